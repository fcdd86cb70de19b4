//! Bound execution context
//!
//! A [`Session`] only exists inside [`Interpreter::bind`] (or inside a guest
//! → host dispatch), so every bridge operation is statically tied to a bound
//! guest context. Handles produced by a session carry its `'js` lifetime and
//! cannot escape it; use [`Session::stash`] to keep a value longer.

use crate::error::{Captured, GuestError, Outcome};
use crate::handle::{Handle, Stashed};
use crate::host::HostState;
use crate::interpreter::Interpreter;
use rquickjs::{Ctx, Exception, Function, Object, Persistent, Value};
use std::marker::PhantomData;
use std::rc::Rc;

/// Guest execution context bound to the calling thread.
pub struct Session<'i, 'js> {
    pub(crate) ctx: Ctx<'js>,
    pub(crate) host: Rc<HostState>,
    pub(crate) prelude: Object<'js>,
    _interpreter: PhantomData<&'i Interpreter>,
}

impl<'i, 'js> Session<'i, 'js> {
    /// Bind a session to a context handed out by the guest runtime.
    pub(crate) fn attach(ctx: Ctx<'js>, host: Rc<HostState>) -> rquickjs::Result<Self> {
        let prelude = host.prelude(&ctx)?;
        Ok(Self {
            ctx,
            host,
            prelude,
            _interpreter: PhantomData,
        })
    }

    pub fn ctx(&self) -> &Ctx<'js> {
        &self.ctx
    }

    /// Evaluate guest source as a script and return its completion value.
    pub fn eval(&self, source: &str) -> Outcome<'js, Handle<'js>> {
        tracing::trace!(bytes = source.len(), "eval");
        self.ctx
            .eval::<Value, _>(source)
            .map(Handle::new)
            .captured(self)
    }

    /// Keep a handle alive beyond this session.
    pub fn stash(&self, handle: &Handle<'js>) -> Stashed<'i> {
        Stashed::new(Persistent::save(&self.ctx, handle.as_value().clone()))
    }

    pub fn restore(&self, stashed: &Stashed<'_>) -> Outcome<'js, Handle<'js>> {
        stashed
            .persistent()
            .clone()
            .restore(&self.ctx)
            .map(Handle::new)
            .captured(self)
    }

    pub fn set_global(&self, name: &str, handle: Handle<'js>) -> Outcome<'js, ()> {
        self.ctx
            .globals()
            .set(name, handle.into_value())
            .captured(self)
    }

    pub fn global(&self, name: &str) -> Outcome<'js, Handle<'js>> {
        self.ctx
            .globals()
            .get::<_, Value>(name)
            .map(Handle::new)
            .captured(self)
    }

    /// Scratch list for batch handle transfer.
    ///
    /// The list is host memory; dropping it releases any handles still inside.
    pub fn alloc_handles(&self, capacity: usize) -> Vec<Handle<'js>> {
        Vec::with_capacity(capacity)
    }

    /// One-line description for diagnostics: type plus guest string form.
    pub fn describe(&self, handle: &Handle<'js>) -> String {
        match self.to_bytes(handle) {
            Ok(bytes) => format!(
                "{}: {}",
                handle.type_name(),
                String::from_utf8_lossy(&bytes)
            ),
            Err(err) => format!("{} (unprintable: {})", handle.type_name(), err),
        }
    }

    /// Build a plain guest `Error` carrying `message`.
    pub fn error(&self, message: impl AsRef<str>) -> GuestError<'js> {
        let _ = Exception::throw_message(&self.ctx, message.as_ref());
        GuestError::from_value(self.ctx.catch())
    }

    /// Build a guest `TypeError` carrying `message`.
    pub fn type_error(&self, message: impl AsRef<str>) -> GuestError<'js> {
        let _ = Exception::throw_type(&self.ctx, message.as_ref());
        GuestError::from_value(self.ctx.catch())
    }

    /// Build a guest `RangeError` carrying `message`.
    pub fn range_error(&self, message: impl AsRef<str>) -> GuestError<'js> {
        let _ = Exception::throw_range(&self.ctx, message.as_ref());
        GuestError::from_value(self.ctx.catch())
    }

    /// Turn a failed guest operation into a captured error value.
    ///
    /// Pending guest exceptions are taken as-is; other runtime failures are
    /// wrapped in a guest `Error` so callers see a single error channel.
    pub(crate) fn capture(&self, err: rquickjs::Error) -> GuestError<'js> {
        let captured = match err {
            rquickjs::Error::Exception => GuestError::from_value(self.ctx.catch()),
            other => self.error(other.to_string()),
        };
        tracing::debug!(kind = ?captured.kind(), error = %captured, "captured guest error");
        captured
    }

    pub(crate) fn prelude_fn(&self, name: &str) -> Outcome<'js, Function<'js>> {
        self.prelude.get::<_, Function>(name).captured(self)
    }
}
