//! Bridge error types
//!
//! Two channels, never mixed:
//! - [`BridgeError`]: host-side failures (init, config, caller mistakes)
//! - [`GuestError`]: a guest error value captured at the crossing point
//!   instead of unwinding the host

use crate::handle::Handle;
use crate::session::Session;
use rquickjs::convert::Coerced;
use rquickjs::{Ctx, Object, Value};
use std::fmt;
use thiserror::Error;

/// Host-side failures that do not originate from guest code.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("guest runtime failed to initialize: {0}")]
    Init(#[source] rquickjs::Error),

    #[error("unrecognized host kind '{0}'")]
    UnknownKind(String),

    #[error("invalid interpreter config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("failed to read interpreter config: {0}")]
    Io(#[from] std::io::Error),
}

/// Classification of a captured guest error, derived from its `name`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GuestErrorKind {
    /// Evaluation or invocation failure raised by guest code.
    Runtime,
    /// A host callback was called with the wrong number of arguments.
    Arity,
    /// Operation on a value of the wrong runtime shape.
    Type,
}

/// A guest error value owned by the host.
///
/// Holding one keeps the guest value alive; [`GuestError::into_handle`] hands
/// it over as a regular handle.
#[derive(Debug)]
pub struct GuestError<'js> {
    value: Value<'js>,
    kind: GuestErrorKind,
    name: Option<String>,
    message: String,
    stack: Option<String>,
}

/// Explicit error slot carried by every session operation.
pub type Outcome<'js, T> = Result<T, GuestError<'js>>;

impl<'js> GuestError<'js> {
    pub(crate) fn from_value(value: Value<'js>) -> Self {
        let ctx = value.ctx().clone();
        let (name, message, stack) = match value.as_object() {
            Some(object) => (
                read_string(&ctx, object, "name"),
                read_string(&ctx, object, "message"),
                read_string(&ctx, object, "stack"),
            ),
            None => (None, None, None),
        };
        let message = message.unwrap_or_else(|| coerce_message(&ctx, &value));
        let kind = match name.as_deref() {
            Some("ArityError") => GuestErrorKind::Arity,
            Some("TypeError") => GuestErrorKind::Type,
            _ => GuestErrorKind::Runtime,
        };
        Self {
            value,
            kind,
            name,
            message,
            stack,
        }
    }

    pub fn kind(&self) -> GuestErrorKind {
        self.kind
    }

    /// Guest error class name (`"TypeError"`, ...), absent for thrown non-objects.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> Option<&str> {
        self.stack.as_deref()
    }

    /// Retain the error value as an additional handle.
    pub fn handle(&self) -> Handle<'js> {
        Handle::new(self.value.clone())
    }

    pub fn into_handle(self) -> Handle<'js> {
        Handle::new(self.value)
    }

    pub(crate) fn into_value(self) -> Value<'js> {
        self.value
    }
}

impl fmt::Display for GuestError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{}: {}", name, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for GuestError<'_> {}

/// Converts raw `rquickjs` results into [`Outcome`]s bound to a session.
pub trait Captured<'js, T> {
    fn captured(self, session: &Session<'_, 'js>) -> Outcome<'js, T>;
}

impl<'js, T> Captured<'js, T> for rquickjs::Result<T> {
    fn captured(self, session: &Session<'_, 'js>) -> Outcome<'js, T> {
        self.map_err(|err| session.capture(err))
    }
}

// Reading diagnostics must not leave a pending exception behind.
fn read_string<'js>(ctx: &Ctx<'js>, object: &Object<'js>, key: &str) -> Option<String> {
    match object.get::<_, Option<String>>(key) {
        Ok(text) => text,
        Err(err) => {
            discard_pending(ctx, &err);
            None
        }
    }
}

fn coerce_message<'js>(ctx: &Ctx<'js>, value: &Value<'js>) -> String {
    match value.get::<Coerced<String>>() {
        Ok(Coerced(text)) => text,
        Err(err) => {
            discard_pending(ctx, &err);
            format!("<unprintable {}>", value.type_name())
        }
    }
}

fn discard_pending(ctx: &Ctx<'_>, err: &rquickjs::Error) {
    if matches!(err, rquickjs::Error::Exception) {
        let _ = ctx.catch();
    }
}
