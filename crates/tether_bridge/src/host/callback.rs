use super::{CallbackEntry, HostEntry, HostKind, HostResult, HostState, ReleaseGuard};
use crate::error::{Captured, Outcome};
use crate::handle::Handle;
use crate::session::Session;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Value};
use std::rc::Rc;

/// Host function callable from guest code.
///
/// Receives exactly the declared number of argument handles and must return
/// exactly the declared number of result handles. Returning `Err` throws the
/// error value into the guest caller.
pub type HostFn = dyn for<'s, 'v> Fn(&Session<'s, 'v>, Vec<Handle<'v>>) -> HostResult<'v>;

impl<'i, 'js> Session<'i, 'js> {
    /// Expose `func` to the guest as a callable value.
    ///
    /// Guest calls with an argument count other than `in_arity` raise an
    /// `ArityError` inside the guest. The registration is dropped, and the
    /// release hook notified, once the guest frees the returned function.
    pub fn register_callback<F>(
        &self,
        in_arity: usize,
        out_arity: usize,
        func: F,
    ) -> Outcome<'js, Handle<'js>>
    where
        F: for<'s, 'v> Fn(&Session<'s, 'v>, Vec<Handle<'v>>) -> HostResult<'v> + 'static,
    {
        let id = self.host.insert(HostEntry::Callback(CallbackEntry {
            func: Rc::new(func),
            in_arity,
            out_arity,
        }));
        let guard = ReleaseGuard::new(Rc::clone(&self.host), id, HostKind::Callback);

        let function = Function::new(
            self.ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                dispatch(&guard, ctx, args.0)
            },
        )
        .captured(self)?;

        let tagged: Value = self
            .prelude_fn("tagCallback")?
            .call((function, id.to_guest()))
            .captured(self)?;
        Ok(Handle::new(tagged))
    }

    /// Raise an `ArityError` in the guest, for use inside dispatch.
    pub(crate) fn throw_arity(&self, message: String) -> rquickjs::Error {
        let built = self
            .prelude
            .get::<_, Function>("arityError")
            .and_then(|make| make.call::<_, Value>((message,)));
        match built {
            Ok(error) => self.ctx.throw(error),
            Err(err) => err,
        }
    }
}

fn dispatch<'js>(
    guard: &ReleaseGuard,
    ctx: Ctx<'js>,
    args: Vec<Value<'js>>,
) -> rquickjs::Result<Value<'js>> {
    let id = guard.id();
    let host: Rc<HostState> = guard.host();
    let Some((func, in_arity, out_arity)) = host.callback(id) else {
        return Err(Exception::throw_reference(
            &ctx,
            &format!("host callback {id} is no longer registered"),
        ));
    };

    let session = Session::attach(ctx.clone(), host)?;
    if args.len() != in_arity {
        return Err(session.throw_arity(format!(
            "callback {id} expects {in_arity} argument(s), got {}",
            args.len()
        )));
    }

    tracing::trace!(%id, args = args.len(), "guest called host callback");
    let returns = match func(&session, args.into_iter().map(Handle::new).collect()) {
        Ok(returns) => returns,
        Err(err) => return Err(ctx.throw(err.into_value())),
    };
    if returns.len() != out_arity {
        return Err(session.throw_arity(format!(
            "callback {id} must return {out_arity} value(s), returned {}",
            returns.len()
        )));
    }
    session.pack_returns(returns)
}
