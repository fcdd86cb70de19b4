use super::{HostEntry, HostId, HostKind, HostResult, HostState, ObjectEntry, ReleaseGuard};
use crate::error::{Captured, Outcome};
use crate::handle::Handle;
use crate::session::Session;
use rquickjs::function::Rest;
use rquickjs::{Ctx, Exception, Function, Object, Value};
use std::rc::Rc;

/// Host record exposed to the guest through a proxy object.
///
/// Field reads and writes made by guest code are delegated here
/// synchronously. Implementations keep their own state behind interior
/// mutability since delegation only hands out `&self`.
pub trait HostObject: 'static {
    fn get_field<'s, 'js>(&self, session: &Session<'s, 'js>, field: &str)
        -> Outcome<'js, Handle<'js>>;

    fn set_field<'s, 'js>(
        &self,
        session: &Session<'s, 'js>,
        field: &str,
        value: Handle<'js>,
    ) -> Outcome<'js, ()>;

    /// Method names the guest may call on the proxy.
    fn methods(&self) -> &[&str] {
        &[]
    }

    /// Results are packed like callback results.
    fn call_method<'s, 'js>(
        &self,
        session: &Session<'s, 'js>,
        name: &str,
        args: Vec<Handle<'js>>,
    ) -> HostResult<'js> {
        let _ = args;
        Err(session.type_error(format!("method '{name}' is not implemented")))
    }
}

impl<'i, 'js> Session<'i, 'js> {
    /// Expose `object` to the guest as a sealed record of type `type_name`.
    ///
    /// The guest sees exactly `fields` (in order) plus the object's declared
    /// methods. New properties cannot be added and existing ones cannot be
    /// deleted or redefined.
    pub fn new_proxy_object<O>(
        &self,
        object: O,
        type_name: &str,
        fields: &[&str],
    ) -> Outcome<'js, Handle<'js>>
    where
        O: HostObject,
    {
        let methods: Vec<String> = object.methods().iter().map(|m| m.to_string()).collect();
        let fields: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
        let id = self.host.insert(HostEntry::Object(ObjectEntry {
            object: Rc::new(object),
            type_name: type_name.to_string(),
        }));
        let guard = Rc::new(ReleaseGuard::new(
            Rc::clone(&self.host),
            id,
            HostKind::Object,
        ));

        let delegates = Object::new(self.ctx.clone()).captured(self)?;
        delegates
            .set("get", self.delegate(&guard, get_field)?)
            .captured(self)?;
        delegates
            .set("set", self.delegate(&guard, set_field)?)
            .captured(self)?;
        delegates
            .set("call", self.delegate(&guard, call_method)?)
            .captured(self)?;
        drop(guard);

        let proxy: Value = self
            .prelude_fn("proxy")?
            .call((id.to_guest(), type_name, fields, methods, delegates))
            .captured(self)?;
        Ok(Handle::new(proxy))
    }

    /// Recover the host id behind a callback or proxy handle.
    ///
    /// `None` when the value is not a host registration of `kind`.
    pub fn resolve_id(&self, handle: &Handle<'js>, kind: HostKind) -> Outcome<'js, Option<HostId>> {
        let found: Value = self
            .prelude_fn("lookup")?
            .call((handle.as_value().clone(), kind.as_str()))
            .captured(self)?;
        Ok(found.as_number().map(HostId::from_guest))
    }

    fn delegate(
        &self,
        guard: &Rc<ReleaseGuard>,
        handler: Delegate,
    ) -> Outcome<'js, Function<'js>> {
        let guard = Rc::clone(guard);
        Function::new(
            self.ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                let id = guard.id();
                let host: Rc<HostState> = guard.host();
                let Some(object) = host.object(id) else {
                    return Err(Exception::throw_reference(
                        &ctx,
                        &format!("host object {id} is no longer registered"),
                    ));
                };
                let session = Session::attach(ctx.clone(), host)?;
                let mut args = args.0.into_iter().map(Handle::new);
                let name = match args.next() {
                    Some(name) => name.into_value().get::<String>()?,
                    None => return Err(Exception::throw_type(&ctx, "missing member name")),
                };
                match handler(&session, object.as_ref(), &name, args.collect()) {
                    Ok(value) => Ok(value),
                    Err(err) => Err(ctx.throw(err.into_value())),
                }
            },
        )
        .captured(self)
    }
}

type Delegate = for<'s, 'v> fn(
    &Session<'s, 'v>,
    &dyn HostObject,
    &str,
    Vec<Handle<'v>>,
) -> Outcome<'v, Value<'v>>;

fn get_field<'s, 'v>(
    session: &Session<'s, 'v>,
    object: &dyn HostObject,
    field: &str,
    _args: Vec<Handle<'v>>,
) -> Outcome<'v, Value<'v>> {
    tracing::trace!(field, "guest read host field");
    object.get_field(session, field).map(Handle::into_value)
}

fn set_field<'s, 'v>(
    session: &Session<'s, 'v>,
    object: &dyn HostObject,
    field: &str,
    args: Vec<Handle<'v>>,
) -> Outcome<'v, Value<'v>> {
    tracing::trace!(field, "guest wrote host field");
    let value = match args.into_iter().next() {
        Some(value) => value,
        None => session.new_undefined(),
    };
    object.set_field(session, field, value)?;
    Ok(Value::new_undefined(session.ctx().clone()))
}

fn call_method<'s, 'v>(
    session: &Session<'s, 'v>,
    object: &dyn HostObject,
    name: &str,
    args: Vec<Handle<'v>>,
) -> Outcome<'v, Value<'v>> {
    tracing::trace!(method = name, args = args.len(), "guest called host method");
    let returns = object.call_method(session, name, args)?;
    session.pack_returns(returns).captured(session)
}
