//! Host → guest calls
//!
//! The number of results the host asks for selects the guest-visible call
//! context, which guest code reads with `Host.context()`:
//!
//! | wanted | context    | results                                         |
//! |--------|------------|-------------------------------------------------|
//! | 0      | `"void"`   | none, the return value is discarded             |
//! | 1      | `"scalar"` | the return value                                |
//! | n ≥ 2  | `"list"`   | an array return spread into at most n results   |
//!
//! A guest callable may behave differently per context, so `wanted` is part
//! of the call, not a truncation applied afterwards.

use crate::error::{Captured, Outcome};
use crate::handle::Handle;
use crate::session::Session;
use rquickjs::{Array, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallContext {
    Void,
    Scalar,
    List,
}

impl CallContext {
    pub fn for_wanted(wanted: usize) -> Self {
        match wanted {
            0 => CallContext::Void,
            1 => CallContext::Scalar,
            _ => CallContext::List,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CallContext::Void => "void",
            CallContext::Scalar => "scalar",
            CallContext::List => "list",
        }
    }
}

impl fmt::Display for CallContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'i, 'js> Session<'i, 'js> {
    /// Call a guest callable with positional arguments.
    ///
    /// Guest faults come back through the error slot; the host never unwinds.
    /// Invoking a non-callable handle is a `TypeError`.
    pub fn invoke(
        &self,
        callable: &Handle<'js>,
        args: Vec<Handle<'js>>,
        wanted: usize,
    ) -> Outcome<'js, Vec<Handle<'js>>> {
        if !callable.is_callable() {
            return Err(self.type_error(format!("cannot invoke a {}", callable.type_name())));
        }
        let context = CallContext::for_wanted(wanted);
        tracing::trace!(%context, args = args.len(), "invoke");

        let args = self.array_of(args).captured(self)?;
        let returned: Value = self
            .prelude_fn("call")?
            .call((context.as_str(), callable.as_value().clone(), args))
            .captured(self)?;
        self.unpack_returns(returned, wanted)
    }

    /// Call `receiver[name]` with `this` bound to `receiver`.
    pub fn invoke_method(
        &self,
        receiver: &Handle<'js>,
        name: &str,
        args: Vec<Handle<'js>>,
        wanted: usize,
    ) -> Outcome<'js, Vec<Handle<'js>>> {
        let context = CallContext::for_wanted(wanted);
        tracing::trace!(%context, method = name, args = args.len(), "invoke method");

        let args = self.array_of(args).captured(self)?;
        let returned: Value = self
            .prelude_fn("callMethod")?
            .call((context.as_str(), receiver.as_value().clone(), name, args))
            .captured(self)?;
        self.unpack_returns(returned, wanted)
    }

    /// Pack host results for a guest caller: none, the value, or an array.
    pub(crate) fn pack_returns(&self, mut values: Vec<Handle<'js>>) -> rquickjs::Result<Value<'js>> {
        match values.len() {
            0 => Ok(Value::new_undefined(self.ctx.clone())),
            1 => Ok(values.remove(0).into_value()),
            _ => self.array_of(values).map(Array::into_value),
        }
    }

    fn unpack_returns(&self, returned: Value<'js>, wanted: usize) -> Outcome<'js, Vec<Handle<'js>>> {
        match CallContext::for_wanted(wanted) {
            CallContext::Void => Ok(Vec::new()),
            CallContext::Scalar => Ok(vec![Handle::new(returned)]),
            CallContext::List => {
                if returned.is_undefined() {
                    return Ok(Vec::new());
                }
                match returned.as_array() {
                    Some(array) => array
                        .iter::<Value>()
                        .take(wanted)
                        .map(|item| item.map(Handle::new))
                        .collect::<rquickjs::Result<Vec<_>>>()
                        .captured(self),
                    None => Ok(vec![Handle::new(returned)]),
                }
            }
        }
    }
}
