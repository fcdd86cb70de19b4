//! Guest value handles
//!
//! Handle-based access to guest-owned values. A [`Handle`] owns exactly one
//! guest reference: [`Handle::retain`] takes another, dropping (or
//! [`Handle::release`]) gives it back. Handles are move-only, so a double
//! release cannot be expressed.

use crate::interpreter::Interpreter;
use rquickjs::{Persistent, Type, Value};
use std::fmt;
use std::marker::PhantomData;

/// Owned reference to a guest value, valid for one bound session.
pub struct Handle<'js> {
    value: Value<'js>,
}

impl<'js> Handle<'js> {
    pub(crate) fn new(value: Value<'js>) -> Self {
        Self { value }
    }

    /// Take an additional guest reference to the same value.
    pub fn retain(&self) -> Handle<'js> {
        Handle::new(self.value.clone())
    }

    /// Give this reference back to the guest.
    ///
    /// Dropping the last reference destroys the guest value, running any
    /// release notification attached to it.
    pub fn release(self) {
        drop(self);
    }

    pub fn type_of(&self) -> Type {
        self.value.type_of()
    }

    pub fn type_name(&self) -> &'static str {
        self.value.type_name()
    }

    pub fn is_callable(&self) -> bool {
        self.value.is_function()
    }

    /// Identity comparison (same guest value), not structural equality.
    pub fn same_value(&self, other: &Handle<'js>) -> bool {
        self.value == other.value
    }

    pub fn as_value(&self) -> &Value<'js> {
        &self.value
    }

    pub fn into_value(self) -> Value<'js> {
        self.value
    }
}

impl fmt::Debug for Handle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("type", &self.value.type_name())
            .finish()
    }
}

/// Handle retained past the session that produced it.
///
/// Borrows the interpreter, so teardown cannot run while one is alive.
/// Bring it back into a session with [`Session::restore`](crate::Session::restore).
pub struct Stashed<'i> {
    value: Persistent<Value<'static>>,
    _interpreter: PhantomData<&'i Interpreter>,
}

impl<'i> Stashed<'i> {
    pub(crate) fn new(value: Persistent<Value<'static>>) -> Self {
        Self {
            value,
            _interpreter: PhantomData,
        }
    }

    pub(crate) fn persistent(&self) -> &Persistent<Value<'static>> {
        &self.value
    }
}

impl fmt::Debug for Stashed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stashed").finish_non_exhaustive()
    }
}
