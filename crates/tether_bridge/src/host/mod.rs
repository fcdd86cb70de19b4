//! Host registrations visible to the guest
//!
//! Callbacks and proxy objects are identified by a [`HostId`]. The registry
//! maps each id to its host-side implementation; the guest side only carries
//! the id plus a [`ReleaseGuard`] buried in the native functions it calls.
//! When the guest frees the last of those functions the guard drops, the
//! entry is removed and the release hook runs, all synchronously inside the
//! guest's own free path.

mod callback;
mod object;

pub use callback::HostFn;
pub use object::HostObject;

use crate::error::{BridgeError, Outcome};
use crate::handle::Handle;
use rquickjs::{Ctx, Exception, Object, Persistent};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

/// Values handed back by a host callback or proxy method.
pub type HostResult<'js> = Outcome<'js, Vec<Handle<'js>>>;

/// Opaque host identifier of a callback or proxy object.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(u64);

impl HostId {
    pub fn get(self) -> u64 {
        self.0
    }

    // Guest numbers are doubles; ids stay far below 2^53.
    pub(crate) fn to_guest(self) -> f64 {
        self.0 as f64
    }

    pub(crate) fn from_guest(raw: f64) -> Self {
        HostId(raw as u64)
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a [`HostId`] refers to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HostKind {
    Callback,
    Object,
}

impl HostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HostKind::Callback => "callback",
            HostKind::Object => "object",
        }
    }
}

impl fmt::Display for HostKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HostKind {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "callback" => Ok(HostKind::Callback),
            "object" => Ok(HostKind::Object),
            other => Err(BridgeError::UnknownKind(other.to_string())),
        }
    }
}

pub(crate) struct CallbackEntry {
    pub func: Rc<HostFn>,
    pub in_arity: usize,
    pub out_arity: usize,
}

pub(crate) struct ObjectEntry {
    pub object: Rc<dyn HostObject>,
    pub type_name: String,
}

pub(crate) enum HostEntry {
    Callback(CallbackEntry),
    Object(ObjectEntry),
}

impl HostEntry {
    fn kind(&self) -> HostKind {
        match self {
            HostEntry::Callback(_) => HostKind::Callback,
            HostEntry::Object(_) => HostKind::Object,
        }
    }
}

type ReleaseHook = Rc<dyn Fn(HostId, HostKind)>;

/// Per-interpreter host state shared with guest-side dispatch stubs.
pub(crate) struct HostState {
    prelude: RefCell<Option<Persistent<Object<'static>>>>,
    next_id: Cell<u64>,
    entries: RefCell<HashMap<HostId, HostEntry>>,
    release_hook: RefCell<Option<ReleaseHook>>,
}

impl HostState {
    pub fn new(prelude: Persistent<Object<'static>>) -> Self {
        Self {
            prelude: RefCell::new(Some(prelude)),
            next_id: Cell::new(1),
            entries: RefCell::new(HashMap::new()),
            release_hook: RefCell::new(None),
        }
    }

    /// Restore the bootstrap helper table inside `ctx`.
    pub fn prelude<'js>(&self, ctx: &Ctx<'js>) -> rquickjs::Result<Object<'js>> {
        let saved = self.prelude.borrow().clone();
        match saved {
            Some(prelude) => prelude.restore(ctx),
            None => Err(Exception::throw_message(ctx, "interpreter is tearing down")),
        }
    }

    /// Drop the helper table so dispatch stubs no longer pin the context.
    pub fn detach(&self) {
        let prelude = self.prelude.borrow_mut().take();
        drop(prelude);
    }

    pub fn insert(&self, entry: HostEntry) -> HostId {
        let id = HostId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        tracing::debug!(%id, kind = %entry.kind(), "registered host entry");
        self.entries.borrow_mut().insert(id, entry);
        id
    }

    pub fn callback(&self, id: HostId) -> Option<(Rc<HostFn>, usize, usize)> {
        match self.entries.borrow().get(&id) {
            Some(HostEntry::Callback(entry)) => {
                Some((Rc::clone(&entry.func), entry.in_arity, entry.out_arity))
            }
            _ => None,
        }
    }

    pub fn object(&self, id: HostId) -> Option<Rc<dyn HostObject>> {
        match self.entries.borrow().get(&id) {
            Some(HostEntry::Object(entry)) => Some(Rc::clone(&entry.object)),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn set_release_hook(&self, hook: ReleaseHook) {
        *self.release_hook.borrow_mut() = Some(hook);
    }

    /// Forget `id` and notify the host. Runs from the guest's free path.
    fn release(&self, id: HostId, kind: HostKind) {
        let removed = self.entries.borrow_mut().remove(&id);
        if let Some(HostEntry::Object(entry)) = &removed {
            tracing::debug!(%id, type_name = %entry.type_name, "guest released proxy object");
        } else {
            tracing::debug!(%id, %kind, "guest released host entry");
        }
        // host resources go away outside the registry borrow
        drop(removed);

        let hook = self.release_hook.borrow().clone();
        if let Some(hook) = hook {
            hook(id, kind);
        }
    }
}

/// Ties a registration to the lifetime of the guest functions that use it.
pub(crate) struct ReleaseGuard {
    host: Rc<HostState>,
    id: HostId,
    kind: HostKind,
}

impl ReleaseGuard {
    pub fn new(host: Rc<HostState>, id: HostId, kind: HostKind) -> Self {
        Self { host, id, kind }
    }

    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn host(&self) -> Rc<HostState> {
        Rc::clone(&self.host)
    }
}

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.host.release(self.id, self.kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("callback".parse::<HostKind>().unwrap(), HostKind::Callback);
        assert_eq!("object".parse::<HostKind>().unwrap(), HostKind::Object);
        let err = "widget".parse::<HostKind>().unwrap_err();
        assert!(matches!(err, BridgeError::UnknownKind(ref k) if k == "widget"));
    }

    #[test]
    fn test_host_id_guest_round_trip() {
        let id = HostId(77);
        assert_eq!(HostId::from_guest(id.to_guest()), id);
        assert_eq!(id.to_string(), "#77");
        assert_eq!(id.get(), 77);
    }
}
