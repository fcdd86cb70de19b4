//! Guest runtime lifecycle
//!
//! One [`Interpreter`] owns one QuickJS runtime and context. It is neither
//! `Send` nor `Sync`: an instance lives on the thread that created it, and
//! independent instances on different threads share no guest state.

use crate::config::InterpreterConfig;
use crate::error::BridgeError;
use crate::host::{HostId, HostKind, HostState};
use crate::prelude;
use crate::session::Session;
use rquickjs::{Context, Object, Persistent, Runtime, Value};
use std::rc::Rc;

/// Embedded guest runtime instance.
pub struct Interpreter {
    // Field order is drop order: context before runtime.
    context: Context,
    runtime: Runtime,
    host: Rc<HostState>,
    config: InterpreterConfig,
}

impl Interpreter {
    /// Create an interpreter with default settings.
    pub fn new() -> Result<Self, BridgeError> {
        Self::init(InterpreterConfig::default())
    }

    /// Allocate and bootstrap a fresh guest runtime.
    pub fn init(config: InterpreterConfig) -> Result<Self, BridgeError> {
        let runtime = Runtime::new().map_err(BridgeError::Init)?;
        if let Some(limit) = config.memory_limit {
            runtime.set_memory_limit(limit);
        }
        if let Some(limit) = config.max_stack_size {
            runtime.set_max_stack_size(limit);
        }
        if let Some(threshold) = config.gc_threshold {
            runtime.set_gc_threshold(threshold);
        }
        let context = Context::full(&runtime).map_err(BridgeError::Init)?;

        let helpers = context
            .with(|ctx| -> rquickjs::Result<Persistent<Object<'static>>> {
                let helpers: Object = ctx.eval(prelude::SOURCE)?;
                let api: Value = helpers.get("api")?;
                ctx.globals().set(config.namespace.as_str(), api)?;
                Ok(Persistent::save(&ctx, helpers))
            })
            .map_err(BridgeError::Init)?;

        tracing::info!(namespace = %config.namespace, "guest interpreter initialized");

        Ok(Self {
            context,
            runtime,
            host: Rc::new(HostState::new(helpers)),
            config,
        })
    }

    /// Bind the guest context to the calling thread and run `f` with it.
    ///
    /// Every handle created inside `f` is released when it returns unless it
    /// was stashed. Guest → host dispatch hands callbacks their own session,
    /// so `bind` must not be called again from inside `f`.
    pub fn bind<'i, F, R>(&'i self, f: F) -> R
    where
        F: for<'js> FnOnce(&Session<'i, 'js>) -> R,
    {
        self.context.with(|ctx| {
            let session = Session::attach(ctx, Rc::clone(&self.host))
                .expect("prelude stays attached until teardown");
            f(&session)
        })
    }

    /// Number of blocks the guest allocator currently holds.
    ///
    /// Counts allocator blocks (objects, strings, shapes, bytecode), so small
    /// numbers and booleans do not show up. Leak diagnostic for tests; must be
    /// called outside [`Interpreter::bind`].
    pub fn count_live(&self) -> u64 {
        let blocks = self.runtime.memory_usage().malloc_count;
        u64::try_from(blocks).unwrap_or_default()
    }

    /// Run the guest cycle collector. Must be called outside [`Interpreter::bind`].
    pub fn collect_garbage(&self) {
        self.runtime.run_gc();
    }

    /// Observe guest releases of host callbacks and proxy objects.
    pub fn on_release(&self, hook: impl Fn(HostId, HostKind) + 'static) {
        self.host.set_release_hook(Rc::new(hook));
    }

    /// Host registrations still referenced by the guest.
    pub fn host_entries(&self) -> usize {
        self.host.len()
    }

    pub fn config(&self) -> &InterpreterConfig {
        &self.config
    }

    /// Destroy the guest runtime.
    ///
    /// Outstanding [`Stashed`](crate::Stashed) handles borrow the interpreter,
    /// so none can survive this call. Callbacks and proxies still held by the
    /// guest are released (and reported) while the runtime shuts down.
    pub fn teardown(self) {
        drop(self);
    }
}

impl Drop for Interpreter {
    fn drop(&mut self) {
        tracing::info!(live_entries = self.host.len(), "tearing down guest interpreter");
        self.host.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_is_configurable() {
        let config = InterpreterConfig {
            namespace: "Bridge".to_string(),
            ..InterpreterConfig::default()
        };
        let interp = Interpreter::init(config).unwrap();
        assert_eq!(interp.config().namespace, "Bridge");
        interp.bind(|s| {
            let h = s.eval("typeof Bridge.context + ':' + typeof Host").unwrap();
            assert_eq!(s.to_bytes(&h).unwrap(), b"function:undefined");
        });
        interp.teardown();
    }

    #[test]
    fn test_memory_limit_is_enforced() {
        let config = InterpreterConfig {
            memory_limit: Some(4 << 20),
            ..InterpreterConfig::default()
        };
        let interp = Interpreter::init(config).unwrap();
        interp.bind(|s| {
            assert!(s.eval("'x'.repeat(1 << 24).length").is_err());
            assert_eq!(s.to_int(&s.eval("2 + 2").unwrap()).unwrap(), 4);
        });
    }

    #[test]
    fn test_interpreters_on_separate_threads() {
        let workers: Vec<_> = (1..=2)
            .map(|n: i64| {
                std::thread::spawn(move || {
                    let interp = Interpreter::new().unwrap();
                    interp.bind(|s| {
                        s.set_global("n", s.new_int(n)).unwrap();
                        s.to_int(&s.eval("n * 10").unwrap()).unwrap()
                    })
                })
            })
            .collect();
        let results: Vec<i64> = workers.into_iter().map(|w| w.join().unwrap()).collect();
        assert_eq!(results, vec![10, 20]);
    }

    #[test]
    fn test_fresh_interpreter_has_no_host_entries() {
        let interp = Interpreter::new().unwrap();
        assert_eq!(interp.host_entries(), 0);
        interp.collect_garbage();
        assert!(interp.count_live() > 0);
    }
}
