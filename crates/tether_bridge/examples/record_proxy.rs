//! Demo: host records and callbacks driven from guest script
//!
//! **Shows:**
//! - A Rust record exposed as a sealed guest object (`Host.type("Inventory")`)
//! - A host callback with declared arity, and the ArityError on misuse
//! - void / scalar / list call context observed by guest code
//! - Release notifications when the guest drops host-backed values
//!
//! Run with: cargo run -p tether_bridge --example record_proxy

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tether_bridge::{
    GuestError, Handle, HostKind, HostObject, HostResult, Interpreter, InterpreterConfig, Outcome,
    Session,
};

// ============================================================================
// HOST RECORD
// ============================================================================

struct Inventory {
    item: String,
    count: Rc<Cell<i64>>,
}

impl HostObject for Inventory {
    fn get_field<'s, 'js>(&self, s: &Session<'s, 'js>, field: &str) -> Outcome<'js, Handle<'js>> {
        match field {
            "item" => s.new_string(&self.item),
            "count" => Ok(s.new_int(self.count.get())),
            other => Err(s.error(format!("no field {other}"))),
        }
    }

    fn set_field<'s, 'js>(
        &self,
        s: &Session<'s, 'js>,
        field: &str,
        value: Handle<'js>,
    ) -> Outcome<'js, ()> {
        match field {
            "count" => {
                self.count.set(s.to_int(&value)?);
                Ok(())
            }
            other => Err(s.type_error(format!("{other} is read-only"))),
        }
    }

    fn methods(&self) -> &[&str] {
        &["restock"]
    }

    fn call_method<'s, 'js>(
        &self,
        s: &Session<'s, 'js>,
        name: &str,
        args: Vec<Handle<'js>>,
    ) -> HostResult<'js> {
        match name {
            "restock" => {
                let amount = match args.first() {
                    Some(amount) => s.to_int(amount)?,
                    None => 1,
                };
                self.count.set(self.count.get() + amount);
                Ok(vec![s.new_int(self.count.get())])
            }
            other => Err(s.type_error(format!("no method {other}"))),
        }
    }
}

// ============================================================================
// MAIN
// ============================================================================

// Guest errors borrow the session; flatten them before they leave `bind`.
fn guest(err: GuestError<'_>) -> anyhow::Error {
    anyhow::anyhow!("guest error: {err}")
}

const SCRIPT: &str = r#"
    function audit(inv) {
        inv.count = inv.count - 3;
        inv.restock(10);
        return [inv.item, inv.count, inv instanceof Host.type("Inventory")];
    }

    function shape() {
        return Host.context() === "list" ? ["a", "b", "c"] : Host.context();
    }
"#;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Tether Bridge: record proxy demo ===\n");

    let config = InterpreterConfig::from_json(r#"{ "memory_limit": 33554432 }"#)?;
    let interp = Interpreter::init(config)?;

    let released = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&released);
    interp.on_release(move |id, kind| sink.borrow_mut().push((id, kind)));

    let count = Rc::new(Cell::new(5));

    interp.bind(|s| -> anyhow::Result<()> {
        s.eval(SCRIPT).map_err(guest)?;

        println!("1. Proxying a host record...");
        let inventory = Inventory {
            item: "lantern".to_string(),
            count: Rc::clone(&count),
        };
        let proxy = s
            .new_proxy_object(inventory, "Inventory", &["item", "count"])
            .map_err(guest)?;

        let audit = s.global("audit").map_err(guest)?;
        let results = s.invoke(&audit, vec![proxy], 3).map_err(guest)?;
        for result in &results {
            println!("   {}", s.describe(result));
        }

        println!("\n2. Call context as seen by the guest...");
        let shape = s.global("shape").map_err(guest)?;
        for wanted in [0, 1, 2] {
            let out = s.invoke(&shape, Vec::new(), wanted).map_err(guest)?;
            let shown: Vec<String> = out.iter().map(|h| s.describe(h)).collect();
            println!("   wanted {wanted}: {shown:?}");
        }

        println!("\n3. Host callback with declared arity...");
        let scale = s
            .register_callback(2, 1, |s, args| {
                let product = s.to_float(&args[0])? * s.to_float(&args[1])?;
                Ok(vec![s.new_float(product)])
            })
            .map_err(guest)?;
        s.set_global("scale", scale).map_err(guest)?;
        let ok = s.eval("scale(1.5, 4)").map_err(guest)?;
        println!("   scale(1.5, 4) = {}", s.to_float(&ok).map_err(guest)?);
        match s.eval("scale(2)") {
            Ok(_) => println!("   scale(2) unexpectedly succeeded"),
            Err(err) => println!("   scale(2) -> {err} ({:?})", err.kind()),
        }

        s.eval("scale = undefined").map_err(guest)?;
        Ok(())
    })?;

    interp.collect_garbage();
    println!("\n4. Released by the guest:");
    for (id, kind) in released.borrow().iter() {
        let what = match kind {
            HostKind::Callback => "callback",
            HostKind::Object => "record",
        };
        println!("   {what} {id}");
    }
    println!("   live host entries: {}", interp.host_entries());
    println!("   final count on host side: {}", count.get());

    interp.teardown();
    println!("\n✅ Done");
    Ok(())
}
