//! Tether Bridge
//!
//! Bidirectional bridge between a Rust host and an embedded QuickJS guest.
//!
//! ## Architecture
//!
//! - **Interpreter:** owns one guest runtime; `bind` opens a [`Session`]
//! - **Handles:** owned guest values; clone = retain, drop = release
//! - **Codecs:** scalars, arrays and mappings in both directions
//! - **Calls:** host→guest `invoke` with void/scalar/list context,
//!   guest→host callbacks with declared arity
//! - **Proxies:** host records exposed as sealed guest objects whose
//!   fields delegate back to the host
//! - **Typed bindings:** Rust types, tuples and closures converted through
//!   [`IntoGuest`] / [`FromGuest`]
//!
//! Guest failures never unwind the host: every session operation returns an
//! [`Outcome`] whose error slot carries the captured guest error value.
//!
//! See `examples/record_proxy.rs` for a walkthrough.

pub mod call;
pub mod composite;
pub mod config;
pub mod error;
pub mod handle;
pub mod host;
pub mod interpreter;
mod prelude;
pub mod scalar;
pub mod session;
pub mod typed;

pub use call::CallContext;
pub use config::InterpreterConfig;
pub use error::{BridgeError, Captured, GuestError, GuestErrorKind, Outcome};
pub use handle::{Handle, Stashed};
pub use host::{HostId, HostKind, HostObject, HostResult};
pub use interpreter::Interpreter;
pub use session::Session;
pub use typed::{FromGuest, FromGuestList, GuestFn, IntoGuest, IntoGuestList};

pub use rquickjs;

/// Bridge version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
