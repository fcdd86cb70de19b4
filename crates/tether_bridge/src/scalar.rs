//! Scalar codec
//!
//! Construction is infallible for numbers and booleans. Reads coerce with
//! guest semantics, so they can run guest code (`valueOf`, `toString`) and
//! therefore report failures through the error slot.

use crate::error::{Captured, Outcome};
use crate::handle::Handle;
use crate::session::Session;
use rquickjs::convert::Coerced;
use rquickjs::{ArrayBuffer, IntoJs, Value};

impl<'i, 'js> Session<'i, 'js> {
    pub fn new_undefined(&self) -> Handle<'js> {
        Handle::new(Value::new_undefined(self.ctx.clone()))
    }

    pub fn new_bool(&self, value: bool) -> Handle<'js> {
        Handle::new(Value::new_bool(self.ctx.clone(), value))
    }

    /// Values outside the guest's 32-bit integer range become doubles.
    pub fn new_int(&self, value: i64) -> Handle<'js> {
        let value = match i32::try_from(value) {
            Ok(small) => Value::new_int(self.ctx.clone(), small),
            Err(_) => Value::new_float(self.ctx.clone(), value as f64),
        };
        Handle::new(value)
    }

    pub fn new_uint(&self, value: u64) -> Handle<'js> {
        let value = match i32::try_from(value) {
            Ok(small) => Value::new_int(self.ctx.clone(), small),
            Err(_) => Value::new_float(self.ctx.clone(), value as f64),
        };
        Handle::new(value)
    }

    pub fn new_float(&self, value: f64) -> Handle<'js> {
        Handle::new(Value::new_float(self.ctx.clone(), value))
    }

    pub fn new_string(&self, text: &str) -> Outcome<'js, Handle<'js>> {
        rquickjs::String::from_str(self.ctx.clone(), text)
            .map(|s| Handle::new(s.into_value()))
            .captured(self)
    }

    /// UTF-8 input becomes a guest string, anything else an `ArrayBuffer`.
    pub fn new_bytes(&self, bytes: &[u8]) -> Outcome<'js, Handle<'js>> {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.new_string(text),
            Err(_) => ArrayBuffer::new(self.ctx.clone(), bytes.to_vec())
                .and_then(|buffer| buffer.into_js(&self.ctx))
                .map(Handle::new)
                .captured(self),
        }
    }

    /// Guest truthiness: `"0"` is true, `""`, `0` and `NaN` are false.
    pub fn to_bool(&self, handle: &Handle<'js>) -> Outcome<'js, bool> {
        handle
            .as_value()
            .get::<Coerced<bool>>()
            .map(|Coerced(b)| b)
            .captured(self)
    }

    pub fn to_float(&self, handle: &Handle<'js>) -> Outcome<'js, f64> {
        handle
            .as_value()
            .get::<Coerced<f64>>()
            .map(|Coerced(n)| n)
            .captured(self)
    }

    /// Truncates toward zero; `NaN` reads as 0.
    pub fn to_int(&self, handle: &Handle<'js>) -> Outcome<'js, i64> {
        self.to_float(handle).map(|n| n as i64)
    }

    pub fn to_uint(&self, handle: &Handle<'js>) -> Outcome<'js, u64> {
        let n = self.to_float(handle)?.trunc();
        if n < 0.0 {
            return Err(self.range_error(format!("{n} is not an unsigned integer")));
        }
        Ok(n as u64)
    }

    /// Raw contents of an `ArrayBuffer`, otherwise the UTF-8 string form.
    pub fn to_bytes(&self, handle: &Handle<'js>) -> Outcome<'js, Vec<u8>> {
        let value = handle.as_value();
        if value.is_object() {
            match value.get::<ArrayBuffer>() {
                Ok(buffer) => {
                    return match buffer.as_bytes() {
                        Some(bytes) => Ok(bytes.to_vec()),
                        None => Err(self.type_error("ArrayBuffer is detached")),
                    };
                }
                // a failed ArrayBuffer conversion leaves a guest TypeError pending
                Err(_) => drop(self.ctx.catch()),
            }
        }
        value
            .get::<Coerced<String>>()
            .map(|Coerced(text)| text.into_bytes())
            .captured(self)
    }
}

#[cfg(test)]
mod tests {
    use crate::{GuestErrorKind, Interpreter};

    #[test]
    fn test_numbers_round_trip() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            assert_eq!(s.to_int(&s.new_int(42)).unwrap(), 42);
            assert_eq!(s.to_int(&s.new_int(-7)).unwrap(), -7);
            assert_eq!(s.to_int(&s.new_int(1 << 40)).unwrap(), 1 << 40);
            assert_eq!(s.to_uint(&s.new_uint(u32::MAX as u64)).unwrap(), u32::MAX as u64);
            assert_eq!(s.to_float(&s.new_float(2.5)).unwrap(), 2.5);
            assert_eq!(s.to_int(&s.new_float(-2.9)).unwrap(), -2);
        });
    }

    #[test]
    fn test_guest_coercion_rules() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            assert!(s.to_bool(&s.new_string("0").unwrap()).unwrap());
            assert!(!s.to_bool(&s.new_string("").unwrap()).unwrap());
            assert!(!s.to_bool(&s.new_int(0)).unwrap());
            assert_eq!(s.to_int(&s.new_string(" 12 ").unwrap()).unwrap(), 12);
            assert_eq!(s.to_int(&s.new_string("nope").unwrap()).unwrap(), 0);
            assert_eq!(s.to_bytes(&s.new_bool(true)).unwrap(), b"true");
            assert_eq!(s.to_bytes(&s.new_float(1.5)).unwrap(), b"1.5");
        });
    }

    #[test]
    fn test_negative_uint_is_a_range_error() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let err = s.to_uint(&s.new_int(-1)).unwrap_err();
            assert_eq!(err.kind(), GuestErrorKind::Runtime);
            assert_eq!(err.name(), Some("RangeError"));
        });
    }

    #[test]
    fn test_bytes_round_trip() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let text = s.new_bytes("héllo".as_bytes()).unwrap();
            assert_eq!(text.type_name(), "string");
            assert_eq!(s.to_bytes(&text).unwrap(), "héllo".as_bytes());

            let raw = [0xff, 0x00, 0xfe];
            let binary = s.new_bytes(&raw).unwrap();
            assert_eq!(binary.type_name(), "object");
            assert_eq!(s.to_bytes(&binary).unwrap(), raw);
        });
    }

    #[test]
    fn test_coercion_failure_is_captured() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let h = s.eval("({ valueOf() { throw new Error('no number') } })").unwrap();
            let err = s.to_int(&h).unwrap_err();
            assert_eq!(err.message(), "no number");
        });
    }

    #[test]
    fn test_object_to_bytes_leaves_nothing_pending() {
        let interp = Interpreter::new().unwrap();
        let kept = interp.bind(|s| {
            let h = s.eval("({ a: 1 })").unwrap();
            s.stash(&h)
        });
        interp.bind(|s| {
            let h = s.eval("({ b: 2 })").unwrap();
            assert_eq!(s.to_bytes(&h).unwrap(), b"[object Object]");
        });
        let baseline = interp.count_live();

        interp.bind(|s| {
            let h = s.restore(&kept).unwrap();
            assert_eq!(s.to_bytes(&h).unwrap(), b"[object Object]");
            assert_eq!(s.describe(&h), "object: [object Object]");
            assert!(!s.ctx().catch().is_object());
        });
        assert_eq!(interp.count_live(), baseline);
    }
}
