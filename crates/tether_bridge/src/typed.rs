//! Typed bindings
//!
//! Conversions between host types and guest values layered over the scalar
//! and composite codecs, so host code can bind guest script results straight
//! into Rust types:
//!
//! ```ignore
//! let xgcd: GuestFn<(i64, i64), (i64, i64, i64)> = s.bind("(u, v) => ...")?;
//! let (g, x, y) = xgcd.call(s, (12345, 54321))?;
//! ```
//!
//! Argument and result lists are tuples. Their length is the arity: a
//! [`GuestFn`] invokes with `wanted` equal to its result tuple length, and
//! [`Session::register_fn`] declares the callback's in/out arity from the
//! closure's tuple types.

use crate::error::Outcome;
use crate::handle::Handle;
use crate::session::Session;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

/// Host value that can be handed to the guest.
pub trait IntoGuest<'js> {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>>;
}

/// Host type that can be read back from a guest value.
pub trait FromGuest<'js>: Sized {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self>;
}

/// Fixed-length argument or result list.
pub trait IntoGuestList<'js> {
    const ARITY: usize;

    fn into_guest_list(self, session: &Session<'_, 'js>) -> Outcome<'js, Vec<Handle<'js>>>;
}

/// Fixed-length argument or result list read back from the guest.
///
/// Missing trailing values read as `undefined`.
pub trait FromGuestList<'js>: Sized {
    const ARITY: usize;

    fn from_guest_list(session: &Session<'_, 'js>, values: Vec<Handle<'js>>) -> Outcome<'js, Self>;
}

impl<'js> IntoGuest<'js> for Handle<'js> {
    fn into_guest(self, _session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        Ok(self)
    }
}

impl<'js> FromGuest<'js> for Handle<'js> {
    fn from_guest(_session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        Ok(handle)
    }
}

impl<'js> IntoGuest<'js> for bool {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        Ok(session.new_bool(self))
    }
}

impl<'js> FromGuest<'js> for bool {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        session.to_bool(&handle)
    }
}

macro_rules! guest_int {
    ($new:ident as $wide:ty => $($int:ty),+) => {$(
        impl<'js> IntoGuest<'js> for $int {
            #[allow(clippy::unnecessary_cast)]
            fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
                Ok(session.$new(self as $wide))
            }
        }

        impl<'js> FromGuest<'js> for $int {
            fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
                let n = session.to_float(&handle)?.trunc();
                // the extremes of 64-bit types round up to 2^63 / 2^64 and saturate
                if n < <$int>::MIN as f64 || n > <$int>::MAX as f64 {
                    return Err(session.range_error(format!(
                        "{n} does not fit in {}",
                        stringify!($int)
                    )));
                }
                Ok(n as $int)
            }
        }
    )+};
}

guest_int!(new_int as i64 => i8, i16, i32, i64, isize);
guest_int!(new_uint as u64 => u8, u16, u32, u64, usize);

impl<'js> IntoGuest<'js> for f64 {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        Ok(session.new_float(self))
    }
}

impl<'js> FromGuest<'js> for f64 {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        session.to_float(&handle)
    }
}

impl<'js> IntoGuest<'js> for f32 {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        Ok(session.new_float(f64::from(self)))
    }
}

impl<'js> FromGuest<'js> for f32 {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        session.to_float(&handle).map(|n| n as f32)
    }
}

impl<'js> IntoGuest<'js> for &str {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        session.new_string(self)
    }
}

impl<'js> IntoGuest<'js> for String {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        session.new_string(&self)
    }
}

impl<'js> FromGuest<'js> for String {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        let bytes = session.to_bytes(&handle)?;
        String::from_utf8(bytes)
            .map_err(|_| session.type_error("binary data is not a UTF-8 string"))
    }
}

/// `None` is `undefined`; `undefined` and `null` read as `None`.
impl<'js, T: IntoGuest<'js>> IntoGuest<'js> for Option<T> {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        match self {
            Some(value) => value.into_guest(session),
            None => Ok(session.new_undefined()),
        }
    }
}

impl<'js, T: FromGuest<'js>> FromGuest<'js> for Option<T> {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        let value = handle.as_value();
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        T::from_guest(session, handle).map(Some)
    }
}

impl<'js, T: IntoGuest<'js>> IntoGuest<'js> for Vec<T> {
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        let items = self
            .into_iter()
            .map(|item| item.into_guest(session))
            .collect::<Outcome<'js, Vec<_>>>()?;
        session.new_array(items)
    }
}

/// Anything that is not an array reads as an empty `Vec`.
impl<'js, T: FromGuest<'js>> FromGuest<'js> for Vec<T> {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        session
            .walk_array(&handle)?
            .into_iter()
            .map(|item| T::from_guest(session, item))
            .collect()
    }
}

/// Keys become guest strings, so integer keys survive a round trip.
impl<'js, K, V> IntoGuest<'js> for HashMap<K, V>
where
    K: IntoGuest<'js>,
    V: IntoGuest<'js>,
{
    fn into_guest(self, session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        let entries = self
            .into_iter()
            .map(|(k, v)| Ok((k.into_guest(session)?, v.into_guest(session)?)))
            .collect::<Outcome<'js, Vec<_>>>()?;
        session.new_mapping(entries)
    }
}

impl<'js, K, V> FromGuest<'js> for HashMap<K, V>
where
    K: FromGuest<'js> + Eq + Hash,
    V: FromGuest<'js>,
{
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        session
            .walk_mapping(&handle)?
            .into_iter()
            .map(|(k, v)| Ok((K::from_guest(session, k)?, V::from_guest(session, v)?)))
            .collect()
    }
}

macro_rules! guest_list {
    ($($name:ident),*) => {
        impl<'js, $($name: IntoGuest<'js>),*> IntoGuestList<'js> for ($($name,)*) {
            const ARITY: usize = <[&str]>::len(&[$(stringify!($name)),*]);

            #[allow(non_snake_case, unused_variables)]
            fn into_guest_list(self, session: &Session<'_, 'js>) -> Outcome<'js, Vec<Handle<'js>>> {
                let ($($name,)*) = self;
                Ok(vec![$($name.into_guest(session)?),*])
            }
        }

        impl<'js, $($name: FromGuest<'js>),*> FromGuestList<'js> for ($($name,)*) {
            const ARITY: usize = <[&str]>::len(&[$(stringify!($name)),*]);

            #[allow(unused_variables, unused_mut)]
            fn from_guest_list(session: &Session<'_, 'js>, values: Vec<Handle<'js>>) -> Outcome<'js, Self> {
                let mut values = values.into_iter();
                Ok(($(
                    <$name as FromGuest<'js>>::from_guest(
                        session,
                        values.next().unwrap_or_else(|| session.new_undefined()),
                    )?,
                )*))
            }
        }
    };
}

guest_list!();
guest_list!(A);
guest_list!(A, B);
guest_list!(A, B, C);
guest_list!(A, B, C, D);
guest_list!(A, B, C, D, E);
guest_list!(A, B, C, D, E, F);

/// A host `Err` is thrown into the guest caller as a plain `Error`.
impl<'js, T, E> IntoGuestList<'js> for Result<T, E>
where
    T: IntoGuestList<'js>,
    E: fmt::Display,
{
    const ARITY: usize = T::ARITY;

    fn into_guest_list(self, session: &Session<'_, 'js>) -> Outcome<'js, Vec<Handle<'js>>> {
        match self {
            Ok(values) => values.into_guest_list(session),
            Err(err) => Err(session.error(err.to_string())),
        }
    }
}

/// Guest callable with a host-side signature.
///
/// `A` and `R` are argument and result tuples. Calls use the list context
/// matching `R`'s length (void for `()`, scalar for one value).
pub struct GuestFn<'js, A, R> {
    handle: Handle<'js>,
    _signature: PhantomData<fn(A) -> R>,
}

impl<'js, A, R> GuestFn<'js, A, R>
where
    A: IntoGuestList<'js>,
    R: FromGuestList<'js>,
{
    pub fn call(&self, session: &Session<'_, 'js>, args: A) -> Outcome<'js, R> {
        let args = args.into_guest_list(session)?;
        let results = session.invoke(&self.handle, args, R::ARITY)?;
        R::from_guest_list(session, results)
    }
}

impl<'js, A, R> GuestFn<'js, A, R> {
    pub fn handle(&self) -> &Handle<'js> {
        &self.handle
    }

    pub fn into_handle(self) -> Handle<'js> {
        self.handle
    }
}

impl<A, R> fmt::Debug for GuestFn<'_, A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuestFn")
            .field("in", &std::any::type_name::<A>())
            .field("out", &std::any::type_name::<R>())
            .finish()
    }
}

impl<'js, A, R> FromGuest<'js> for GuestFn<'js, A, R> {
    fn from_guest(session: &Session<'_, 'js>, handle: Handle<'js>) -> Outcome<'js, Self> {
        if !handle.is_callable() {
            return Err(session.type_error(format!(
                "expected a function, got {}",
                handle.type_name()
            )));
        }
        Ok(GuestFn {
            handle,
            _signature: PhantomData,
        })
    }
}

impl<'js, A, R> IntoGuest<'js> for GuestFn<'js, A, R> {
    fn into_guest(self, _session: &Session<'_, 'js>) -> Outcome<'js, Handle<'js>> {
        Ok(self.handle)
    }
}

impl<'i, 'js> Session<'i, 'js> {
    /// Evaluate guest source and convert its completion value to `T`.
    pub fn bind<T: FromGuest<'js>>(&self, source: &str) -> Outcome<'js, T> {
        let value = self.eval(source)?;
        T::from_guest(self, value)
    }

    /// Convert a host value for the guest.
    pub fn to_guest<T: IntoGuest<'js>>(&self, value: T) -> Outcome<'js, Handle<'js>> {
        value.into_guest(self)
    }

    /// Convert a guest value into a host type.
    pub fn from_guest<T: FromGuest<'js>>(&self, handle: Handle<'js>) -> Outcome<'js, T> {
        T::from_guest(self, handle)
    }

    /// Expose a plain Rust closure to the guest.
    ///
    /// The declared in/out arity is the length of the argument and result
    /// tuples. Arguments are converted before the closure runs; a failed
    /// conversion is thrown into the guest caller.
    pub fn register_fn<A, R, F>(&self, func: F) -> Outcome<'js, Handle<'js>>
    where
        A: for<'v> FromGuestList<'v> + 'static,
        R: for<'v> IntoGuestList<'v> + 'static,
        F: Fn(A) -> R + 'static,
    {
        let in_arity = <A as FromGuestList<'js>>::ARITY;
        let out_arity = <R as IntoGuestList<'js>>::ARITY;
        self.register_callback(in_arity, out_arity, move |session, args| {
            let args = A::from_guest_list(session, args)?;
            func(args).into_guest_list(session)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GuestErrorKind, Interpreter};

    #[test]
    fn test_scalar_widths_round_trip() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let id: GuestFn<(i8, u8, i16, u16, i32, u32), (i8, u8, i16, u16, i32, u32)> =
                s.bind("(...xs) => xs").unwrap();
            let extremes = (i8::MIN, u8::MAX, i16::MIN, u16::MAX, i32::MIN, u32::MAX);
            assert_eq!(id.call(s, extremes).unwrap(), extremes);

            let id64: GuestFn<(i64, u64), (i64, u64)> = s.bind("(...xs) => xs").unwrap();
            assert_eq!(id64.call(s, (i64::MIN, u64::MAX)).unwrap(), (i64::MIN, u64::MAX));
            assert_eq!(id64.call(s, (-1, 0)).unwrap(), (-1, 0));

            let idf: GuestFn<(f32, f64), (f32, f64)> = s.bind("(...xs) => xs").unwrap();
            assert_eq!(idf.call(s, (1.5, -0.25)).unwrap(), (1.5, -0.25));
        });
    }

    #[test]
    fn test_out_of_range_is_a_range_error() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let err = s.bind::<i8>("200").unwrap_err();
            assert_eq!(err.name(), Some("RangeError"));
            let err = s.bind::<u32>("-1").unwrap_err();
            assert_eq!(err.name(), Some("RangeError"));
            assert_eq!(s.bind::<u8>("255.9").unwrap(), 255);
        });
    }

    #[test]
    fn test_bind_bool_uses_guest_truthiness() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            assert!(!s.bind::<bool>("undefined").unwrap());
            assert!(s.bind::<bool>("1 == 1").unwrap());
            assert!(!s.bind::<bool>("''").unwrap());
            assert!(s.bind::<bool>("'0'").unwrap());
            assert!(s.bind::<bool>("'a string'").unwrap());

            let id: GuestFn<(bool,), (bool,)> = s.bind("(b) => b").unwrap();
            assert_eq!(id.call(s, (true,)).unwrap(), (true,));
            assert_eq!(id.call(s, (false,)).unwrap(), (false,));
        });
    }

    #[test]
    fn test_strings_and_options() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let id: GuestFn<(String,), (String,)> = s.bind("(x) => x").unwrap();
            assert_eq!(id.call(s, (String::new(),)).unwrap().0, "");
            assert_eq!(id.call(s, ("a string".to_string(),)).unwrap().0, "a string");

            assert_eq!(s.bind::<Option<i64>>("null").unwrap(), None);
            assert_eq!(s.bind::<Option<i64>>("7").unwrap(), Some(7));
            let h = s.to_guest(None::<String>).unwrap();
            assert_eq!(h.type_name(), "undefined");
        });
    }

    #[test]
    fn test_list_identity() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let id: GuestFn<(Vec<i64>,), (Vec<i64>,)> = s.bind("(x) => x").unwrap();
            assert_eq!(id.call(s, (Vec::new(),)).unwrap().0, Vec::<i64>::new());
            assert_eq!(id.call(s, (vec![1, 2, 3],)).unwrap().0, vec![1, 2, 3]);

            let nested: Vec<Vec<String>> = s.bind("[['a'], [], ['b', 'c']]").unwrap();
            assert_eq!(nested, vec![vec!["a"], vec![], vec!["b", "c"]]);
        });
    }

    #[test]
    fn test_map_identity() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let id: GuestFn<(HashMap<i64, i64>,), (HashMap<i64, i64>,)> =
                s.bind("(x) => x").unwrap();
            let want = HashMap::from([(66, 12), (88, 8)]);
            assert_eq!(id.call(s, (want.clone(),)).unwrap().0, want);

            let named: HashMap<String, f64> = s.bind("({ x: 1.5, y: -2 })").unwrap();
            assert_eq!(named, HashMap::from([("x".to_string(), 1.5), ("y".to_string(), -2.0)]));
        });
    }

    #[test]
    fn test_multiple_results() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let xgcd: GuestFn<(i64, i64), (i64, i64, i64, i64, i64)> = s
                .bind(
                    r#"(u, v) => {
                        let [s, oldS] = [0, 1];
                        let [t, oldT] = [1, 0];
                        let [r, oldR] = [v, u];
                        while (r) {
                            const q = Math.trunc(oldR / r);
                            [oldR, r] = [r, oldR - q * r];
                            [oldS, s] = [s, oldS - q * s];
                            [oldT, t] = [t, oldT - q * t];
                        }
                        return oldS > 0
                            ? [oldS, u, 0 - oldT, v, oldR]
                            : [0 - oldS, u, oldT, v, oldR];
                    }"#,
                )
                .unwrap();
            assert_eq!(
                xgcd.call(s, (12345, 54321)).unwrap(),
                (3617, 12345, 822, 54321, 3)
            );

            // short results pad with undefined
            let short: GuestFn<(), (i64, Option<i64>)> = s.bind("() => [4]").unwrap();
            assert_eq!(short.call(s, ()).unwrap(), (4, None));
        });
    }

    #[test]
    fn test_guest_errors_surface_from_typed_calls() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            assert!(s.bind::<Handle>("1 = 2").is_err());

            let die: GuestFn<(), ()> = s.bind("() => { throw 'tippy\\n' }").unwrap();
            let err = die.call(s, ()).unwrap_err();
            assert_eq!(err.message(), "tippy\n");

            let err = s.bind::<GuestFn<(), ()>>("42").unwrap_err();
            assert_eq!(err.kind(), GuestErrorKind::Type);
        });
    }

    #[test]
    fn test_register_fn_declares_arity_from_types() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let add = s.register_fn(|(a, b): (i64, i64)| (a + b,)).unwrap();
            s.set_global("add", add).unwrap();
            assert_eq!(s.bind::<i64>("add(40, 2)").unwrap(), 42);
            let err = s.eval("add(1)").unwrap_err();
            assert_eq!(err.kind(), GuestErrorKind::Arity);

            let split = s
                .register_fn(|(text,): (String,)| {
                    let words: Vec<String> = text.split(' ').map(str::to_string).collect();
                    (words.len(), words)
                })
                .unwrap();
            s.set_global("split", split).unwrap();
            assert_eq!(s.bind::<String>("split('a b c').join('|')").unwrap(), "3|a,b,c");

            let checked = s
                .register_fn(|(n,): (u32,)| {
                    if n == 0 {
                        Err("zero is not allowed")
                    } else {
                        Ok((100 / n,))
                    }
                })
                .unwrap();
            s.set_global("checked", checked).unwrap();
            assert_eq!(s.bind::<u32>("checked(4)").unwrap(), 25);
            let err = s.eval("checked(0)").unwrap_err();
            assert_eq!(err.message(), "zero is not allowed");
        });
    }

    #[test]
    fn test_functions_pass_through_the_guest() {
        let interp = Interpreter::new().unwrap();
        interp.bind(|s| {
            let host = s.register_fn(|(v,): (i64,)| (v + 54321,)).unwrap();
            let host: GuestFn<(i64,), (i64,)> = s.from_guest(host).unwrap();

            type AFunc<'js> = GuestFn<'js, (i64,), (i64,)>;
            let id: GuestFn<(AFunc,), (AFunc,)> = s.bind("(f) => f").unwrap();
            let (back,) = id.call(s, (host,)).unwrap();
            assert_eq!(back.call(s, (18,)).unwrap(), (54339,));
        });
    }

    #[test]
    fn test_typed_calls_do_not_leak() {
        let interp = Interpreter::new().unwrap();
        let round = |n: usize| {
            interp.bind(|s| {
                let id: GuestFn<(String, Vec<i64>, HashMap<String, i64>), (String, Vec<i64>)> =
                    s.bind("id3").unwrap();
                for _ in 0..n {
                    let map = HashMap::from([("k".to_string(), 17)]);
                    let out = id.call(s, ("uuu".to_string(), vec![17, 18], map)).unwrap();
                    assert_eq!(out.0, "uuu");
                }
            })
        };
        interp.bind(|s| {
            s.eval("globalThis.id3 = (a, b, c) => [a, b, c]").unwrap();
        });
        round(1);
        let baseline = interp.count_live();
        round(256);
        assert!(interp.count_live() < baseline + 64);
    }
}
