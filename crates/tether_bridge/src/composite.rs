//! Composite codec
//!
//! Arrays and string-keyed mappings in both directions. Walking a value of
//! the wrong shape yields an empty result, not an error; callers use that to
//! check shapes.

use crate::error::{Captured, Outcome};
use crate::handle::Handle;
use crate::session::Session;
use rquickjs::{Array, Value};

impl<'i, 'js> Session<'i, 'js> {
    /// Build a guest array holding `items` in order.
    pub fn new_array(&self, items: Vec<Handle<'js>>) -> Outcome<'js, Handle<'js>> {
        self.array_of(items)
            .map(|array| Handle::new(array.into_value()))
            .captured(self)
    }

    /// Build a guest mapping from key/value pairs.
    ///
    /// Keys are coerced to guest strings and later duplicates overwrite
    /// earlier ones. Key handles are consumed.
    pub fn new_mapping(&self, entries: Vec<(Handle<'js>, Handle<'js>)>) -> Outcome<'js, Handle<'js>> {
        let flat = self
            .array_of(entries.into_iter().flat_map(|(k, v)| [k, v]))
            .captured(self)?;
        let mapping: Value = self
            .prelude_fn("mapping")?
            .call((flat,))
            .captured(self)?;
        Ok(Handle::new(mapping))
    }

    /// Snapshot of an array's elements. Copies, so later guest mutation does
    /// not affect the result.
    pub fn walk_array(&self, handle: &Handle<'js>) -> Outcome<'js, Vec<Handle<'js>>> {
        let Some(array) = handle.as_value().as_array() else {
            return Ok(Vec::new());
        };
        array
            .iter::<Value>()
            .map(|item| item.map(Handle::new))
            .collect::<rquickjs::Result<Vec<_>>>()
            .captured(self)
    }

    /// Key/value pairs of a plain object (own enumerable string keys) or a
    /// guest `Map` (keys as stored).
    pub fn walk_mapping(
        &self,
        handle: &Handle<'js>,
    ) -> Outcome<'js, Vec<(Handle<'js>, Handle<'js>)>> {
        let flat: Value = self
            .prelude_fn("entries")?
            .call((handle.as_value().clone(),))
            .captured(self)?;
        let Some(flat) = flat.as_array() else {
            return Ok(Vec::new());
        };

        let mut pairs = Vec::with_capacity(flat.len() / 2);
        let mut items = flat.iter::<Value>();
        while let (Some(key), Some(value)) = (items.next(), items.next()) {
            pairs.push((
                Handle::new(key.captured(self)?),
                Handle::new(value.captured(self)?),
            ));
        }
        Ok(pairs)
    }

    pub(crate) fn array_of(
        &self,
        items: impl IntoIterator<Item = Handle<'js>>,
    ) -> rquickjs::Result<Array<'js>> {
        let array = Array::new(self.ctx.clone())?;
        for (index, item) in items.into_iter().enumerate() {
            array.set(index, item.into_value())?;
        }
        Ok(array)
    }
}
