//! # Safe Display Serialization
//!
//! Produces bounded display strings for error reports. Every function here is
//! total: no input makes it panic or return an error, so a pathological value
//! under test can never take down the report that describes it.
//!
//! ## Fallback chain
//!
//! 1. JSON through a cycle guard. The guard keeps the set of values
//!    currently being serialized, keyed by address and type; a value met
//!    again inside its own serialization is replaced by [`CIRCULAR_MARKER`].
//!    Nesting past [`MAX_NESTING`] levels gets the same marker, and once
//!    [`MAX_NODES`] values have been visited the rest are elided, so shared
//!    (non-cyclic) `Rc` graphs cannot blow up either.
//! 2. The value's `Debug` output, when JSON serialization errors (for example
//!    a map with non-string keys) or panics.
//! 3. [`UNSERIALIZABLE_PLACEHOLDER`], when `Debug` panics too.
//!
//! The result is then capped at [`MAX_DISPLAY_LEN`] characters. A cycle
//! marker cut off by the cap is re-appended after the truncation suffix.
//!
//! This module is used only by reporting paths, never by validation logic.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::ser::{
    Serialize, SerializeMap, SerializeSeq, SerializeStruct, SerializeStructVariant,
    SerializeTuple, SerializeTupleStruct, SerializeTupleVariant, Serializer,
};

/// Marker substituted for a value met inside its own serialization.
pub const CIRCULAR_MARKER: &str = "[Circular Reference]";

/// Returned when neither JSON nor `Debug` can render a value.
pub const UNSERIALIZABLE_PLACEHOLDER: &str = "[Unserializable Value]";

/// Maximum length, in characters, of a display string.
pub const MAX_DISPLAY_LEN: usize = 1000;

/// Nesting depth past which a value is treated as a reference cycle.
pub const MAX_NESTING: usize = 128;

/// Number of values visited before the rest of a graph is elided.
pub const MAX_NODES: usize = 10_000;

/// Substituted for values past the [`MAX_NODES`] budget.
const ELIDED_MARKER: &str = "…";

const TRUNCATION_SUFFIX: &str = "…(truncated)";

/// Render `value` for an error report. Never panics.
pub fn safe_stringify<T>(value: &T) -> String
where
    T: Serialize + fmt::Debug + ?Sized,
{
    let json = catch_unwind(AssertUnwindSafe(|| {
        let state = GuardState::default();
        serde_json::to_string(&DepthGuard {
            value,
            depth: 0,
            state: &state,
        })
    }));
    if let Ok(Ok(rendered)) = json {
        let mut out = truncate_display(&rendered, MAX_DISPLAY_LEN);
        // Keep the cycle visible even when the cut lands before the marker.
        if rendered.contains(CIRCULAR_MARKER) && !out.contains(CIRCULAR_MARKER) {
            out.push(' ');
            out.push_str(CIRCULAR_MARKER);
        }
        return out;
    }

    match catch_unwind(AssertUnwindSafe(|| format!("{value:?}"))) {
        Ok(rendered) => truncate_display(&rendered, MAX_DISPLAY_LEN),
        Err(_) => UNSERIALIZABLE_PLACEHOLDER.to_string(),
    }
}

/// Cap `text` at `max_chars` characters, marking the cut.
///
/// Cuts on a character boundary, so multi-byte text is never split.
pub fn truncate_display(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let mut out = String::with_capacity(cut + TRUNCATION_SUFFIX.len());
            out.push_str(&text[..cut]);
            out.push_str(TRUNCATION_SUFFIX);
            out
        }
    }
}

// ---------------------------------------------------------------------------
// Cycle guard
// ---------------------------------------------------------------------------

/// Identity of a value: its address plus its type, since a struct and its
/// first field share an address.
type ValueKey = (*const (), &'static str);

/// Bookkeeping shared by every guard of one `safe_stringify` call.
#[derive(Default)]
struct GuardState {
    active: RefCell<Vec<ValueKey>>,
    visited: Cell<usize>,
}

impl GuardState {
    /// Push `key` unless it is already being serialized.
    fn enter(&self, key: ValueKey) -> bool {
        let mut active = self.active.borrow_mut();
        if active.contains(&key) {
            return false;
        }
        active.push(key);
        true
    }

    fn leave(&self) {
        self.active.borrow_mut().pop();
    }

    /// Count one visit; false once the budget is spent.
    fn visit(&self) -> bool {
        let visited = self.visited.get();
        self.visited.set(visited.saturating_add(1));
        visited < MAX_NODES
    }
}

/// A value paired with its nesting depth and the shared guard state.
struct DepthGuard<'a, 's, T: ?Sized> {
    value: &'a T,
    depth: usize,
    state: &'s GuardState,
}

impl<T: Serialize + ?Sized> Serialize for DepthGuard<'_, '_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.depth > MAX_NESTING {
            return serializer.serialize_str(CIRCULAR_MARKER);
        }
        if !self.state.visit() {
            return serializer.serialize_str(ELIDED_MARKER);
        }
        let key: ValueKey = (
            self.value as *const T as *const (),
            std::any::type_name::<T>(),
        );
        if !self.state.enter(key) {
            return serializer.serialize_str(CIRCULAR_MARKER);
        }
        let result = self.value.serialize(GuardedSerializer {
            inner: serializer,
            depth: self.depth,
            state: self.state,
        });
        self.state.leave();
        result
    }
}

/// Forwards to `inner`, wrapping every nested value in a deeper [`DepthGuard`].
struct GuardedSerializer<'s, S> {
    inner: S,
    depth: usize,
    state: &'s GuardState,
}

/// Compound-state wrapper handed out by [`GuardedSerializer`].
struct Guarded<'s, C> {
    inner: C,
    depth: usize,
    state: &'s GuardState,
}

impl<'s, S> GuardedSerializer<'s, S> {
    fn nested<'a, T: ?Sized>(&self, value: &'a T) -> DepthGuard<'a, 's, T> {
        DepthGuard {
            value,
            depth: self.depth + 1,
            state: self.state,
        }
    }
}

impl<'s, S: Serializer> Serializer for GuardedSerializer<'s, S> {
    type Ok = S::Ok;
    type Error = S::Error;
    type SerializeSeq = Guarded<'s, S::SerializeSeq>;
    type SerializeTuple = Guarded<'s, S::SerializeTuple>;
    type SerializeTupleStruct = Guarded<'s, S::SerializeTupleStruct>;
    type SerializeTupleVariant = Guarded<'s, S::SerializeTupleVariant>;
    type SerializeMap = Guarded<'s, S::SerializeMap>;
    type SerializeStruct = Guarded<'s, S::SerializeStruct>;
    type SerializeStructVariant = Guarded<'s, S::SerializeStructVariant>;

    fn serialize_bool(self, v: bool) -> Result<S::Ok, S::Error> {
        self.inner.serialize_bool(v)
    }

    fn serialize_i8(self, v: i8) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i8(v)
    }

    fn serialize_i16(self, v: i16) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i16(v)
    }

    fn serialize_i32(self, v: i32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i32(v)
    }

    fn serialize_i64(self, v: i64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i64(v)
    }

    fn serialize_i128(self, v: i128) -> Result<S::Ok, S::Error> {
        self.inner.serialize_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u8(v)
    }

    fn serialize_u16(self, v: u16) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u16(v)
    }

    fn serialize_u32(self, v: u32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u32(v)
    }

    fn serialize_u64(self, v: u64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u64(v)
    }

    fn serialize_u128(self, v: u128) -> Result<S::Ok, S::Error> {
        self.inner.serialize_u128(v)
    }

    fn serialize_f32(self, v: f32) -> Result<S::Ok, S::Error> {
        self.inner.serialize_f32(v)
    }

    fn serialize_f64(self, v: f64) -> Result<S::Ok, S::Error> {
        self.inner.serialize_f64(v)
    }

    fn serialize_char(self, v: char) -> Result<S::Ok, S::Error> {
        self.inner.serialize_char(v)
    }

    fn serialize_str(self, v: &str) -> Result<S::Ok, S::Error> {
        self.inner.serialize_str(v)
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<S::Ok, S::Error> {
        self.inner.serialize_bytes(v)
    }

    fn serialize_none(self) -> Result<S::Ok, S::Error> {
        self.inner.serialize_none()
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<S::Ok, S::Error> {
        let guard = self.nested(value);
        self.inner.serialize_some(&guard)
    }

    fn serialize_unit(self) -> Result<S::Ok, S::Error> {
        self.inner.serialize_unit()
    }

    fn serialize_unit_struct(self, name: &'static str) -> Result<S::Ok, S::Error> {
        self.inner.serialize_unit_struct(name)
    }

    fn serialize_unit_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
    ) -> Result<S::Ok, S::Error> {
        self.inner.serialize_unit_variant(name, variant_index, variant)
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<S::Ok, S::Error> {
        let guard = self.nested(value);
        self.inner.serialize_newtype_struct(name, &guard)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<S::Ok, S::Error> {
        let guard = self.nested(value);
        self.inner
            .serialize_newtype_variant(name, variant_index, variant, &guard)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self.inner.serialize_seq(len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self.inner.serialize_tuple(len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_tuple_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self.inner.serialize_tuple_struct(name, len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_tuple_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self
            .inner
            .serialize_tuple_variant(name, variant_index, variant, len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<Self::SerializeMap, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self.inner.serialize_map(len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_struct(
        self,
        name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStruct, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self.inner.serialize_struct(name, len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn serialize_struct_variant(
        self,
        name: &'static str,
        variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeStructVariant, S::Error> {
        let (depth, state) = (self.depth, self.state);
        let inner = self
            .inner
            .serialize_struct_variant(name, variant_index, variant, len)?;
        Ok(Guarded {
            inner,
            depth: depth + 1,
            state,
        })
    }

    fn is_human_readable(&self) -> bool {
        self.inner.is_human_readable()
    }
}

impl<'s, C> Guarded<'s, C> {
    fn nested<'a, T: ?Sized>(&self, value: &'a T) -> DepthGuard<'a, 's, T> {
        DepthGuard {
            value,
            depth: self.depth,
            state: self.state,
        }
    }
}

impl<C: SerializeSeq> SerializeSeq for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_element(&guard)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTuple> SerializeTuple for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_element(&guard)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleStruct> SerializeTupleStruct for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_field(&guard)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeTupleVariant> SerializeTupleVariant for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_field(&guard)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeMap> SerializeMap for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), C::Error> {
        let guard = self.nested(key);
        self.inner.serialize_key(&guard)
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_value(&guard)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStruct> SerializeStruct for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_field(key, &guard)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.inner.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}

impl<C: SerializeStructVariant> SerializeStructVariant for Guarded<'_, C> {
    type Ok = C::Ok;
    type Error = C::Error;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), C::Error> {
        let guard = self.nested(value);
        self.inner.serialize_field(key, &guard)
    }

    fn skip_field(&mut self, key: &'static str) -> Result<(), C::Error> {
        self.inner.skip_field(key)
    }

    fn end(self) -> Result<C::Ok, C::Error> {
        self.inner.end()
    }
}
