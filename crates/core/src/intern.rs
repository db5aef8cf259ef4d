//! Value interning.
//!
//! An `InternTable` maps values to small, stable handles. Equal values always
//! receive the same handle, so handles may be compared instead of values.

use crate::value::Shared;
use crate::value::Value;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Handle to an interned value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Interned(usize);

impl Interned {
    /// Returns the raw handle index.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A content-addressed table of interned values.
#[derive(Clone, Debug, Default)]
pub struct InternTable {
    values: Vec<Shared>,
    lookup: HashMap<Shared, Interned>,
}

impl InternTable {
    /// Creates a new empty intern table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a value, returning the existing handle for an equal value.
    pub fn intern(&mut self, value: Value) -> Interned {
        let shared = Shared::new(value);
        if let Some(&handle) = self.lookup.get(&shared) {
            return handle;
        }
        let handle = Interned(self.values.len());
        self.values.push(shared.clone());
        self.lookup.insert(shared, handle);
        handle
    }

    /// Resolves a handle to its value.
    pub fn resolve(&self, handle: Interned) -> Option<&Value> {
        self.values.get(handle.0).map(Shared::get)
    }

    /// Resolves a handle to a shared reference usable as a `Value::Ref`.
    pub fn resolve_shared(&self, handle: Interned) -> Option<Shared> {
        self.values.get(handle.0).cloned()
    }

    /// Looks up the handle of a value without interning it.
    pub fn lookup(&self, value: &Value) -> Option<Interned> {
        self.lookup.get(&Shared::new(value.clone())).copied()
    }

    /// Returns the number of interned values.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if nothing has been interned.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
