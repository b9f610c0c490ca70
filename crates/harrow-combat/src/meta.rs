//! Type-safe per-event metadata.
//!
//! A [`MetaKey<T>`] is a registered, process-unique token that carries its
//! value type. Because the only way to read a slot is through the key that
//! wrote it, a mismatched `get` fails to type-check; no casts are visible to
//! callers. Internally the store erases values behind `dyn Any`, the same
//! token-plus-`TypeId` discipline the component registry uses.
//!
//! Absence is a first-class outcome: `get` on an unset key is `None`, never
//! an error. Keys are independent of each other and unordered.
//!
//! Keys are meant to be minted once and shared, typically via a
//! `once_cell::sync::Lazy` static:
//!
//! ```
//! use harrow_combat::meta::{MetaKey, MetaStore};
//! use once_cell::sync::Lazy;
//!
//! static KNOCKBACK: Lazy<MetaKey<f32>> = Lazy::new(|| MetaKey::new("knockback"));
//!
//! let mut meta = MetaStore::new();
//! meta.set(&KNOCKBACK, 0.4);
//! assert_eq!(meta.get(&KNOCKBACK), Some(&0.4));
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// MetaKey
// ---------------------------------------------------------------------------

static NEXT_KEY_ID: AtomicU64 = AtomicU64::new(0);

/// A registered metadata token, parameterized by its value type.
///
/// Every call to [`MetaKey::new`] mints a distinct key, so two keys with the
/// same value type still address independent slots. Construct each logical
/// key exactly once and share it.
pub struct MetaKey<T> {
    id: u64,
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MetaKey<T> {
    /// Mint a new, globally unique key. `name` is diagnostic only.
    pub fn new(name: &'static str) -> Self {
        Self {
            id: NEXT_KEY_ID.fetch_add(1, Ordering::Relaxed),
            name,
            _marker: PhantomData,
        }
    }

    /// The diagnostic name this key was registered under.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

// Manual impls: derives would put bounds on T, which the key never stores.
impl<T> Clone for MetaKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for MetaKey<T> {}

impl<T> fmt::Debug for MetaKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MetaKey({}#{})", self.name, self.id)
    }
}

// ---------------------------------------------------------------------------
// MetaStore
// ---------------------------------------------------------------------------

/// Heterogeneous key/value extension storage for a single event.
#[derive(Default)]
pub struct MetaStore {
    entries: HashMap<u64, Box<dyn Any + Send + Sync>>,
}

impl MetaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `key`, replacing any previous value.
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &MetaKey<T>, value: T) {
        self.entries.insert(key.id, Box::new(value));
    }

    /// The value for `key`, or `None` if unset.
    pub fn get<T: 'static>(&self, key: &MetaKey<T>) -> Option<&T> {
        self.entries.get(&key.id).and_then(|b| b.downcast_ref::<T>())
    }

    /// Mutable access to the value for `key`.
    pub fn get_mut<T: 'static>(&mut self, key: &MetaKey<T>) -> Option<&mut T> {
        self.entries
            .get_mut(&key.id)
            .and_then(|b| b.downcast_mut::<T>())
    }

    /// Whether `key` has a value.
    pub fn has<T: 'static>(&self, key: &MetaKey<T>) -> bool {
        self.entries.contains_key(&key.id)
    }

    /// Remove and return the value for `key`, if any.
    pub fn remove<T: 'static>(&mut self, key: &MetaKey<T>) -> Option<T> {
        self.entries
            .remove(&key.id)
            .and_then(|b| b.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Number of set keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no keys are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for MetaStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaStore")
            .field("len", &self.entries.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Knockback {
        strength: f32,
    }

    #[test]
    fn set_get_roundtrip() {
        let key = MetaKey::<Knockback>::new("knockback");
        let mut store = MetaStore::new();
        store.set(&key, Knockback { strength: 1.5 });
        assert_eq!(store.get(&key), Some(&Knockback { strength: 1.5 }));
    }

    #[test]
    fn unset_key_is_none() {
        let key = MetaKey::<u32>::new("charges");
        let store = MetaStore::new();
        assert_eq!(store.get(&key), None);
        assert!(!store.has(&key));
    }

    #[test]
    fn same_type_distinct_keys_are_independent() {
        let a = MetaKey::<u32>::new("a");
        let b = MetaKey::<u32>::new("b");
        let mut store = MetaStore::new();
        store.set(&a, 1);
        store.set(&b, 2);
        assert_eq!(store.get(&a), Some(&1));
        assert_eq!(store.get(&b), Some(&2));
        store.remove(&a);
        assert_eq!(store.get(&a), None);
        assert_eq!(store.get(&b), Some(&2));
    }

    #[test]
    fn set_overwrites() {
        let key = MetaKey::<u32>::new("stacks");
        let mut store = MetaStore::new();
        store.set(&key, 1);
        store.set(&key, 9);
        assert_eq!(store.get(&key), Some(&9));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn get_mut_modifies_in_place() {
        let key = MetaKey::<Knockback>::new("knockback");
        let mut store = MetaStore::new();
        store.set(&key, Knockback { strength: 1.0 });
        if let Some(k) = store.get_mut(&key) {
            k.strength = 3.0;
        }
        assert_eq!(store.get(&key).unwrap().strength, 3.0);
    }

    #[test]
    fn remove_returns_owned_value() {
        let key = MetaKey::<Knockback>::new("knockback");
        let mut store = MetaStore::new();
        store.set(&key, Knockback { strength: 2.0 });
        assert_eq!(store.remove(&key), Some(Knockback { strength: 2.0 }));
        assert_eq!(store.remove(&key), None);
        assert!(store.is_empty());
    }

    #[test]
    fn keys_are_unique_per_mint() {
        let a = MetaKey::<u8>::new("same_name");
        let b = MetaKey::<u8>::new("same_name");
        let mut store = MetaStore::new();
        store.set(&a, 1);
        assert_eq!(store.get(&b), None, "a freshly minted key addresses its own slot");
    }
}
