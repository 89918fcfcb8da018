//! A name-to-value registry with one-shot registration and concurrent reads.
//!
//! Used to hold the built-in (and user-registered) Noise handshake patterns,
//! and anywhere else the spec calls for "Name→value mapping with one-shot
//! registration, concurrent read" (spec.md §2). Readers never block writers
//! and writers only ever happen at process/registry-construction time
//! (spec.md §9, "Global mutable state") — there is deliberately no process
//! global here; callers that want isolation construct their own `Registry`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use kerpass_error::{Error, Result};
use parking_lot::RwLock;

/// Multi-reader, single-writer name→value map. Each name may be `set` only
/// once; a second `set` for the same name fails with `ErrorKind::Validation`.
pub struct Registry<K, V> {
    entries: RwLock<HashMap<K, Arc<V>>>,
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Registry {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `value` under `name`. Fails if `name` is already taken.
    pub fn set(&self, name: K, value: V) -> Result<()> {
        let mut entries = self.entries.write();
        if entries.contains_key(&name) {
            return Err(Error::validation(format!(
                "name {name:?} already registered"
            )));
        }
        entries.insert(name, Arc::new(value));
        Ok(())
    }

    /// Returns a clone of the `Arc` for `name`, or `None` if unregistered.
    pub fn get(&self, name: &K) -> Option<Arc<V>> {
        self.entries.read().get(name).cloned()
    }

    pub fn contains(&self, name: &K) -> bool {
        self.entries.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the currently registered names.
    pub fn names(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_then_get_roundtrips() {
        let reg: Registry<String, u32> = Registry::new();
        reg.set("a".to_string(), 1).unwrap();
        assert_eq!(*reg.get(&"a".to_string()).unwrap(), 1);
    }

    #[test]
    fn double_set_fails() {
        let reg: Registry<String, u32> = Registry::new();
        reg.set("a".to_string(), 1).unwrap();
        let err = reg.set("a".to_string(), 2).unwrap_err();
        assert!(err.is_validation());
        assert_eq!(*reg.get(&"a".to_string()).unwrap(), 1);
    }

    #[test]
    fn missing_name_is_none() {
        let reg: Registry<String, u32> = Registry::new();
        assert!(reg.get(&"missing".to_string()).is_none());
    }
}
