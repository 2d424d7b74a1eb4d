//! Keyed state storage for per-sender policy state.
//!
//! The abuse detector and ban tracker keep their per-sender records behind
//! the object-safe [`StateStore`] trait so that a deployment can swap the
//! process-local [`MemoryStore`] for a shared cache without touching the
//! dispatch logic.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;

/// A keyed store of per-sender policy records.
///
/// Every method is synchronous. [`modify`](StateStore::modify) must apply
/// the closure atomically with respect to other calls for the same key, so
/// increment-then-compare sequences cannot race.
pub trait StateStore<V>: Send + Sync {
    /// Returns a copy of the record for `key`.
    fn get(&self, key: &str) -> Option<V>;

    /// Replaces the record for `key`.
    fn set(&self, key: &str, value: V);

    /// Removes the record for `key`, returning it.
    fn evict(&self, key: &str) -> Option<V>;

    /// Runs `f` on the record slot for `key` while holding the store's lock.
    ///
    /// The slot is `None` when no record exists; leaving it `None` removes
    /// the record.
    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Option<V>));

    /// Keeps only the records for which `keep` returns `true`.
    ///
    /// Returns the number of records removed.
    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) -> usize;

    /// Number of records currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The default process-local [`StateStore`].
pub struct MemoryStore<V> {
    entries: Mutex<HashMap<String, V>>,
}

impl<V> MemoryStore<V> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V> Default for MemoryStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<V: Clone + Send> StateStore<V> for MemoryStore<V> {
    fn get(&self, key: &str) -> Option<V> {
        self.entries.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: V) {
        self.entries.lock().insert(key.to_string(), value);
    }

    fn evict(&self, key: &str) -> Option<V> {
        self.entries.lock().remove(key)
    }

    fn modify(&self, key: &str, f: &mut dyn FnMut(&mut Option<V>)) {
        let mut entries = self.entries.lock();
        let mut slot = entries.remove(key);
        f(&mut slot);
        if let Some(value) = slot {
            entries.insert(key.to_string(), value);
        }
    }

    fn retain(&self, keep: &mut dyn FnMut(&str, &V) -> bool) -> usize {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|k, v| keep(k, v));
        before - entries.len()
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_set_evict() {
        let store = MemoryStore::new();
        assert!(store.get("alice").is_none());

        store.set("alice", 3u32);
        assert_eq!(store.get("alice"), Some(3));
        assert_eq!(store.evict("alice"), Some(3));
        assert!(store.is_empty());
    }

    #[test]
    fn test_modify_creates_updates_and_removes() {
        let store: MemoryStore<u32> = MemoryStore::new();

        store.modify("bob", &mut |slot| *slot = Some(slot.unwrap_or(0) + 1));
        store.modify("bob", &mut |slot| *slot = Some(slot.unwrap_or(0) + 1));
        assert_eq!(store.get("bob"), Some(2));

        store.modify("bob", &mut |slot| *slot = None);
        assert!(store.get("bob").is_none());
    }

    #[test]
    fn test_retain_reports_removed() {
        let store = MemoryStore::new();
        store.set("a", 1u32);
        store.set("b", 20);
        store.set("c", 30);

        let removed = store.retain(&mut |_, v| *v >= 10);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
    }
}
