//! Per-sender execution locks.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// The set of senders with a dispatch in flight.
///
/// Acquisition never waits: a busy sender is rejected, not queued.
#[derive(Debug, Clone, Default)]
pub struct ExecutionLockSet {
    held: Arc<Mutex<HashSet<String>>>,
}

impl ExecutionLockSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the lock for `key`, or returns `None` when it is already held.
    pub fn try_acquire(&self, key: &str) -> Option<ExecutionLock> {
        if !self.held.lock().insert(key.to_string()) {
            return None;
        }
        Some(ExecutionLock {
            key: key.to_string(),
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_locked(&self, key: &str) -> bool {
        self.held.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.held.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A held execution lock, released on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as it is dropped"]
pub struct ExecutionLock {
    key: String,
    held: Arc<Mutex<HashSet<String>>>,
}

impl ExecutionLock {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for ExecutionLock {
    fn drop(&mut self) {
        self.held.lock().remove(&self.key);
    }
}
