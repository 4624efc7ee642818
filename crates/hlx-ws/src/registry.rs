//! Subscription registry: channel key → handler.
//!
//! Exactly one handler per key. Entries remember the order in which their key
//! was first registered so that prefix lookups pick the earliest match
//! deterministically.

use std::sync::Arc;

use ahash::AHashMap;
use serde_json::Value;

/// Handler invoked with the `data` of each matching feed message.
///
/// Runs on the reader task: a handler that blocks stalls delivery for every
/// subscription on the connection. Hand heavy work off to another task.
pub type Callback = Arc<dyn Fn(Value) + Send + Sync>;

struct Entry {
    seq: u64,
    callback: Callback,
}

#[derive(Default)]
pub struct Registry {
    entries: AHashMap<String, Entry>,
    next_seq: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `callback` under `key`, replacing any previous handler.
    ///
    /// Returns `true` if a handler was replaced. A replaced key keeps its
    /// original registration order.
    pub fn insert(&mut self, key: String, callback: Callback) -> bool {
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.callback = callback;
            return true;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(key, Entry { seq, callback });
        false
    }

    /// Remove the handler for `key`. Absent keys are a no-op.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<Callback> {
        self.entries.get(key).map(|e| Arc::clone(&e.callback))
    }

    /// Earliest-registered entry whose key starts with `prefix` and is longer
    /// than it.
    pub fn first_with_prefix(&self, prefix: &str) -> Option<(String, Callback)> {
        self.entries
            .iter()
            .filter(|(key, _)| key.len() > prefix.len() && key.starts_with(prefix))
            .min_by_key(|(_, entry)| entry.seq)
            .map(|(key, entry)| (key.clone(), Arc::clone(&entry.callback)))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
