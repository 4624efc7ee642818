//! Request correlation table: request id → one-shot response slot.
//!
//! A slot is removed by whichever writer gets to it first: the reader
//! resolving a response, the caller giving up after its timeout, or a
//! teardown failing every outstanding request. Whoever removes it owns the
//! only sender, so a slot is fulfilled at most once.

use ahash::AHashMap;
use hlx_core::error::{HlxError, Result};
use serde_json::Value;
use tokio::sync::oneshot;

pub type ResponseSlot = oneshot::Sender<Result<Value>>;

#[derive(Default)]
pub struct PendingRequests {
    slots: AHashMap<u64, ResponseSlot>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the slot for `id` and return the receiving end.
    pub fn register(&mut self, id: u64) -> oneshot::Receiver<Result<Value>> {
        let (tx, rx) = oneshot::channel();
        self.slots.insert(id, tx);
        rx
    }

    /// Deliver `result` to the request `id`.
    ///
    /// Returns `false` if no such request is pending (late, duplicate or
    /// already expired response).
    pub fn resolve(&mut self, id: u64, result: Result<Value>) -> bool {
        match self.slots.remove(&id) {
            // The caller may have stopped waiting; nothing to do then.
            Some(slot) => {
                let _ = slot.send(result);
                true
            }
            None => false,
        }
    }

    /// Forget `id` without answering it.
    pub fn remove(&mut self, id: u64) -> bool {
        self.slots.remove(&id).is_some()
    }

    /// Fail every pending request with the error built by `err`.
    ///
    /// Returns the number of requests failed.
    pub fn fail_all(&mut self, err: impl Fn() -> HlxError) -> usize {
        let count = self.slots.len();
        for (_, slot) in self.slots.drain() {
            let _ = slot.send(Err(err()));
        }
        count
    }

    pub fn contains(&self, id: u64) -> bool {
        self.slots.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
