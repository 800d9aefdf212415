use crate::util::lock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Which site keys are claimed by an in-flight dispatch
///
/// At most one claim per key exists at any time; this is what keeps a site
/// down to one request in flight.
#[derive(Default)]
pub(crate) struct ClaimTable {
    /// site key -> dispatch sequence number of the holder
    holders: Mutex<HashMap<String, u64>>,
    next_dispatch: AtomicU64,
}

impl ClaimTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `key`, returning the holder's sequence number
    ///
    /// # Returns
    ///
    /// `None` if the key is already claimed.
    pub fn claim(&self, key: &str) -> Option<u64> {
        let mut holders = lock(&self.holders);
        if holders.contains_key(key) {
            return None;
        }
        let seq = self.next_dispatch.fetch_add(1, Ordering::Relaxed);
        holders.insert(key.to_string(), seq);
        Some(seq)
    }

    /// Releases a claim; returns false if the key was not claimed
    pub fn release(&self, key: &str) -> bool {
        lock(&self.holders).remove(key).is_some()
    }

    pub fn is_claimed(&self, key: &str) -> bool {
        lock(&self.holders).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.holders).len()
    }
}
