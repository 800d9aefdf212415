use crate::util::lock;
use std::collections::BTreeSet;
use std::sync::Mutex;

/// Site keys of queues that ran out of lifetime budget
#[derive(Default)]
pub(crate) struct RetiredSet {
    keys: Mutex<BTreeSet<String>>,
}

impl RetiredSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str) -> bool {
        lock(&self.keys).insert(key.to_string())
    }

    /// Removes and returns every retired key, in key order
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *lock(&self.keys)).into_iter().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.keys).len()
    }
}
