use crate::frontier::WorkQueue;
use crate::util::{read, write};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

/// Shared handle to one site's queue
pub(crate) type QueueHandle = Arc<Mutex<WorkQueue>>;

/// Lookup from site key to work queue
///
/// The registry lock is only ever held for the map operation itself, never
/// while a queue lock is taken.
#[derive(Default)]
pub(crate) struct QueueRegistry {
    queues: RwLock<HashMap<String, QueueHandle>>,
}

impl QueueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the queue for `key`, creating it with `create` on first reference
    ///
    /// `create` runs outside the registry lock; if another caller registers the
    /// key first, its queue wins and the freshly built one is dropped.
    pub fn get_or_create(&self, key: &str, create: impl FnOnce() -> WorkQueue) -> QueueHandle {
        if let Some(queue) = self.get(key) {
            return queue;
        }

        let fresh = Arc::new(Mutex::new(create()));
        let mut queues = write(&self.queues);
        let queue = queues.entry(key.to_string()).or_insert_with(|| {
            tracing::debug!("Created work queue {}", key);
            fresh
        });
        Arc::clone(queue)
    }

    /// Looks up an existing queue without creating one
    pub fn get(&self, key: &str) -> Option<QueueHandle> {
        read(&self.queues).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.queues).len()
    }

    /// Handles to every queue, copied out so callers lock them one at a time
    pub fn all(&self) -> Vec<QueueHandle> {
        read(&self.queues).values().cloned().collect()
    }
}
