use crate::util::lock;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

/// Time-ordered set of site keys serving a politeness delay
///
/// The supervisor sleeps until the earliest wake time; inserting an earlier
/// one signals `updated` so that sleep is cut short.
#[derive(Default)]
pub(crate) struct SnoozeScheduler {
    heap: Mutex<SnoozeHeap>,
    updated: Notify,
}

#[derive(Default)]
struct SnoozeHeap {
    /// (wake time, insertion sequence, key); the sequence keeps ties FIFO
    entries: BinaryHeap<Reverse<(Instant, u64, String)>>,
    next_seq: u64,
}

impl SnoozeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snoozes `key` until `wake_at`
    pub fn snooze(&self, key: &str, wake_at: Instant) {
        let earlier = {
            let mut heap = lock(&self.heap);
            let earlier = heap
                .entries
                .peek()
                .map_or(true, |Reverse((next, _, _))| wake_at < *next);
            let seq = heap.next_seq;
            heap.next_seq += 1;
            heap.entries.push(Reverse((wake_at, seq, key.to_string())));
            earlier
        };

        if earlier {
            self.updated.notify_one();
        }
    }

    /// Removes and returns the earliest key due at or before `now`
    ///
    /// Keys are taken one at a time so that a failure while waking one queue
    /// leaves every later key in the heap.
    pub fn pop_due_one(&self, now: Instant) -> Option<String> {
        let mut heap = lock(&self.heap);
        if heap
            .entries
            .peek()
            .is_some_and(|Reverse((wake, _, _))| *wake <= now)
        {
            heap.entries.pop().map(|Reverse((_, _, key))| key)
        } else {
            None
        }
    }

    pub fn next_wake(&self) -> Option<Instant> {
        lock(&self.heap)
            .entries
            .peek()
            .map(|Reverse((wake, _, _))| *wake)
    }

    pub fn len(&self) -> usize {
        lock(&self.heap).entries.len()
    }

    /// Resolves when an earlier wake time or a state request arrives
    pub fn updated(&self) -> Notified<'_> {
        self.updated.notified()
    }

    /// Interrupts the supervisor's current sleep
    pub fn signal(&self) {
        self.updated.notify_one();
    }
}
