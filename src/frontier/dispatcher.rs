use crate::dedup::DedupError;
use crate::frontier::{Budgets, Frontier, Placement, WorkQueue};
use crate::state::{CrawlState, QueueState};
use crate::uri::CrawlUri;
use crate::util::{duration_ms, lock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Holds the single-flight pull flag; clears it when dropped
struct PullGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> PullGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for PullGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Result of trying to claim a ready queue
enum Claim {
    Claimed,
    Skipped,
    Parked(u32),
}

impl Frontier {
    /// Waits for the next URI this worker may fetch
    ///
    /// The returned URI's queue is claimed by the caller until it reports the
    /// outcome through `complete`. Dropping the future before it resolves
    /// leaves nothing claimed.
    ///
    /// # Returns
    ///
    /// * `Some(CrawlUri)` - A URI to fetch
    /// * `None` - The crawl is finishing; the worker should stop
    pub async fn next(&self) -> Option<CrawlUri> {
        loop {
            let notified = self.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let target = self.state.target();
            if target == CrawlState::Finish {
                return None;
            }

            if target.allows_dispatch() {
                if let Some(uri) = self.find_eligible().await {
                    // Pass the wakeup on while more queues are ready
                    if !self.ready.is_empty() {
                        self.ready.notify_one();
                    }
                    return Some(uri);
                }
            }

            notified.await;
        }
    }

    /// One dispatch attempt: replenish if low, then claim from ready keys
    pub(super) async fn find_eligible(&self) -> Option<CrawlUri> {
        loop {
            if !self.state.target().allows_dispatch() {
                return None;
            }

            let mut progress = false;
            if self.ready.len() < self.config.pull_trigger_level {
                progress = self.replenish().await;
            }

            let Some(key) = self.ready.poll() else {
                if progress {
                    continue;
                }
                return None;
            };

            if let Some(uri) = self.dispatch_from(&key) {
                return Some(uri);
            }
        }
    }

    /// Refills the ready FIFO, with at most one caller doing so at a time
    ///
    /// A caller that finds another one already pulling retries a bounded
    /// number of times, giving up early once keys show up.
    ///
    /// # Returns
    ///
    /// True if this call activated a queue or received new URIs.
    pub(super) async fn replenish(&self) -> bool {
        let retries = self.config.pull_contention_retries;
        for attempt in 0..=retries {
            if let Some(_guard) = PullGuard::acquire(&self.pulling) {
                return self.pull_uris().await;
            }
            if attempt == retries || !self.ready.is_empty() {
                break;
            }
            tokio::time::sleep(self.config.pull_contention_backoff()).await;
        }
        false
    }

    /// Activates a local inactive queue, else asks the dedup gateway for more
    async fn pull_uris(&self) -> bool {
        if !self.inactive.is_empty()
            && self.inactive.highest_waiting() < self.config.precedence_floor
            && self.activate_inactive_queue()
        {
            return true;
        }

        let started = Instant::now();
        let timeout = self.config.flush_timeout();
        match tokio::time::timeout(timeout, self.dedup.request_flush(self)).await {
            Ok(Ok(flushed)) => {
                tracing::debug!(
                    "Dedup gateway flushed {} URIs in {}ms",
                    flushed,
                    duration_ms(started.elapsed())
                );
                flushed > 0
            }
            Ok(Err(e)) => {
                tracing::warn!("Dedup flush failed: {}", e);
                false
            }
            Err(_) => {
                let e = DedupError::Timeout(duration_ms(timeout));
                tracing::warn!("{}", e);
                false
            }
        }
    }

    /// Claims the queue behind a ready key and emits its head
    ///
    /// A head whose site key changed is moved to its new queue and the next
    /// head is examined, until one stays put or the queue runs dry.
    fn dispatch_from(&self, key: &str) -> Option<CrawlUri> {
        let Some(queue) = self.registry.get(key) else {
            tracing::warn!("Key {} in ready queue, but not in registry", key);
            return None;
        };
        let budgets = self.budgets();

        let mut claimed = false;
        loop {
            let (moved, emptied) = {
                let mut queue = lock(&queue);
                if !claimed {
                    match self.claim(key, &mut queue, budgets) {
                        Claim::Claimed => claimed = true,
                        Claim::Skipped => return None,
                        Claim::Parked(tier) => {
                            drop(queue);
                            self.place(key, Placement::Inactive(tier));
                            return None;
                        }
                    }
                }

                let Some(head) = queue.peek().cloned() else {
                    tracing::warn!("Claimed queue {} has no head", key);
                    self.claims.release(key);
                    self.mark_exhausted(&mut queue);
                    return None;
                };

                let current_key = self.routing.site_key(&head);
                if current_key == key {
                    queue.record_dispatch();
                    self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Dispatching {} from {}", head, key);
                    return Some(head);
                }

                tracing::debug!("{} site key changed {} -> {}", head, key, current_key);
                let Some(mut moved) = queue.dequeue(&head) else {
                    tracing::warn!("Head of {} vanished during reclassification", key);
                    self.claims.release(key);
                    self.mark_exhausted(&mut queue);
                    return None;
                };
                moved.site_key = current_key;

                let emptied = queue.is_empty();
                if emptied {
                    self.claims.release(key);
                    self.mark_exhausted(&mut queue);
                }
                (moved, emptied)
            };

            self.stats.reclassified.fetch_add(1, Ordering::Relaxed);
            self.stats.decrement_queued();
            self.send_to_queue(moved);

            if emptied {
                return None;
            }
        }
    }

    /// Takes the in-process claim on a ready queue and applies its budgets
    fn claim(&self, key: &str, queue: &mut WorkQueue, budgets: Budgets) -> Claim {
        if queue.state() != QueueState::Ready {
            tracing::debug!("Skipping stale ready entry {} ({})", key, queue.state());
            return Claim::Skipped;
        }
        if queue.is_empty() {
            tracing::debug!("{} is exhausted, trying another", key);
            self.mark_exhausted(queue);
            return Claim::Skipped;
        }
        if self.claims.claim(key).is_none() {
            tracing::debug!("{} is already in-process", key);
            return Claim::Skipped;
        }
        if let Err(e) = queue.transition(QueueState::InProcess) {
            tracing::warn!("Queue anomaly: {}", e);
            self.claims.release(key);
            return Claim::Skipped;
        }

        queue.consider_active();
        queue.set_wake_time(None);
        queue.set_session_budget(budgets.session);
        queue.set_total_budget(budgets.total);

        // A spent session parks first; the total budget is checked again once
        // the queue comes back with a fresh session
        if queue.is_over_session_budget() {
            self.claims.release(key);
            let tier = queue.precedence();
            return match self.deactivate(queue, tier) {
                Placement::Inactive(tier) => Claim::Parked(tier),
                _ => Claim::Skipped,
            };
        }
        if queue.is_over_total_budget() {
            self.claims.release(key);
            self.retire(queue);
            return Claim::Skipped;
        }
        Claim::Claimed
    }
}
