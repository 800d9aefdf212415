use crate::frontier::{CrawlOutcome, FetchStatus, Frontier, Placement, WorkQueue};
use crate::state::QueueState;
use crate::uri::CrawlUri;
use crate::util::lock;
use crate::{FrontierError, Result};
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

impl Frontier {
    /// Reports the outcome of a URI handed out by `next`
    ///
    /// Releases the queue's claim and moves the queue on: retired if its
    /// lifetime budget is spent, exhausted if nothing is left and no delay is
    /// owed, snoozed while a delay is owed, else back to ready or inactive.
    ///
    /// # Arguments
    ///
    /// * `uri` - The URI exactly as returned by `next`
    /// * `outcome` - How the fetch ended
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The queue was released
    /// * `Err(FrontierError)` - The URI's queue is unknown, not in-process,
    ///   or does not have this URI at its head
    pub fn complete(&self, uri: &CrawlUri, outcome: &CrawlOutcome) -> Result<()> {
        let key = uri.site_key.as_str();
        let queue = self
            .registry
            .get(key)
            .ok_or_else(|| FrontierError::MissingQueue {
                site_key: key.to_string(),
            })?;

        let (finished, placement) = {
            let mut queue = lock(&queue);
            if queue.state() != QueueState::InProcess || !self.claims.is_claimed(key) {
                return Err(FrontierError::NotInProcess {
                    site_key: key.to_string(),
                });
            }
            let head_retries = match queue.peek() {
                Some(head) if head.url == uri.url => head.retries,
                _ => {
                    return Err(FrontierError::UnknownItem {
                        uri: uri.to_string(),
                        site_key: key.to_string(),
                    })
                }
            };

            let mut delay = match outcome.status {
                // Nothing was fetched, so the site is owed no pause
                FetchStatus::Disregarded => Duration::ZERO,
                _ => self.politeness.delay(&queue, uri, outcome),
            };

            let retry = matches!(outcome.status, FetchStatus::Retry(_))
                && head_retries < self.config.max_retries;

            let finished = if retry {
                let attempt = queue.retry_head().unwrap_or_default();
                self.stats.retried.fetch_add(1, Ordering::Relaxed);
                delay = delay.max(self.config.retry_delay());
                tracing::debug!("Retrying {} (attempt {}) in {:?}", uri, attempt, delay);
                None
            } else {
                let done = queue.dequeue(uri);
                if let Some(done) = &done {
                    queue.expend(done.cost);
                    self.stats.decrement_queued();
                }
                queue.record_outcome(&outcome.status);
                self.count_outcome(&outcome.status);
                done
            };

            self.claims.release(key);

            let placement = if queue.is_over_total_budget() {
                self.retire(&mut queue);
                Placement::Stay
            } else if queue.is_empty() && delay.is_zero() {
                self.mark_exhausted(&mut queue);
                Placement::Stay
            } else if !delay.is_zero() {
                // Snooze even when empty so the delay holds for later arrivals
                self.snooze(&mut queue, delay);
                Placement::Stay
            } else {
                self.reenqueue(&mut queue)
            };
            (finished, placement)
        };

        self.place(key, placement);

        if let Some(done) = finished {
            self.dedup.note_finished(&done, outcome);
        }

        // Let the supervisor notice a drained crawl without waiting out its sleep
        if !self.state.target().allows_dispatch() && self.claims.len() == 0 {
            self.snoozed.signal();
        }
        Ok(())
    }

    fn count_outcome(&self, status: &FetchStatus) {
        let counter = match status {
            FetchStatus::Success(_) => &self.stats.succeeded,
            FetchStatus::Failure(_) | FetchStatus::Retry(_) => &self.stats.failed,
            FetchStatus::Disregarded => &self.stats.disregarded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snooze(&self, queue: &mut WorkQueue, delay: Duration) {
        if let Err(e) = queue.transition(QueueState::Snoozed) {
            tracing::warn!("Queue anomaly: {}", e);
            return;
        }
        let wake_at = Instant::now() + delay;
        queue.set_wake_time(Some(wake_at));
        tracing::debug!("Snoozing {} for {}ms", queue.key(), delay.as_millis());
        self.snoozed.snooze(queue.key(), wake_at);
    }
}
