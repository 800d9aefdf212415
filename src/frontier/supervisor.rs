use crate::frontier::{Frontier, Placement};
use crate::state::{CrawlState, QueueState};
use crate::util::lock;
use crate::{FrontierError, Result};
use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

impl Frontier {
    /// Spawns the supervisor task that drives the crawl state
    ///
    /// The task runs until FINISH is reached. Failures inside a step are
    /// logged and pause the crawl; they never end the task.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let frontier = Arc::clone(self);
        tokio::spawn(async move { frontier.supervise().await })
    }

    async fn supervise(&self) {
        tracing::info!("Frontier supervisor started");

        while self.state.reached() != Some(CrawlState::Finish) {
            let step = catch_unwind(AssertUnwindSafe(|| self.management_step()));
            let sleep_for = match step {
                Ok(Ok(sleep_for)) => sleep_for,
                Ok(Err(e)) => {
                    tracing::error!("Frontier management step failed: {}", e);
                    self.force_pause();
                    self.config.max_sleep()
                }
                Err(_) => {
                    tracing::error!("Frontier management step panicked");
                    self.force_pause();
                    self.config.max_sleep()
                }
            };

            if self.state.reached() == Some(CrawlState::Finish) {
                break;
            }

            if sleep_for.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }

            tokio::select! {
                _ = tokio::time::sleep(sleep_for) => {}
                _ = self.snoozed.updated() => {}
            }
        }

        tracing::info!("Frontier supervisor exiting");
    }

    /// Works toward the target state once
    ///
    /// # Returns
    ///
    /// How long to sleep before the next step.
    pub(super) fn management_step(&self) -> Result<Duration> {
        let max_sleep = self.config.max_sleep();

        match self.state.target() {
            CrawlState::Empty => {
                if !self.is_empty() {
                    self.state.replace_target(CrawlState::Empty, CrawlState::Run);
                    return Ok(Duration::ZERO);
                }
                if self.state.mark_reached(CrawlState::Empty) {
                    tracing::info!("Frontier reached EMPTY");
                }
                self.wake_queues();
                // Wake one worker so it can pull from the dedup gateway
                self.ready.notify_one();
                Ok(max_sleep)
            }
            CrawlState::Run => {
                if self.is_empty() {
                    self.state.replace_target(CrawlState::Run, CrawlState::Empty);
                    return Ok(Duration::ZERO);
                }
                if self.state.mark_reached(CrawlState::Run) {
                    tracing::info!("Frontier reached RUN");
                }
                let sleep_for = self.wake_queues();
                if self.ready.is_empty() {
                    // Nothing ready locally; let a worker activate or pull
                    self.ready.notify_one();
                }
                Ok(sleep_for)
            }
            CrawlState::Hold | CrawlState::Pause => {
                if self.claims.len() == 0 && self.state.mark_reached(CrawlState::Pause) {
                    tracing::info!("Frontier reached PAUSE");
                }
                Ok(max_sleep)
            }
            CrawlState::Finish => {
                if self.claims.len() > 0 {
                    return Ok(max_sleep);
                }
                let finalized = self.final_tasks();
                self.state.mark_reached(CrawlState::Finish);
                self.ready.notify_all();
                tracing::info!("Frontier reached FINISH");
                finalized.map(|_| Duration::ZERO)
            }
        }
    }

    /// Releases snoozed queues that are due
    ///
    /// # Returns
    ///
    /// Time until the next wake, capped at `max-sleep-ms`.
    pub(super) fn wake_queues(&self) -> Duration {
        let now = Instant::now();
        while let Some(key) = self.snoozed.pop_due_one(now) {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.wake_queue(&key))) {
                // Keys not yet popped stay in the heap; restore this one too
                self.resnooze(&key, now);
                resume_unwind(panic);
            }
        }

        let max_sleep = self.config.max_sleep();
        match self.snoozed.next_wake() {
            Some(wake) => wake.saturating_duration_since(now).min(max_sleep),
            None => max_sleep,
        }
    }

    fn wake_queue(&self, key: &str) {
        let Some(queue) = self.registry.get(key) else {
            tracing::warn!("Snoozed key {} has no backing queue", key);
            return;
        };

        let placement = {
            let mut queue = lock(&queue);
            if queue.state() != QueueState::Snoozed {
                tracing::debug!("Skipping stale snooze entry {} ({})", key, queue.state());
                return;
            }
            queue.set_wake_time(None);
            if queue.is_empty() {
                self.mark_exhausted(&mut queue);
                Placement::Stay
            } else {
                self.reenqueue(&mut queue)
            }
        };
        self.place(key, placement);
    }

    /// Returns a key whose wake failed to the snooze heap
    fn resnooze(&self, key: &str, wake_at: Instant) {
        let Some(queue) = self.registry.get(key) else {
            return;
        };
        let mut queue = lock(&queue);
        if queue.state() != QueueState::Snoozed {
            return;
        }
        queue.set_wake_time(Some(wake_at));
        self.snoozed.snooze(key, wake_at);
    }

    fn force_pause(&self) {
        let current = self.state.target();
        if current != CrawlState::Finish && self.state.replace_target(current, CrawlState::Pause) {
            tracing::warn!("Frontier forced to PAUSE after a supervisor failure");
        }
    }

    fn final_tasks(&self) -> Result<()> {
        tracing::info!(
            "Finishing frontier: {} queued, {} queues",
            self.queued_count(),
            self.queue_count()
        );
        self.dedup
            .close()
            .map_err(|e| FrontierError::Finalization(e.to_string()))
    }
}
