//! The URI frontier: per-site queues and the structures that schedule them
//!
//! # Components
//!
//! - `WorkQueue`: FIFO of URIs for one site plus budgets and wake time
//! - `QueueRegistry`: site key -> queue
//! - `ReadyRegister`: FIFO of keys eligible for dispatch
//! - `PrecedenceActivator`: inactive keys, tiered by precedence
//! - `SnoozeScheduler`: keys serving a politeness delay, ordered by wake time
//! - `RetiredSet`: keys that exhausted their lifetime budget
//! - `ClaimTable`: keys claimed by an in-flight dispatch
//!
//! `Frontier` ties them together. Workers call `next()` and `complete()`;
//! the supervisor task started by `start()` drives the crawl state and wakes
//! snoozed queues.
//!
//! # Lock order
//!
//! precedence tiers -> one queue -> {claims, ready, snooze heap, retired}.
//! The registry lock is never held while another lock is taken, and no
//! thread holds two queue locks at once. Keys headed for the inactive tiers
//! are filed after the queue lock is released.

mod claims;
mod completion;
mod dispatcher;
mod outcome;
mod precedence;
mod ready;
mod registry;
mod retired;
mod snooze;
mod supervisor;
mod work_queue;

pub use outcome::{CrawlOutcome, FetchStatus};
pub use work_queue::WorkQueue;

use crate::config::FrontierConfig;
use crate::dedup::{CandidateSink, DedupGateway};
use crate::policy::{PolitenessPolicy, RoutingPolicy};
use crate::report::{FrontierSnapshot, QueueSnapshot, Reporter};
use crate::state::{CrawlState, CrawlStateCell, QueueState};
use crate::uri::CrawlUri;
use crate::util::{lock, read, write};
use chrono::Utc;
use claims::ClaimTable;
use precedence::{Activation, PrecedenceActivator};
use ready::ReadyRegister;
use registry::QueueRegistry;
use retired::RetiredSet;
use snooze::SnoozeScheduler;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::watch;

/// Budgets applied to a queue each time it is claimed
#[derive(Debug, Clone, Copy)]
struct Budgets {
    session: u64,
    total: Option<u64>,
}

/// Where a queue goes once its lock is released
enum Placement {
    Ready,
    Inactive(u32),
    Stay,
}

/// Frontier-wide counters
#[derive(Default)]
struct FrontierStats {
    queued: AtomicU64,
    dispatched: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    disregarded: AtomicU64,
    retried: AtomicU64,
    reclassified: AtomicU64,
    queues_readied: AtomicU64,
}

impl FrontierStats {
    fn decrement_queued(&self) {
        let _ = self
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }
}

/// The scheduling core shared by all workers and the supervisor
pub struct Frontier {
    config: FrontierConfig,
    budgets: RwLock<Budgets>,

    routing: Arc<dyn RoutingPolicy>,
    politeness: Arc<dyn PolitenessPolicy>,
    dedup: Arc<dyn DedupGateway>,

    registry: QueueRegistry,
    ready: ReadyRegister,
    inactive: PrecedenceActivator,
    snoozed: SnoozeScheduler,
    retired: RetiredSet,
    claims: ClaimTable,

    state: CrawlStateCell,

    /// Single-flight guard for replenishing the ready FIFO
    pulling: AtomicBool,

    stats: FrontierStats,
}

impl Frontier {
    /// Creates a paused frontier
    ///
    /// # Arguments
    ///
    /// * `config` - Scheduling and budget settings
    /// * `routing` - Assigns site keys and precedence tiers
    /// * `politeness` - Computes the delay owed after each completion
    /// * `dedup` - Source of new candidate URIs
    pub fn new(
        config: FrontierConfig,
        routing: Arc<dyn RoutingPolicy>,
        politeness: Arc<dyn PolitenessPolicy>,
        dedup: Arc<dyn DedupGateway>,
    ) -> Self {
        let budgets = Budgets {
            session: config.balance_replenish_amount,
            total: config.total_budget(),
        };

        Self {
            config,
            budgets: RwLock::new(budgets),
            routing,
            politeness,
            dedup,
            registry: QueueRegistry::new(),
            ready: ReadyRegister::new(),
            inactive: PrecedenceActivator::new(),
            snoozed: SnoozeScheduler::new(),
            retired: RetiredSet::new(),
            claims: ClaimTable::new(),
            state: CrawlStateCell::new(CrawlState::Pause),
            pulling: AtomicBool::new(false),
            stats: FrontierStats::default(),
        }
    }

    pub fn config(&self) -> &FrontierConfig {
        &self.config
    }

    /// Adds a URI to the queue its site key names
    ///
    /// A queue that was empty is placed: parked as inactive when
    /// `hold-queues` is on and the ready backlog is full, otherwise by the
    /// re-enqueue rule.
    pub fn schedule(&self, mut uri: CrawlUri) {
        uri.site_key = self.routing.site_key(&uri);
        self.send_to_queue(uri);
    }

    /// Appends a URI whose site key is already set
    fn send_to_queue(&self, uri: CrawlUri) {
        let key = uri.site_key.clone();
        let queue = self.registry.get_or_create(&key, || {
            WorkQueue::new(key.clone(), self.routing.precedence(&key))
        });

        let placement = {
            let mut queue = lock(&queue);
            queue.enqueue(uri);
            self.stats.queued.fetch_add(1, Ordering::SeqCst);

            if queue.state() != QueueState::Empty {
                Placement::Stay
            } else if self.config.hold_queues
                && self.ready.len() >= self.config.ready_backlog_target
            {
                let tier = self.refresh_precedence(&mut queue);
                self.deactivate(&mut queue, tier)
            } else {
                self.reenqueue(&mut queue)
            }
        };
        self.place(&key, placement);
    }

    /// Re-reads the routing policy's tier for a queue
    fn refresh_precedence(&self, queue: &mut WorkQueue) -> u32 {
        let precedence = self.routing.precedence(queue.key());
        queue.set_precedence(precedence);
        queue.precedence()
    }

    /// Decides between ready and inactive for a queue that has work
    ///
    /// Must be called with the queue locked; the placement is applied by
    /// `place` after the lock is released.
    fn reenqueue(&self, queue: &mut WorkQueue) -> Placement {
        let precedence = self.refresh_precedence(queue);
        if precedence > self.inactive.highest_waiting()
            || precedence >= self.config.precedence_floor
            || queue.is_over_session_budget()
        {
            return self.deactivate(queue, precedence);
        }

        match queue.transition(QueueState::Ready) {
            Ok(()) => Placement::Ready,
            Err(e) => {
                tracing::warn!("Queue anomaly: {}", e);
                Placement::Stay
            }
        }
    }

    fn deactivate(&self, queue: &mut WorkQueue, tier: u32) -> Placement {
        match queue.transition(QueueState::Inactive) {
            Ok(()) => {
                queue.deactivate();
                Placement::Inactive(tier)
            }
            Err(e) => {
                tracing::warn!("Queue anomaly: {}", e);
                Placement::Stay
            }
        }
    }

    /// Marks a queue with no pending URIs as exhausted
    fn mark_exhausted(&self, queue: &mut WorkQueue) {
        queue.note_exhausted();
        if let Err(e) = queue.transition(QueueState::Empty) {
            tracing::warn!("Queue anomaly: {}", e);
        }
    }

    /// Retires a queue that spent its lifetime budget
    fn retire(&self, queue: &mut WorkQueue) {
        match queue.transition(QueueState::Retired) {
            Ok(()) => {
                queue.deactivate();
                self.retired.insert(queue.key());
                tracing::info!("Retired queue {} (over total budget)", queue.key());
            }
            Err(e) => tracing::warn!("Queue anomaly: {}", e),
        }
    }

    fn place(&self, key: &str, placement: Placement) {
        match placement {
            Placement::Ready => self.publish_ready(key),
            Placement::Inactive(tier) => {
                tracing::debug!("Queue {} inactive at tier {}", key, tier);
                self.inactive.file(key, tier);
            }
            Placement::Stay => {}
        }
    }

    fn publish_ready(&self, key: &str) {
        tracing::debug!("Queue readied: {}", key);
        self.stats.queues_readied.fetch_add(1, Ordering::Relaxed);
        self.ready.publish(key);
    }

    /// Moves the best inactive queue into the ready FIFO
    ///
    /// # Returns
    ///
    /// True if a queue was activated.
    fn activate_inactive_queue(&self) -> bool {
        let activated = self.inactive.activate_next(|key, tier| {
            let Some(queue) = self.registry.get(key) else {
                tracing::warn!("Inactive key {} has no backing queue", key);
                return Activation::Stale;
            };

            let mut queue = lock(&queue);
            if queue.state() != QueueState::Inactive {
                return Activation::Stale;
            }
            let current = self.refresh_precedence(&mut queue);
            if current != tier {
                return Activation::Refile(current);
            }
            match queue.transition(QueueState::Ready) {
                Ok(()) => Activation::Activated,
                Err(e) => {
                    tracing::warn!("Queue anomaly: {}", e);
                    Activation::Stale
                }
            }
        });

        match activated {
            Some(key) => {
                tracing::debug!("Activated inactive queue {}", key);
                self.publish_ready(&key);
                true
            }
            None => false,
        }
    }

    /// Requests a crawl-wide state change
    ///
    /// The supervisor performs the transition; observe it with
    /// `wait_for_state`. A finishing frontier cannot be resumed.
    pub fn request_state(&self, target: CrawlState) {
        let previous = loop {
            let current = self.state.target();
            if current == CrawlState::Finish && target != CrawlState::Finish {
                tracing::warn!("Ignoring request for {} after FINISH", target);
                return;
            }
            if self.state.replace_target(current, target) {
                break current;
            }
        };

        if previous != target {
            tracing::info!("Frontier target state {} -> {}", previous, target);
            match target {
                // One worker wakes; it fans out to others while work remains
                CrawlState::Run => self.ready.notify_one(),
                CrawlState::Finish => self.ready.notify_all(),
                _ => {}
            }
        }
        self.snoozed.signal();
    }

    pub fn target_state(&self) -> CrawlState {
        self.state.target()
    }

    pub fn reached_state(&self) -> Option<CrawlState> {
        self.state.reached()
    }

    /// Waits until the supervisor reaches `state`
    pub async fn wait_for_state(&self, state: CrawlState) {
        self.state.wait_reached(state).await;
    }

    pub fn subscribe_state(&self) -> watch::Receiver<Option<CrawlState>> {
        self.state.subscribe()
    }

    /// Changes the budgets applied at each queue's next claim
    ///
    /// # Arguments
    ///
    /// * `session` - Allowance per activation
    /// * `total` - Lifetime allowance, `None` for unlimited
    pub fn set_budgets(&self, session: u64, total: Option<u64>) {
        // A zero session budget would park every queue at its first claim
        let session = session.max(1);
        *write(&self.budgets) = Budgets { session, total };
        tracing::info!("Queue budgets set: session={} total={:?}", session, total);
    }

    fn budgets(&self) -> Budgets {
        *read(&self.budgets)
    }

    /// Reconsiders every retired queue under the current budgets
    ///
    /// # Returns
    ///
    /// The number of queues brought back into scheduling.
    pub fn unretire_queues(&self) -> usize {
        let budgets = self.budgets();
        let mut unretired = 0;

        for key in self.retired.drain() {
            let Some(queue) = self.registry.get(&key) else {
                tracing::warn!("Retired key {} has no backing queue", key);
                continue;
            };

            let placement = {
                let mut queue = lock(&queue);
                if queue.state() != QueueState::Retired {
                    continue;
                }
                queue.set_total_budget(budgets.total);
                if queue.is_over_total_budget() {
                    self.retired.insert(&key);
                    continue;
                }
                unretired += 1;
                self.reenqueue(&mut queue)
            };
            self.place(&key, placement);
        }

        if unretired > 0 {
            tracing::info!("Unretired {} queues", unretired);
        }
        unretired
    }

    /// True when no URI is queued anywhere
    pub fn is_empty(&self) -> bool {
        self.queued_count() == 0
    }

    pub fn queued_count(&self) -> u64 {
        self.stats.queued.load(Ordering::SeqCst)
    }

    pub fn in_process_count(&self) -> usize {
        self.claims.len()
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn inactive_count(&self) -> usize {
        self.inactive.len()
    }

    pub fn snoozed_count(&self) -> usize {
        self.snoozed.len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.len()
    }

    pub fn queue_count(&self) -> usize {
        self.registry.len()
    }

    pub fn highest_precedence_waiting(&self) -> u32 {
        self.inactive.highest_waiting()
    }

    /// URIs ever accepted by the dedup gateway
    pub fn candidate_uri_count(&self) -> u64 {
        self.dedup.added_count()
    }

    pub fn queue_state(&self, key: &str) -> Option<QueueState> {
        self.registry.get(key).map(|queue| lock(&queue).state())
    }

    pub fn queue_snapshot(&self, key: &str) -> Option<QueueSnapshot> {
        let now = Instant::now();
        self.registry.get(key).map(|queue| lock(&queue).snapshot(now))
    }

    /// Copies the frontier's counters and memberships for reporting
    ///
    /// Each structure is locked only long enough to copy it, one queue at a
    /// time; formatting the result happens with no lock held.
    pub fn snapshot(&self) -> FrontierSnapshot {
        let now = Instant::now();
        let mut queues: Vec<QueueSnapshot> = self
            .registry
            .all()
            .iter()
            .map(|queue| lock(queue).snapshot(now))
            .collect();
        queues.sort_by(|a, b| a.key.cmp(&b.key));

        let exhausted_queues = queues
            .iter()
            .filter(|q| q.state == QueueState::Empty)
            .count();
        let tier_counts = self.inactive.tier_counts();

        FrontierSnapshot {
            generated_at: Utc::now(),
            target_state: self.state.target(),
            reached_state: self.state.reached(),
            queued: self.queued_count(),
            ready: self.ready.len(),
            inactive: tier_counts.values().sum(),
            inactive_by_tier: tier_counts
                .into_iter()
                .map(|(tier, count)| (tier.to_string(), count))
                .collect(),
            snoozed: self.snoozed.len(),
            retired: self.retired.len(),
            in_process: self.claims.len(),
            total_queues: queues.len(),
            exhausted_queues,
            dispatched: self.stats.dispatched.load(Ordering::Relaxed),
            succeeded: self.stats.succeeded.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
            disregarded: self.stats.disregarded.load(Ordering::Relaxed),
            retried: self.stats.retried.load(Ordering::Relaxed),
            reclassified: self.stats.reclassified.load(Ordering::Relaxed),
            queues_readied: self.stats.queues_readied.load(Ordering::Relaxed),
            candidate_uris: self.candidate_uri_count(),
            highest_precedence_waiting: match self.inactive.highest_waiting() {
                u32::MAX => None,
                tier => Some(tier),
            },
            queues,
        }
    }
}

impl CandidateSink for Frontier {
    fn receive(&self, uri: CrawlUri) {
        self.schedule(uri);
    }
}

impl Reporter for Frontier {
    fn short_report_legend(&self) -> &'static str {
        FrontierSnapshot::LEGEND
    }

    fn short_report_line(&self) -> String {
        self.snapshot().short_report_line()
    }

    fn report_to(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.snapshot().report_to(out)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::dedup::{DedupResult, MemoryUniqFilter};
    use crate::policy::{DelayFactorPolicy, HostRoutingPolicy};
    use async_trait::async_trait;
    use std::time::Duration;

    /// A frontier with no politeness delay and small timings
    pub fn frontier_with(
        config: FrontierConfig,
        routing: Arc<HostRoutingPolicy>,
        politeness: DelayFactorPolicy,
    ) -> Frontier {
        Frontier::new(
            config,
            routing,
            Arc::new(politeness),
            Arc::new(MemoryUniqFilter::new(100)),
        )
    }

    pub fn test_config() -> FrontierConfig {
        FrontierConfig {
            max_sleep_ms: 20,
            pull_contention_backoff_ms: 1,
            ..FrontierConfig::default()
        }
    }

    pub fn test_frontier() -> Frontier {
        frontier_with(
            test_config(),
            Arc::new(HostRoutingPolicy::new(1)),
            DelayFactorPolicy::none(),
        )
    }

    pub fn uri(s: &str) -> CrawlUri {
        CrawlUri::parse(s).unwrap()
    }

    pub fn ok() -> CrawlOutcome {
        CrawlOutcome::success(200, Duration::from_millis(10))
    }

    /// Gateway that never has anything to hand over
    pub struct NoCandidates;

    #[async_trait]
    impl DedupGateway for NoCandidates {
        async fn request_flush(&self, _sink: &dyn CandidateSink) -> DedupResult<usize> {
            Ok(0)
        }

        fn added_count(&self) -> u64 {
            0
        }
    }
}
