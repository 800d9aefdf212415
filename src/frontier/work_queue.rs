use crate::frontier::FetchStatus;
use crate::report::QueueSnapshot;
use crate::state::QueueState;
use crate::uri::CrawlUri;
use crate::util::duration_ms;
use crate::{FrontierError, Result};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::time::Instant;

/// Ordered per-site queue of candidate URIs plus its scheduling state
///
/// Mutations are serialized by the mutex the registry wraps every queue in.
/// Which register holds the queue's key is recorded in `state`; the frontier
/// keeps the two in step.
#[derive(Debug)]
pub struct WorkQueue {
    key: String,
    items: VecDeque<CrawlUri>,
    state: QueueState,

    /// Tier assigned by the routing policy
    precedence: u32,

    /// Best tier suggested by any URI ever enqueued here
    hinted_precedence: Option<u32>,

    session_budget: u64,
    session_spent: u64,
    total_budget: Option<u64>,
    total_spent: u64,

    /// True from the first claim after activation until deactivation
    active: bool,

    wake_time: Option<Instant>,
    exhausted_count: u64,

    counters: QueueCounters,
    last_dispatched: Option<DateTime<Utc>>,
    last_completed: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Clone, Copy)]
struct QueueCounters {
    enqueued: u64,
    dispatched: u64,
    succeeded: u64,
    failed: u64,
    disregarded: u64,
    retried: u64,
}

impl WorkQueue {
    pub fn new(key: impl Into<String>, precedence: u32) -> Self {
        Self {
            key: key.into(),
            items: VecDeque::new(),
            state: QueueState::Empty,
            precedence,
            hinted_precedence: None,
            session_budget: 0,
            session_spent: 0,
            total_budget: None,
            total_spent: 0,
            active: false,
            wake_time: None,
            exhausted_count: 0,
            counters: QueueCounters::default(),
            last_dispatched: None,
            last_completed: None,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Moves the queue to `to`, rejecting moves the state machine forbids
    pub fn transition(&mut self, to: QueueState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(FrontierError::InvalidTransition {
                site_key: self.key.clone(),
                from: self.state,
                to,
            });
        }
        self.state = to;
        Ok(())
    }

    /// Appends a URI to the tail
    pub fn enqueue(&mut self, uri: CrawlUri) {
        if let Some(hint) = uri.precedence_hint {
            self.raise_precedence(hint);
        }
        self.items.push_back(uri);
        self.counters.enqueued += 1;
    }

    pub fn peek(&self) -> Option<&CrawlUri> {
        self.items.front()
    }

    /// Removes a specific URI, normally the head
    pub fn dequeue(&mut self, uri: &CrawlUri) -> Option<CrawlUri> {
        let position = self.items.iter().position(|item| item.url == uri.url)?;
        self.items.remove(position)
    }

    /// Keeps the head in place for another attempt
    pub(crate) fn retry_head(&mut self) -> Option<u32> {
        let head = self.items.front_mut()?;
        head.retries += 1;
        self.counters.retried += 1;
        Some(head.retries)
    }

    /// Effective tier: the policy's answer, improved by any URI hint
    pub fn precedence(&self) -> u32 {
        match self.hinted_precedence {
            Some(hint) => hint.min(self.precedence),
            None => self.precedence,
        }
    }

    pub fn set_precedence(&mut self, precedence: u32) {
        self.precedence = precedence;
    }

    /// Lowers the effective tier if `hint` is better than any seen so far
    pub fn raise_precedence(&mut self, hint: u32) {
        self.hinted_precedence = Some(self.hinted_precedence.map_or(hint, |h| h.min(hint)));
    }

    pub fn set_session_budget(&mut self, budget: u64) {
        self.session_budget = budget;
    }

    pub fn set_total_budget(&mut self, budget: Option<u64>) {
        self.total_budget = budget;
    }

    /// True when the open session has spent its allowance
    ///
    /// A queue without an open session is never over; its next claim
    /// starts a fresh one.
    pub fn is_over_session_budget(&self) -> bool {
        self.active && self.session_spent >= self.session_budget
    }

    pub fn is_over_total_budget(&self) -> bool {
        self.total_budget.is_some_and(|budget| self.total_spent >= budget)
    }

    /// Charges a completed URI's cost against both budgets
    pub fn expend(&mut self, cost: u32) {
        self.session_spent = self.session_spent.saturating_add(u64::from(cost));
        self.total_spent = self.total_spent.saturating_add(u64::from(cost));
    }

    /// Opens a new session unless one is already open
    pub fn consider_active(&mut self) {
        if !self.active {
            self.active = true;
            self.session_spent = 0;
        }
    }

    /// Closes the current session
    pub fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn note_exhausted(&mut self) {
        self.exhausted_count += 1;
    }

    pub fn wake_time(&self) -> Option<Instant> {
        self.wake_time
    }

    pub fn set_wake_time(&mut self, wake_time: Option<Instant>) {
        self.wake_time = wake_time;
    }

    pub(crate) fn record_dispatch(&mut self) {
        self.counters.dispatched += 1;
        self.last_dispatched = Some(Utc::now());
    }

    pub(crate) fn record_outcome(&mut self, status: &FetchStatus) {
        match status {
            FetchStatus::Success(_) => self.counters.succeeded += 1,
            FetchStatus::Failure(_) | FetchStatus::Retry(_) => self.counters.failed += 1,
            FetchStatus::Disregarded => self.counters.disregarded += 1,
        }
        self.last_completed = Some(Utc::now());
    }

    /// Copies the queue's counters and budgets for reporting
    pub fn snapshot(&self, now: Instant) -> QueueSnapshot {
        QueueSnapshot {
            key: self.key.clone(),
            state: self.state,
            precedence: self.precedence(),
            queued: self.items.len(),
            active: self.active,
            session_budget: self.session_budget,
            session_spent: self.session_spent,
            total_budget: self.total_budget,
            total_spent: self.total_spent,
            wake_in_ms: self
                .wake_time
                .map(|wake| duration_ms(wake.saturating_duration_since(now))),
            enqueued: self.counters.enqueued,
            dispatched: self.counters.dispatched,
            succeeded: self.counters.succeeded,
            failed: self.counters.failed,
            disregarded: self.counters.disregarded,
            retried: self.counters.retried,
            exhausted: self.exhausted_count,
            last_dispatched: self.last_dispatched,
            last_completed: self.last_completed,
        }
    }
}
