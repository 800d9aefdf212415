//! Frontier reporting
//!
//! Reports are rendered from a `FrontierSnapshot`, a plain copy of the
//! frontier's counters and memberships. Taking the snapshot locks each
//! structure briefly; rendering it locks nothing.

use crate::state::{CrawlState, QueueState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Something that can describe its own progress
pub trait Reporter {
    /// Column names for `short_report_line`
    fn short_report_legend(&self) -> &'static str;

    /// One-line summary suitable for periodic progress logs
    fn short_report_line(&self) -> String;

    /// Full multi-line report
    fn report_to(&self, out: &mut dyn fmt::Write) -> fmt::Result;
}

/// Point-in-time copy of the frontier
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontierSnapshot {
    pub generated_at: DateTime<Utc>,
    pub target_state: CrawlState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reached_state: Option<CrawlState>,

    /// URIs queued across all work queues
    pub queued: u64,

    pub ready: usize,
    pub inactive: usize,

    /// Inactive keys per precedence tier, keyed by the tier number
    pub inactive_by_tier: BTreeMap<String, usize>,

    pub snoozed: usize,
    pub retired: usize,
    pub in_process: usize,
    pub total_queues: usize,

    /// Queues currently holding no URIs
    pub exhausted_queues: usize,

    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub disregarded: u64,
    pub retried: u64,
    pub reclassified: u64,
    pub queues_readied: u64,

    /// URIs ever accepted by the dedup gateway
    pub candidate_uris: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub highest_precedence_waiting: Option<u32>,

    pub queues: Vec<QueueSnapshot>,
}

/// Point-in-time copy of one work queue
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueueSnapshot {
    pub key: String,
    pub state: QueueState,
    pub precedence: u32,
    pub queued: usize,
    pub active: bool,
    pub session_budget: u64,
    pub session_spent: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_budget: Option<u64>,
    pub total_spent: u64,

    /// Milliseconds until a snoozed queue wakes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wake_in_ms: Option<u64>,

    pub enqueued: u64,
    pub dispatched: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub disregarded: u64,
    pub retried: u64,

    /// Times the queue ran out of URIs
    pub exhausted: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_dispatched: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_completed: Option<DateTime<Utc>>,
}

impl FrontierSnapshot {
    pub const LEGEND: &'static str =
        "total: in-process ready snoozed inactive retired exhausted; queued dispatched";

    /// One line matching `LEGEND`
    pub fn short_report_line(&self) -> String {
        format!(
            "{} queues: {} in-process, {} ready, {} snoozed, {} inactive, {} retired, {} exhausted; {} queued, {} dispatched",
            self.total_queues,
            self.in_process,
            self.ready,
            self.snoozed,
            self.inactive,
            self.retired,
            self.exhausted_queues,
            self.queued,
            self.dispatched
        )
    }

    /// Renders the snapshot as a TOML document
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Writes a human-readable multi-line report
    pub fn report_to(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(out, "=== Frontier Report ===")?;
        writeln!(out, "Generated: {}", self.generated_at.to_rfc3339())?;
        let reached = self
            .reached_state
            .map(|state| state.as_str())
            .unwrap_or("(none)");
        writeln!(out, "State: target {}, reached {}", self.target_state, reached)?;
        writeln!(out)?;

        writeln!(out, "Queues:")?;
        writeln!(out, "  Total: {}", self.total_queues)?;
        writeln!(out, "  In-process: {}", self.in_process)?;
        writeln!(out, "  Ready: {}", self.ready)?;
        writeln!(out, "  Snoozed: {}", self.snoozed)?;
        writeln!(out, "  Inactive: {}", self.inactive)?;
        for (tier, count) in &self.inactive_by_tier {
            writeln!(out, "    tier {}: {}", tier, count)?;
        }
        writeln!(out, "  Retired: {}", self.retired)?;
        writeln!(out, "  Exhausted: {}", self.exhausted_queues)?;
        if let Some(tier) = self.highest_precedence_waiting {
            writeln!(out, "  Highest precedence waiting: {}", tier)?;
        }
        writeln!(out)?;

        writeln!(out, "URIs:")?;
        writeln!(out, "  Queued: {}", self.queued)?;
        writeln!(out, "  Candidates accepted: {}", self.candidate_uris)?;
        writeln!(out, "  Dispatched: {}", self.dispatched)?;
        writeln!(out, "  Succeeded: {}", self.succeeded)?;
        writeln!(out, "  Failed: {}", self.failed)?;
        writeln!(out, "  Disregarded: {}", self.disregarded)?;
        writeln!(out, "  Retried: {}", self.retried)?;
        writeln!(out, "  Reclassified: {}", self.reclassified)?;
        writeln!(out, "  Queues readied: {}", self.queues_readied)?;

        if self.queues.is_empty() {
            return Ok(());
        }

        writeln!(out)?;
        writeln!(out, "Per queue:")?;
        for queue in &self.queues {
            queue.report_to(out)?;
        }
        Ok(())
    }
}

impl fmt::Display for FrontierSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.report_to(f)
    }
}

impl QueueSnapshot {
    fn report_to(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(
            out,
            "  {} [{}] p{} queued={} dispatched={} ok={} failed={} disregarded={} retried={}",
            self.key,
            self.state,
            self.precedence,
            self.queued,
            self.dispatched,
            self.succeeded,
            self.failed,
            self.disregarded,
            self.retried
        )?;

        write!(out, " session={}/{}", self.session_spent, self.session_budget)?;
        match self.total_budget {
            Some(total) => write!(out, " total={}/{}", self.total_spent, total)?,
            None => write!(out, " total={}", self.total_spent)?,
        }
        if let Some(wake_in_ms) = self.wake_in_ms {
            write!(out, " wakes-in={}ms", wake_in_ms)?;
        }
        writeln!(out)
    }
}
