use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Pull-Frontier
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub politeness: PolitenessConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default, rename = "site")]
    pub sites: Vec<SiteEntry>,
}

/// Scheduling and budget configuration for the frontier
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FrontierConfig {
    /// Ready-queue length below which workers try to pull more work
    pub pull_trigger_level: usize,

    /// Session budget granted to a queue each time it is activated
    pub balance_replenish_amount: u64,

    /// Lifetime budget per queue; negative means unlimited
    pub queue_total_budget: i64,

    /// Queues at or beyond this precedence are never activated by a pull
    pub precedence_floor: u32,

    /// Precedence assigned to sites without an explicit override
    pub default_precedence: u32,

    /// Upper bound on the supervisor's sleep between sweeps (milliseconds)
    pub max_sleep_ms: u64,

    /// Park newly non-empty queues as inactive once the ready backlog is full
    pub hold_queues: bool,

    /// Ready backlog size at which `hold_queues` starts parking queues
    pub ready_backlog_target: usize,

    /// Retries granted to a URI before a retryable outcome counts as failure
    pub max_retries: u32,

    /// Minimum delay before a retried URI is attempted again (milliseconds)
    pub retry_delay_ms: u64,

    /// Upper bound on a single dedup flush (milliseconds)
    pub flush_timeout_ms: u64,

    /// Maximum URIs a local uniq filter hands over per flush
    pub flush_batch_size: usize,

    /// Times a worker that lost the pull race retries before giving up
    pub pull_contention_retries: u32,

    /// Pause between those retries (milliseconds)
    pub pull_contention_backoff_ms: u64,
}

impl FrontierConfig {
    /// Lifetime budget, or `None` when unlimited
    pub fn total_budget(&self) -> Option<u64> {
        u64::try_from(self.queue_total_budget).ok()
    }

    pub fn max_sleep(&self) -> Duration {
        Duration::from_millis(self.max_sleep_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.flush_timeout_ms)
    }

    pub fn pull_contention_backoff(&self) -> Duration {
        Duration::from_millis(self.pull_contention_backoff_ms)
    }
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            pull_trigger_level: 100,
            balance_replenish_amount: 3000,
            queue_total_budget: -1,
            precedence_floor: 255,
            default_precedence: 1,
            max_sleep_ms: 1000,
            hold_queues: false,
            ready_backlog_target: 0,
            max_retries: 30,
            retry_delay_ms: 900_000,
            flush_timeout_ms: 30_000,
            flush_batch_size: 1000,
            pull_contention_retries: 3,
            pull_contention_backoff_ms: 10,
        }
    }
}

/// Politeness delay configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PolitenessConfig {
    /// Multiple of the last fetch duration to wait before the next request
    pub delay_factor: f64,

    /// Lower bound on the delay (milliseconds)
    pub min_delay_ms: u64,

    /// Upper bound on the delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            delay_factor: 5.0,
            min_delay_ms: 3000,
            max_delay_ms: 30_000,
        }
    }
}

/// Worker pool configuration for the simulation driver
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct WorkerConfig {
    /// Number of concurrent workers calling `next()`
    pub count: usize,

    /// Pretend fetch duration (milliseconds)
    pub simulated_fetch_ms: u64,

    /// Synthetic links discovered per fetched page
    pub links_per_page: usize,

    /// Depth beyond which synthetic links are not followed
    pub max_depth: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 8,
            simulated_fetch_ms: 50,
            links_per_page: 0,
            max_depth: 0,
        }
    }
}

/// Site entry with optional precedence and seed URLs
#[derive(Debug, Clone, Deserialize)]
pub struct SiteEntry {
    /// Host name the entry applies to (e.g., "example.com")
    pub domain: String,

    /// Precedence tier for the site's queue (lower is served first)
    #[serde(default)]
    pub precedence: Option<u32>,

    /// Seed URLs handed to the uniq filter at startup
    #[serde(default)]
    pub seeds: Vec<String>,
}
