//! Crawl coordinator: wires a frontier to simulated workers and runs it
//!
//! The coordinator owns the pieces a real crawler would plug into the
//! frontier:
//! - the routing and politeness policies built from the configuration
//! - a local uniq filter seeded with the configured seeds
//! - the supervisor task and the worker pool
//! - a monitor that finishes the crawl once nothing is left to do

use crate::config::Config;
use crate::crawler::worker::{run_worker, WorkerContext};
use crate::dedup::MemoryUniqFilter;
use crate::frontier::Frontier;
use crate::policy::{DelayFactorPolicy, HostRoutingPolicy};
use crate::report::{FrontierSnapshot, Reporter};
use crate::state::CrawlState;
use crate::uri::CrawlUri;
use crate::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Config,
    frontier: Arc<Frontier>,
    filter: Arc<MemoryUniqFilter>,
}

impl Coordinator {
    /// Builds the frontier and seeds the uniq filter
    ///
    /// # Arguments
    ///
    /// * `config` - A validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(FrontierError)` - A seed is not a valid http(s) URL
    pub fn new(config: Config) -> Result<Self> {
        let filter = Arc::new(MemoryUniqFilter::new(config.frontier.flush_batch_size));

        let mut seeded = 0;
        for site in &config.sites {
            for seed in &site.seeds {
                let uri = CrawlUri::parse(seed)?;
                if filter.add(uri) {
                    seeded += 1;
                }
            }
        }
        tracing::info!("Seeded uniq filter with {} URIs", seeded);

        let frontier = Arc::new(Frontier::new(
            config.frontier.clone(),
            Arc::new(HostRoutingPolicy::from_config(&config)),
            Arc::new(DelayFactorPolicy::from_config(&config.politeness)),
            filter.clone(),
        ));

        Ok(Self {
            config,
            frontier,
            filter,
        })
    }

    pub fn frontier(&self) -> &Arc<Frontier> {
        &self.frontier
    }

    /// Runs the crawl to completion
    ///
    /// # Returns
    ///
    /// The frontier snapshot taken after FINISH was reached.
    pub async fn run(self) -> Result<FrontierSnapshot> {
        let started = Instant::now();
        let completed = Arc::new(AtomicU64::new(0));

        self.frontier.request_state(CrawlState::Run);
        let supervisor = self.frontier.start();

        let ctx = Arc::new(WorkerContext {
            frontier: self.frontier.clone(),
            filter: self.filter.clone(),
            settings: self.config.workers.clone(),
            completed: completed.clone(),
            started,
        });

        let workers: Vec<_> = (0..self.config.workers.count)
            .map(|id| tokio::spawn(run_worker(id, ctx.clone())))
            .collect();
        tracing::info!("Started {} workers", workers.len());

        self.wait_until_done(&completed).await;
        self.frontier.request_state(CrawlState::Finish);

        for (id, worker) in workers.into_iter().enumerate() {
            if let Err(e) = worker.await {
                tracing::error!("Worker {} panicked: {}", id, e);
            }
        }
        if let Err(e) = supervisor.await {
            tracing::error!("Supervisor task failed: {}", e);
        }

        let snapshot = self.frontier.snapshot();
        tracing::info!(
            "Crawl completed: {} URIs in {:?}",
            completed.load(Ordering::SeqCst),
            started.elapsed()
        );
        tracing::info!("{}", self.frontier.short_report_line());
        Ok(snapshot)
    }

    /// Waits until the frontier is EMPTY with nothing in flight and nothing
    /// left in the uniq filter
    async fn wait_until_done(&self, completed: &AtomicU64) {
        let mut reached = self.frontier.subscribe_state();
        let mut tick = tokio::time::interval(self.config.frontier.max_sleep());

        loop {
            tokio::select! {
                _ = tick.tick() => {}
                changed = reached.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }

            if self.frontier.target_state() == CrawlState::Finish {
                return;
            }
            if self.frontier.reached_state() != Some(CrawlState::Empty) {
                continue;
            }

            // A completion during the checks could have produced new work
            let before = completed.load(Ordering::SeqCst);
            let idle = self.frontier.is_empty()
                && self.filter.pending() == 0
                && self.frontier.in_process_count() == 0;
            if idle && completed.load(Ordering::SeqCst) == before {
                tracing::info!("Frontier drained; requesting FINISH");
                return;
            }
        }
    }
}

/// Runs a complete simulated crawl
///
/// # Arguments
///
/// * `config` - The validated configuration
pub async fn run_simulation(config: Config) -> Result<FrontierSnapshot> {
    Coordinator::new(config)?.run().await
}
