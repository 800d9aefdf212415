//! Simulated crawl driving the frontier end to end
//!
//! This module contains:
//! - The coordinator that builds a frontier from the configuration
//! - Worker tasks that fetch (pretend), discover links, and complete URIs

mod coordinator;
mod worker;

pub use coordinator::{run_simulation, Coordinator};
pub use worker::{depth_of, discover_links, DEPTH_KEY};

use crate::config::Config;
use crate::report::FrontierSnapshot;
use crate::Result;

/// Runs a complete simulated crawl
///
/// This is the main entry point for a crawl. It will:
/// 1. Seed the uniq filter from the configured sites
/// 2. Start the frontier supervisor and request RUN
/// 3. Run the worker pool until the frontier drains
/// 4. Request FINISH and wait for every task to exit
///
/// # Arguments
///
/// * `config` - The crawler configuration
///
/// # Returns
///
/// * `Ok(FrontierSnapshot)` - The frontier as it stood at FINISH
/// * `Err(FrontierError)` - The crawl could not be set up
pub async fn crawl(config: Config) -> Result<FrontierSnapshot> {
    run_simulation(config).await
}
