//! State module for tracking scheduling progress
//!
//! # Components
//!
//! - `QueueState`: where a single site's work queue currently lives (ready, in-process, snoozed, ...)
//! - `CrawlState`: the crawl-wide lifecycle state (run, pause, finish, ...)
//! - `CrawlStateCell`: the target / last-reached pair driven by the supervisor

mod crawl_state;
mod queue_state;

// Re-export main types
pub use crawl_state::{CrawlState, CrawlStateCell};
pub use queue_state::QueueState;
