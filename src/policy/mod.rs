//! Pluggable scheduling policies
//!
//! The frontier never decides on its own which site a URI belongs to, how
//! urgent a site is, or how long to wait between requests to it. Those
//! answers come from the policies in this module:
//!
//! - `RoutingPolicy`: site key and precedence tier
//! - `PolitenessPolicy`: delay imposed on a queue after each completion

mod politeness;
mod routing;

pub use politeness::DelayFactorPolicy;
pub use routing::HostRoutingPolicy;

use crate::frontier::{CrawlOutcome, WorkQueue};
use crate::uri::CrawlUri;
use std::time::Duration;

/// Assigns URIs to queues and queues to precedence tiers
///
/// Answers must be deterministic for a given snapshot of the policy's
/// external state, but may change over time. A changed site key for a queued
/// URI moves it to another queue when it next reaches the head of its queue.
pub trait RoutingPolicy: Send + Sync {
    /// Computes the site key for a URI
    fn site_key(&self, uri: &CrawlUri) -> String;

    /// Computes the precedence tier for a site (lower is served first)
    fn precedence(&self, site_key: &str) -> u32;
}

/// Computes the politeness delay owed after a completed fetch
pub trait PolitenessPolicy: Send + Sync {
    fn delay(&self, queue: &WorkQueue, completed: &CrawlUri, outcome: &CrawlOutcome) -> Duration;
}
