//! Deduplication gateway traits and error types
//!
//! The frontier does not decide which discovered URIs are new. An external
//! uniqueness service does, and hands approved candidates over only when the
//! frontier asks for them (a "pull"). The service may live in-process
//! (`MemoryUniqFilter`) or behind a network hop; the frontier only sees the
//! `DedupGateway` trait.

mod memory;

pub use memory::MemoryUniqFilter;

use crate::frontier::CrawlOutcome;
use crate::uri::CrawlUri;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while talking to the dedup service
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Dedup service unavailable: {0}")]
    Unavailable(String),

    #[error("Dedup flush timed out after {0}ms")]
    Timeout(u64),

    #[error("Dedup gateway is closed")]
    Closed,
}

/// Result type for dedup operations
pub type DedupResult<T> = Result<T, DedupError>;

/// Receiver of approved candidate URIs
///
/// The frontier implements this; gateways push into it during a flush.
pub trait CandidateSink: Send + Sync {
    fn receive(&self, uri: CrawlUri);
}

/// Source of candidate URIs that have passed the uniqueness check
#[async_trait]
pub trait DedupGateway: Send + Sync {
    /// Pushes any newly approved candidates into `sink`
    ///
    /// # Returns
    ///
    /// The number of URIs pushed; zero when nothing was waiting.
    async fn request_flush(&self, sink: &dyn CandidateSink) -> DedupResult<usize>;

    /// Monotonic count of URIs ever accepted by the gateway
    fn added_count(&self) -> u64;

    /// Called once per URI that left the frontier for good
    fn note_finished(&self, _uri: &CrawlUri, _outcome: &CrawlOutcome) {}

    /// Releases the gateway's resources when the crawl finishes
    fn close(&self) -> DedupResult<()> {
        Ok(())
    }
}
