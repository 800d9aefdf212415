//! Pull-Frontier: the scheduling core of a polite web crawler
//!
//! This crate decides which URI a fetch worker should fetch next. It keeps one
//! work queue per site, guarantees that a site never has two requests in
//! flight, spaces requests to a site by a politeness delay, accounts session
//! and lifetime budgets per queue, and pulls new candidates from an external
//! deduplication service when the ready set runs low.

pub mod config;
pub mod crawler;
pub mod dedup;
pub mod frontier;
pub mod policy;
pub mod report;
pub mod state;
pub mod uri;

mod util;

use thiserror::Error;

/// Main error type for frontier operations
#[derive(Debug, Error)]
pub enum FrontierError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dedup gateway error: {0}")]
    Dedup(#[from] dedup::DedupError),

    #[error("URI error: {0}")]
    Uri(#[from] UriError),

    #[error("No work queue registered for site key {site_key}")]
    MissingQueue { site_key: String },

    #[error("Queue {site_key} is not claimed in-process")]
    NotInProcess { site_key: String },

    #[error("{uri} is not the head of queue {site_key}")]
    UnknownItem { uri: String, site_key: String },

    #[error("Invalid queue state transition for {site_key}: {from:?} -> {to:?}")]
    InvalidTransition {
        site_key: String,
        from: state::QueueState,
        to: state::QueueState,
    },

    #[error("Finalization failed: {0}")]
    Finalization(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// Candidate URI errors
#[derive(Debug, Error)]
pub enum UriError {
    #[error("Failed to parse URI: {0}")]
    Parse(#[from] ::url::ParseError),

    #[error("Invalid URI scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URI: {0}")]
    MissingHost(String),
}

/// Result type alias for frontier operations
pub type Result<T> = std::result::Result<T, FrontierError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URI operations
pub type UriResult<T> = std::result::Result<T, UriError>;

// Re-export commonly used types
pub use config::Config;
pub use dedup::{CandidateSink, DedupGateway, MemoryUniqFilter};
pub use frontier::{CrawlOutcome, FetchStatus, Frontier, WorkQueue};
pub use policy::{DelayFactorPolicy, HostRoutingPolicy, PolitenessPolicy, RoutingPolicy};
pub use report::{FrontierSnapshot, QueueSnapshot, Reporter};
pub use state::{CrawlState, QueueState};
pub use uri::CrawlUri;
