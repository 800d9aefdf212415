//! Configuration module for Pull-Frontier
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pull_frontier::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("frontier.toml")).unwrap();
//! println!("Session budget: {}", config.frontier.balance_replenish_amount);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FrontierConfig, PolitenessConfig, SiteEntry, WorkerConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
