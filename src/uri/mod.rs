//! Candidate URI handling
//!
//! A `CrawlUri` is one unit of work: the absolute URL to fetch, the site key
//! of the queue that owns it, and an opaque payload carried through the
//! frontier untouched.

mod site_key;

pub use site_key::{extract_site_key, uniq_key};

use crate::{UriError, UriResult};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// A candidate URI owned by exactly one work queue at a time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlUri {
    /// The URL to fetch
    pub url: Url,

    /// Key of the queue holding this URI, assigned when it is scheduled
    pub site_key: String,

    /// Precedence suggested by whoever discovered the URI
    pub precedence_hint: Option<u32>,

    /// Budget units expended when the URI completes
    pub cost: u32,

    /// Number of times the URI has been handed back for retry
    pub retries: u32,

    /// Opaque payload; the frontier never interprets it
    pub data: BTreeMap<String, String>,
}

impl CrawlUri {
    /// Creates a new candidate with unit cost and no site key yet
    pub fn new(url: Url) -> Self {
        Self {
            url,
            site_key: String::new(),
            precedence_hint: None,
            cost: 1,
            retries: 0,
            data: BTreeMap::new(),
        }
    }

    /// Parses an absolute http(s) URL into a candidate
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlUri)` - A candidate for the URL
    /// * `Err(UriError)` - The string is not an absolute http(s) URL with a host
    pub fn parse(input: &str) -> UriResult<Self> {
        let url = Url::parse(input)?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(UriError::InvalidScheme(url.scheme().to_string()));
        }

        if url.host_str().is_none() {
            return Err(UriError::MissingHost(input.to_string()));
        }

        Ok(Self::new(url))
    }

    pub fn with_precedence(mut self, precedence: u32) -> Self {
        self.precedence_hint = Some(precedence);
        self
    }

    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Key under which this URI is deduplicated
    pub fn uniq_key(&self) -> String {
        uniq_key(&self.url)
    }
}

impl fmt::Display for CrawlUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}
