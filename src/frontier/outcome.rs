use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// How a dispatched URI ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Fetched and processed (HTTP status code)
    Success(u16),

    /// Permanently failed (HTTP status code, or 0 for a network failure)
    Failure(u16),

    /// Transient failure; the URI may be attempted again
    Retry(String),

    /// Deliberately not fetched (e.g. excluded by a late-binding rule)
    Disregarded,
}

/// Completion record handed back to the frontier by a worker
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlOutcome {
    pub status: FetchStatus,

    /// Wall time the fetch took; drives the politeness delay
    pub fetch_duration: Duration,

    /// Digest of the fetched content, e.g. `sha256:<hex>`
    pub content_digest: Option<String>,

    /// ETag without surrounding quotes
    pub etag: Option<String>,

    pub last_modified: Option<DateTime<Utc>>,
}

impl CrawlOutcome {
    pub fn new(status: FetchStatus, fetch_duration: Duration) -> Self {
        Self {
            status,
            fetch_duration,
            content_digest: None,
            etag: None,
            last_modified: None,
        }
    }

    pub fn success(code: u16, fetch_duration: Duration) -> Self {
        Self::new(FetchStatus::Success(code), fetch_duration)
    }

    pub fn failure(code: u16, fetch_duration: Duration) -> Self {
        Self::new(FetchStatus::Failure(code), fetch_duration)
    }

    pub fn retry(reason: impl Into<String>, fetch_duration: Duration) -> Self {
        Self::new(FetchStatus::Retry(reason.into()), fetch_duration)
    }

    pub fn disregarded() -> Self {
        Self::new(FetchStatus::Disregarded, Duration::ZERO)
    }

    /// Records an ETag header value, stripping one pair of surrounding quotes
    pub fn with_etag(mut self, raw: &str) -> Self {
        let trimmed = raw.trim();
        let unquoted = trimmed
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
            .unwrap_or(trimmed);
        self.etag = Some(unquoted.to_string());
        self
    }

    /// Records the SHA-256 digest of the fetched body
    pub fn with_content(mut self, body: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(body);
        self.content_digest = Some(format!("sha256:{}", hex::encode(hasher.finalize())));
        self
    }

    pub fn with_last_modified(mut self, last_modified: DateTime<Utc>) -> Self {
        self.last_modified = Some(last_modified);
        self
    }

    /// Parses an HTTP `Last-Modified` header; unparseable values are ignored
    pub fn with_last_modified_header(self, raw: &str) -> Self {
        match DateTime::parse_from_rfc2822(raw.trim()) {
            Ok(parsed) => self.with_last_modified(parsed.with_timezone(&Utc)),
            Err(e) => {
                tracing::debug!("Ignoring unparseable Last-Modified '{}': {}", raw, e);
                self
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_etag_unquoted() {
        let outcome = CrawlOutcome::success(200, Duration::ZERO).with_etag("\"abc123\"");
        assert_eq!(outcome.etag.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_etag_without_quotes_kept() {
        let outcome = CrawlOutcome::success(200, Duration::ZERO).with_etag("W/\"weak\"");
        assert_eq!(outcome.etag.as_deref(), Some("W/\"weak\""));

        let outcome = CrawlOutcome::success(200, Duration::ZERO).with_etag("plain");
        assert_eq!(outcome.etag.as_deref(), Some("plain"));
    }

    #[test]
    fn test_content_digest() {
        let outcome = CrawlOutcome::success(200, Duration::ZERO).with_content(b"hello");
        assert_eq!(
            outcome.content_digest.as_deref(),
            Some("sha256:2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
        );
    }

    #[test]
    fn test_last_modified_header() {
        let outcome = CrawlOutcome::success(200, Duration::ZERO)
            .with_last_modified_header("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(
            outcome.last_modified,
            Some(Utc.with_ymd_and_hms(2015, 10, 21, 7, 28, 0).unwrap())
        );

        let outcome = CrawlOutcome::success(200, Duration::ZERO).with_last_modified_header("never");
        assert!(outcome.last_modified.is_none());
    }

    #[test]
    fn test_disregarded_outcome() {
        assert_eq!(CrawlOutcome::disregarded().status, FetchStatus::Disregarded);
    }
}
