//! Simulated fetch workers
//!
//! A worker loops `next()` -> pretend fetch -> synthetic link discovery ->
//! `complete()` until the frontier finishes.

use crate::config::WorkerConfig;
use crate::dedup::MemoryUniqFilter;
use crate::frontier::{CrawlOutcome, Frontier};
use crate::report::Reporter;
use crate::uri::CrawlUri;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Payload key holding a URI's distance from its seed
pub const DEPTH_KEY: &str = "depth";

/// Settings and shared counters for one worker pool
pub(crate) struct WorkerContext {
    pub frontier: Arc<Frontier>,
    pub filter: Arc<MemoryUniqFilter>,
    pub settings: WorkerConfig,
    pub completed: Arc<AtomicU64>,
    pub started: Instant,
}

/// Runs one worker until `next()` returns `None`
pub(crate) async fn run_worker(id: usize, ctx: Arc<WorkerContext>) {
    tracing::debug!("Worker {} started", id);
    let fetch_time = Duration::from_millis(ctx.settings.simulated_fetch_ms);

    while let Some(uri) = ctx.frontier.next().await {
        tracing::debug!("Worker {} fetching {}", id, uri);
        tokio::time::sleep(fetch_time).await;

        let discovered = discover_links(&uri, &ctx.settings)
            .into_iter()
            .filter(|link| ctx.filter.add(link.clone()))
            .count();
        if discovered > 0 {
            tracing::debug!("Worker {} discovered {} new URIs on {}", id, discovered, uri);
        }

        let outcome =
            CrawlOutcome::success(200, fetch_time).with_content(uri.as_str().as_bytes());
        if let Err(e) = ctx.frontier.complete(&uri, &outcome) {
            tracing::warn!("Worker {} failed to complete {}: {}", id, uri, e);
        }

        let completed = ctx.completed.fetch_add(1, Ordering::SeqCst) + 1;
        if completed % 10 == 0 {
            let elapsed = ctx.started.elapsed().as_secs_f64();
            let rate = if elapsed > 0.0 {
                completed as f64 / elapsed
            } else {
                0.0
            };
            tracing::info!(
                "Progress: {} URIs completed, {:.2} URIs/sec, {}",
                completed,
                rate,
                ctx.frontier.short_report_line()
            );
        }
    }

    tracing::debug!("Worker {} exiting", id);
}

/// Reads the depth recorded in a URI's payload, 0 when absent
pub fn depth_of(uri: &CrawlUri) -> u32 {
    uri.data
        .get(DEPTH_KEY)
        .and_then(|depth| depth.parse().ok())
        .unwrap_or(0)
}

/// Invents `links-per-page` child URIs one level deeper than `uri`
///
/// Children live on the same host under the parent's path, so each parent
/// yields distinct links. Nothing is produced at or beyond `max-depth`.
pub fn discover_links(uri: &CrawlUri, settings: &WorkerConfig) -> Vec<CrawlUri> {
    let depth = depth_of(uri);
    if depth >= settings.max_depth {
        return Vec::new();
    }

    let parent = uri.url.path().trim_end_matches('/');
    (0..settings.links_per_page)
        .map(|i| {
            let mut url = uri.url.clone();
            url.set_path(&format!("{}/{}", parent, i));
            url.set_query(None);
            url.set_fragment(None);
            CrawlUri::new(url).with_data(DEPTH_KEY, (depth + 1).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(links_per_page: usize, max_depth: u32) -> WorkerConfig {
        WorkerConfig {
            count: 1,
            simulated_fetch_ms: 0,
            links_per_page,
            max_depth,
        }
    }

    #[test]
    fn test_depth_defaults_to_zero() {
        let uri = CrawlUri::parse("https://example.com/").unwrap();
        assert_eq!(depth_of(&uri), 0);

        let uri = uri.with_data(DEPTH_KEY, "3");
        assert_eq!(depth_of(&uri), 3);
    }

    #[test]
    fn test_discover_links_under_parent() {
        let uri = CrawlUri::parse("https://example.com/a/?q=1").unwrap();
        let links = discover_links(&uri, &settings(2, 2));

        let urls: Vec<&str> = links.iter().map(|l| l.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a/0", "https://example.com/a/1"]);
        assert!(links.iter().all(|l| depth_of(l) == 1));
    }

    #[test]
    fn test_no_links_at_max_depth() {
        let uri = CrawlUri::parse("https://example.com/").unwrap().with_data(DEPTH_KEY, "2");
        assert!(discover_links(&uri, &settings(5, 2)).is_empty());
        assert!(discover_links(&uri, &settings(5, 0)).is_empty());
    }
}
