use crate::dedup::{CandidateSink, DedupError, DedupGateway, DedupResult};
use crate::frontier::CrawlOutcome;
use crate::uri::CrawlUri;
use crate::util::lock;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// In-process uniqueness filter with a pending buffer
///
/// New URIs are remembered by their uniqueness key and buffered until the
/// frontier pulls them. Nothing is handed over eagerly.
pub struct MemoryUniqFilter {
    inner: Mutex<FilterInner>,
    added: AtomicU64,
    finished: AtomicU64,
    batch_size: usize,
}

struct FilterInner {
    seen: HashSet<String>,
    pending: VecDeque<CrawlUri>,
    closed: bool,
}

impl MemoryUniqFilter {
    /// Creates a filter that hands over at most `batch_size` URIs per flush
    pub fn new(batch_size: usize) -> Self {
        Self {
            inner: Mutex::new(FilterInner {
                seen: HashSet::new(),
                pending: VecDeque::new(),
                closed: false,
            }),
            added: AtomicU64::new(0),
            finished: AtomicU64::new(0),
            batch_size: batch_size.max(1),
        }
    }

    /// Offers a URI; returns true if it was new and is now pending
    pub fn add(&self, uri: CrawlUri) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed || !inner.seen.insert(uri.uniq_key()) {
            return false;
        }
        inner.pending.push_back(uri);
        self.added.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Queues a URI even if it was seen before (e.g. a forced recrawl)
    pub fn add_force(&self, uri: CrawlUri) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }
        inner.seen.insert(uri.uniq_key());
        inner.pending.push_back(uri);
        self.added.fetch_add(1, Ordering::Relaxed);
        true
    }

    /// Marks a URI as seen without queueing it
    pub fn note(&self, uri: &CrawlUri) {
        lock(&self.inner).seen.insert(uri.uniq_key());
    }

    /// Forgets a URI so a later `add` accepts it again
    pub fn forget(&self, uri: &CrawlUri) {
        lock(&self.inner).seen.remove(&uri.uniq_key());
    }

    /// Number of approved URIs not yet flushed
    pub fn pending(&self) -> usize {
        lock(&self.inner).pending.len()
    }

    /// Number of distinct URIs ever seen
    pub fn count(&self) -> usize {
        lock(&self.inner).seen.len()
    }

    /// Number of URIs reported finished by the frontier
    pub fn finished_count(&self) -> u64 {
        self.finished.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DedupGateway for MemoryUniqFilter {
    async fn request_flush(&self, sink: &dyn CandidateSink) -> DedupResult<usize> {
        let batch: Vec<CrawlUri> = {
            let mut inner = lock(&self.inner);
            if inner.closed {
                return Err(DedupError::Closed);
            }
            let take = inner.pending.len().min(self.batch_size);
            inner.pending.drain(..take).collect()
        };

        let flushed = batch.len();
        for uri in batch {
            sink.receive(uri);
        }
        tracing::debug!("Uniq filter flushed {} URIs", flushed);
        Ok(flushed)
    }

    fn added_count(&self) -> u64 {
        self.added.load(Ordering::Relaxed)
    }

    fn note_finished(&self, _uri: &CrawlUri, _outcome: &CrawlOutcome) {
        self.finished.fetch_add(1, Ordering::Relaxed);
    }

    fn close(&self) -> DedupResult<()> {
        let mut inner = lock(&self.inner);
        if !inner.pending.is_empty() {
            tracing::warn!("Closing uniq filter with {} URIs still pending", inner.pending.len());
        }
        inner.closed = true;
        Ok(())
    }
}
