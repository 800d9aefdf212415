//! Integration tests for the frontier
//!
//! These drive the public API the way a crawler would: workers call
//! `next()`/`complete()` while the supervisor runs, with scripted dedup
//! gateways and a routing policy that changes under the crawl.

use async_trait::async_trait;
use pull_frontier::config::{parse_config, FrontierConfig};
use pull_frontier::crawler::run_simulation;
use pull_frontier::dedup::{CandidateSink, DedupGateway, DedupResult};
use pull_frontier::{
    CrawlOutcome, CrawlState, CrawlUri, DelayFactorPolicy, Frontier, HostRoutingPolicy,
    MemoryUniqFilter, QueueState,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn test_config() -> FrontierConfig {
    FrontierConfig {
        max_sleep_ms: 20,
        pull_contention_backoff_ms: 1,
        ..FrontierConfig::default()
    }
}

fn build(
    config: FrontierConfig,
    routing: Arc<HostRoutingPolicy>,
    dedup: Arc<dyn DedupGateway>,
) -> Arc<Frontier> {
    Arc::new(Frontier::new(
        config,
        routing,
        Arc::new(DelayFactorPolicy::none()),
        dedup,
    ))
}

fn simple_frontier(config: FrontierConfig) -> Arc<Frontier> {
    build(
        config,
        Arc::new(HostRoutingPolicy::new(1)),
        Arc::new(MemoryUniqFilter::new(100)),
    )
}

fn uri(s: &str) -> CrawlUri {
    CrawlUri::parse(s).unwrap()
}

fn ok() -> CrawlOutcome {
    CrawlOutcome::success(200, Duration::from_millis(5))
}

async fn next_within(frontier: &Frontier, ms: u64) -> Option<CrawlUri> {
    tokio::time::timeout(Duration::from_millis(ms), frontier.next())
        .await
        .ok()
        .flatten()
}

/// Gateway that reports nothing for a while, then hands over one URI
struct ScriptedGateway {
    empty_flushes: usize,
    calls: AtomicUsize,
    candidate: Mutex<Option<CrawlUri>>,
}

impl ScriptedGateway {
    fn new(empty_flushes: usize, candidate: CrawlUri) -> Self {
        Self {
            empty_flushes,
            calls: AtomicUsize::new(0),
            candidate: Mutex::new(Some(candidate)),
        }
    }
}

#[async_trait]
impl DedupGateway for ScriptedGateway {
    async fn request_flush(&self, sink: &dyn CandidateSink) -> DedupResult<usize> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.empty_flushes {
            return Ok(0);
        }
        match self.candidate.lock().unwrap().take() {
            Some(uri) => {
                sink.receive(uri);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn added_count(&self) -> u64 {
        1
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_at_most_one_in_flight_per_site() {
    let frontier = simple_frontier(test_config());
    let sites = ["a.com", "b.com", "c.com"];
    for site in sites {
        for page in 0..8 {
            frontier.schedule(uri(&format!("https://{}/{}", site, page)));
        }
    }
    let total = sites.len() * 8;

    frontier.request_state(CrawlState::Run);
    let supervisor = frontier.start();

    let in_flight: Arc<Mutex<HashMap<String, usize>>> = Arc::new(Mutex::new(HashMap::new()));
    let completed = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..6)
        .map(|_| {
            let frontier = frontier.clone();
            let in_flight = in_flight.clone();
            let completed = completed.clone();
            tokio::spawn(async move {
                while let Some(uri) = frontier.next().await {
                    {
                        let mut in_flight = in_flight.lock().unwrap();
                        let count = in_flight.entry(uri.site_key.clone()).or_insert(0);
                        *count += 1;
                        assert_eq!(*count, 1, "two dispatches in flight for {}", uri.site_key);
                    }

                    tokio::time::sleep(Duration::from_millis(2)).await;

                    *in_flight.lock().unwrap().get_mut(&uri.site_key).unwrap() -= 1;
                    frontier.complete(&uri, &ok()).unwrap();
                    completed.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    tokio::time::timeout(Duration::from_secs(5), async {
        while completed.load(Ordering::SeqCst) < total {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("all URIs should complete");

    frontier.request_state(CrawlState::Finish);
    for worker in workers {
        tokio::time::timeout(Duration::from_secs(2), worker)
            .await
            .expect("worker should stop")
            .expect("worker should not panic");
    }
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .expect("supervisor should stop")
        .unwrap();

    let snapshot = frontier.snapshot();
    assert_eq!(snapshot.succeeded, total as u64);
    assert_eq!(snapshot.queued, 0);
    assert_eq!(snapshot.exhausted_queues, 3);
}

#[tokio::test]
async fn test_exhausted_queue_is_never_returned() {
    let frontier = simple_frontier(test_config());
    frontier.request_state(CrawlState::Run);
    frontier.schedule(uri("https://a.com/"));

    let claimed = frontier.next().await.unwrap();
    frontier.complete(&claimed, &ok()).unwrap();

    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Empty));
    assert_eq!(frontier.queue_snapshot("a.com").unwrap().exhausted, 1);
    assert_eq!(frontier.ready_count(), 0);
    assert!(next_within(&frontier, 50).await.is_none());
}

#[tokio::test]
async fn test_session_budget_at_claim_parks_not_retires() {
    let config = FrontierConfig {
        balance_replenish_amount: 2,
        pull_trigger_level: 0,
        ..test_config()
    };
    let routing = Arc::new(HostRoutingPolicy::new(1));
    routing.set_precedence("a.com", 3);
    let frontier = build(config, routing, Arc::new(MemoryUniqFilter::new(100)));
    frontier.request_state(CrawlState::Run);
    for page in 0..3 {
        frontier.schedule(uri(&format!("https://a.com/{}", page)));
    }

    let first = frontier.next().await.unwrap();
    frontier.complete(&first, &ok()).unwrap();
    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Ready));

    frontier.set_budgets(1, None);
    assert!(next_within(&frontier, 50).await.is_none());

    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Inactive));
    assert_eq!(frontier.highest_precedence_waiting(), 3);
    assert_eq!(frontier.retired_count(), 0);
    assert_eq!(frontier.in_process_count(), 0);
    assert_eq!(frontier.queued_count(), 2);
}

#[tokio::test]
async fn test_total_budget_retires_until_unretired() {
    let config = FrontierConfig {
        pull_trigger_level: 0,
        ..test_config()
    };
    let frontier = simple_frontier(config);
    frontier.request_state(CrawlState::Run);
    frontier.schedule(uri("https://a.com/1"));
    frontier.schedule(uri("https://a.com/2"));

    let first = frontier.next().await.unwrap();
    frontier.complete(&first, &ok()).unwrap();

    frontier.set_budgets(3000, Some(1));
    assert!(next_within(&frontier, 50).await.is_none());
    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Retired));
    assert_eq!(frontier.retired_count(), 1);

    // New arrivals do not pull a retired queue back into scheduling
    frontier.schedule(uri("https://a.com/3"));
    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Retired));
    assert_eq!(frontier.ready_count(), 0);
    assert_eq!(frontier.inactive_count(), 0);
    assert_eq!(frontier.snoozed_count(), 0);
    assert!(next_within(&frontier, 50).await.is_none());

    // Unretiring under an unchanged budget keeps it retired
    assert_eq!(frontier.unretire_queues(), 0);
    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Retired));

    frontier.set_budgets(3000, None);
    assert_eq!(frontier.unretire_queues(), 1);
    let next = next_within(&frontier, 500).await.unwrap();
    assert_eq!(next.as_str(), "https://a.com/2");
}

#[tokio::test]
async fn test_reclassified_item_moves_and_next_item_is_returned() {
    let routing = Arc::new(HostRoutingPolicy::new(1));
    let frontier = build(
        test_config(),
        routing.clone(),
        Arc::new(MemoryUniqFilter::new(100)),
    );
    frontier.request_state(CrawlState::Run);
    frontier.schedule(uri("https://a.com/moved"));
    frontier.schedule(uri("https://b.com/stays"));

    routing.reassign("a.com", "10.0.0.1");

    let dispatched = frontier.next().await.unwrap();
    assert_eq!(dispatched.as_str(), "https://b.com/stays");

    let moved = frontier.queue_snapshot("10.0.0.1").unwrap();
    assert_eq!(moved.queued, 1);
    assert_eq!(frontier.queue_state("a.com"), Some(QueueState::Empty));
    assert_eq!(frontier.queued_count(), 2);
    assert_eq!(frontier.snapshot().reclassified, 1);

    let relocated = frontier.next().await.unwrap();
    assert_eq!(relocated.as_str(), "https://a.com/moved");
    assert_eq!(relocated.site_key, "10.0.0.1");
}

#[tokio::test]
async fn test_unchanged_key_resolution_is_idempotent() {
    let routing = Arc::new(HostRoutingPolicy::new(1));
    let frontier = build(
        test_config(),
        routing.clone(),
        Arc::new(MemoryUniqFilter::new(100)),
    );
    frontier.request_state(CrawlState::Run);
    frontier.schedule(uri("https://a.com/1"));
    routing.reassign("a.com", "shared");

    // The first resolution moves the item, the second finds it already home
    let dispatched = frontier.next().await.unwrap();
    assert_eq!(dispatched.site_key, "shared");
    assert_eq!(frontier.queued_count(), 1);
    assert_eq!(frontier.queue_snapshot("shared").unwrap().queued, 1);

    frontier.complete(&dispatched, &ok()).unwrap();
    assert_eq!(frontier.queued_count(), 0);

    let snapshot = frontier.snapshot();
    assert_eq!(snapshot.dispatched, 1);
    assert_eq!(snapshot.reclassified, 1);
    assert_eq!(snapshot.succeeded, 1);
}

#[tokio::test]
async fn test_lower_tier_dispatched_first() {
    let routing = Arc::new(HostRoutingPolicy::new(1));
    routing.set_precedence("b.com", 2);
    let config = FrontierConfig {
        hold_queues: true,
        ready_backlog_target: 0,
        ..test_config()
    };
    let frontier = build(config, routing, Arc::new(MemoryUniqFilter::new(100)));
    frontier.request_state(CrawlState::Run);

    frontier.schedule(uri("https://b.com/"));
    frontier.schedule(uri("https://a.com/"));
    assert_eq!(frontier.inactive_count(), 2);

    let first = frontier.next().await.unwrap();
    assert_eq!(first.site_key, "a.com");
    frontier.complete(&first, &ok()).unwrap();

    let second = frontier.next().await.unwrap();
    assert_eq!(second.site_key, "b.com");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocked_next_woken_by_late_flush() {
    let gateway = Arc::new(ScriptedGateway::new(3, uri("https://site1/")));
    let frontier = build(
        test_config(),
        Arc::new(HostRoutingPolicy::new(1)),
        gateway.clone(),
    );
    frontier.request_state(CrawlState::Run);
    let supervisor = frontier.start();

    let found = tokio::time::timeout(Duration::from_secs(2), frontier.next())
        .await
        .expect("next should be woken once the gateway delivers")
        .unwrap();
    assert_eq!(found.as_str(), "https://site1/");
    assert_eq!(found.site_key, "site1");
    assert!(gateway.calls.load(Ordering::SeqCst) >= 4);

    frontier.complete(&found, &ok()).unwrap();
    frontier.request_state(CrawlState::Finish);
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .expect("supervisor should stop")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_finish_releases_blocked_workers_and_waits_for_in_flight() {
    let frontier = simple_frontier(test_config());
    frontier.request_state(CrawlState::Run);
    frontier.schedule(uri("https://a.com/"));
    let supervisor = frontier.start();

    let claimed = frontier.next().await.unwrap();

    let blocked: Vec<_> = (0..3)
        .map(|_| {
            let frontier = frontier.clone();
            tokio::spawn(async move { frontier.next().await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(30)).await;

    frontier.request_state(CrawlState::Finish);
    for worker in blocked {
        let result = tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("blocked worker should return")
            .unwrap();
        assert!(result.is_none());
    }

    // FINISH is not reached while a dispatch is in flight
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(!supervisor.is_finished());
    assert_ne!(frontier.reached_state(), Some(CrawlState::Finish));

    frontier.complete(&claimed, &ok()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .expect("supervisor should exit")
        .unwrap();
    assert_eq!(frontier.reached_state(), Some(CrawlState::Finish));

    // Resuming after FINISH is refused
    frontier.request_state(CrawlState::Run);
    assert_eq!(frontier.target_state(), CrawlState::Finish);
    assert!(frontier.next().await.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_simulation_with_politeness_delays() {
    let config = parse_config(
        r#"
[frontier]
max-sleep-ms = 10

[politeness]
delay-factor = 1.0
min-delay-ms = 5
max-delay-ms = 20

[workers]
count = 4
simulated-fetch-ms = 2
links-per-page = 3
max-depth = 1

[[site]]
domain = "a.com"
seeds = ["https://a.com/"]

[[site]]
domain = "b.com"
precedence = 2
seeds = ["https://b.com/"]
"#,
    )
    .unwrap();

    let snapshot = tokio::time::timeout(Duration::from_secs(10), run_simulation(config))
        .await
        .expect("simulation should finish")
        .unwrap();

    assert_eq!(snapshot.candidate_uris, 8);
    assert_eq!(snapshot.succeeded, 8);
    assert_eq!(snapshot.reached_state, Some(CrawlState::Finish));
    assert_eq!(snapshot.total_queues, 2);
}

/// Gateway that hands over one URI per slow flush and records overlap
struct SlowGateway {
    pending: Mutex<VecDeque<CrawlUri>>,
    flushing: AtomicUsize,
    max_flushing: AtomicUsize,
    added: u64,
}

impl SlowGateway {
    fn new(uris: Vec<CrawlUri>) -> Self {
        Self {
            added: uris.len() as u64,
            pending: Mutex::new(uris.into()),
            flushing: AtomicUsize::new(0),
            max_flushing: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DedupGateway for SlowGateway {
    async fn request_flush(&self, sink: &dyn CandidateSink) -> DedupResult<usize> {
        let current = self.flushing.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_flushing.fetch_max(current, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(10)).await;
        let next = self.pending.lock().unwrap().pop_front();

        self.flushing.fetch_sub(1, Ordering::SeqCst);
        match next {
            Some(uri) => {
                sink.receive(uri);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn added_count(&self) -> u64 {
        self.added
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_workers_pull_one_at_a_time() {
    let sites = ["a.com", "b.com", "c.com", "d.com"];
    let gateway = Arc::new(SlowGateway::new(
        sites.iter().map(|site| uri(&format!("https://{}/", site))).collect(),
    ));
    let frontier = build(
        test_config(),
        Arc::new(HostRoutingPolicy::new(1)),
        gateway.clone(),
    );
    frontier.request_state(CrawlState::Run);
    let supervisor = frontier.start();

    let workers: Vec<_> = (0..sites.len())
        .map(|_| {
            let frontier = frontier.clone();
            tokio::spawn(async move { next_within(&frontier, 2000).await })
        })
        .collect();

    let mut served = Vec::new();
    for worker in workers {
        served.push(worker.await.unwrap().expect("every worker should get a URI"));
    }

    let mut hosts: Vec<String> = served.iter().map(|u| u.site_key.clone()).collect();
    hosts.sort();
    assert_eq!(hosts, sites);
    assert_eq!(gateway.max_flushing.load(Ordering::SeqCst), 1);

    for uri in &served {
        frontier.complete(uri, &ok()).unwrap();
    }
    frontier.request_state(CrawlState::Finish);
    tokio::time::timeout(Duration::from_secs(2), supervisor)
        .await
        .expect("supervisor should exit")
        .unwrap();
}
