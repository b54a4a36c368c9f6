//! Bounded worker pool over a priority queue, gated by the rate limiter.
//!
//! Each worker loops: dequeue → `RateLimiter::acquire(domain)` → fetch with
//! bounded retry → emit the outcome. Lower priority numbers are served
//! first; ties break by insertion order (FIFO stability via a monotonic
//! sequence number). Within one domain, strict FIFO across workers is NOT
//! guaranteed, only the priority ordering is.
//!
//! A domain that keeps failing terminally gets skipped for the remainder of
//! the run: its queued requests drain as failures instead of burning the
//! retry budget forever. `stop()` is cooperative: nothing new is dequeued
//! after the signal, in-flight fetches complete and workers are joined.

use anyhow::{bail, Result};
use metrics::counter;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, BinaryHeap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;

use super::{fetch_with_retry, FetchOutcome, Fetcher, RetryPolicy};
use crate::config::PipelineConfig;
use crate::rate_limit::RateLimiter;
use crate::record::FetchRequest;

#[derive(Debug)]
struct QueuedRequest {
    request: FetchRequest,
    seq: u64,
}

impl QueuedRequest {
    fn key(&self) -> (i32, u64) {
        (self.request.priority, self.seq)
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl Eq for QueuedRequest {}
impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueuedRequest {
    // BinaryHeap is a max-heap; reverse so the smallest (priority, seq)
    // pops first.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other.key().cmp(&self.key())
    }
}

#[derive(Debug, Default)]
struct QueueState {
    heap: BinaryHeap<QueuedRequest>,
    next_seq: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomainCounters {
    pub requests: u64,
    pub successful: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct StatsInner {
    total_requests: u64,
    successful: u64,
    failed: u64,
    skipped: u64,
    per_domain: BTreeMap<String, DomainCounters>,
    consecutive_failures: HashMap<String, u32>,
    skipped_domains: BTreeSet<String>,
}

/// Point-in-time snapshot returned by `stats()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub total_requests: u64,
    pub successful: u64,
    pub failed: u64,
    /// Requests drained without fetching because their domain was skipped.
    pub skipped: u64,
    pub requests_per_hour: f64,
    pub per_domain: BTreeMap<String, DomainCounters>,
    pub skipped_domains: Vec<String>,
}

struct Shared {
    queue: Mutex<QueueState>,
    queue_notify: Notify,
    limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn Fetcher>,
    policy: RetryPolicy,
    stats: Mutex<StatsInner>,
    tx: mpsc::UnboundedSender<FetchOutcome>,
    skip_after: u32,
}

impl Shared {
    fn pop(&self) -> Option<FetchRequest> {
        let mut q = self.queue.lock().expect("fetch queue mutex poisoned");
        q.heap.pop().map(|q| q.request)
    }

    fn domain_skipped(&self, domain: &str) -> bool {
        let stats = self.stats.lock().expect("pool stats mutex poisoned");
        stats.skipped_domains.contains(domain)
    }

    fn record_outcome(&self, outcome: &FetchOutcome) {
        let domain = outcome.request().domain.clone();
        let mut stats = self.stats.lock().expect("pool stats mutex poisoned");
        if outcome.is_success() {
            stats.per_domain.entry(domain.clone()).or_default().successful += 1;
            stats.successful += 1;
            stats.consecutive_failures.remove(&domain);
            counter!("fetch_success_total").increment(1);
        } else {
            stats.per_domain.entry(domain.clone()).or_default().failed += 1;
            stats.failed += 1;
            let streak = {
                let s = stats.consecutive_failures.entry(domain.clone()).or_insert(0);
                *s += 1;
                *s
            };
            counter!("fetch_failed_total").increment(1);
            if streak >= self.skip_after && stats.skipped_domains.insert(domain.clone()) {
                counter!("fetch_domains_skipped_total").increment(1);
                tracing::warn!(
                    target: "fetch_pool",
                    domain = %domain,
                    failures = streak,
                    "domain skipped for the remainder of the run"
                );
            }
        }
    }

    fn record_skipped(&self, request: &FetchRequest) {
        let mut stats = self.stats.lock().expect("pool stats mutex poisoned");
        stats.skipped += 1;
        stats.failed += 1;
        stats
            .per_domain
            .entry(request.domain.clone())
            .or_default()
            .failed += 1;
    }
}

pub struct FetchWorkerPool {
    shared: Arc<Shared>,
    stop_tx: watch::Sender<bool>,
    stop_rx: watch::Receiver<bool>,
    workers: Vec<JoinHandle<()>>,
    default_workers: usize,
    started_at: Instant,
}

impl FetchWorkerPool {
    /// Build a pool. Outcomes arrive on the returned receiver, success and
    /// failure alike; nothing is silently dropped.
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<RateLimiter>,
        config: &PipelineConfig,
    ) -> Result<(Self, mpsc::UnboundedReceiver<FetchOutcome>)> {
        config.validate()?;
        let policy = RetryPolicy::new(config.retry_attempts, config.retry_base_delay_ms)?;
        for (domain, rate) in &config.rate_limits {
            limiter.configure(domain, *rate)?;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            queue: Mutex::new(QueueState::default()),
            queue_notify: Notify::new(),
            limiter,
            fetcher,
            policy,
            stats: Mutex::new(StatsInner::default()),
            tx,
            skip_after: config.skip_domain_after_failures,
        });

        Ok((
            Self {
                shared,
                stop_tx,
                stop_rx,
                workers: Vec::new(),
                default_workers: config.max_workers,
                started_at: Instant::now(),
            },
            rx,
        ))
    }

    /// Enqueue a URL. Lower `priority` numbers are served first.
    pub fn add(&self, url: impl Into<String>, priority: i32) {
        let request = FetchRequest::new(url, priority);
        {
            let mut stats = self.shared.stats.lock().expect("pool stats mutex poisoned");
            stats.total_requests += 1;
            stats
                .per_domain
                .entry(request.domain.clone())
                .or_default()
                .requests += 1;
        }
        counter!("fetch_requests_total").increment(1);
        {
            let mut q = self
                .shared
                .queue
                .lock()
                .expect("fetch queue mutex poisoned");
            let seq = q.next_seq;
            q.next_seq += 1;
            q.heap.push(QueuedRequest { request, seq });
        }
        self.shared.queue_notify.notify_one();
    }

    /// Spawn the configured `max_workers` number of workers.
    pub fn start_default(&mut self) -> Result<()> {
        self.start(self.default_workers)
    }

    /// Spawn `num_workers` concurrent workers.
    pub fn start(&mut self, num_workers: usize) -> Result<()> {
        if !self.workers.is_empty() {
            bail!("worker pool already started");
        }
        if num_workers == 0 {
            bail!("num_workers must be positive");
        }
        crate::pipeline::ensure_metrics_described();
        for _ in 0..num_workers {
            let shared = Arc::clone(&self.shared);
            let stop_rx = self.stop_rx.clone();
            self.workers.push(tokio::spawn(run_worker(shared, stop_rx)));
        }
        self.started_at = Instant::now();
        Ok(())
    }

    /// Graceful shutdown: no new work is dequeued, in-flight fetches
    /// complete, all workers are joined.
    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
    }

    pub fn queue_len(&self) -> usize {
        self.shared
            .queue
            .lock()
            .expect("fetch queue mutex poisoned")
            .heap
            .len()
    }

    pub fn stats(&self) -> PoolStats {
        let stats = self.shared.stats.lock().expect("pool stats mutex poisoned");
        let hours = self.started_at.elapsed().as_secs_f64() / 3600.0;
        let completed = stats.successful + stats.failed;
        PoolStats {
            total_requests: stats.total_requests,
            successful: stats.successful,
            failed: stats.failed,
            skipped: stats.skipped,
            requests_per_hour: if hours > 0.0 {
                completed as f64 / hours
            } else {
                0.0
            },
            per_domain: stats.per_domain.clone(),
            skipped_domains: stats.skipped_domains.iter().cloned().collect(),
        }
    }
}

async fn run_worker(shared: Arc<Shared>, mut stop_rx: watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow() {
            break;
        }

        let Some(request) = shared.pop() else {
            // Park until new work or the stop signal; re-check both.
            tokio::select! {
                _ = shared.queue_notify.notified() => {}
                _ = stop_rx.changed() => {}
            }
            continue;
        };

        if shared.domain_skipped(&request.domain) {
            shared.record_skipped(&request);
            let _ = shared.tx.send(FetchOutcome::Failed {
                error: format!("domain {} skipped after repeated failures", request.domain),
                attempts: 0,
                request,
            });
            continue;
        }

        shared.limiter.acquire(&request.domain).await;
        let outcome = fetch_with_retry(shared.fetcher.as_ref(), &request, &shared.policy).await;
        shared.record_outcome(&outcome);
        // Receiver gone means the caller stopped caring; keep draining.
        let _ = shared.tx.send(outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchError, FetchResponse};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct OkFetcher;

    #[async_trait::async_trait]
    impl Fetcher for OkFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
            Ok(FetchResponse {
                status: 200,
                body: "ok".into(),
            })
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig {
            default_rate_per_minute: 60_000.0, // effectively unthrottled
            retry_attempts: 1,
            retry_base_delay_ms: 1,
            ..Default::default()
        }
    }

    fn pool_with(
        fetcher: Arc<dyn Fetcher>,
        config: &PipelineConfig,
    ) -> (FetchWorkerPool, mpsc::UnboundedReceiver<FetchOutcome>) {
        let limiter = Arc::new(RateLimiter::new(config.default_rate_per_minute).unwrap());
        FetchWorkerPool::new(fetcher, limiter, config).unwrap()
    }

    #[test]
    fn queue_orders_by_priority_then_fifo() {
        let cfg = test_config();
        let (pool, _rx) = pool_with(Arc::new(OkFetcher), &cfg);
        pool.add("https://xe.gr/c", 5);
        pool.add("https://xe.gr/a", 1);
        pool.add("https://xe.gr/b", 5);

        let first = pool.shared.pop().unwrap();
        let second = pool.shared.pop().unwrap();
        let third = pool.shared.pop().unwrap();
        assert_eq!(first.url, "https://xe.gr/a"); // lowest priority number
        assert_eq!(second.url, "https://xe.gr/c"); // FIFO among equal priorities
        assert_eq!(third.url, "https://xe.gr/b");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fetches_everything_and_stops_cleanly() {
        let cfg = test_config();
        let (mut pool, mut rx) = pool_with(Arc::new(OkFetcher), &cfg);
        for i in 0..10 {
            pool.add(format!("https://xe.gr/p/{i}"), 5);
        }
        pool.start(3).unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.push(rx.recv().await.unwrap());
        }
        pool.stop().await;

        assert!(outcomes.iter().all(|o| o.is_success()));
        let stats = pool.stats();
        assert_eq!(stats.total_requests, 10);
        assert_eq!(stats.successful, 10);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.per_domain["xe.gr"].successful, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_domain_gets_skipped() {
        struct AlwaysDown;
        #[async_trait::async_trait]
        impl Fetcher for AlwaysDown {
            async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
                Err(FetchError::Network("connection refused".into()))
            }
        }

        let cfg = PipelineConfig {
            skip_domain_after_failures: 2,
            ..test_config()
        };
        let (mut pool, mut rx) = pool_with(Arc::new(AlwaysDown), &cfg);
        for i in 0..6 {
            pool.add(format!("https://down.gr/p/{i}"), 5);
        }
        // One worker so the failure streak accumulates deterministically.
        pool.start(1).unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..6 {
            outcomes.push(rx.recv().await.unwrap());
        }
        pool.stop().await;

        assert!(outcomes.iter().all(|o| !o.is_success()));
        let stats = pool.stats();
        assert_eq!(stats.failed, 6);
        assert!(stats.skipped >= 4, "later requests drain without fetching");
        assert_eq!(stats.skipped_domains, vec!["down.gr".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stop_without_work_returns() {
        let cfg = test_config();
        let (mut pool, _rx) = pool_with(Arc::new(OkFetcher), &cfg);
        pool.start(2).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        pool.stop().await; // must not hang on idle workers
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn start_default_uses_the_configured_worker_count() {
        let cfg = PipelineConfig {
            max_workers: 2,
            ..test_config()
        };
        let (mut pool, mut rx) = pool_with(Arc::new(OkFetcher), &cfg);
        for i in 0..5 {
            pool.add(format!("https://xe.gr/p/{i}"), 5);
        }
        pool.start_default().unwrap();
        assert!(pool.start(1).is_err(), "already running");

        for _ in 0..5 {
            assert!(rx.recv().await.unwrap().is_success());
        }
        pool.stop().await;
        assert_eq!(pool.stats().successful, 5);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let cfg = test_config();
        let (mut pool, _rx) = pool_with(Arc::new(OkFetcher), &cfg);
        pool.start(1).unwrap();
        assert!(pool.start(1).is_err());
        pool.stop().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn pool_counts_attempts_not_just_requests() {
        struct CountingFail {
            calls: AtomicU32,
        }
        #[async_trait::async_trait]
        impl Fetcher for CountingFail {
            async fn fetch(&self, _url: &str) -> Result<FetchResponse, FetchError> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::Timeout)
            }
        }

        let fetcher = Arc::new(CountingFail {
            calls: AtomicU32::new(0),
        });
        let cfg = PipelineConfig {
            retry_attempts: 2,
            skip_domain_after_failures: 100,
            ..test_config()
        };
        let (mut pool, mut rx) = pool_with(fetcher.clone(), &cfg);
        pool.add("https://xe.gr/p/1", 5);
        pool.start(1).unwrap();
        let out = rx.recv().await.unwrap();
        pool.stop().await;

        assert!(!out.is_success());
        // retry_attempts + 1 total attempts, never more.
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
    }
}
