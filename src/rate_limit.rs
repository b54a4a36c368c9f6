//! rate_limit.rs — Per-domain token-bucket rate limiter.
//!
//! One bucket per domain under a single mutex; the read-modify-write of
//! `tokens` always happens with the lock held, and the waiting happens with
//! the lock released. Buckets start full, so the first request to a fresh
//! domain is never delayed. `acquire` is the only intentional suspension
//! point in the fetch path: it never fails, it only delays.
//!
//! Uses `tokio::time::Instant` so paused-clock tests drive refills.

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// Capacity of one bucket. Kept at a single token so requests to one domain
/// are evenly spaced at `60 / rate_per_minute` seconds rather than bursting.
const BUCKET_CAPACITY: f64 = 1.0;

#[derive(Debug)]
struct DomainBudget {
    tokens: f64,
    rate_per_minute: f64,
    last_refill: Instant,
}

impl DomainBudget {
    fn new(rate_per_minute: f64, now: Instant) -> Self {
        Self {
            tokens: BUCKET_CAPACITY, // start full
            rate_per_minute,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        let added = elapsed.as_secs_f64() * (self.rate_per_minute / 60.0);
        self.tokens = (self.tokens + added).min(BUCKET_CAPACITY);
        self.last_refill = now;
    }

    /// Time until the next whole token, assuming none arrive meanwhile.
    fn time_to_next_token(&self) -> Duration {
        let missing = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(missing * 60.0 / self.rate_per_minute)
    }
}

/// Shared per-domain token accounting. Cheap to share via `Arc`.
#[derive(Debug)]
pub struct RateLimiter {
    inner: Mutex<HashMap<String, DomainBudget>>,
    default_rate_per_minute: f64,
}

impl RateLimiter {
    pub fn new(default_rate_per_minute: f64) -> Result<Self> {
        if default_rate_per_minute <= 0.0 || !default_rate_per_minute.is_finite() {
            bail!("default rate must be positive, got {default_rate_per_minute}");
        }
        Ok(Self {
            inner: Mutex::new(HashMap::new()),
            default_rate_per_minute,
        })
    }

    /// Set or update a domain's budget. Existing tokens are kept so a rate
    /// change mid-run cannot mint extra capacity.
    pub fn configure(&self, domain: &str, rate_per_minute: f64) -> Result<()> {
        if rate_per_minute <= 0.0 || !rate_per_minute.is_finite() {
            bail!("rate for `{domain}` must be positive, got {rate_per_minute}");
        }
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");
        inner
            .entry(domain.to_string())
            .and_modify(|b| {
                b.refill(now);
                b.rate_per_minute = rate_per_minute;
            })
            .or_insert_with(|| DomainBudget::new(rate_per_minute, now));
        Ok(())
    }

    /// Consume one token for `domain`, sleeping until one is available.
    pub async fn acquire(&self, domain: &str) {
        loop {
            let wait = {
                let now = Instant::now();
                let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");
                let bucket = inner
                    .entry(domain.to_string())
                    .or_insert_with(|| DomainBudget::new(self.default_rate_per_minute, now));
                bucket.refill(now);
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                bucket.time_to_next_token()
            };
            // Sleep outside the lock; re-check on wake (another worker may
            // have taken the token first).
            tokio::time::sleep(wait).await;
        }
    }

    /// Non-blocking variant for tests and diagnostics.
    pub fn try_acquire(&self, domain: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");
        let bucket = inner
            .entry(domain.to_string())
            .or_insert_with(|| DomainBudget::new(self.default_rate_per_minute, now));
        bucket.refill(now);
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Current `(domain, tokens_remaining, rate_per_minute)` view.
    pub fn snapshot(&self) -> Vec<(String, f64, f64)> {
        let now = Instant::now();
        let mut inner = self.inner.lock().expect("rate limiter mutex poisoned");
        let mut out: Vec<_> = inner
            .iter_mut()
            .map(|(d, b)| {
                b.refill(now);
                (d.clone(), b.tokens, b.rate_per_minute)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
