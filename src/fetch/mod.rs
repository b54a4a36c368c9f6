//! # Fetch layer
//! The `Fetcher` trait is the boundary to the outside world: the core only
//! needs "fetch(url) → raw content or failure". Failures are values, not
//! exceptions: retry logic returns a `FetchOutcome`, and raised errors are
//! reserved for configuration/programmer faults.

pub mod http;
pub mod pool;

use anyhow::Result;
use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::record::FetchRequest;

/// Raw response from the external fetch collaborator.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("http status {0}")]
    Status(u16),
    #[error("timeout")]
    Timeout,
    #[error("network: {0}")]
    Network(String),
}

#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, FetchError>;
    fn name(&self) -> &'static str {
        "fetcher"
    }
}

/// Terminal result of one fetch request after retries.
#[derive(Debug, Clone, Serialize)]
pub enum FetchOutcome {
    Success {
        request: FetchRequest,
        body: String,
        attempts: u32,
    },
    Failed {
        request: FetchRequest,
        error: String,
        attempts: u32,
    },
}

impl FetchOutcome {
    pub fn request(&self) -> &FetchRequest {
        match self {
            FetchOutcome::Success { request, .. } | FetchOutcome::Failed { request, .. } => request,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success { .. })
    }
}

/// Bounded retry policy: `attempts` retries on top of the first try,
/// exponential backoff with jitter between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, base_delay_ms: u64) -> Result<Self> {
        anyhow::ensure!(base_delay_ms > 0, "retry base delay must be positive");
        Ok(Self {
            attempts,
            base_delay: Duration::from_millis(base_delay_ms),
        })
    }

    /// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`
    /// plus up to 50% jitter so workers hitting one domain don't thunder.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay.saturating_mul(1 << (attempt - 1).min(16));
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64 / 2);
        base + Duration::from_millis(jitter_ms)
    }
}

/// Fetch with bounded retry. A URL whose fetch always fails is attempted at
/// most `attempts + 1` times total, then reported as `Failed`.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    request: &FetchRequest,
    policy: &RetryPolicy,
) -> FetchOutcome {
    let mut request = request.clone();
    let mut last_error = String::new();

    for attempt in 0..=policy.attempts {
        request.retry_count = attempt;
        match fetcher.fetch(&request.url).await {
            Ok(resp) if resp.is_success() => {
                return FetchOutcome::Success {
                    request,
                    body: resp.body,
                    attempts: attempt + 1,
                };
            }
            Ok(resp) => {
                last_error = FetchError::Status(resp.status).to_string();
            }
            Err(e) => {
                last_error = e.to_string();
            }
        }

        if attempt < policy.attempts {
            let delay = policy.delay_for(attempt + 1);
            tracing::debug!(
                target: "fetch",
                url = %request.url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                error = %last_error,
                "fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    FetchOutcome::Failed {
        attempts: policy.attempts + 1,
        request,
        error: last_error,
    }
}
