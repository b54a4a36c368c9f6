// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod batch;
pub mod cache;
pub mod config;
pub mod fetch;
pub mod market;
pub mod pipeline;
pub mod rate_limit;
pub mod record;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::cache::{fingerprint, CacheStats, ResultCache};
pub use crate::config::PipelineConfig;
pub use crate::fetch::pool::{FetchWorkerPool, PoolStats};
pub use crate::fetch::{FetchOutcome, Fetcher, RetryPolicy};
pub use crate::market::{MarketDataProvider, StaticMarketTable};
pub use crate::pipeline::{PipelineReport, ResultSink, ValidationPipeline, VecSink};
pub use crate::rate_limit::RateLimiter;
pub use crate::record::{FetchRequest, ListingFields, RawRecord, ValidationResult, ValidationScore};
pub use crate::validate::weights::ScoreWeights;
pub use crate::validate::{AuthenticityValidator, ValidatorStats};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Enable compact tracing logs in development only.
/// Activation requires BOTH:
///   - dev environment (debug build OR PIPELINE_ENV in {local, development, dev})
///   - PIPELINE_DEV_LOG=1
pub fn enable_dev_tracing() {
    let dev_flag = std::env::var("PIPELINE_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");

    let is_dev_env = cfg!(debug_assertions)
        || matches!(
            std::env::var("PIPELINE_ENV")
                .unwrap_or_default()
                .to_ascii_lowercase()
                .as_str(),
            "local" | "development" | "dev"
        );

    if !(dev_flag && is_dev_env) {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pipeline=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
