//! pipeline.rs — Cache-checked validation orchestration.
//!
//! Pull raw record → check cache → validate (misses only, possibly in
//! parallel) → cache result → emit. Every input record produces exactly one
//! emitted result; failures are results too, never silent drops. Output
//! order is not guaranteed, only set equality with the input.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::{Arc, Mutex};

use crate::batch::{self, ExecStrategy};
use crate::cache::{fingerprint, ResultCache};
use crate::record::{RawRecord, ValidationResult};
use crate::validate::AuthenticityValidator;

/// One-time metrics registration; whichever exporter the embedder installs
/// picks these descriptions up.
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("fetch_requests_total", "URLs enqueued into the pool.");
        describe_counter!("fetch_success_total", "Fetches that succeeded.");
        describe_counter!(
            "fetch_failed_total",
            "Fetches that exhausted their retry budget."
        );
        describe_counter!(
            "fetch_domains_skipped_total",
            "Domains skipped after repeated failures."
        );
        describe_counter!("pipeline_records_total", "Records entering the pipeline.");
        describe_counter!("pipeline_cache_hits_total", "Validations served from cache.");
        describe_counter!("pipeline_validated_total", "Records actually validated.");
        describe_counter!(
            "pipeline_rejected_total",
            "Records scored below the validity threshold."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

/// Where final results go. The core does not care about persistence format,
/// only that `emit` is called once per result.
pub trait ResultSink: Send + Sync {
    fn emit(&self, result: &ValidationResult);
}

/// Collects results in memory; the sink used by tests and demos.
#[derive(Debug, Default)]
pub struct VecSink {
    inner: Mutex<Vec<ValidationResult>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> Vec<ValidationResult> {
        self.inner.lock().expect("sink mutex poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("sink mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for VecSink {
    fn emit(&self, result: &ValidationResult) {
        self.inner
            .lock()
            .expect("sink mutex poisoned")
            .push(result.clone());
    }
}

/// Summary of one `process` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub processed: usize,
    pub cache_hits: usize,
    pub validated: usize,
    pub passed: usize,
    pub failed: usize,
}

pub struct ValidationPipeline {
    validator: Arc<AuthenticityValidator>,
    cache: Arc<ResultCache>,
    sink: Arc<dyn ResultSink>,
    memory_ceiling_bytes: u64,
}

impl ValidationPipeline {
    pub fn new(
        validator: Arc<AuthenticityValidator>,
        cache: Arc<ResultCache>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            validator,
            cache,
            sink,
            memory_ceiling_bytes: batch::DEFAULT_MEMORY_CEILING_BYTES,
        }
    }

    /// Cap the estimated in-flight memory used for parallel chunk sizing;
    /// wire `PipelineConfig::memory_ceiling_bytes` through here.
    pub fn with_memory_ceiling(mut self, bytes: u64) -> Self {
        self.memory_ceiling_bytes = bytes;
        self
    }

    fn strategy_for(&self, total: usize) -> ExecStrategy {
        batch::select_strategy_with(total, self.memory_ceiling_bytes)
    }

    /// Process a batch with the default strategy policy.
    pub fn process(&self, records: Vec<RawRecord>) -> PipelineReport {
        let strategy = self.strategy_for(records.len());
        self.process_with(records, strategy)
    }

    /// Process a batch under an explicit execution strategy.
    pub fn process_with(&self, records: Vec<RawRecord>, strategy: ExecStrategy) -> PipelineReport {
        ensure_metrics_described();
        let total = records.len();
        counter!("pipeline_records_total").increment(total as u64);

        // Cache check first; only misses go to the validator.
        let mut cache_hits = 0usize;
        let mut passed = 0usize;
        let mut failed = 0usize;
        let mut misses: Vec<(String, RawRecord)> = Vec::new();

        for record in records {
            let fp = fingerprint(&record.fields);
            match self.cache.get(&fp) {
                Some(result) => {
                    cache_hits += 1;
                    if result.is_valid {
                        passed += 1;
                    } else {
                        failed += 1;
                    }
                    self.sink.emit(&result);
                }
                None => misses.push((fp, record)),
            }
        }
        counter!("pipeline_cache_hits_total").increment(cache_hits as u64);

        let validator = Arc::clone(&self.validator);
        let validated: Vec<(String, ValidationResult)> =
            batch::run(strategy, misses, move |(fp, record)| {
                (fp, validator.validate(&record))
            });

        let validated_count = validated.len();
        for (fp, result) in validated {
            if result.is_valid {
                passed += 1;
            } else {
                failed += 1;
                counter!("pipeline_rejected_total").increment(1);
            }
            self.cache.put(fp, result.clone());
            self.sink.emit(&result);
        }
        counter!("pipeline_validated_total").increment(validated_count as u64);
        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp().max(0) as f64);

        let report = PipelineReport {
            processed: total,
            cache_hits,
            validated: validated_count,
            passed,
            failed,
        };
        tracing::info!(
            target: "pipeline",
            processed = report.processed,
            cache_hits = report.cache_hits,
            validated = report.validated,
            passed = report.passed,
            failed = report.failed,
            strategy = ?strategy,
            "pipeline batch complete"
        );
        report
    }

    pub fn cache_stats(&self) -> crate::cache::CacheStats {
        self.cache.stats()
    }
}
