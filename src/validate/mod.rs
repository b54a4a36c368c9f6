//! # Authenticity Validator
//! Pure, testable logic that maps one `RawRecord` → `ValidationResult`.
//! No I/O, suitable for unit tests and offline evaluation.
//!
//! Six independent sub-scorers (url, price, attributes, market, temporal,
//! image) feed one aggregator. All six always run: a hard error in one
//! does not short-circuit the others, and every warning/error collected is
//! reported. The weighted total gates `is_valid` against the configured
//! threshold; the caller decides how to act on it.

pub mod attributes;
pub mod images;
pub mod market;
pub mod price;
pub mod temporal;
pub mod url;
pub mod weights;

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::config::PipelineConfig;
use crate::market::MarketDataProvider;
use crate::record::{RawRecord, ValidationResult, ValidationScore};
use weights::ScoreWeights;

/// One sub-scorer's contribution: a 0–100 score plus whatever it has to say.
#[derive(Debug, Default)]
pub(crate) struct SubScore {
    pub score: f64,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl SubScore {
    pub(crate) fn new(score: f64) -> Self {
        Self {
            score,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Throughput counters exposed via `get_statistics()`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidatorStats {
    pub total_validated: u64,
    pub total_passed: u64,
    pub avg_validation_time_ms: f64,
}

#[derive(Debug, Default)]
struct StatsInner {
    validated: u64,
    passed: u64,
    total_ms: f64,
}

/// Stateless scorer (modulo throughput counters). Construction fails fast
/// on invalid weights or threshold, which is a config bug rather than a
/// data-quality issue.
pub struct AuthenticityValidator {
    weights: ScoreWeights,
    threshold: f64,
    market: Arc<dyn MarketDataProvider>,
    known_domains: Vec<String>,
    recent_window_days: i64,
    stale_after_days: i64,
    min_image_count: usize,
    max_sane_price: f64,
    deviation_warn_pct: f64,
    stats: Mutex<StatsInner>,
}

impl AuthenticityValidator {
    pub fn new(config: &PipelineConfig, market: Arc<dyn MarketDataProvider>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            weights: config.score_weights,
            threshold: config.min_score_threshold,
            market,
            known_domains: config.known_domains.clone(),
            recent_window_days: config.recent_window_days,
            stale_after_days: config.stale_after_days,
            min_image_count: config.min_image_count,
            max_sane_price: config.max_sane_price,
            deviation_warn_pct: config.deviation_warn_pct,
            stats: Mutex::new(StatsInner::default()),
        })
    }

    /// Sole public entry point: score one record against the current clock.
    pub fn validate(&self, record: &RawRecord) -> ValidationResult {
        self.validate_at(record, Utc::now())
    }

    /// Deterministic variant: the same record and `now` always produce the
    /// same `ValidationScore`.
    pub fn validate_at(&self, record: &RawRecord, now: DateTime<Utc>) -> ValidationResult {
        let started = Instant::now();

        let url = url::score(&record.source_url, &self.known_domains);
        let price = price::score(
            &record.fields,
            self.market.as_ref(),
            self.max_sane_price,
            self.deviation_warn_pct,
        );
        let attrs = attributes::score(&record.fields, now.year());
        let mkt = market::score(record.fields.location.as_deref(), self.market.as_ref());
        let temporal = temporal::score(
            record.fields.listed_date.as_deref(),
            now,
            self.recent_window_days,
            self.stale_after_days,
        );
        let images = images::score(&record.fields.images, self.min_image_count);

        let score = ValidationScore {
            url_score: url.score,
            price_score: price.score,
            attributes_score: attrs.score,
            market_score: mkt.score,
            temporal_score: temporal.score,
            image_score: images.score,
            total_score: weighted_total(
                &self.weights,
                [
                    url.score,
                    price.score,
                    attrs.score,
                    mkt.score,
                    temporal.score,
                    images.score,
                ],
            ),
        };

        // Fixed scorer order keeps error/warning lists deterministic.
        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        for sub in [url, price, attrs, mkt, temporal, images] {
            errors.extend(sub.errors);
            warnings.extend(sub.warnings);
        }

        let is_valid = score.total_score >= self.threshold;
        let validation_time_ms = started.elapsed().as_secs_f64() * 1000.0;

        {
            let mut stats = self.stats.lock().expect("validator stats mutex poisoned");
            stats.validated += 1;
            if is_valid {
                stats.passed += 1;
            }
            stats.total_ms += validation_time_ms;
        }

        ValidationResult {
            record_id: record.record_id(),
            is_valid,
            score,
            errors,
            warnings,
            validation_time_ms,
            timestamp: now,
        }
    }

    /// Maps `validate` over the slice; no cross-record state, so callers are
    /// free to parallelize instead (see the batch executor).
    pub fn validate_batch(&self, records: &[RawRecord]) -> Vec<ValidationResult> {
        records.iter().map(|r| self.validate(r)).collect()
    }

    pub fn min_score_threshold(&self) -> f64 {
        self.threshold
    }

    pub fn get_statistics(&self) -> ValidatorStats {
        let stats = self.stats.lock().expect("validator stats mutex poisoned");
        ValidatorStats {
            total_validated: stats.validated,
            total_passed: stats.passed,
            avg_validation_time_ms: if stats.validated > 0 {
                stats.total_ms / stats.validated as f64
            } else {
                0.0
            },
        }
    }
}

fn weighted_total(w: &ScoreWeights, s: [f64; 6]) -> f64 {
    let total = s[0] * w.url
        + s[1] * w.price
        + s[2] * w.attributes
        + s[3] * w.market
        + s[4] * w.temporal
        + s[5] * w.image;
    total.clamp(0.0, 100.0)
}
