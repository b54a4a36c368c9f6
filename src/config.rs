//! config.rs — Pipeline configuration surface.
//!
//! One explicitly constructed config object, dependency-injected into the
//! pipeline pieces; no ambient globals. Loads from TOML or JSON (both are
//! accepted, extension is only a hint), with an env-var path override:
//!
//! 1) `$LISTING_PIPELINE_CONFIG`
//! 2) `config/pipeline.toml`
//! 3) `config/pipeline.json`
//! 4) built-in defaults
//!
//! `validate()` fails fast on programmer/config errors (bad weight sum,
//! zero cache size, non-positive rates) per the fail-fast policy.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::validate::weights::ScoreWeights;

pub const ENV_CONFIG_PATH: &str = "LISTING_PIPELINE_CONFIG";

fn default_rate_per_minute() -> f64 {
    30.0
}
fn default_max_workers() -> usize {
    4
}
fn default_min_score_threshold() -> f64 {
    70.0
}
fn default_cache_size() -> usize {
    1000
}
fn default_cache_ttl_seconds() -> u64 {
    3600
}
fn default_retry_attempts() -> u32 {
    2
}
fn default_retry_base_delay_ms() -> u64 {
    500
}
fn default_recent_window_days() -> i64 {
    30
}
fn default_stale_after_days() -> i64 {
    180
}
fn default_min_image_count() -> usize {
    3
}
fn default_max_sane_price() -> f64 {
    10_000_000.0
}
fn default_deviation_warn_pct() -> f64 {
    30.0
}
fn default_skip_domain_after_failures() -> u32 {
    5
}
fn default_memory_ceiling_bytes() -> u64 {
    500 * 1024 * 1024
}

/// Greek property portals we recognize as marketplace domains.
fn default_known_domains() -> Vec<String> {
    [
        "spitogatos.gr",
        "xe.gr",
        "spiti24.gr",
        "tospitimou.gr",
        "plot.gr",
        "golden-home.gr",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Per-domain request budgets; domains not listed fall back to
    /// `default_rate_per_minute`.
    #[serde(default)]
    pub rate_limits: HashMap<String, f64>,
    #[serde(default = "default_rate_per_minute")]
    pub default_rate_per_minute: f64,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_min_score_threshold")]
    pub min_score_threshold: f64,
    #[serde(default)]
    pub score_weights: ScoreWeights,
    #[serde(default = "default_cache_size")]
    pub cache_size: usize,
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    /// Listings newer than this score 100 on the temporal dimension.
    #[serde(default = "default_recent_window_days")]
    pub recent_window_days: i64,
    /// Listings older than this are "stale" (score floor 20, warning).
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
    #[serde(default = "default_min_image_count")]
    pub min_image_count: usize,
    /// Broad sanity cap; prices above it score 50 with a warning.
    #[serde(default = "default_max_sane_price")]
    pub max_sane_price: f64,
    /// Percent deviation from the market average that triggers a warning.
    #[serde(default = "default_deviation_warn_pct")]
    pub deviation_warn_pct: f64,
    #[serde(default = "default_known_domains")]
    pub known_domains: Vec<String>,
    /// Consecutive terminal fetch failures before a domain is skipped for
    /// the remainder of the run.
    #[serde(default = "default_skip_domain_after_failures")]
    pub skip_domain_after_failures: u32,
    /// Memory budget for batch sizing (input + output + cache overhead).
    #[serde(default = "default_memory_ceiling_bytes")]
    pub memory_ceiling_bytes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        // Round-trip through serde so the field defaults stay the single
        // source of truth.
        serde_json::from_str("{}").expect("empty config must deserialize")
    }
}

impl PipelineConfig {
    /// Load from an explicit path. TOML and JSON are both accepted.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading pipeline config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, ext.as_str())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks; defaults when no file exists.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/pipeline.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/pipeline.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Fail-fast invariant checks; call once at startup.
    pub fn validate(&self) -> Result<()> {
        self.score_weights.validate()?;
        if !(0.0..=100.0).contains(&self.min_score_threshold) {
            bail!(
                "min_score_threshold must be in [0, 100], got {}",
                self.min_score_threshold
            );
        }
        if self.cache_size == 0 {
            bail!("cache_size must be positive");
        }
        if self.max_workers == 0 {
            bail!("max_workers must be positive");
        }
        if self.default_rate_per_minute <= 0.0 {
            bail!("default_rate_per_minute must be positive");
        }
        for (domain, rate) in &self.rate_limits {
            if *rate <= 0.0 {
                bail!("rate limit for `{domain}` must be positive, got {rate}");
            }
        }
        if self.retry_base_delay_ms == 0 {
            bail!("retry_base_delay_ms must be positive");
        }
        if self.stale_after_days <= self.recent_window_days {
            bail!("stale_after_days must exceed recent_window_days");
        }
        Ok(())
    }

    /// Requests-per-minute budget for one domain.
    pub fn rate_for(&self, domain: &str) -> f64 {
        self.rate_limits
            .get(domain)
            .copied()
            .unwrap_or(self.default_rate_per_minute)
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<PipelineConfig> {
    // Try TOML first if hinted or the content looks like it.
    let try_toml = hint_ext == "toml" || !s.trim_start().starts_with('{');
    if try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = serde_json::from_str(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = toml::from_str(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported pipeline config format"))
}
