//! cache.rs — LRU result cache with TTL, keyed by record fingerprint.
//!
//! Classic LRU: any `get` or `put` on a key moves it to the most-recently-used
//! position; inserting at capacity evicts the least-recently-used entry. A TTL
//! check happens on every lookup, so a stale entry is never returned even when
//! it sits at the MRU end. `get`/`put` each run atomically under one mutex,
//! so recency promotion and eviction cannot race.

use anyhow::{bail, Result};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::record::{ListingFields, ValidationResult};

/// Cache key: hex digest over the fields that dominate the scoring outcome
/// (id, price, size, location, rooms). Two records agreeing on these will
/// validate identically, so re-validation is redundant.
pub type Fingerprint = String;

pub fn fingerprint(fields: &ListingFields) -> Fingerprint {
    let canonical = format!(
        "id={}|price={}|size={}|location={}|rooms={}",
        fields.id.as_deref().unwrap_or(""),
        fields.price.map(|p| format!("{p:.2}")).unwrap_or_default(),
        fields
            .size_sqm
            .map(|s| format!("{s:.1}"))
            .unwrap_or_default(),
        fields
            .location
            .as_deref()
            .map(|l| l.trim().to_lowercase())
            .unwrap_or_default(),
        fields.rooms.map(|r| r.to_string()).unwrap_or_default(),
    );
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

#[derive(Debug)]
struct CacheEntry {
    result: ValidationResult,
    inserted_at: Instant,
}

#[derive(Debug, Default)]
struct CacheInner {
    map: HashMap<Fingerprint, CacheEntry>,
    /// Recency order, LRU at the front.
    order: VecDeque<Fingerprint>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
}

impl CacheInner {
    fn promote(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
        self.order.push_back(key.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub hit_rate: f64,
}

/// Thread-safe LRU + TTL cache for validation results.
#[derive(Debug)]
pub struct ResultCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Result<Self> {
        if capacity == 0 {
            bail!("cache capacity must be positive");
        }
        Ok(Self {
            inner: Mutex::new(CacheInner::default()),
            capacity,
            ttl,
        })
    }

    /// Lookup by precomputed fingerprint. Expired entries are removed and
    /// counted as misses.
    pub fn get(&self, key: &str) -> Option<ValidationResult> {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        match inner.map.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                let result = entry.result.clone();
                inner.promote(key);
                inner.hits += 1;
                Some(result)
            }
            Some(_) => {
                inner.map.remove(key);
                if let Some(pos) = inner.order.iter().position(|k| k == key) {
                    inner.order.remove(pos);
                }
                inner.expired += 1;
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Convenience lookup straight from a record's fields.
    pub fn get_record(&self, fields: &ListingFields) -> Option<ValidationResult> {
        self.get(&fingerprint(fields))
    }

    pub fn put(&self, key: Fingerprint, result: ValidationResult) {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let existing = inner.map.contains_key(&key);
        if !existing && inner.map.len() >= self.capacity {
            // Evict exactly the least-recently-used entry.
            if let Some(lru) = inner.order.pop_front() {
                inner.map.remove(&lru);
                inner.evictions += 1;
            }
        }
        inner.map.insert(
            key.clone(),
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
        inner.promote(&key);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let lookups = inner.hits + inner.misses;
        CacheStats {
            size: inner.map.len(),
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expired: inner.expired,
            hit_rate: if lookups > 0 {
                inner.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}
