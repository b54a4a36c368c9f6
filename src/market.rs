//! # Market Data
//!
//! This module provides a configurable mapping from Athens-area locations
//! to average asking prices per square meter (EUR/m²).
//!
//! - Loads from JSON config (averages + aliases + known areas).
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Aliases map alternative spellings to canonical neighborhood names.
//! - Fallback order: aliases → exact match → substring match → none.
//! - Includes a built-in `default_seed()` with common neighborhoods.
//!
//! The validator only ever sees the `MarketDataProvider` trait, so the static
//! table can later be swapped for a live data source without touching scoring.

use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

/// What the price and market scorers need from the outside world.
pub trait MarketDataProvider: Send + Sync {
    /// Average asking price per m² for a location, if we track it.
    fn average_price_per_sqm(&self, location: &str) -> Option<f64>;

    /// Whether the location is a recognized market area at all. An area can
    /// be known without having comparable averages yet.
    fn knows(&self, location: &str) -> bool {
        self.average_price_per_sqm(location).is_some()
    }
}

/// Static neighborhood table, loaded from JSON or seeded with defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct StaticMarketTable {
    /// EUR/m² averages for canonical neighborhood names.
    #[serde(default)]
    pub averages: HashMap<String, f64>,
    /// Areas we recognize but have no averages for yet.
    #[serde(default)]
    pub known_without_average: Vec<String>,
    /// Aliases mapping non-canonical names → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

impl StaticMarketTable {
    /// Load from a JSON file. Falls back to `default_seed()` on error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|_| Self::default_seed()),
            Err(_) => Self::default_seed(),
        }
    }

    /// Built-in seed with central Athens, northern/southern suburbs and
    /// Piraeus. Rough 2025 asking-price averages, EUR/m².
    pub fn default_seed() -> Self {
        let mut averages = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("kolonaki", 4500.0),
            ("glyfada", 3800.0),
            ("voula", 4000.0),
            ("kifisia", 3500.0),
            ("marousi", 2700.0),
            ("chalandri", 2600.0),
            ("koukaki", 2600.0),
            ("nea smyrni", 2500.0),
            ("pagkrati", 2400.0),
            ("ampelokipi", 2100.0),
            ("psyrri", 2000.0),
            ("exarchia", 1900.0),
            ("zografou", 1900.0),
            ("kallithea", 1800.0),
            ("piraeus", 1800.0),
        ] {
            averages.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("kolonáki", "kolonaki"),
            ("glifada", "glyfada"),
            ("ano glyfada", "glyfada"),
            ("maroussi", "marousi"),
            ("amaroussio", "marousi"),
            ("halandri", "chalandri"),
            ("ambelokipi", "ampelokipi"),
            ("psirri", "psyrri"),
            ("exarcheia", "exarchia"),
            ("pireas", "piraeus"),
            ("peiraias", "piraeus"),
            ("neasmyrni", "nea smyrni"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        let known_without_average = ["petralona", "galatsi", "vyronas", "ilioupoli"]
            .into_iter()
            .map(str::to_string)
            .collect();

        Self {
            averages,
            known_without_average,
            aliases,
        }
    }

    fn canonical(&self, location: &str) -> String {
        let s = normalize(location);
        match self.aliases.get(&s) {
            Some(canon) => normalize(canon),
            None => s,
        }
    }
}

impl MarketDataProvider for StaticMarketTable {
    fn average_price_per_sqm(&self, location: &str) -> Option<f64> {
        let s = self.canonical(location);
        if s.is_empty() {
            return None;
        }

        if let Some(&v) = self.averages.get(&s) {
            return Some(v);
        }

        // Substring fallback, e.g. "Kolonaki, Athens" → "kolonaki".
        for (k, &v) in &self.averages {
            if s.contains(k) {
                return Some(v);
            }
        }

        None
    }

    fn knows(&self, location: &str) -> bool {
        let s = self.canonical(location);
        if s.is_empty() {
            return false;
        }
        if self.average_price_per_sqm(location).is_some() {
            return true;
        }
        self.known_without_average
            .iter()
            .any(|k| s == normalize(k) || s.contains(&normalize(k)))
    }
}

/// Normalize input: lowercase, replace punctuation/dashes with spaces,
/// collapse multiple spaces into one.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();

    for ch in ['—', '–', '-', '_', '/', '\\'] {
        out = out.replace(ch, " ");
    }
    out = out.replace(['\n', '\r', '\t', '.', ',', '\''], " ");

    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
