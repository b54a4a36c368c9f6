//! Market dimension: does the listing sit in a market we can reason about?
//!
//! 100 — known location with comparable averages.
//! 60  — recognized area, but no averages tracked yet (warning).
//! 50  — location missing, or a name the provider has never seen (warning).
//!
//! An unknown name is not evidence of fraud by itself, but it leaves us as
//! blind as a missing location, so it lands in the same tier with its own
//! warning.

use super::SubScore;
use crate::market::MarketDataProvider;

pub(crate) fn score(location: Option<&str>, market: &dyn MarketDataProvider) -> SubScore {
    let mut out = SubScore::new(0.0);

    let Some(location) = location.map(str::trim).filter(|l| !l.is_empty()) else {
        out.score = 50.0;
        out.warnings.push("missing location".to_string());
        return out;
    };

    if market.average_price_per_sqm(location).is_some() {
        out.score = 100.0;
    } else if market.knows(location) {
        out.score = 60.0;
        out.warnings
            .push(format!("no market averages for {location}"));
    } else {
        out.score = 50.0;
        out.warnings
            .push(format!("unrecognized location: {location}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::StaticMarketTable;

    fn table() -> StaticMarketTable {
        StaticMarketTable::default_seed()
    }

    #[test]
    fn location_with_averages_scores_full() {
        let s = score(Some("Kolonaki"), &table());
        assert_eq!(s.score, 100.0);
        assert!(s.warnings.is_empty());
    }

    #[test]
    fn known_location_without_averages() {
        let s = score(Some("Petralona"), &table());
        assert_eq!(s.score, 60.0);
        assert_eq!(s.warnings.len(), 1);
        assert!(s.warnings[0].contains("no market averages"));
    }

    #[test]
    fn recognized_area_outranks_unknown_name() {
        let known = score(Some("Petralona"), &table());
        let unknown = score(Some("Atlantis"), &table());
        assert_eq!(known.score, 60.0);
        assert_eq!(unknown.score, 50.0);
        assert!(unknown.warnings[0].contains("unrecognized location"));
        assert!(unknown.errors.is_empty());
    }

    #[test]
    fn missing_location() {
        for loc in [None, Some(""), Some("   ")] {
            let s = score(loc, &table());
            assert_eq!(s.score, 50.0);
            assert_eq!(s.warnings.len(), 1);
        }
    }
}
