//! Price dimension: positivity, sanity cap, and market deviation.
//!
//! Missing or non-positive prices are hard errors. Prices above the broad
//! sanity cap score 50 with a warning. When the market table has an average
//! for the listing's location (and we know the size), the score decays
//! proportionally once the per-m² deviation passes the warning threshold,
//! floored at 40. Unusual is suspect, not disqualifying.

use super::SubScore;
use crate::market::MarketDataProvider;
use crate::record::ListingFields;

/// Floor for deviation-driven decay; only the hard checks go lower.
const DEVIATION_SCORE_FLOOR: f64 = 40.0;

pub(crate) fn score(
    fields: &ListingFields,
    market: &dyn MarketDataProvider,
    max_sane_price: f64,
    deviation_warn_pct: f64,
) -> SubScore {
    let mut out = SubScore::new(0.0);

    let price = match fields.price {
        Some(p) if p > 0.0 => p,
        Some(p) => {
            out.errors.push(format!("non-positive price: {p}"));
            return out;
        }
        None => {
            out.errors.push("missing price".to_string());
            return out;
        }
    };

    if price > max_sane_price {
        out.score = 50.0;
        out.warnings
            .push(format!("price {price:.0} exceeds sanity cap {max_sane_price:.0}"));
        return out;
    }

    out.score = 100.0;

    let (size, location) = match (fields.size_sqm, fields.location.as_deref()) {
        (Some(s), Some(l)) if s > 0.0 => (s, l),
        // Without a comparable basis we stay neutral here; the market
        // dimension accounts for the missing data.
        _ => return out,
    };

    let Some(avg) = market.average_price_per_sqm(location) else {
        return out;
    };

    let per_sqm = price / size;
    let deviation_pct = ((per_sqm - avg) / avg).abs() * 100.0;

    if deviation_pct > deviation_warn_pct {
        out.warnings.push(format!(
            "price deviates {deviation_pct:.0}% from {location} average ({avg:.0} EUR/m2)"
        ));
        out.score = (100.0 - (deviation_pct - deviation_warn_pct)).max(DEVIATION_SCORE_FLOOR);
    }
    out
}
