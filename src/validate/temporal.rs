//! Temporal dimension: listing freshness.
//!
//! 100 within the recent window, then a linear decay down to the stale
//! floor of 20 (warning past the stale horizon). Unparseable, missing and
//! future dates are hard errors; a listing "from tomorrow" is fabricated
//! data, not an old one.
//!
//! Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates, which covers
//! what the portals actually emit.

use super::SubScore;
use chrono::{DateTime, NaiveDate, Utc};

pub(crate) const STALE_FLOOR: f64 = 20.0;

pub(crate) fn score(
    listed_date: Option<&str>,
    now: DateTime<Utc>,
    recent_window_days: i64,
    stale_after_days: i64,
) -> SubScore {
    let mut out = SubScore::new(0.0);

    let Some(raw) = listed_date.map(str::trim).filter(|s| !s.is_empty()) else {
        out.errors.push("missing listed date".to_string());
        return out;
    };

    let Some(listed) = parse_date(raw) else {
        out.errors.push(format!("unparseable listed date: {raw}"));
        return out;
    };

    if listed > now {
        out.errors.push(format!("listed date in the future: {raw}"));
        return out;
    }

    let age_days = (now - listed).num_days();
    if age_days <= recent_window_days {
        out.score = 100.0;
    } else if age_days >= stale_after_days {
        out.score = STALE_FLOOR;
        out.warnings
            .push(format!("stale listing ({age_days} days old)"));
    } else {
        // Linear decay between the recent window and the stale horizon.
        let span = (stale_after_days - recent_window_days) as f64;
        let into = (age_days - recent_window_days) as f64;
        out.score = 100.0 - into / span * (100.0 - STALE_FLOOR);
    }
    out
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            d.and_hms_opt(0, 0, 0)?,
            Utc,
        ));
    }
    None
}
