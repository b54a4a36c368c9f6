//! Attribute dimension: size, rooms, size/room ratio, construction year.
//!
//! Starts at 100 and deducts fixed penalties for out-of-range values. A
//! construction year outside [1800, current year] is the one hard error
//! here and drives the score toward 0. Penalty magnitudes are tunable
//! policy, the ordering (worse data → lower score) is the contract.

use super::SubScore;
use crate::record::ListingFields;

pub(crate) const SIZE_RANGE_SQM: (f64, f64) = (20.0, 500.0);
pub(crate) const ROOM_RANGE: (u32, u32) = (1, 10);
pub(crate) const MIN_SQM_PER_ROOM: f64 = 10.0;
pub(crate) const MIN_YEAR_BUILT: i32 = 1800;

const OUT_OF_RANGE_PENALTY: f64 = 25.0;
const RATIO_PENALTY: f64 = 15.0;
const MISSING_PENALTY: f64 = 10.0;
const YEAR_ERROR_SCORE: f64 = 10.0;

pub(crate) fn score(fields: &ListingFields, current_year: i32) -> SubScore {
    let mut out = SubScore::new(100.0);

    match fields.size_sqm {
        Some(s) if s < SIZE_RANGE_SQM.0 || s > SIZE_RANGE_SQM.1 => {
            out.warnings
                .push(format!("size {s:.0} m2 outside plausible range"));
            out.score -= OUT_OF_RANGE_PENALTY;
        }
        Some(_) => {}
        None => {
            out.warnings.push("missing size".to_string());
            out.score -= MISSING_PENALTY;
        }
    }

    match fields.rooms {
        Some(r) if r < ROOM_RANGE.0 || r > ROOM_RANGE.1 => {
            out.warnings.push(format!("unusual room count: {r}"));
            out.score -= OUT_OF_RANGE_PENALTY;
        }
        Some(_) => {}
        None => {
            out.warnings.push("missing room count".to_string());
            out.score -= MISSING_PENALTY;
        }
    }

    if let (Some(size), Some(rooms)) = (fields.size_sqm, fields.rooms) {
        if rooms >= 1 && size / (rooms as f64) < MIN_SQM_PER_ROOM {
            out.warnings.push(format!(
                "suspicious size/room ratio: {:.1} m2 per room",
                size / rooms as f64
            ));
            out.score -= RATIO_PENALTY;
        }
    }

    if let Some(year) = fields.year_built {
        if year < MIN_YEAR_BUILT || year > current_year {
            out.errors
                .push(format!("construction year {year} out of range"));
            out.score = out.score.min(YEAR_ERROR_SCORE);
        }
    }

    out.score = out.score.clamp(0.0, 100.0);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ListingFields {
        ListingFields {
            size_sqm: Some(100.0),
            rooms: Some(3),
            year_built: Some(1995),
            ..Default::default()
        }
    }

    #[test]
    fn plausible_attributes_score_full() {
        let s = score(&base(), 2026);
        assert_eq!(s.score, 100.0);
        assert!(s.warnings.is_empty() && s.errors.is_empty());
    }

    #[test]
    fn out_of_range_size_and_rooms_are_warnings() {
        let mut f = base();
        f.size_sqm = Some(900.0);
        f.rooms = Some(14);
        let s = score(&f, 2026);
        assert_eq!(s.warnings.len(), 2);
        assert!(s.errors.is_empty());
        assert_eq!(s.score, 50.0);
    }

    #[test]
    fn tight_ratio_is_suspicious() {
        let mut f = base();
        f.size_sqm = Some(35.0);
        f.rooms = Some(5); // 7 m2 per room
        let s = score(&f, 2026);
        assert!(s.warnings.iter().any(|w| w.contains("ratio")));
        assert_eq!(s.score, 85.0);
    }

    #[test]
    fn future_year_is_a_hard_error() {
        let mut f = base();
        f.year_built = Some(2031);
        let s = score(&f, 2026);
        assert_eq!(s.errors.len(), 1);
        assert!(s.score <= 10.0);
    }

    #[test]
    fn ancient_year_is_a_hard_error() {
        let mut f = base();
        f.year_built = Some(1750);
        let s = score(&f, 2026);
        assert_eq!(s.errors.len(), 1);
    }

    #[test]
    fn missing_fields_deduct_mildly() {
        let f = ListingFields::default();
        let s = score(&f, 2026);
        assert_eq!(s.score, 80.0);
        assert_eq!(s.warnings.len(), 2);
        assert!(s.errors.is_empty());
    }
}
