//! Scoring weights for the six authenticity dimensions.
//!
//! The total score is `Σ(component × weight)` and the weights must sum to
//! exactly 1.0 (within float tolerance). A bad sum is a configuration bug
//! and fails at construction, never at validation time.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub url: f64,
    pub price: f64,
    pub attributes: f64,
    pub market: f64,
    pub temporal: f64,
    pub image: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        // Near-equal 1/6 split, rounded so the total is exactly 1.0.
        Self {
            url: 0.167,
            price: 0.167,
            attributes: 0.167,
            market: 0.167,
            temporal: 0.166,
            image: 0.166,
        }
    }
}

impl ScoreWeights {
    pub fn sum(&self) -> f64 {
        self.url + self.price + self.attributes + self.market + self.temporal + self.image
    }

    /// Fail-fast check: every weight in [0, 1], total within tolerance of 1.0.
    pub fn validate(&self) -> Result<()> {
        for (name, w) in [
            ("url", self.url),
            ("price", self.price),
            ("attributes", self.attributes),
            ("market", self.market),
            ("temporal", self.temporal),
            ("image", self.image),
        ] {
            if !(0.0..=1.0).contains(&w) || !w.is_finite() {
                bail!("score weight `{name}` must be in [0.0, 1.0], got {w}");
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            bail!("score weights must sum to 1.0, got {sum}");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_sum_to_one() {
        let w = ScoreWeights::default();
        assert!((w.sum() - 1.0).abs() <= WEIGHT_SUM_TOLERANCE);
        w.validate().unwrap();
    }

    #[test]
    fn bad_sum_is_rejected() {
        let w = ScoreWeights {
            price: 0.10, // drops the sum well below 1.0
            ..ScoreWeights::default()
        };
        assert!(w.validate().is_err());
    }

    #[test]
    fn negative_weight_is_rejected() {
        let w = ScoreWeights {
            url: -0.1,
            price: 0.4,
            ..ScoreWeights::default()
        };
        assert!(w.validate().is_err());
    }
}
