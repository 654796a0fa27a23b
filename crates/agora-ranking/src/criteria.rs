//! Ranking configuration
//!
//! Weights are never renormalized. Criteria whose weights do not sum to one
//! (within [`WEIGHT_TOLERANCE`]) are rejected by [`RankingCriteria::validate`].

use serde::{Deserialize, Serialize};

use crate::error::{RankingError, RankingResult};

/// Allowed deviation of the weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 0.001;

/// Default number of rows in a debug breakdown
pub const DEFAULT_DEBUG_TOP_N: usize = 10;

/// Price interval always covered by price normalization
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 1000.0,
        }
    }
}

/// Weights and bounds for composite scoring
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankingCriteria {
    pub proximity_weight: f64,
    pub price_weight: f64,
    pub referral_weight: f64,
    /// Distance at which the proximity score reaches zero
    pub max_distance_km: f64,
    pub price_range: PriceRange,
}

impl Default for RankingCriteria {
    fn default() -> Self {
        Self {
            proximity_weight: 0.4,
            price_weight: 0.3,
            referral_weight: 0.3,
            max_distance_km: 50.0,
            price_range: PriceRange::default(),
        }
    }
}

impl RankingCriteria {
    /// Criteria with the given weights and default bounds
    pub fn new(proximity_weight: f64, price_weight: f64, referral_weight: f64) -> Self {
        Self {
            proximity_weight,
            price_weight,
            referral_weight,
            ..Self::default()
        }
    }

    pub fn with_max_distance_km(mut self, max_distance_km: f64) -> Self {
        self.max_distance_km = max_distance_km;
        self
    }

    pub fn with_price_range(mut self, min: f64, max: f64) -> Self {
        self.price_range = PriceRange::new(min, max);
        self
    }

    pub fn weight_sum(&self) -> f64 {
        self.proximity_weight + self.price_weight + self.referral_weight
    }

    /// Check every invariant, describing the first violation
    pub fn validate(&self) -> RankingResult<()> {
        let weights = [
            ("proximity", self.proximity_weight),
            ("price", self.price_weight),
            ("referral", self.referral_weight),
        ];
        for (name, weight) in weights {
            if !weight.is_finite() || !(0.0..=1.0).contains(&weight) {
                return Err(RankingError::invalid(format!(
                    "{} weight {} is outside [0, 1]",
                    name, weight
                )));
            }
        }

        let sum = self.weight_sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(RankingError::invalid(format!(
                "weights sum to {:.4}, expected 1",
                sum
            )));
        }

        if !self.max_distance_km.is_finite() || self.max_distance_km <= 0.0 {
            return Err(RankingError::invalid(format!(
                "max distance {} km must be positive",
                self.max_distance_km
            )));
        }

        let range = self.price_range;
        if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
            return Err(RankingError::invalid(format!(
                "price range {}..{} is not an interval",
                range.min, range.max
            )));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Whether `criteria` may be used for ranking
pub fn is_valid_config(criteria: &RankingCriteria) -> bool {
    criteria.is_valid()
}

/// Per-criterion breakdown reporting for offline tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugConfig {
    pub enabled: bool,
    /// How many of the top candidates to break down
    pub top_n: usize,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            top_n: DEFAULT_DEBUG_TOP_N,
        }
    }
}

impl DebugConfig {
    /// Enabled, breaking down the top `top_n` candidates
    pub fn top(top_n: usize) -> Self {
        Self {
            enabled: true,
            top_n,
        }
    }
}
