//! Per-criterion scoring functions
//!
//! Every function here returns a value in `[0, 1]`.

use crate::criteria::PriceRange;

/// Score for a criterion with no information
pub const NEUTRAL_SCORE: f64 = 0.5;

/// Referral score of a seller with no points
pub const REFERRAL_FLOOR: f64 = 0.1;

/// Exponent of the concave curve applied to inverted prices
pub const PRICE_CURVE_EXPONENT: f64 = 0.7;

/// Prices closer than this count as one price point
const PRICE_EPSILON: f64 = 1e-9;

/// Linear decay from 1 at zero distance to 0 at `max_distance_km`
pub fn proximity_score(distance_km: Option<f64>, max_distance_km: f64) -> f64 {
    match distance_km {
        Some(d) if d.is_finite() && max_distance_km > 0.0 => {
            let d = d.max(0.0).min(max_distance_km);
            ((max_distance_km - d) / max_distance_km).max(0.0)
        }
        _ => NEUTRAL_SCORE,
    }
}

/// Normalization interval for a batch of prices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBounds {
    pub min: f64,
    pub max: f64,
}

impl PriceBounds {
    /// Observed bounds of `prices`, widened to cover `range`
    ///
    /// `None` when the batch has fewer than two distinct finite prices, in
    /// which case every price scores neutral.
    pub fn observe(prices: impl IntoIterator<Item = f64>, range: PriceRange) -> Option<Self> {
        let (min, max) = prices
            .into_iter()
            .filter(|p| p.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, p| match acc {
                None => Some((p, p)),
                Some((lo, hi)) => Some((lo.min(p), hi.max(p))),
            })?;

        if max - min < PRICE_EPSILON {
            return None;
        }
        Some(Self {
            min: min.min(range.min),
            max: max.max(range.max),
        })
    }
}

/// Cheaper is better, compressed by a concave curve
pub fn price_score(price: f64, bounds: Option<PriceBounds>) -> f64 {
    let Some(bounds) = bounds else {
        return NEUTRAL_SCORE;
    };
    let span = bounds.max - bounds.min;
    if !price.is_finite() || span <= 0.0 {
        return NEUTRAL_SCORE;
    }
    let normalized = ((price - bounds.min) / span).clamp(0.0, 1.0);
    (1.0 - normalized).powf(PRICE_CURVE_EXPONENT)
}

/// Logarithmic boost relative to the best-scoring seller in the batch
pub fn referral_score(points: u64, max_points: u64) -> f64 {
    if points == 0 || max_points == 0 {
        return REFERRAL_FLOOR;
    }
    let normalized = (points as f64 / max_points as f64).min(1.0);
    (REFERRAL_FLOOR + 0.9 * (1.0 + 9.0 * normalized).log10()).min(1.0)
}
