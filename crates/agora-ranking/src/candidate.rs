//! Ranking inputs and outputs

use agora_core::{ItemId, UserId};
use serde::{Deserialize, Serialize};

/// Mean Earth radius used for great-circle distances
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance to `other`
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let d_lat = lat2 - lat1;
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

/// An item to be ranked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub price: f64,
    /// Precomputed distance to the user, if the backend supplied one
    pub distance_km: Option<f64>,
    pub location: Option<GeoPoint>,
}

impl Candidate {
    pub fn new(item_id: impl Into<ItemId>, seller_id: impl Into<UserId>, price: f64) -> Self {
        Self {
            item_id: item_id.into(),
            seller_id: seller_id.into(),
            price,
            distance_km: None,
            location: None,
        }
    }

    pub fn with_distance_km(mut self, distance_km: f64) -> Self {
        self.distance_km = Some(distance_km);
        self
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }

    /// Distance to the user, or `None` when either side has no position
    pub fn resolve_distance(&self, user_location: Option<&GeoPoint>) -> Option<f64> {
        let user = user_location?;
        self.distance_km
            .or_else(|| self.location.map(|at| user.distance_km(&at)))
            .filter(|d| d.is_finite())
            .map(|d| d.max(0.0))
    }
}

/// Per-request ranking context
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RankingContext {
    pub user_location: Option<GeoPoint>,
    /// Keep only the first `limit` results
    pub limit: Option<usize>,
}

impl RankingContext {
    pub fn at(user_location: GeoPoint) -> Self {
        Self {
            user_location: Some(user_location),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A candidate with its per-criterion and composite scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub item_id: ItemId,
    pub seller_id: UserId,
    pub price: f64,
    pub proximity_score: f64,
    pub price_score: f64,
    pub referral_score: f64,
    pub composite_score: f64,
    pub distance_km: Option<f64>,
    pub referral_points_of_seller: u64,
}

/// One row of a debug breakdown
///
/// Each `*_contribution` is the criterion score multiplied by its weight;
/// the three contributions sum to the composite score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    /// 1-based position in the ranking
    pub rank: usize,
    pub item_id: ItemId,
    pub proximity_score: f64,
    pub proximity_contribution: f64,
    pub price_score: f64,
    pub price_contribution: f64,
    pub referral_score: f64,
    pub referral_contribution: f64,
    pub composite_score: f64,
}

/// Result of a ranking call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ranking {
    /// Highest composite score first
    pub candidates: Vec<ScoredCandidate>,
    /// The points lookup failed and every referral score fell back to the floor
    pub referral_degraded: bool,
    /// Present only when debug breakdown is enabled
    pub breakdown: Option<Vec<BreakdownRow>>,
}

impl Ranking {
    pub fn item_ids(&self) -> Vec<&ItemId> {
        self.candidates.iter().map(|c| &c.item_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // Paris to London, roughly 344 km
        let paris = GeoPoint::new(48.8566, 2.3522);
        let london = GeoPoint::new(51.5074, -0.1278);
        let d = paris.distance_km(&london);
        assert!((d - 343.5).abs() < 2.0, "got {}", d);
        assert_eq!(paris.distance_km(&paris), 0.0);
    }

    #[test]
    fn test_resolve_distance_prefers_precomputed() {
        let user = GeoPoint::new(0.0, 0.0);
        let candidate = Candidate::new("i1", "s1", 10.0)
            .with_distance_km(3.0)
            .with_location(GeoPoint::new(10.0, 10.0));
        assert_eq!(candidate.resolve_distance(Some(&user)), Some(3.0));
    }

    #[test]
    fn test_resolve_distance_needs_user_location() {
        let candidate = Candidate::new("i1", "s1", 10.0).with_distance_km(3.0);
        assert_eq!(candidate.resolve_distance(None), None);

        let nowhere = Candidate::new("i2", "s1", 10.0);
        assert_eq!(nowhere.resolve_distance(Some(&GeoPoint::new(0.0, 0.0))), None);
    }
}
