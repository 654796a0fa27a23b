//! End-to-end ranking behavior against synthetic points lookups

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use agora_core::{LookupError, PointsLookup, StaticPointsLookup, UserId};
use agora_ranking::{
    Candidate, DebugConfig, GeoPoint, RankingContext, RankingCriteria, RankingEngine,
    RankingError,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio_test::assert_ok;

/// Lookup that counts calls and can be told to fail
#[derive(Default)]
struct ProbeLookup {
    points: HashMap<UserId, u64>,
    fail: bool,
    calls: AtomicUsize,
    last_batch: Mutex<Vec<UserId>>,
}

#[async_trait]
impl PointsLookup for ProbeLookup {
    async fn points_for_users(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, u64>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_batch.lock() = user_ids.to_vec();
        if self.fail {
            return Err(LookupError::Network("connection reset".into()));
        }
        Ok(user_ids
            .iter()
            .filter_map(|id| self.points.get(id).map(|p| (id.clone(), *p)))
            .collect())
    }
}

fn points(entries: &[(&str, u64)]) -> HashMap<UserId, u64> {
    entries
        .iter()
        .map(|(id, p)| (UserId::from(*id), *p))
        .collect()
}

#[tokio::test]
async fn test_empty_input_skips_lookup() {
    let lookup = Arc::new(ProbeLookup::default());
    let engine = RankingEngine::new(lookup.clone());

    let ranking = assert_ok!(
        engine
            .rank(Vec::new(), &RankingCriteria::default(), &RankingContext::default())
            .await
    );
    assert!(ranking.candidates.is_empty());
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_criteria_rejected_before_lookup() {
    let lookup = Arc::new(ProbeLookup::default());
    let engine = RankingEngine::new(lookup.clone());

    let err = engine
        .rank(
            vec![Candidate::new("i1", "s1", 10.0)],
            &RankingCriteria::new(0.6, 0.6, 0.0),
            &RankingContext::default(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RankingError::InvalidCriteria { .. }));
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_one_batched_lookup_of_unique_sellers() {
    let lookup = Arc::new(ProbeLookup {
        points: points(&[("s1", 100)]),
        ..Default::default()
    });
    let engine = RankingEngine::new(lookup.clone());
    let candidates = vec![
        Candidate::new("i1", "s1", 10.0),
        Candidate::new("i2", "s2", 20.0),
        Candidate::new("i3", "s1", 30.0),
    ];

    assert_ok!(
        engine
            .rank(candidates, &RankingCriteria::default(), &RankingContext::default())
            .await
    );
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        *lookup.last_batch.lock(),
        vec![UserId::from("s1"), UserId::from("s2")]
    );
}

#[tokio::test]
async fn test_lookup_failure_degrades_to_floor() {
    let lookup = Arc::new(ProbeLookup {
        points: points(&[("s1", 900)]),
        fail: true,
        ..Default::default()
    });
    let engine = RankingEngine::new(lookup);
    let candidates = vec![
        Candidate::new("i1", "s1", 10.0),
        Candidate::new("i2", "s2", 20.0),
    ];

    let ranking = assert_ok!(
        engine
            .rank(candidates, &RankingCriteria::default(), &RankingContext::default())
            .await
    );
    assert!(ranking.referral_degraded);
    for c in &ranking.candidates {
        assert_eq!(c.referral_score, 0.1);
        assert_eq!(c.referral_points_of_seller, 0);
    }
}

#[tokio::test]
async fn test_distance_example() {
    let engine = RankingEngine::new(Arc::new(StaticPointsLookup::default()));
    let criteria = RankingCriteria::default().with_max_distance_km(50.0);
    let ctx = RankingContext::at(GeoPoint::new(45.0, 7.0));
    let candidates = vec![
        Candidate::new("at-home", "s", 10.0).with_distance_km(0.0),
        Candidate::new("nearby", "s", 10.0).with_distance_km(25.0),
        Candidate::new("remote", "s", 10.0).with_distance_km(60.0),
    ];

    let ranking = assert_ok!(engine.rank(candidates, &criteria, &ctx).await);
    let proximity: HashMap<&str, f64> = ranking
        .candidates
        .iter()
        .map(|c| (c.item_id.as_str(), c.proximity_score))
        .collect();
    assert_eq!(proximity["at-home"], 1.0);
    assert_eq!(proximity["nearby"], 0.5);
    assert_eq!(proximity["remote"], 0.0);
}

#[tokio::test]
async fn test_single_price_is_neutral_whatever_the_value() {
    let engine = RankingEngine::new(Arc::new(StaticPointsLookup::default()));
    for price in [0.0, 1.0, 999.0, 1_000_000.0] {
        let candidates = (0..4)
            .map(|n| Candidate::new(format!("i{}", n), format!("s{}", n), price))
            .collect();
        let ranking = assert_ok!(
            engine
                .rank(candidates, &RankingCriteria::default(), &RankingContext::default())
                .await
        );
        assert!(ranking.candidates.iter().all(|c| c.price_score == 0.5));
    }
}

#[tokio::test]
async fn test_referral_points_lift_seller() {
    let lookup = StaticPointsLookup::new(points(&[("star", 400), ("newbie", 0)]));
    let engine = RankingEngine::new(Arc::new(lookup));
    let criteria = RankingCriteria::new(0.0, 0.0, 1.0);
    let candidates = vec![
        Candidate::new("plain", "newbie", 10.0),
        Candidate::new("boosted", "star", 10.0),
    ];

    let ranking = assert_ok!(
        engine
            .rank(candidates, &criteria, &RankingContext::default())
            .await
    );
    let top = &ranking.candidates[0];
    assert_eq!(top.item_id.as_str(), "boosted");
    assert_eq!(top.referral_score, 1.0);
    assert_eq!(top.referral_points_of_seller, 400);
    assert_eq!(ranking.candidates[1].referral_score, 0.1);
}

#[tokio::test]
async fn test_random_valid_criteria_bounded_and_sorted() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let sellers: Vec<String> = (0..8).map(|n| format!("seller-{}", n)).collect();
    let lookup = StaticPointsLookup::new(
        sellers
            .iter()
            .map(|s| (UserId::from(s.as_str()), rng.random_range(0..2000)))
            .collect(),
    );
    let engine = RankingEngine::new(Arc::new(lookup));
    let ctx = RankingContext::at(GeoPoint::new(40.0, -3.7));

    for _ in 0..50 {
        let a: f64 = rng.random_range(0.0..1.0);
        let b: f64 = rng.random_range(0.0..(1.0 - a));
        let criteria = RankingCriteria::new(a, b, 1.0 - a - b)
            .with_max_distance_km(rng.random_range(1.0..100.0));
        assert!(criteria.is_valid());

        let candidates: Vec<Candidate> = (0..30)
            .map(|n| {
                let seller = &sellers[rng.random_range(0..sellers.len())];
                let mut candidate =
                    Candidate::new(format!("item-{}", n), seller.as_str(), rng.random_range(0.0..3000.0));
                if rng.random_bool(0.7) {
                    candidate = candidate.with_location(GeoPoint::new(
                        40.0 + rng.random_range(-0.5..0.5),
                        -3.7 + rng.random_range(-0.5..0.5),
                    ));
                }
                candidate
            })
            .collect();

        let ranking = assert_ok!(engine.rank(candidates, &criteria, &ctx).await);
        assert_eq!(ranking.candidates.len(), 30);
        for c in &ranking.candidates {
            assert!((0.0..=1.0).contains(&c.composite_score));
        }
        for pair in ranking.candidates.windows(2) {
            assert!(pair[0].composite_score >= pair[1].composite_score);
        }
    }
}

#[tokio::test]
async fn test_debug_breakdown_does_not_change_order() {
    let lookup: Arc<dyn PointsLookup> =
        Arc::new(StaticPointsLookup::new(points(&[("s1", 50), ("s2", 500)])));
    let plain = RankingEngine::new(lookup.clone());
    let debug = RankingEngine::new(lookup).with_debug(DebugConfig::top(2));
    let ctx = RankingContext::at(GeoPoint::new(0.0, 0.0)).with_limit(3);

    let candidates: Vec<Candidate> = (0..6)
        .map(|n| {
            Candidate::new(format!("i{}", n), if n % 2 == 0 { "s1" } else { "s2" }, 50.0 * n as f64)
                .with_distance_km(7.0 * n as f64)
        })
        .collect();

    let a = assert_ok!(
        plain
            .rank(candidates.clone(), &RankingCriteria::default(), &ctx)
            .await
    );
    let b = assert_ok!(debug.rank(candidates, &RankingCriteria::default(), &ctx).await);

    assert_eq!(a.candidates, b.candidates);
    assert_eq!(a.candidates.len(), 3);
    assert!(a.breakdown.is_none());

    let rows = b.breakdown.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].rank, 1);
    assert_eq!(rows[0].item_id, b.candidates[0].item_id);
}
