//! Synthetic marketplace ranking with a debug breakdown
//!
//! Sellers earn referral points through real awards, then a batch of
//! randomly placed and priced candidates is ranked around a fixed point.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use agora_core::{MockChangeFeed, UserId};
use agora_node::{AgoraNode, NodeConfig};
use agora_ranking::{Candidate, DebugConfig, GeoPoint, Ranking, RankingContext};
use agora_referral::{ConversionKind, InMemoryReferralStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use tracing::info;

/// Where the simulated shopper stands
const SHOPPER: GeoPoint = GeoPoint {
    lat: 52.52,
    lon: 13.405,
};

#[derive(Debug, Clone)]
pub struct RankScenario {
    pub candidates: usize,
    pub sellers: usize,
    /// Results to keep and to break down
    pub top: usize,
    pub seed: u64,
    /// Take the referral store offline before ranking
    pub lookup_outage: bool,
}

impl Default for RankScenario {
    fn default() -> Self {
        Self {
            candidates: 50,
            sellers: 8,
            top: 10,
            seed: 7,
            lookup_outage: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankReport {
    pub seller_points: BTreeMap<String, u64>,
    pub ranking: Ranking,
}

pub async fn run_rank(scenario: &RankScenario) -> anyhow::Result<RankReport> {
    info!(
        candidates = scenario.candidates,
        sellers = scenario.sellers,
        seed = scenario.seed,
        "Running ranking scenario"
    );
    let mut rng = StdRng::seed_from_u64(scenario.seed);

    let referral_store = Arc::new(InMemoryReferralStore::new());
    let config = NodeConfig::default().with_ranking_debug(DebugConfig::top(scenario.top));
    let node = AgoraNode::in_memory(config, Arc::new(MockChangeFeed::new()), referral_store.clone())?;
    let accounting = node.accounting();

    let sellers: Vec<UserId> = (0..scenario.sellers.max(1))
        .map(|n| UserId::new(format!("seller-{:02}", n)))
        .collect();

    for (n, seller) in sellers.iter().enumerate() {
        let code = accounting.referral_code_for(seller).await?;
        for r in 0..rng.random_range(0..=4) {
            let referred = UserId::new(format!("buyer-{}-{}", n, r));
            let relationship = accounting.register_referral(&code, &referred).await?;
            for kind in ConversionKind::ALL {
                if !kind.is_repeatable() && rng.random_bool(0.5) {
                    accounting
                        .award_points(&relationship.id, kind, json!({"source": "simulation"}))
                        .await?;
                }
            }
        }
    }

    let seller_points: BTreeMap<String, u64> = sellers
        .iter()
        .map(|seller| {
            let points = accounting
                .cached_account(seller)
                .map_or(0, |account| account.total_points());
            (seller.to_string(), points)
        })
        .collect();

    let candidates: Vec<Candidate> = (0..scenario.candidates)
        .map(|n| {
            let seller = sellers[rng.random_range(0..sellers.len())].clone();
            let price = (rng.random_range(5.0..500.0_f64) * 100.0).round() / 100.0;
            let location = GeoPoint::new(
                SHOPPER.lat + rng.random_range(-0.4..0.4),
                SHOPPER.lon + rng.random_range(-0.4..0.4),
            );
            Candidate::new(format!("item-{:03}", n), seller, price).with_location(location)
        })
        .collect();

    if scenario.lookup_outage {
        referral_store.set_unavailable(true);
    }

    let ctx = RankingContext::at(SHOPPER).with_limit(scenario.top);
    let ranking = node.rank(candidates, &ctx).await?;

    Ok(RankReport {
        seller_points,
        ranking,
    })
}

impl fmt::Display for RankReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Ranking Scenario ===")?;
        writeln!(f, "--- Seller points ---")?;
        for (seller, points) in &self.seller_points {
            writeln!(f, "  {:<10} {:>5}", seller, points)?;
        }
        if self.ranking.referral_degraded {
            writeln!(f, "  (points lookup failed; referral scores at floor)")?;
        }

        writeln!(f, "--- Results ---")?;
        for (n, c) in self.ranking.candidates.iter().enumerate() {
            writeln!(
                f,
                "  {:>2}. {:<9} {:<10} {:>7.2}  {:>6}  score {:.3}",
                n + 1,
                c.item_id,
                c.seller_id,
                c.price,
                c.distance_km
                    .map_or_else(|| "-".to_string(), |d| format!("{:.1}km", d)),
                c.composite_score,
            )?;
        }

        if let Some(rows) = &self.ranking.breakdown {
            writeln!(f, "--- Breakdown (score x weight) ---")?;
            for row in rows {
                writeln!(
                    f,
                    "  {:>2}. {:<9} prox {:.2}x={:.3}  price {:.2}x={:.3}  ref {:.2}x={:.3}  = {:.3}",
                    row.rank,
                    row.item_id,
                    row.proximity_score,
                    row.proximity_contribution,
                    row.price_score,
                    row.price_contribution,
                    row.referral_score,
                    row.referral_contribution,
                    row.composite_score,
                )?;
            }
        }
        Ok(())
    }
}
