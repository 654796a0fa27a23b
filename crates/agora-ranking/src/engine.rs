//! The ranking engine

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use agora_core::{PointsLookup, UserId};
use tracing::{debug, instrument, warn};

use crate::candidate::{BreakdownRow, Candidate, Ranking, RankingContext, ScoredCandidate};
use crate::criteria::{DebugConfig, RankingCriteria};
use crate::error::RankingResult;
use crate::score::{PriceBounds, price_score, proximity_score, referral_score};

/// Orders candidates by weighted proximity, price, and seller referral points
///
/// The only suspension point is one batched points lookup per call; scoring
/// and sorting are synchronous (see [`score_candidates`]).
pub struct RankingEngine {
    lookup: Arc<dyn PointsLookup>,
    debug: DebugConfig,
}

impl RankingEngine {
    pub fn new(lookup: Arc<dyn PointsLookup>) -> Self {
        Self {
            lookup,
            debug: DebugConfig::default(),
        }
    }

    /// Enable or configure the per-criterion breakdown
    pub fn with_debug(mut self, debug: DebugConfig) -> Self {
        self.debug = debug;
        self
    }

    pub fn debug_config(&self) -> DebugConfig {
        self.debug
    }

    /// Rank `candidates`, highest composite score first
    ///
    /// Fails only on invalid criteria. A failed points lookup degrades every
    /// referral score to the floor and sets [`Ranking::referral_degraded`].
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn rank(
        &self,
        candidates: Vec<Candidate>,
        criteria: &RankingCriteria,
        ctx: &RankingContext,
    ) -> RankingResult<Ranking> {
        criteria.validate()?;
        if candidates.is_empty() {
            return Ok(Ranking::default());
        }

        let sellers = unique_sellers(&candidates);
        let (points, referral_degraded) = match self.lookup.points_for_users(&sellers).await {
            Ok(points) => (points, false),
            Err(e) => {
                warn!(sellers = sellers.len(), error = %e, "Points lookup failed; using referral floor");
                (HashMap::new(), true)
            }
        };

        let mut scored = score_candidates(candidates, criteria, ctx, &points);

        let breakdown = self.debug.enabled.then(|| {
            let rows = breakdown(&scored, criteria, self.debug.top_n);
            for row in &rows {
                debug!(
                    rank = row.rank,
                    item_id = %row.item_id,
                    proximity = row.proximity_score,
                    price = row.price_score,
                    referral = row.referral_score,
                    composite = row.composite_score,
                    "Ranking breakdown"
                );
            }
            rows
        });

        if let Some(limit) = ctx.limit {
            scored.truncate(limit);
        }

        Ok(Ranking {
            candidates: scored,
            referral_degraded,
            breakdown,
        })
    }
}

/// Score and sort candidates against known seller points
///
/// Sellers missing from `points` have zero points. The sort is stable, so
/// candidates with equal composite scores keep their input order.
pub fn score_candidates(
    candidates: Vec<Candidate>,
    criteria: &RankingCriteria,
    ctx: &RankingContext,
    points: &HashMap<UserId, u64>,
) -> Vec<ScoredCandidate> {
    let bounds = PriceBounds::observe(candidates.iter().map(|c| c.price), criteria.price_range);
    let max_points = candidates
        .iter()
        .filter_map(|c| points.get(&c.seller_id))
        .copied()
        .max()
        .unwrap_or(0);

    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let distance_km = candidate.resolve_distance(ctx.user_location.as_ref());
            let seller_points = points.get(&candidate.seller_id).copied().unwrap_or(0);

            let proximity = proximity_score(distance_km, criteria.max_distance_km);
            let price = price_score(candidate.price, bounds);
            let referral = referral_score(seller_points, max_points);
            let composite = (criteria.proximity_weight * proximity
                + criteria.price_weight * price
                + criteria.referral_weight * referral)
                .clamp(0.0, 1.0);

            ScoredCandidate {
                item_id: candidate.item_id,
                seller_id: candidate.seller_id,
                price: candidate.price,
                proximity_score: proximity,
                price_score: price,
                referral_score: referral,
                composite_score: composite,
                distance_km,
                referral_points_of_seller: seller_points,
            }
        })
        .collect();

    scored.sort_by(|a, b| b.composite_score.total_cmp(&a.composite_score));
    scored
}

fn unique_sellers(candidates: &[Candidate]) -> Vec<UserId> {
    let mut seen = HashSet::new();
    candidates
        .iter()
        .filter(|c| seen.insert(&c.seller_id))
        .map(|c| c.seller_id.clone())
        .collect()
}

fn breakdown(scored: &[ScoredCandidate], criteria: &RankingCriteria, top_n: usize) -> Vec<BreakdownRow> {
    scored
        .iter()
        .take(top_n)
        .enumerate()
        .map(|(i, c)| BreakdownRow {
            rank: i + 1,
            item_id: c.item_id.clone(),
            proximity_score: c.proximity_score,
            proximity_contribution: c.proximity_score * criteria.proximity_weight,
            price_score: c.price_score,
            price_contribution: c.price_score * criteria.price_weight,
            referral_score: c.referral_score,
            referral_contribution: c.referral_score * criteria.referral_weight,
            composite_score: c.composite_score,
        })
        .collect()
}
