//! One referrer climbing the tiers
//!
//! Every referred friend triggers the one-time conversions, then the
//! repeatable monthly activity is claimed twice per simulated month. The
//! second claim, and a replayed signup, show duplicate awards being absorbed.

use std::fmt;
use std::sync::Arc;

use agora_core::{FixedClock, UserId};
use agora_referral::{
    ConversionKind, InMemoryReferralStore, PointsAccountingEngine, ReferralRelationship,
    RepeatPolicy, Tier,
};
use anyhow::Context;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::info;

const ONE_TIME_KINDS: [ConversionKind; 4] = [
    ConversionKind::Signup,
    ConversionKind::FirstPurchase,
    ConversionKind::SuccessfulSale,
    ConversionKind::SubscriptionPurchase,
];

#[derive(Debug, Clone)]
pub struct TierScenario {
    pub referrals: usize,
    pub months: u32,
    pub policy: RepeatPolicy,
}

impl Default for TierScenario {
    fn default() -> Self {
        Self {
            referrals: 6,
            months: 3,
            policy: RepeatPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStep {
    pub friend: String,
    pub kind: ConversionKind,
    pub awarded: bool,
    pub total_points: u64,
    pub tier: Tier,
    pub multiplier: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierReport {
    pub referrer: String,
    pub steps: Vec<TierStep>,
    pub absorbed: usize,
    pub final_points: u64,
    pub final_tier: Tier,
    pub points_to_next: Option<u64>,
}

struct Run<'a> {
    engine: &'a PointsAccountingEngine,
    steps: Vec<TierStep>,
    absorbed: usize,
}

impl Run<'_> {
    async fn award(
        &mut self,
        relationship: &ReferralRelationship,
        kind: ConversionKind,
    ) -> anyhow::Result<()> {
        let award = self
            .engine
            .award_points(&relationship.id, kind, json!({"source": "simulation"}))
            .await?;
        if !award.is_new() {
            self.absorbed += 1;
        }

        let account = self.engine.account(&relationship.referrer_id).await?;
        self.steps.push(TierStep {
            friend: relationship.referred_id.to_string(),
            kind,
            awarded: award.is_new(),
            total_points: account.total_points(),
            tier: account.tier(),
            multiplier: account.boost_multiplier(),
        });
        Ok(())
    }
}

pub async fn run_tiers(scenario: &TierScenario) -> anyhow::Result<TierReport> {
    info!(
        referrals = scenario.referrals,
        months = scenario.months,
        policy = ?scenario.policy,
        "Running tier scenario"
    );

    let start = Utc
        .with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
        .single()
        .context("scenario start date is ambiguous")?;
    let clock = Arc::new(FixedClock::new(start));
    let engine = PointsAccountingEngine::new(Arc::new(InMemoryReferralStore::new()))
        .with_clock(clock.clone())
        .with_repeat_policy(scenario.policy);

    let referrer = UserId::from("alice");
    let code = engine.referral_code_for(&referrer).await?;
    let mut relationships = Vec::with_capacity(scenario.referrals);
    for n in 0..scenario.referrals {
        let friend = UserId::new(format!("friend-{}", n + 1));
        relationships.push(engine.register_referral(&code, &friend).await?);
    }

    let mut run = Run {
        engine: &engine,
        steps: Vec::new(),
        absorbed: 0,
    };
    for relationship in &relationships {
        for kind in ONE_TIME_KINDS {
            run.award(relationship, kind).await?;
        }
        // Replayed webhook
        run.award(relationship, ConversionKind::Signup).await?;
    }

    for _ in 0..scenario.months {
        for relationship in &relationships {
            run.award(relationship, ConversionKind::MonthlyActivity).await?;
            run.award(relationship, ConversionKind::MonthlyActivity).await?;
        }
        // Any 31-day step lands in a later calendar month
        clock.advance(chrono::Duration::days(31));
    }

    let account = engine.account(&referrer).await?;
    let Run { steps, absorbed, .. } = run;
    Ok(TierReport {
        referrer: referrer.to_string(),
        steps,
        absorbed,
        final_points: account.total_points(),
        final_tier: account.tier(),
        points_to_next: Tier::points_to_next(account.total_points()),
    })
}

impl fmt::Display for TierReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Tier Scenario ({}) ===", self.referrer)?;
        let mut tier = None;
        for step in &self.steps {
            let marker = if tier.is_some_and(|t| t != step.tier) {
                format!("  -> {}", step.tier)
            } else {
                String::new()
            };
            tier = Some(step.tier);
            writeln!(
                f,
                "  {:<10} {:<22} {:<8} {:>5} pts  x{:.2}{}",
                step.friend,
                step.kind.as_str(),
                if step.awarded { "awarded" } else { "absorbed" },
                step.total_points,
                step.multiplier,
                marker,
            )?;
        }
        writeln!(f, "--- Result ---")?;
        writeln!(f, "  points:    {}", self.final_points)?;
        writeln!(f, "  tier:      {}", self.final_tier)?;
        writeln!(f, "  absorbed:  {}", self.absorbed)?;
        match self.points_to_next {
            Some(missing) => write!(f, "  next tier: {} points away", missing),
            None => write!(f, "  next tier: none (top tier)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn test_default_run_reaches_platinum() {
        let report = assert_ok!(run_tiers(&TierScenario::default()).await);

        // 6 friends x (10 + 75 + 50 + 100) one-time points, plus
        // 6 friends x 3 months x 30 monthly points
        assert_eq!(report.final_points, 6 * 235 + 6 * 3 * 30);
        assert_eq!(report.final_tier, Tier::Platinum);
        // One replayed signup per friend and one extra monthly claim per
        // friend per month
        assert_eq!(report.absorbed, 6 + 6 * 3);
        assert!(
            report
                .steps
                .windows(2)
                .all(|w| w[0].total_points <= w[1].total_points)
        );
    }

    #[tokio::test]
    async fn test_unconstrained_policy_credits_every_claim() {
        let scenario = TierScenario {
            referrals: 1,
            months: 2,
            policy: RepeatPolicy::Unconstrained,
        };
        let report = assert_ok!(run_tiers(&scenario).await);

        assert_eq!(report.final_points, 235 + 4 * 30);
        assert_eq!(report.absorbed, 1);
        assert_eq!(report.final_tier, Tier::Silver);
        assert_eq!(report.points_to_next, Some(500 - 355));
    }
}
