//! Incentive tiers
//!
//! A tier is a pure function of total points. Nothing stores a tier
//! independently of the points it was derived from.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Points at which the multiplier bonus reaches its cap
const BONUS_POINTS_SCALE: f64 = 10_000.0;

/// Maximum points-derived bonus on top of the tier base multiplier
pub const MAX_POINTS_BONUS: f64 = 0.5;

/// Incentive level, ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
}

impl Tier {
    /// Every tier, lowest first
    pub const ALL: [Tier; 5] = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
    ];

    /// Minimum total points for this tier
    pub fn threshold(&self) -> u64 {
        match self {
            Tier::Bronze => 0,
            Tier::Silver => 100,
            Tier::Gold => 500,
            Tier::Platinum => 1500,
            Tier::Diamond => 5000,
        }
    }

    /// Highest tier whose threshold is at most `points`
    pub fn for_points(points: u64) -> Tier {
        Tier::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| tier.threshold() <= points)
            .unwrap_or(Tier::Bronze)
    }

    /// The tier above, if any
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Bronze => Some(Tier::Silver),
            Tier::Silver => Some(Tier::Gold),
            Tier::Gold => Some(Tier::Platinum),
            Tier::Platinum => Some(Tier::Diamond),
            Tier::Diamond => None,
        }
    }

    /// Points still needed to reach the next tier from `points`
    pub fn points_to_next(points: u64) -> Option<u64> {
        let next = Tier::for_points(points).next()?;
        Some(next.threshold() - points)
    }

    /// Multiplier before the points bonus
    pub fn base_multiplier(&self) -> f64 {
        match self {
            Tier::Bronze => 1.0,
            Tier::Silver => 1.1,
            Tier::Gold => 1.25,
            Tier::Platinum => 1.5,
            Tier::Diamond => 2.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Bronze => "bronze",
            Tier::Silver => "silver",
            Tier::Gold => "gold",
            Tier::Platinum => "platinum",
            Tier::Diamond => "diamond",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tier for a points total
pub fn compute_tier(total_points: u64) -> Tier {
    Tier::for_points(total_points)
}

/// Multiplicative boost: tier base plus a points bonus capped at
/// [`MAX_POINTS_BONUS`]
pub fn boost_multiplier(tier: Tier, total_points: u64) -> f64 {
    let bonus = (total_points as f64 / BONUS_POINTS_SCALE).min(MAX_POINTS_BONUS);
    tier.base_multiplier() + bonus
}
