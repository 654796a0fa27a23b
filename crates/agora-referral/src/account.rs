//! Referral accounts

use agora_core::UserId;
use serde::{Deserialize, Serialize};

use crate::tier::{Tier, boost_multiplier};

/// A referrer's points balance
///
/// Fields are private so the tier can only change together with the points
/// it derives from. A stored tier is never trusted on the way in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AccountRecord", into = "AccountRecord")]
pub struct ReferralAccount {
    user_id: UserId,
    total_points: u64,
    lifetime_points: u64,
    tier: Tier,
}

/// Wire shape of an account
#[derive(Serialize, Deserialize)]
struct AccountRecord {
    user_id: UserId,
    total_points: u64,
    lifetime_points: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tier: Option<Tier>,
}

impl From<AccountRecord> for ReferralAccount {
    fn from(record: AccountRecord) -> Self {
        Self {
            user_id: record.user_id,
            total_points: record.total_points,
            lifetime_points: record.lifetime_points,
            tier: Tier::for_points(record.total_points),
        }
    }
}

impl From<ReferralAccount> for AccountRecord {
    fn from(account: ReferralAccount) -> Self {
        Self {
            user_id: account.user_id,
            total_points: account.total_points,
            lifetime_points: account.lifetime_points,
            tier: Some(account.tier),
        }
    }
}

impl ReferralAccount {
    /// A fresh Bronze account with no points
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_points: 0,
            lifetime_points: 0,
            tier: Tier::Bronze,
        }
    }

    /// Add points to both balances and recompute the tier
    pub fn credit(&mut self, points: u64) {
        self.total_points = self.total_points.saturating_add(points);
        self.lifetime_points = self.lifetime_points.saturating_add(points);
        self.tier = Tier::for_points(self.total_points);
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn total_points(&self) -> u64 {
        self.total_points
    }

    /// Points ever credited; never decreases
    pub fn lifetime_points(&self) -> u64 {
        self.lifetime_points
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn boost_multiplier(&self) -> f64 {
        boost_multiplier(self.tier, self.total_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_recomputes_tier() {
        let mut account = ReferralAccount::new(UserId::from("u1"));
        assert_eq!(account.tier(), Tier::Bronze);

        account.credit(75);
        assert_eq!(account.tier(), Tier::Bronze);
        account.credit(25);
        assert_eq!(account.tier(), Tier::Silver);
        assert_eq!(account.total_points(), 100);
        assert_eq!(account.lifetime_points(), 100);
    }

    #[test]
    fn test_stored_tier_is_recomputed_on_load() {
        let account: ReferralAccount = serde_json::from_str(
            r#"{"user_id":"u1","total_points":5000,"lifetime_points":5000,"tier":"bronze"}"#,
        )
        .unwrap();
        assert_eq!(account.tier(), Tier::Diamond);
        assert_eq!(account.tier(), Tier::for_points(account.total_points()));

        let without_tier: ReferralAccount =
            serde_json::from_str(r#"{"user_id":"u2","total_points":120,"lifetime_points":300}"#)
                .unwrap();
        assert_eq!(without_tier.tier(), Tier::Silver);

        let value = serde_json::to_value(&account).unwrap();
        assert_eq!(value["tier"], "diamond");
    }
}
