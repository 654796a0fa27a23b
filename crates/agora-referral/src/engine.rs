//! The points accounting engine

use std::collections::HashMap;
use std::sync::Arc;

use agora_core::{Clock, LookupError, PointsLookup, RelationshipId, SystemClock, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::account::ReferralAccount;
use crate::conversion::{ConversionEvent, ConversionKind};
use crate::error::{ReferralError, ReferralResult};
use crate::policy::RepeatPolicy;
use crate::relationship::{ReferralRelationship, generate_code, normalize_code};
use crate::store::ReferralStore;
use crate::tier::{Tier, boost_multiplier, compute_tier};

/// Attempts at drawing an unused referral code before giving up
const CODE_ATTEMPTS: usize = 8;

/// Outcome of [`PointsAccountingEngine::award_points`]
#[derive(Debug, Clone, PartialEq)]
pub enum Award {
    /// A new conversion was recorded and points were credited
    Created(ConversionEvent),
    /// An earlier conversion already covers this award; nothing changed
    Existing(ConversionEvent),
}

impl Award {
    pub fn event(&self) -> &ConversionEvent {
        match self {
            Award::Created(event) | Award::Existing(event) => event,
        }
    }

    pub fn into_event(self) -> ConversionEvent {
        match self {
            Award::Created(event) | Award::Existing(event) => event,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Award::Created(_))
    }
}

/// Idempotent points awarding with a local account cache
///
/// The store is the source of truth. The local cache is only written after
/// the store accepted the change, so a failed call leaves local state as it
/// was and can simply be retried.
pub struct PointsAccountingEngine {
    store: Arc<dyn ReferralStore>,
    clock: Arc<dyn Clock>,
    repeat_policy: RepeatPolicy,
    accounts: DashMap<UserId, ReferralAccount>,
    /// Serializes read-check-write sequences (awards and code assignment)
    write_lock: Mutex<()>,
}

impl PointsAccountingEngine {
    pub fn new(store: Arc<dyn ReferralStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            repeat_policy: RepeatPolicy::default(),
            accounts: DashMap::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_repeat_policy(mut self, repeat_policy: RepeatPolicy) -> Self {
        self.repeat_policy = repeat_policy;
        self
    }

    pub fn repeat_policy(&self) -> RepeatPolicy {
        self.repeat_policy
    }

    /// Award the referrer of `relationship_id` for a conversion of `kind`
    ///
    /// Non-repeatable kinds are awarded at most once per relationship; a
    /// repeated call returns the original event. The repeatable kind is
    /// limited by the configured [`RepeatPolicy`].
    #[instrument(skip_all, fields(relationship = %relationship_id, kind = %kind))]
    pub async fn award_points(
        &self,
        relationship_id: &RelationshipId,
        kind: ConversionKind,
        metadata: Value,
    ) -> ReferralResult<Award> {
        let _guard = self.write_lock.lock().await;

        let relationship = self
            .store
            .relationship(relationship_id)
            .await?
            .ok_or_else(|| ReferralError::NotFound(relationship_id.clone()))?;

        let prior: Vec<ConversionEvent> = self
            .store
            .conversions(relationship_id)
            .await?
            .into_iter()
            .filter(|event| event.kind == kind)
            .collect();
        let now = self.clock.now_utc();

        let blocking = if kind.is_repeatable() {
            self.repeat_policy.blocking_award(&prior, now)
        } else {
            prior.first()
        };
        if let Some(existing) = blocking {
            debug!(event_id = %existing.id, "Duplicate award absorbed");
            return Ok(Award::Existing(existing.clone()));
        }

        let referrer = relationship.referrer_id;
        let mut account = self
            .store
            .account(&referrer)
            .await?
            .unwrap_or_else(|| ReferralAccount::new(referrer.clone()));
        let previous_tier = account.tier();
        account.credit(kind.points());

        let event = ConversionEvent::new(relationship_id.clone(), referrer.clone(), kind, metadata, now);
        self.store.record_award(&event, &account).await?;

        if account.tier() != previous_tier {
            info!(user = %referrer, from = %previous_tier, to = %account.tier(), "Tier changed");
        }
        debug!(
            user = %referrer,
            points = event.points_awarded,
            total = account.total_points(),
            "Points awarded"
        );
        self.accounts.insert(referrer, account);
        Ok(Award::Created(event))
    }

    /// Stable referral code for `user_id`, created on first request
    pub async fn referral_code_for(&self, user_id: &UserId) -> ReferralResult<String> {
        let _guard = self.write_lock.lock().await;

        if let Some(code) = self.store.code_for(user_id).await? {
            return Ok(code);
        }

        let mut last_error = None;
        for _ in 0..CODE_ATTEMPTS {
            let code = generate_code(&mut rand::rng());
            if self.store.code_owner(&code).await?.is_some() {
                continue;
            }
            match self.store.assign_code(user_id, &code).await {
                Ok(()) => {
                    debug!(user = %user_id, "Referral code assigned");
                    return Ok(code);
                }
                Err(e) => last_error = Some(e),
            }
        }
        Err(ReferralError::Store(last_error.unwrap_or_else(|| {
            agora_core::StorageError::unavailable("no free referral code found")
        })))
    }

    /// Link `referred` to the owner of `code`
    #[instrument(skip(self))]
    pub async fn register_referral(
        &self,
        code: &str,
        referred: &UserId,
    ) -> ReferralResult<ReferralRelationship> {
        let code = normalize_code(code).ok_or_else(|| ReferralError::InvalidCode(code.to_string()))?;

        let _guard = self.write_lock.lock().await;
        let referrer = self
            .store
            .code_owner(&code)
            .await?
            .ok_or_else(|| ReferralError::InvalidCode(code.clone()))?;
        if &referrer == referred {
            return Err(ReferralError::SelfReferral);
        }
        if self.store.relationship_for_referred(referred).await?.is_some() {
            return Err(ReferralError::AlreadyReferred(referred.clone()));
        }

        let relationship =
            ReferralRelationship::new(referrer, referred.clone(), code, self.clock.now_utc());
        self.store.insert_relationship(&relationship).await?;
        info!(
            relationship = %relationship.id,
            referrer = %relationship.referrer_id,
            "Referral registered"
        );
        Ok(relationship)
    }

    /// Current account from the store, refreshing the local cache
    ///
    /// Users who were never credited get an empty Bronze account.
    pub async fn account(&self, user_id: &UserId) -> ReferralResult<ReferralAccount> {
        let account = self
            .store
            .account(user_id)
            .await?
            .unwrap_or_else(|| ReferralAccount::new(user_id.clone()));
        self.accounts.insert(user_id.clone(), account.clone());
        Ok(account)
    }

    /// Locally cached account, without a round trip
    pub fn cached_account(&self, user_id: &UserId) -> Option<ReferralAccount> {
        self.accounts.get(user_id).map(|a| a.value().clone())
    }

    pub async fn conversions(
        &self,
        relationship_id: &RelationshipId,
    ) -> ReferralResult<Vec<ConversionEvent>> {
        Ok(self.store.conversions(relationship_id).await?)
    }

    pub fn compute_tier(&self, total_points: u64) -> Tier {
        compute_tier(total_points)
    }

    pub fn boost_multiplier(&self, tier: Tier, total_points: u64) -> f64 {
        boost_multiplier(tier, total_points)
    }
}

#[async_trait]
impl PointsLookup for PointsAccountingEngine {
    async fn points_for_users(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, u64>, LookupError> {
        let accounts = self.store.accounts(user_ids).await.map_err(|e| {
            warn!(users = user_ids.len(), error = %e, "Points lookup failed");
            LookupError::Network(e.to_string())
        })?;

        let mut points = HashMap::with_capacity(user_ids.len());
        for id in user_ids {
            let total = accounts.get(id).map(|a| a.total_points()).unwrap_or(0);
            points.insert(id.clone(), total);
        }
        for (id, account) in accounts {
            self.accounts.insert(id, account);
        }
        Ok(points)
    }
}
