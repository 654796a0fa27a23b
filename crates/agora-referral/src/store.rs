//! Remote source of truth for referral data
//!
//! The engine treats every call here as a network round trip that may fail.
//! [`InMemoryReferralStore`] stands in for the backend in tests and
//! simulation, with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use agora_core::{RelationshipId, StorageError, UserId};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use crate::account::ReferralAccount;
use crate::conversion::ConversionEvent;
use crate::relationship::ReferralRelationship;

/// Referral persistence contract
#[async_trait]
pub trait ReferralStore: Send + Sync {
    async fn account(&self, user_id: &UserId) -> Result<Option<ReferralAccount>, StorageError>;

    /// Accounts for several users; users without an account are omitted
    async fn accounts(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, ReferralAccount>, StorageError>;

    async fn relationship(
        &self,
        id: &RelationshipId,
    ) -> Result<Option<ReferralRelationship>, StorageError>;

    /// The relationship in which `user_id` is the referred party
    async fn relationship_for_referred(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ReferralRelationship>, StorageError>;

    async fn insert_relationship(&self, relationship: &ReferralRelationship)
    -> Result<(), StorageError>;

    /// Every conversion recorded for a relationship, oldest first
    async fn conversions(&self, id: &RelationshipId) -> Result<Vec<ConversionEvent>, StorageError>;

    /// Write a conversion and the credited account as one unit
    async fn record_award(
        &self,
        event: &ConversionEvent,
        account: &ReferralAccount,
    ) -> Result<(), StorageError>;

    async fn code_for(&self, user_id: &UserId) -> Result<Option<String>, StorageError>;

    async fn code_owner(&self, code: &str) -> Result<Option<UserId>, StorageError>;

    /// Assign `code` to `user_id`; fails if the code is taken
    async fn assign_code(&self, user_id: &UserId, code: &str) -> Result<(), StorageError>;
}

/// In-memory referral store with fault injection
#[derive(Debug, Default)]
pub struct InMemoryReferralStore {
    accounts: DashMap<UserId, ReferralAccount>,
    relationships: DashMap<RelationshipId, ReferralRelationship>,
    referred_index: DashMap<UserId, RelationshipId>,
    conversions: DashMap<RelationshipId, Vec<ConversionEvent>>,
    codes: DashMap<String, UserId>,
    codes_by_user: DashMap<UserId, String>,
    /// Number of upcoming calls that should fail
    fail_next: AtomicU32,
    unavailable: AtomicBool,
}

impl InMemoryReferralStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make every call fail until cleared
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total conversions stored across all relationships
    pub fn conversion_count(&self) -> usize {
        self.conversions.iter().map(|entry| entry.value().len()).sum()
    }

    fn check(&self, op: &str) -> Result<(), StorageError> {
        trace!(op, "Referral store call");
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(format!("{}: backend unreachable", op)));
        }
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::unavailable(format!("{}: injected failure", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ReferralStore for InMemoryReferralStore {
    async fn account(&self, user_id: &UserId) -> Result<Option<ReferralAccount>, StorageError> {
        self.check("account")?;
        Ok(self.accounts.get(user_id).map(|a| a.value().clone()))
    }

    async fn accounts(
        &self,
        user_ids: &[UserId],
    ) -> Result<HashMap<UserId, ReferralAccount>, StorageError> {
        self.check("accounts")?;
        Ok(user_ids
            .iter()
            .filter_map(|id| self.accounts.get(id).map(|a| (id.clone(), a.value().clone())))
            .collect())
    }

    async fn relationship(
        &self,
        id: &RelationshipId,
    ) -> Result<Option<ReferralRelationship>, StorageError> {
        self.check("relationship")?;
        Ok(self.relationships.get(id).map(|r| r.value().clone()))
    }

    async fn relationship_for_referred(
        &self,
        user_id: &UserId,
    ) -> Result<Option<ReferralRelationship>, StorageError> {
        self.check("relationship_for_referred")?;
        Ok(self
            .referred_index
            .get(user_id)
            .and_then(|id| self.relationships.get(id.value()).map(|r| r.value().clone())))
    }

    async fn insert_relationship(
        &self,
        relationship: &ReferralRelationship,
    ) -> Result<(), StorageError> {
        self.check("insert_relationship")?;
        self.referred_index
            .insert(relationship.referred_id.clone(), relationship.id.clone());
        self.relationships
            .insert(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    async fn conversions(&self, id: &RelationshipId) -> Result<Vec<ConversionEvent>, StorageError> {
        self.check("conversions")?;
        Ok(self
            .conversions
            .get(id)
            .map(|events| events.value().clone())
            .unwrap_or_default())
    }

    async fn record_award(
        &self,
        event: &ConversionEvent,
        account: &ReferralAccount,
    ) -> Result<(), StorageError> {
        self.check("record_award")?;
        self.conversions
            .entry(event.relationship_id.clone())
            .or_default()
            .push(event.clone());
        self.accounts.insert(account.user_id().clone(), account.clone());
        Ok(())
    }

    async fn code_for(&self, user_id: &UserId) -> Result<Option<String>, StorageError> {
        self.check("code_for")?;
        Ok(self.codes_by_user.get(user_id).map(|c| c.value().clone()))
    }

    async fn code_owner(&self, code: &str) -> Result<Option<UserId>, StorageError> {
        self.check("code_owner")?;
        Ok(self.codes.get(code).map(|u| u.value().clone()))
    }

    async fn assign_code(&self, user_id: &UserId, code: &str) -> Result<(), StorageError> {
        self.check("assign_code")?;
        match self.codes.entry(code.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StorageError::unavailable(format!("code {} already assigned", code)))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user_id.clone());
                self.codes_by_user.insert(user_id.clone(), code.to_string());
                Ok(())
            }
        }
    }
}
