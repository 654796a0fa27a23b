//! Conversion kinds and events

use std::fmt;

use agora_core::{RelationshipId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// What a referred user did to earn their referrer points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    Signup,
    ProductListing,
    MonthlyActivity,
    SuccessfulSale,
    FirstPurchase,
    SubscriptionPurchase,
}

impl ConversionKind {
    pub const ALL: [ConversionKind; 6] = [
        ConversionKind::Signup,
        ConversionKind::ProductListing,
        ConversionKind::MonthlyActivity,
        ConversionKind::SuccessfulSale,
        ConversionKind::FirstPurchase,
        ConversionKind::SubscriptionPurchase,
    ];

    /// Points credited to the referrer
    pub fn points(&self) -> u64 {
        match self {
            ConversionKind::Signup => 10,
            ConversionKind::ProductListing => 20,
            ConversionKind::MonthlyActivity => 30,
            ConversionKind::SuccessfulSale => 50,
            ConversionKind::FirstPurchase => 75,
            ConversionKind::SubscriptionPurchase => 100,
        }
    }

    /// Whether the kind may be awarded more than once per relationship
    pub fn is_repeatable(&self) -> bool {
        matches!(self, ConversionKind::MonthlyActivity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionKind::Signup => "signup",
            ConversionKind::ProductListing => "product_listing",
            ConversionKind::MonthlyActivity => "monthly_activity",
            ConversionKind::SuccessfulSale => "successful_sale",
            ConversionKind::FirstPurchase => "first_purchase",
            ConversionKind::SubscriptionPurchase => "subscription_purchase",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded points award
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionEvent {
    pub id: Uuid,
    pub relationship_id: RelationshipId,
    /// The referrer credited with the points
    pub account_id: UserId,
    pub kind: ConversionKind,
    pub points_awarded: u64,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl ConversionEvent {
    pub fn new(
        relationship_id: RelationshipId,
        account_id: UserId,
        kind: ConversionKind,
        metadata: Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            relationship_id,
            account_id,
            kind,
            points_awarded: kind.points(),
            metadata,
            created_at,
        }
    }
}
