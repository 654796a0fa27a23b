//! Referral relationships and codes

use agora_core::{RelationshipId, UserId};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Length of a referral code
pub const CODE_LENGTH: usize = 8;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// A referrer/referred pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralRelationship {
    pub id: RelationshipId,
    pub referrer_id: UserId,
    pub referred_id: UserId,
    /// The code the referred user redeemed
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl ReferralRelationship {
    pub fn new(
        referrer_id: UserId,
        referred_id: UserId,
        code: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: RelationshipId::new(uuid::Uuid::new_v4().to_string()),
            referrer_id,
            referred_id,
            code: code.into(),
            created_at,
        }
    }
}

/// Generate a random uppercase alphanumeric code
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..CODE_LENGTH)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Canonical form of a user-entered code, or `None` if it cannot be a code
pub fn normalize_code(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_uppercase();
    let well_formed =
        code.len() == CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b));
    well_formed.then_some(code)
}
