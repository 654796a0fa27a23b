//! # Agora Referral
//!
//! Referral relationships, idempotent points awards, and the tiers derived
//! from them.
//!
//! ## Key Types
//!
//! - [`PointsAccountingEngine`]: Awards points, assigns codes, registers
//!   referrals; doubles as the ranking engine's points lookup
//! - [`ReferralStore`]: The remote source of truth
//! - [`Tier`]: Bronze through Diamond, a pure function of total points
//! - [`ConversionKind`]: What earned the points, and how many
//! - [`RepeatPolicy`]: How often the repeatable kind may be awarded
//!
//! ## Idempotence
//!
//! Every conversion kind except [`ConversionKind::MonthlyActivity`] is
//! awarded at most once per relationship. Repeated or concurrent calls
//! return the first event and credit nothing.

pub mod account;
pub mod conversion;
pub mod engine;
pub mod error;
pub mod policy;
pub mod relationship;
pub mod store;
pub mod tier;

pub use account::ReferralAccount;
pub use conversion::{ConversionEvent, ConversionKind};
pub use engine::{Award, PointsAccountingEngine};
pub use error::{ReferralError, ReferralResult};
pub use policy::RepeatPolicy;
pub use relationship::{CODE_LENGTH, ReferralRelationship, generate_code, normalize_code};
pub use store::{InMemoryReferralStore, ReferralStore};
pub use tier::{Tier, boost_multiplier, compute_tier};
