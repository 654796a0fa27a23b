//! Recurrence policy for repeatable conversions

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::conversion::ConversionEvent;

/// How often a repeatable conversion may be awarded per relationship
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatPolicy {
    /// Every call awards points
    Unconstrained,
    /// At most once per UTC calendar month
    #[default]
    OncePerCalendarMonth,
}

impl RepeatPolicy {
    /// The prior award that blocks a new one at `now`, if any
    pub fn blocking_award<'a>(
        &self,
        prior: &'a [ConversionEvent],
        now: DateTime<Utc>,
    ) -> Option<&'a ConversionEvent> {
        match self {
            RepeatPolicy::Unconstrained => None,
            RepeatPolicy::OncePerCalendarMonth => prior.iter().find(|event| {
                event.created_at.year() == now.year() && event.created_at.month() == now.month()
            }),
        }
    }
}
