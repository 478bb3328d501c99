//! Lifecycle status shared by orders and bookings.
//!
//! Stored as a short lowercase string. Unknown values are rejected at the
//! boundary instead of being persisted verbatim.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of an order or a booking
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Created but not yet confirmed; a pending booking holds no capacity
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Confirmed; a confirmed booking consumes capacity on its date
    #[sea_orm(string_value = "confirmed")]
    Confirmed,
    /// Trip took place
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Cancelled; frees any capacity held
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl Status {
    /// Lowercase wire/storage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Whether the transition table allows moving from `self` to `next`.
    ///
    /// Re-applying the current status is always allowed. `completed` and
    /// `cancelled` are terminal.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Pending | Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Confirmed | Self::Completed | Self::Cancelled)
                | (Self::Completed, Self::Completed)
                | (Self::Cancelled, Self::Cancelled)
        )
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
