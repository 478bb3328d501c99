//! Status transitions shared by orders and bookings.

use crate::{
    entities::Status,
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Result of a successful status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange<Id> {
    /// Id of the changed row
    pub id: Id,
    /// Status before the change
    pub previous_status: Status,
    /// Status after the change
    pub new_status: Status,
    /// New `updated_at` of the row
    pub updated_at: DateTime<Utc>,
}

/// Checks `from -> to` against [`Status::can_transition_to`].
///
/// # Errors
/// Returns [`Error::InvalidStatusTransition`] when the move is not allowed.
pub fn check_transition(from: Status, to: Status) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(Error::InvalidStatusTransition {
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_transition_reports_both_ends() {
        assert!(check_transition(Status::Pending, Status::Confirmed).is_ok());

        match check_transition(Status::Cancelled, Status::Confirmed) {
            Err(Error::InvalidStatusTransition { from, to }) => {
                assert_eq!(from, "cancelled");
                assert_eq!(to, "confirmed");
            }
            other => panic!("expected transition error, got {other:?}"),
        }
    }
}
