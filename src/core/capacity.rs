//! Capacity admission guard.
//!
//! Decides whether a confirmed booking fits the daily pax ceiling. The check and
//! the booking insert that follows it must share one [`DatabaseTransaction`]:
//! [`try_admit`] first upserts the date's `booking_days` row, which write-locks
//! the date until that transaction commits or rolls back, and only then sums the
//! confirmed pax. A second admission for the same date therefore waits for the
//! first one's insert to become visible instead of reading a stale total.
//!
//! On `SQLite` the upsert takes the database write lock, so callers must make it
//! the transaction's first statement. On a server database under READ COMMITTED
//! it is a row lock on that date alone; without it, two transactions would both
//! read the same sum and both insert.

use crate::{
    config::CapacityConfig,
    entities::{Booking, BookingDay, Status, booking, booking_day},
    errors::{Error, Result},
};
use chrono::NaiveDate;
use sea_orm::{
    DatabaseTransaction, FromQueryResult, QueryOrder, QuerySelect, Set,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Diagnostic returned when a request does not fit the remaining capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityRejection {
    /// Confirmed pax already on the date
    pub current_pax: i64,
    /// Pax still available on the date
    pub remaining_capacity: i64,
    /// Pax the caller asked for
    pub requested_pax: i64,
    /// Configured ceiling
    pub max_capacity: i64,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The request fits; `remaining` is what is left once it is inserted.
    Admitted {
        /// Capacity left after the admitted pax
        remaining: i64,
    },
    /// The request does not fit. Not an error: the caller reports it and rolls back.
    Rejected(CapacityRejection),
}

/// Read-only view of one date's capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Availability {
    /// Date queried
    pub booking_date: NaiveDate,
    /// Confirmed pax on the date
    pub total_pax: i64,
    /// `max_capacity - total_pax`, never below zero
    pub remaining_capacity: i64,
    /// Configured ceiling
    pub max_capacity: i64,
}

/// Confirmed load of a single date, as returned by [`calendar`].
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyLoad {
    /// Calendar date
    pub date: NaiveDate,
    /// Sum of confirmed pax
    pub total_pax: i64,
    /// Number of confirmed bookings
    pub booking_count: i64,
}

/// Sums `pax_count` over confirmed bookings on `date`.
pub async fn confirmed_pax<C>(db: &C, date: NaiveDate) -> Result<i64>
where
    C: ConnectionTrait,
{
    let total: Option<Option<i64>> = Booking::find()
        .select_only()
        .column_as(Expr::col(booking::Column::PaxCount).sum(), "total_pax")
        .filter(booking::Column::BookingDate.eq(date))
        .filter(booking::Column::Status.eq(Status::Confirmed))
        .into_tuple()
        .one(db)
        .await?;

    Ok(total.flatten().unwrap_or(0))
}

/// Takes the per-date lock inside `txn`.
///
/// The upsert is the transaction's write on the date; concurrent admissions for
/// the same date block here until the holder finishes.
async fn lock_date(txn: &DatabaseTransaction, date: NaiveDate) -> Result<()> {
    let row = booking_day::ActiveModel {
        booking_date: Set(date),
        admissions: Set(1),
    };

    BookingDay::insert(row)
        .on_conflict(
            OnConflict::column(booking_day::Column::BookingDate)
                .value(
                    booking_day::Column::Admissions,
                    Expr::col(booking_day::Column::Admissions).add(1),
                )
                .to_owned(),
        )
        .exec_without_returning(txn)
        .await?;

    Ok(())
}

/// Decides whether `requested_pax` more confirmed pax fit on `date`.
///
/// Must be called with the same transaction that will insert (or confirm) the
/// booking. The date stays locked until that transaction ends, so the result is
/// only valid inside it.
///
/// # Errors
/// Returns [`Error::Validation`] when `requested_pax` is below one, and
/// [`Error::Database`] on store failure. Running out of capacity is
/// [`Admission::Rejected`], not an error.
#[instrument(skip(txn))]
pub async fn try_admit(
    txn: &DatabaseTransaction,
    capacity: CapacityConfig,
    date: NaiveDate,
    requested_pax: i32,
) -> Result<Admission> {
    if requested_pax < 1 {
        return Err(Error::validation(format!(
            "pax count must be at least 1, got {requested_pax}"
        )));
    }

    lock_date(txn, date).await?;

    let ceiling = capacity.ceiling();
    let requested = i64::from(requested_pax);
    let current_pax = confirmed_pax(txn, date).await?;
    let remaining = (ceiling - current_pax).max(0);

    if current_pax + requested > ceiling {
        info!(
            %date,
            current_pax,
            remaining,
            requested,
            "Admission rejected: capacity exceeded"
        );
        return Ok(Admission::Rejected(CapacityRejection {
            current_pax,
            remaining_capacity: remaining,
            requested_pax: requested,
            max_capacity: ceiling,
        }));
    }

    debug!(%date, current_pax, requested, "Admission granted");
    Ok(Admission::Admitted {
        remaining: remaining - requested,
    })
}

/// Remaining capacity for `date`, computed fresh from the store.
pub async fn availability<C>(
    db: &C,
    capacity: CapacityConfig,
    date: NaiveDate,
) -> Result<Availability>
where
    C: ConnectionTrait,
{
    let ceiling = capacity.ceiling();
    let total_pax = confirmed_pax(db, date).await?;

    Ok(Availability {
        booking_date: date,
        total_pax,
        remaining_capacity: (ceiling - total_pax).max(0),
        max_capacity: ceiling,
    })
}

/// Per-date confirmed pax and booking count between `start` and `end` inclusive.
///
/// Dates without confirmed bookings are omitted.
pub async fn calendar<C>(db: &C, start: NaiveDate, end: NaiveDate) -> Result<Vec<DailyLoad>>
where
    C: ConnectionTrait,
{
    if end < start {
        return Err(Error::validation(format!(
            "calendar end {end} is before start {start}"
        )));
    }

    Booking::find()
        .select_only()
        .column_as(booking::Column::BookingDate, "date")
        .column_as(Expr::col(booking::Column::PaxCount).sum(), "total_pax")
        .column_as(Expr::col(booking::Column::Id).count(), "booking_count")
        .filter(booking::Column::BookingDate.gte(start))
        .filter(booking::Column::BookingDate.lte(end))
        .filter(booking::Column::Status.eq(Status::Confirmed))
        .group_by(booking::Column::BookingDate)
        .order_by_asc(booking::Column::BookingDate)
        .into_model::<DailyLoad>()
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::TransactionTrait;

    const CEILING_3: CapacityConfig = CapacityConfig {
        max_pax_per_date: 3,
    };

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 2, d).unwrap()
    }

    #[tokio::test]
    async fn test_confirmed_pax_ignores_other_statuses_and_dates() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        insert_booking(&db, &order.id, day(15), 2, Status::Confirmed).await?;
        insert_booking(&db, &order.id, day(15), 5, Status::Pending).await?;
        insert_booking(&db, &order.id, day(15), 4, Status::Cancelled).await?;
        insert_booking(&db, &order.id, day(16), 1, Status::Confirmed).await?;

        assert_eq!(confirmed_pax(&db, day(15)).await?, 2);
        assert_eq!(confirmed_pax(&db, day(16)).await?, 1);
        assert_eq!(confirmed_pax(&db, day(17)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_try_admit_within_and_over_ceiling() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        let txn = db.begin().await?;
        let admission = try_admit(&txn, CEILING_3, day(15), 2).await?;
        assert_eq!(admission, Admission::Admitted { remaining: 1 });
        txn.commit().await?;
        insert_booking(&db, &order.id, day(15), 2, Status::Confirmed).await?;

        let txn = db.begin().await?;
        let admission = try_admit(&txn, CEILING_3, day(15), 2).await?;
        assert_eq!(
            admission,
            Admission::Rejected(CapacityRejection {
                current_pax: 2,
                remaining_capacity: 1,
                requested_pax: 2,
                max_capacity: 3,
            })
        );

        let admission = try_admit(&txn, CEILING_3, day(15), 1).await?;
        assert_eq!(admission, Admission::Admitted { remaining: 0 });
        Ok(())
    }

    #[tokio::test]
    async fn test_try_admit_rejects_non_positive_pax_as_validation() -> Result<()> {
        let db = setup_test_db().await?;
        let txn = db.begin().await?;

        let result = try_admit(&txn, CEILING_3, day(15), 0).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = try_admit(&txn, CEILING_3, day(15), -2).await;
        assert!(matches!(result, Err(Error::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_ceiling_comes_from_configuration() -> Result<()> {
        let db = setup_test_db().await?;
        let roomy = CapacityConfig {
            max_pax_per_date: 40,
        };

        let txn = db.begin().await?;
        let admission = try_admit(&txn, roomy, day(15), 12).await?;
        assert_eq!(admission, Admission::Admitted { remaining: 28 });
        Ok(())
    }

    #[tokio::test]
    async fn test_lock_row_counts_attempts() -> Result<()> {
        let db = setup_test_db().await?;

        for _ in 0..3 {
            let txn = db.begin().await?;
            try_admit(&txn, CEILING_3, day(20), 1).await?;
            txn.commit().await?;
        }

        let row = BookingDay::find_by_id(day(20)).one(&db).await?.unwrap();
        assert_eq!(row.admissions, 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_availability() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_booking(&db, &order.id, day(15), 2, Status::Confirmed).await?;

        let availability = availability(&db, CEILING_3, day(15)).await?;
        assert_eq!(availability.total_pax, 2);
        assert_eq!(availability.remaining_capacity, 1);
        assert_eq!(availability.max_capacity, 3);

        // Over-full dates (e.g. after lowering the ceiling) report zero remaining
        let tight = CapacityConfig {
            max_pax_per_date: 1,
        };
        let availability = super::availability(&db, tight, day(15)).await?;
        assert_eq!(availability.remaining_capacity, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_calendar_groups_confirmed_bookings_by_date() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_booking(&db, &order.id, day(3), 1, Status::Confirmed).await?;
        insert_booking(&db, &order.id, day(3), 2, Status::Confirmed).await?;
        insert_booking(&db, &order.id, day(3), 2, Status::Cancelled).await?;
        insert_booking(&db, &order.id, day(9), 1, Status::Confirmed).await?;
        insert_booking(&db, &order.id, day(28), 1, Status::Confirmed).await?;

        let loads = calendar(&db, day(1), day(10)).await?;
        assert_eq!(
            loads,
            vec![
                DailyLoad {
                    date: day(3),
                    total_pax: 3,
                    booking_count: 2,
                },
                DailyLoad {
                    date: day(9),
                    total_pax: 1,
                    booking_count: 1,
                },
            ]
        );

        assert!(calendar(&db, day(10), day(1)).await.is_err());
        Ok(())
    }
}
