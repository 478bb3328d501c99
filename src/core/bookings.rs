//! Booking business logic.
//!
//! Confirmed bookings go through the capacity guard inside the transaction that
//! writes them; pending bookings hold no capacity and are admitted when they are
//! later confirmed.

use crate::{
    config::CapacityConfig,
    core::{
        capacity::{self, Admission, CapacityRejection},
        lifecycle::{StatusChange, check_transition},
        money,
        reconcile::{self, DesiredChild, ReconcileSummary},
    },
    entities::{Booking, BookingPackage, Order, Status, booking, booking_package},
    errors::{Error, Result},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::{NotSet, Unchanged},
    DatabaseTransaction, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, instrument};

/// A booking package as submitted by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPackageLine {
    /// Catalogue package reference
    pub package_id: String,
    /// Display name
    pub package_name: String,
    /// Units booked
    pub quantity: i32,
    /// Travellers covered by this package
    pub no_of_pax: i32,
    /// Price per unit, in cents
    pub unit_price_cents: i64,
}

impl BookingPackageLine {
    fn validate(&self) -> Result<()> {
        if self.package_id.trim().is_empty() {
            return Err(Error::validation("package id cannot be empty"));
        }
        if self.no_of_pax < 0 {
            return Err(Error::validation(format!(
                "package pax cannot be negative, got {}",
                self.no_of_pax
            )));
        }
        money::validate_quantity(self.quantity)?;
        money::line_total_cents(self.unit_price_cents, self.quantity)?;
        Ok(())
    }

    fn into_active_model(self, booking_id: i64) -> Result<booking_package::ActiveModel> {
        let line_total_cents = money::line_total_cents(self.unit_price_cents, self.quantity)?;
        Ok(booking_package::ActiveModel {
            id: NotSet,
            booking_id: Set(booking_id),
            package_id: Set(self.package_id),
            package_name: Set(self.package_name),
            quantity: Set(self.quantity),
            no_of_pax: Set(self.no_of_pax),
            unit_price_cents: Set(self.unit_price_cents),
            line_total_cents: Set(line_total_cents),
        })
    }
}

/// Input of [`create_booking`].
#[derive(Debug, Clone)]
pub struct NewBooking {
    /// Order to book against
    pub order_id: String,
    /// Trip date
    pub booking_date: NaiveDate,
    /// Travellers, at least one
    pub pax_count: i32,
    /// Initial status, `pending` or `confirmed`
    pub status: Status,
    /// Optional packages
    pub packages: Vec<BookingPackageLine>,
}

/// Booking package as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingPackageView {
    /// Persisted id
    pub id: i64,
    /// Catalogue package reference
    pub package_id: String,
    /// Display name
    pub package_name: String,
    /// Units booked
    pub quantity: i32,
    /// Travellers covered
    pub no_of_pax: i32,
    /// Price per unit
    pub unit_price: Decimal,
    /// `unit_price * quantity`
    pub line_total: Decimal,
}

impl From<booking_package::Model> for BookingPackageView {
    fn from(model: booking_package::Model) -> Self {
        Self {
            id: model.id,
            package_id: model.package_id,
            package_name: model.package_name,
            quantity: model.quantity,
            no_of_pax: model.no_of_pax,
            unit_price: money::from_cents(model.unit_price_cents),
            line_total: money::from_cents(model.line_total_cents),
        }
    }
}

/// Booking with its packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    /// Booking id
    pub id: i64,
    /// Order booked against
    pub order_id: String,
    /// Trip date
    pub booking_date: NaiveDate,
    /// Travellers
    pub pax_count: i32,
    /// Lifecycle status
    pub status: Status,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Packages ordered by id
    pub packages: Vec<BookingPackageView>,
}

impl BookingView {
    fn project(booking: booking::Model, mut packages: Vec<booking_package::Model>) -> Self {
        packages.sort_by_key(|p| p.id);
        Self {
            id: booking.id,
            order_id: booking.order_id,
            booking_date: booking.booking_date,
            pax_count: booking.pax_count,
            status: booking.status,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }
}

/// Booking row joined with a summary of its order, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSummary {
    /// Booking id
    pub id: i64,
    /// Order booked against
    pub order_id: String,
    /// Trip date
    pub booking_date: NaiveDate,
    /// Travellers
    pub pax_count: i32,
    /// Lifecycle status
    pub status: Status,
    /// Customer of the order
    pub customer_name: Option<String>,
    /// Reference number of the order
    pub reference_number: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Result of [`create_booking`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingOutcome {
    /// Booking persisted
    Created(BookingView),
    /// Not enough capacity; nothing was written
    Rejected(CapacityRejection),
}

/// Result of [`set_booking_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingStatusOutcome {
    /// Status changed
    Changed(StatusChange<i64>),
    /// Confirming would exceed the date's capacity; status left as it was
    Rejected(CapacityRejection),
}

fn validate_new_booking(new_booking: &NewBooking) -> Result<()> {
    if new_booking.order_id.trim().is_empty() {
        return Err(Error::validation("order id cannot be empty"));
    }
    if new_booking.pax_count < 1 {
        return Err(Error::validation(format!(
            "pax count must be at least 1, got {}",
            new_booking.pax_count
        )));
    }
    if !matches!(new_booking.status, Status::Pending | Status::Confirmed) {
        return Err(Error::validation(format!(
            "a booking cannot be created as {}",
            new_booking.status
        )));
    }
    for line in &new_booking.packages {
        line.validate()?;
    }
    Ok(())
}

/// Creates a booking and its packages.
///
/// A confirmed booking is admitted against the date's ceiling in the same
/// transaction that inserts it; if it does not fit the transaction is rolled
/// back and the rejection returned. An unknown order is reported ahead of any
/// capacity rejection.
///
/// # Errors
/// - [`Error::Validation`] / [`Error::InvalidAmount`] for bad input
/// - [`Error::InvalidOrderReference`] if the order does not exist
#[instrument(skip(db, new_booking), fields(order_id = %new_booking.order_id, date = %new_booking.booking_date))]
pub async fn create_booking(
    db: &DatabaseConnection,
    capacity: CapacityConfig,
    new_booking: NewBooking,
) -> Result<BookingOutcome> {
    validate_new_booking(&new_booking)?;

    let txn = db.begin().await?;

    // The date lock must be this transaction's first statement: SQLite only
    // waits out a busy write lock for a transaction that holds no read lock yet.
    let admission = if new_booking.status == Status::Confirmed {
        let admission = capacity::try_admit(
            &txn,
            capacity,
            new_booking.booking_date,
            new_booking.pax_count,
        )
        .await?;
        Some(admission)
    } else {
        None
    };

    let order_exists = Order::find_by_id(new_booking.order_id.as_str())
        .count(&txn)
        .await?
        > 0;
    if !order_exists {
        return Err(Error::InvalidOrderReference {
            id: new_booking.order_id,
        });
    }
    if let Some(Admission::Rejected(rejection)) = admission {
        return Ok(BookingOutcome::Rejected(rejection));
    }

    let now = Utc::now();
    let booking = booking::ActiveModel {
        id: NotSet,
        order_id: Set(new_booking.order_id),
        booking_date: Set(new_booking.booking_date),
        pax_count: Set(new_booking.pax_count),
        status: Set(new_booking.status),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&txn)
    .await?;

    let mut packages = Vec::with_capacity(new_booking.packages.len());
    for line in new_booking.packages {
        packages.push(line.into_active_model(booking.id)?.insert(&txn).await?);
    }
    txn.commit().await?;

    info!(
        booking_id = booking.id,
        pax = booking.pax_count,
        status = %booking.status,
        "Booking created"
    );
    Ok(BookingOutcome::Created(BookingView::project(booking, packages)))
}

/// Finds a booking with its packages.
pub async fn get_booking(db: &DatabaseConnection, booking_id: i64) -> Result<Option<BookingView>> {
    let found = Booking::find_by_id(booking_id)
        .find_with_related(BookingPackage)
        .all(db)
        .await?;

    Ok(found
        .into_iter()
        .next()
        .map(|(booking, packages)| BookingView::project(booking, packages)))
}

/// Lists bookings between `start` and `end` (inclusive, each optional), with
/// the customer and reference of their order.
pub async fn list_bookings(
    db: &DatabaseConnection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<BookingSummary>> {
    if let (Some(start), Some(end)) = (start, end) {
        if end < start {
            return Err(Error::validation(format!(
                "end date {end} is before start date {start}"
            )));
        }
    }

    let mut query = Booking::find();
    if let Some(start) = start {
        query = query.filter(booking::Column::BookingDate.gte(start));
    }
    if let Some(end) = end {
        query = query.filter(booking::Column::BookingDate.lte(end));
    }

    let rows = query
        .order_by_asc(booking::Column::BookingDate)
        .order_by_asc(booking::Column::Id)
        .find_also_related(Order)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(booking, order)| BookingSummary {
            id: booking.id,
            order_id: booking.order_id,
            booking_date: booking.booking_date,
            pax_count: booking.pax_count,
            status: booking.status,
            customer_name: order.as_ref().map(|o| o.customer_name.clone()),
            reference_number: order.and_then(|o| o.reference_number),
            created_at: booking.created_at,
        })
        .collect())
}

/// Deletes a booking and its packages.
#[instrument(skip(db))]
pub async fn delete_booking(db: &DatabaseConnection, booking_id: i64) -> Result<()> {
    let txn = db.begin().await?;

    let booking = Booking::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or(Error::BookingNotFound { id: booking_id })?;

    let packages_deleted = BookingPackage::delete_many()
        .filter(booking_package::Column::BookingId.eq(booking_id))
        .exec(&txn)
        .await?
        .rows_affected;

    booking.delete(&txn).await?;
    txn.commit().await?;

    info!(booking_id, packages_deleted, "Booking deleted");
    Ok(())
}

/// Moves a booking to `status`.
///
/// Entering `confirmed` from another status runs the capacity guard for the
/// booking's date and pax; a rejection leaves the booking untouched.
#[instrument(skip(db))]
pub async fn set_booking_status(
    db: &DatabaseConnection,
    capacity: CapacityConfig,
    booking_id: i64,
    status: Status,
) -> Result<BookingStatusOutcome> {
    let txn = db.begin().await?;
    let now = Utc::now();

    // Write before reading, like `create_booking`: touching the row takes the
    // write lock before the date lock is needed.
    let touched = Booking::update_many()
        .col_expr(booking::Column::UpdatedAt, Expr::value(now))
        .filter(booking::Column::Id.eq(booking_id))
        .exec(&txn)
        .await?;
    if touched.rows_affected == 0 {
        return Err(Error::BookingNotFound { id: booking_id });
    }

    let persisted = Booking::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or(Error::BookingNotFound { id: booking_id })?;

    let previous_status = persisted.status;
    check_transition(previous_status, status)?;

    if status == Status::Confirmed && previous_status != Status::Confirmed {
        let admission =
            capacity::try_admit(&txn, capacity, persisted.booking_date, persisted.pax_count)
                .await?;
        if let Admission::Rejected(rejection) = admission {
            return Ok(BookingStatusOutcome::Rejected(rejection));
        }
    }

    let mut active: booking::ActiveModel = persisted.into();
    active.status = Set(status);
    active.updated_at = Set(now);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!(booking_id, from = %previous_status, to = %status, "Booking status changed");
    Ok(BookingStatusOutcome::Changed(StatusChange {
        id: updated.id,
        previous_status,
        new_status: updated.status,
        updated_at: updated.updated_at,
    }))
}

/// Reconciles a booking's packages against `desired` and refreshes the
/// booking's `updated_at`, in one transaction.
#[instrument(skip(db, desired))]
pub async fn replace_booking_packages(
    db: &DatabaseConnection,
    booking_id: i64,
    desired: Vec<DesiredChild<BookingPackageLine>>,
) -> Result<ReconcileSummary> {
    for child in &desired {
        match child {
            DesiredChild::New(line) | DesiredChild::Existing { data: line, .. } => {
                line.validate()?;
            }
        }
    }

    let txn = db.begin().await?;

    let persisted = Booking::find_by_id(booking_id)
        .one(&txn)
        .await?
        .ok_or(Error::BookingNotFound { id: booking_id })?;

    let summary = apply_package_plan(&txn, booking_id, desired).await?;

    let mut active: booking::ActiveModel = persisted.into();
    active.updated_at = Set(Utc::now());
    active.update(&txn).await?;
    txn.commit().await?;

    info!(
        booking_id,
        added = summary.added,
        updated = summary.updated,
        deleted = summary.deleted,
        "Booking packages replaced"
    );
    Ok(summary)
}

async fn apply_package_plan(
    txn: &DatabaseTransaction,
    booking_id: i64,
    desired: Vec<DesiredChild<BookingPackageLine>>,
) -> Result<ReconcileSummary> {
    let persisted_ids: Vec<i64> = BookingPackage::find()
        .select_only()
        .column(booking_package::Column::Id)
        .filter(booking_package::Column::BookingId.eq(booking_id))
        .into_tuple()
        .all(txn)
        .await?;

    let plan = reconcile::plan(persisted_ids, desired)?;
    let summary = ReconcileSummary::from(&plan);
    if plan.is_empty() {
        return Ok(summary);
    }

    if !plan.to_delete.is_empty() {
        BookingPackage::delete_many()
            .filter(booking_package::Column::BookingId.eq(booking_id))
            .filter(booking_package::Column::Id.is_in(plan.to_delete))
            .exec(txn)
            .await?;
    }

    for (id, line) in plan.to_update {
        let mut row = line.into_active_model(booking_id)?;
        row.id = Unchanged(id);
        row.update(txn).await?;
    }

    for line in plan.to_insert {
        line.into_active_model(booking_id)?.insert(txn).await?;
    }

    debug!(booking_id, ?summary, "Booking packages reconciled");
    Ok(summary)
}
