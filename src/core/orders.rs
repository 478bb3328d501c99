//! Order business logic - creation, full replacement with line-item
//! reconciliation, cascading deletion, status changes and statistics.
//!
//! Every write runs in one `SeaORM` transaction: an error anywhere rolls back the
//! parent row together with all of its children.

use crate::{
    core::{
        lifecycle::{StatusChange, check_transition},
        money,
        reconcile::{self, DesiredChild, ReconcileSummary},
    },
    entities::{
        Booking, BookingPackage, Order, OrderPackage, Status, booking, booking_package, order,
        order_package,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveValue::{NotSet, Unchanged},
    DatabaseTransaction, PaginatorTrait, QueryOrder, QuerySelect, Set, TransactionTrait,
    prelude::*,
    sea_query::Expr,
};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// A line item as submitted by the caller, money already in cents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageLine {
    /// Catalogue package reference
    pub package_id: String,
    /// Display name
    pub package_name: String,
    /// Units ordered
    pub quantity: i32,
    /// Price per unit, in cents
    pub unit_price_cents: i64,
}

impl PackageLine {
    fn validate(&self) -> Result<()> {
        if self.package_id.trim().is_empty() {
            return Err(Error::validation("package id cannot be empty"));
        }
        money::validate_quantity(self.quantity)?;
        money::line_total_cents(self.unit_price_cents, self.quantity)?;
        Ok(())
    }

    fn into_active_model(self, order_id: &str) -> Result<order_package::ActiveModel> {
        let line_total_cents = money::line_total_cents(self.unit_price_cents, self.quantity)?;
        Ok(order_package::ActiveModel {
            id: NotSet,
            order_id: Set(order_id.to_owned()),
            package_id: Set(self.package_id),
            package_name: Set(self.package_name),
            quantity: Set(self.quantity),
            unit_price_cents: Set(self.unit_price_cents),
            line_total_cents: Set(line_total_cents),
        })
    }
}

/// Caller-owned order fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderFields {
    /// Booking form reference
    pub form_id: Option<String>,
    /// Merchant reference
    pub merchant_id: Option<String>,
    /// Customer display name
    pub customer_name: String,
    /// Human-facing reference number
    pub reference_number: Option<String>,
    /// Lifecycle status
    pub status: Status,
    /// Subtotal, in cents
    pub subtotal_cents: i64,
    /// Deposit paid, in cents
    pub deposit_paid_cents: i64,
    /// Balance due, in cents
    pub balance_due_cents: i64,
    /// Grand total, in cents
    pub grand_total_cents: i64,
}

impl OrderFields {
    fn validate(&self) -> Result<()> {
        if self.customer_name.trim().is_empty() {
            return Err(Error::validation("customer name cannot be empty"));
        }
        Ok(())
    }
}

/// Input of [`create_order`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    /// Order fields
    pub fields: OrderFields,
    /// Initial line items
    pub packages: Vec<PackageLine>,
}

/// Input of [`update_order`]: a full replacement of the order.
#[derive(Debug, Clone)]
pub struct OrderReplacement {
    /// New values for every caller-owned field
    pub fields: OrderFields,
    /// Creation timestamp as echoed by the client; never persisted
    pub created_at: Option<DateTime<Utc>>,
    /// Version the client last read; a mismatch is a conflict
    pub version: Option<i64>,
    /// Desired line items; `None` leaves the persisted items untouched
    pub packages: Option<Vec<DesiredChild<PackageLine>>>,
}

/// Line item as returned to clients. Carries no reference back to its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderPackageView {
    /// Persisted id
    pub id: i64,
    /// Catalogue package reference
    pub package_id: String,
    /// Display name
    pub package_name: String,
    /// Units ordered
    pub quantity: i32,
    /// Price per unit
    pub unit_price: Decimal,
    /// `unit_price * quantity`
    pub line_total: Decimal,
}

impl From<order_package::Model> for OrderPackageView {
    fn from(model: order_package::Model) -> Self {
        Self {
            id: model.id,
            package_id: model.package_id,
            package_name: model.package_name,
            quantity: model.quantity,
            unit_price: money::from_cents(model.unit_price_cents),
            line_total: money::from_cents(model.line_total_cents),
        }
    }
}

/// Order with its line items, as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    /// Order id
    pub id: String,
    /// Booking form reference
    pub form_id: Option<String>,
    /// Merchant reference
    pub merchant_id: Option<String>,
    /// Customer display name
    pub customer_name: String,
    /// Human-facing reference number
    pub reference_number: Option<String>,
    /// Lifecycle status
    pub status: Status,
    /// Subtotal
    pub subtotal: Decimal,
    /// Deposit paid
    pub deposit_paid: Decimal,
    /// Balance due
    pub balance_due: Decimal,
    /// Grand total
    pub grand_total: Decimal,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
    /// Modification counter; echo it back on update to detect lost updates
    pub version: i64,
    /// Line items ordered by id
    pub packages: Vec<OrderPackageView>,
}

impl OrderView {
    fn project(order: order::Model, mut packages: Vec<order_package::Model>) -> Self {
        packages.sort_by_key(|p| p.id);
        Self {
            id: order.id,
            form_id: order.form_id,
            merchant_id: order.merchant_id,
            customer_name: order.customer_name,
            reference_number: order.reference_number,
            status: order.status,
            subtotal: money::from_cents(order.subtotal_cents),
            deposit_paid: money::from_cents(order.deposit_paid_cents),
            balance_due: money::from_cents(order.balance_due_cents),
            grand_total: money::from_cents(order.grand_total_cents),
            created_at: order.created_at,
            updated_at: order.updated_at,
            version: order.version,
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }
}

/// Rows removed by [`delete_order`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedOrder {
    /// Line items removed
    pub packages_deleted: u64,
    /// Bookings removed (with their packages)
    pub bookings_deleted: u64,
}

/// Optional filters for [`order_statistics`].
#[derive(Debug, Clone, Default)]
pub struct StatisticsFilter {
    /// Restrict to one booking form
    pub form_id: Option<String>,
    /// Restrict to one merchant
    pub merchant_id: Option<String>,
}

/// Aggregate order figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatistics {
    /// Orders matching the filter
    pub total_orders: u64,
    /// Sum of grand totals
    pub total_revenue: Decimal,
    /// Sum of deposits paid
    pub total_deposits: Decimal,
    /// Sum of balances due
    pub outstanding_balance: Decimal,
    /// Orders created today (UTC)
    pub today_orders: u64,
    /// Grand totals of orders created today
    pub today_revenue: Decimal,
    /// Orders in `pending`
    pub pending_count: u64,
    /// Orders in `confirmed`
    pub confirmed_count: u64,
    /// Orders in `completed`
    pub completed_count: u64,
    /// Orders in `cancelled`
    pub cancelled_count: u64,
}

/// Creates an order and its line items in one transaction.
///
/// The id is a fresh UUID and both timestamps are set to now; any ids on the
/// submitted lines are irrelevant because every line is new.
#[instrument(skip(db, new_order))]
pub async fn create_order(db: &DatabaseConnection, new_order: NewOrder) -> Result<OrderView> {
    new_order.fields.validate()?;
    for line in &new_order.packages {
        line.validate()?;
    }

    let now = Utc::now();
    let fields = new_order.fields;
    let row = order::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        form_id: Set(fields.form_id),
        merchant_id: Set(fields.merchant_id),
        customer_name: Set(fields.customer_name.trim().to_string()),
        reference_number: Set(fields.reference_number),
        status: Set(fields.status),
        subtotal_cents: Set(fields.subtotal_cents),
        deposit_paid_cents: Set(fields.deposit_paid_cents),
        balance_due_cents: Set(fields.balance_due_cents),
        grand_total_cents: Set(fields.grand_total_cents),
        created_at: Set(now),
        updated_at: Set(now),
        version: Set(1),
    };

    let txn = db.begin().await?;
    let order = row.insert(&txn).await?;

    let mut packages = Vec::with_capacity(new_order.packages.len());
    for line in new_order.packages {
        packages.push(line.into_active_model(&order.id)?.insert(&txn).await?);
    }
    txn.commit().await?;

    info!(order_id = %order.id, packages = packages.len(), "Order created");
    Ok(OrderView::project(order, packages))
}

/// Finds an order with its line items.
pub async fn get_order(db: &DatabaseConnection, order_id: &str) -> Result<Option<OrderView>> {
    let found = Order::find_by_id(order_id)
        .find_with_related(OrderPackage)
        .all(db)
        .await?;

    Ok(found
        .into_iter()
        .next()
        .map(|(order, packages)| OrderView::project(order, packages)))
}

/// Lists orders with their line items, newest first, optionally for one form.
pub async fn list_orders(db: &DatabaseConnection, form_id: Option<&str>) -> Result<Vec<OrderView>> {
    let mut query = Order::find();
    if let Some(form_id) = form_id {
        query = query.filter(order::Column::FormId.eq(form_id));
    }

    let rows = query
        .order_by_desc(order::Column::CreatedAt)
        .order_by_asc(order::Column::Id)
        .find_with_related(OrderPackage)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .map(|(order, packages)| OrderView::project(order, packages))
        .collect())
}

/// Replaces an order's fields and, when `packages` is present, reconciles its
/// line items, all in one transaction.
///
/// `created_at` and `version` are server-owned: whatever the caller sent is
/// discarded in favour of the persisted values, and the version is bumped. The
/// parent update is a compare-and-set on the version read at the start; if it
/// matches no row the order either vanished (not found) or was changed by
/// someone else (conflict).
///
/// # Errors
/// - [`Error::Validation`] / [`Error::InvalidAmount`] for bad input
/// - [`Error::OrderNotFound`] if the order does not exist
/// - [`Error::ConcurrentModification`] if the order changed since it was read
#[instrument(skip(db, replacement))]
pub async fn update_order(
    db: &DatabaseConnection,
    order_id: &str,
    replacement: OrderReplacement,
) -> Result<ReconcileSummary> {
    let OrderReplacement {
        fields,
        created_at,
        version,
        packages,
    } = replacement;

    fields.validate()?;
    for child in packages.iter().flatten() {
        match child {
            DesiredChild::New(line) | DesiredChild::Existing { data: line, .. } => {
                line.validate()?;
            }
        }
    }

    let txn = db.begin().await?;
    let persisted = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            id: order_id.to_owned(),
        })?;

    if version.is_some_and(|expected| expected != persisted.version) {
        return Err(Error::ConcurrentModification {
            entity: "order",
            id: order_id.to_owned(),
        });
    }

    let summary = match packages {
        Some(desired) => reconcile_packages(&txn, order_id, desired).await?,
        None => ReconcileSummary::default(),
    };

    let row = replacement_row(order_id, fields, created_at, &persisted, Utc::now());
    let result = Order::update_many()
        .set(overwrite(row))
        .filter(order::Column::Id.eq(order_id))
        .filter(order::Column::Version.eq(persisted.version))
        .exec(&txn)
        .await?;

    if result.rows_affected == 0 {
        return Err(lost_update(&txn, order_id).await?);
    }
    txn.commit().await?;

    info!(
        order_id,
        added = summary.added,
        updated = summary.updated,
        deleted = summary.deleted,
        "Order updated"
    );
    Ok(summary)
}

/// Builds the full replacement row from the caller's payload, then restores the
/// server-owned fields from `persisted`.
fn replacement_row(
    order_id: &str,
    fields: OrderFields,
    submitted_created_at: Option<DateTime<Utc>>,
    persisted: &order::Model,
    now: DateTime<Utc>,
) -> order::Model {
    let mut row = order::Model {
        id: order_id.to_owned(),
        form_id: fields.form_id,
        merchant_id: fields.merchant_id,
        customer_name: fields.customer_name.trim().to_string(),
        reference_number: fields.reference_number,
        status: fields.status,
        subtotal_cents: fields.subtotal_cents,
        deposit_paid_cents: fields.deposit_paid_cents,
        balance_due_cents: fields.balance_due_cents,
        grand_total_cents: fields.grand_total_cents,
        created_at: submitted_created_at.unwrap_or(now),
        updated_at: now,
        version: 0,
    };
    protect_server_fields(&mut row, persisted);
    row
}

fn protect_server_fields(row: &mut order::Model, persisted: &order::Model) {
    row.created_at = persisted.created_at;
    row.version = persisted.version + 1;
}

/// Every column except the key marked for overwrite.
fn overwrite(row: order::Model) -> order::ActiveModel {
    order::ActiveModel {
        id: Unchanged(row.id),
        form_id: Set(row.form_id),
        merchant_id: Set(row.merchant_id),
        customer_name: Set(row.customer_name),
        reference_number: Set(row.reference_number),
        status: Set(row.status),
        subtotal_cents: Set(row.subtotal_cents),
        deposit_paid_cents: Set(row.deposit_paid_cents),
        balance_due_cents: Set(row.balance_due_cents),
        grand_total_cents: Set(row.grand_total_cents),
        created_at: Set(row.created_at),
        updated_at: Set(row.updated_at),
        version: Set(row.version),
    }
}

/// Distinguishes "row gone" from "row changed" after a compare-and-set miss.
async fn lost_update<C>(db: &C, order_id: &str) -> Result<Error>
where
    C: ConnectionTrait,
{
    let still_exists = Order::find_by_id(order_id).count(db).await? > 0;
    Ok(if still_exists {
        Error::ConcurrentModification {
            entity: "order",
            id: order_id.to_owned(),
        }
    } else {
        Error::OrderNotFound {
            id: order_id.to_owned(),
        }
    })
}

/// Applies the reconciliation of an order's line items: deletes, then updates,
/// then inserts.
async fn reconcile_packages(
    txn: &DatabaseTransaction,
    order_id: &str,
    desired: Vec<DesiredChild<PackageLine>>,
) -> Result<ReconcileSummary> {
    let persisted_ids: Vec<i64> = OrderPackage::find()
        .select_only()
        .column(order_package::Column::Id)
        .filter(order_package::Column::OrderId.eq(order_id))
        .into_tuple()
        .all(txn)
        .await?;

    let plan = reconcile::plan(persisted_ids, desired)?;
    let summary = ReconcileSummary::from(&plan);

    if !plan.to_delete.is_empty() {
        OrderPackage::delete_many()
            .filter(order_package::Column::OrderId.eq(order_id))
            .filter(order_package::Column::Id.is_in(plan.to_delete))
            .exec(txn)
            .await?;
    }

    for (id, line) in plan.to_update {
        let mut row = line.into_active_model(order_id)?;
        row.id = Unchanged(id);
        row.update(txn).await?;
    }

    for line in plan.to_insert {
        line.into_active_model(order_id)?.insert(txn).await?;
    }

    debug!(order_id, ?summary, "Order packages reconciled");
    Ok(summary)
}

/// Deletes an order together with its line items, bookings and booking
/// packages.
#[instrument(skip(db))]
pub async fn delete_order(db: &DatabaseConnection, order_id: &str) -> Result<DeletedOrder> {
    let txn = db.begin().await?;

    let order = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            id: order_id.to_owned(),
        })?;

    let booking_ids: Vec<i64> = Booking::find()
        .select_only()
        .column(booking::Column::Id)
        .filter(booking::Column::OrderId.eq(order_id))
        .into_tuple()
        .all(&txn)
        .await?;

    if !booking_ids.is_empty() {
        BookingPackage::delete_many()
            .filter(booking_package::Column::BookingId.is_in(booking_ids))
            .exec(&txn)
            .await?;
    }

    let bookings_deleted = Booking::delete_many()
        .filter(booking::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?
        .rows_affected;

    let packages_deleted = OrderPackage::delete_many()
        .filter(order_package::Column::OrderId.eq(order_id))
        .exec(&txn)
        .await?
        .rows_affected;

    order.delete(&txn).await?;
    txn.commit().await?;

    info!(order_id, packages_deleted, bookings_deleted, "Order deleted");
    Ok(DeletedOrder {
        packages_deleted,
        bookings_deleted,
    })
}

/// Moves an order to `status` if the transition table allows it.
#[instrument(skip(db))]
pub async fn set_order_status(
    db: &DatabaseConnection,
    order_id: &str,
    status: Status,
) -> Result<StatusChange<String>> {
    let txn = db.begin().await?;

    let persisted = Order::find_by_id(order_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::OrderNotFound {
            id: order_id.to_owned(),
        })?;

    let previous_status = persisted.status;
    check_transition(previous_status, status)?;

    let version = persisted.version;
    let mut active: order::ActiveModel = persisted.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.version = Set(version + 1);
    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!(order_id, from = %previous_status, to = %status, "Order status changed");
    Ok(StatusChange {
        id: updated.id,
        previous_status,
        new_status: updated.status,
        updated_at: updated.updated_at,
    })
}

/// Aggregates order counts and money figures in the database. `today` decides
/// which orders count as created today (UTC).
pub async fn order_statistics(
    db: &DatabaseConnection,
    filter: &StatisticsFilter,
    today: NaiveDate,
) -> Result<OrderStatistics> {
    let scoped = || {
        let mut query = Order::find().select_only();
        if let Some(form_id) = &filter.form_id {
            query = query.filter(order::Column::FormId.eq(form_id.as_str()));
        }
        if let Some(merchant_id) = &filter.merchant_id {
            query = query.filter(order::Column::MerchantId.eq(merchant_id.as_str()));
        }
        query
    };

    let (total_orders, revenue, deposits, outstanding): (i64, Option<i64>, Option<i64>, Option<i64>) =
        scoped()
            .column_as(Expr::col(order::Column::Id).count(), "total_orders")
            .column_as(Expr::col(order::Column::GrandTotalCents).sum(), "revenue")
            .column_as(Expr::col(order::Column::DepositPaidCents).sum(), "deposits")
            .column_as(Expr::col(order::Column::BalanceDueCents).sum(), "outstanding")
            .into_tuple()
            .one(db)
            .await?
            .unwrap_or_default();

    let day_start = today.and_time(NaiveTime::MIN).and_utc();
    let (today_orders, today_revenue): (i64, Option<i64>) = scoped()
        .column_as(Expr::col(order::Column::Id).count(), "today_orders")
        .column_as(Expr::col(order::Column::GrandTotalCents).sum(), "today_revenue")
        .filter(order::Column::CreatedAt.gte(day_start))
        .filter(order::Column::CreatedAt.lt(day_start + Duration::days(1)))
        .into_tuple()
        .one(db)
        .await?
        .unwrap_or_default();

    let by_status: Vec<(Status, i64)> = scoped()
        .column(order::Column::Status)
        .column_as(Expr::col(order::Column::Id).count(), "orders")
        .group_by(order::Column::Status)
        .into_tuple()
        .all(db)
        .await?;
    let count_of = |wanted: Status| {
        by_status
            .iter()
            .find(|(status, _)| *status == wanted)
            .map_or(0, |(_, n)| n.unsigned_abs())
    };

    Ok(OrderStatistics {
        total_orders: total_orders.unsigned_abs(),
        total_revenue: money::from_cents(revenue.unwrap_or(0)),
        total_deposits: money::from_cents(deposits.unwrap_or(0)),
        outstanding_balance: money::from_cents(outstanding.unwrap_or(0)),
        today_orders: today_orders.unsigned_abs(),
        today_revenue: money::from_cents(today_revenue.unwrap_or(0)),
        pending_count: count_of(Status::Pending),
        confirmed_count: count_of(Status::Confirmed),
        completed_count: count_of(Status::Completed),
        cancelled_count: count_of(Status::Cancelled),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    async fn package_ids(db: &DatabaseConnection, order_id: &str) -> Vec<i64> {
        get_order(db, order_id)
            .await
            .unwrap()
            .unwrap()
            .packages
            .iter()
            .map(|p| p.id)
            .collect()
    }

    fn replacement(
        packages: Option<Vec<DesiredChild<PackageLine>>>,
    ) -> OrderReplacement {
        OrderReplacement {
            fields: sample_order_fields(),
            created_at: None,
            version: None,
            packages,
        }
    }

    #[tokio::test]
    async fn test_create_order_validation() -> Result<()> {
        let db = setup_test_db().await?;

        let mut fields = sample_order_fields();
        fields.customer_name = "   ".to_string();
        let result = create_order(
            &db,
            NewOrder {
                fields,
                packages: Vec::new(),
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let result = create_order(
            &db,
            NewOrder {
                fields: sample_order_fields(),
                packages: vec![package_line("Island hop", 0, 1000)],
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        assert!(list_orders(&db, None).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_create_order_with_packages() -> Result<()> {
        let db = setup_test_db().await?;

        let view = create_order(
            &db,
            NewOrder {
                fields: sample_order_fields(),
                packages: vec![
                    package_line("Snorkel", 2, 4550),
                    package_line("Lunch", 3, 1999),
                ],
            },
        )
        .await?;

        assert_eq!(view.version, 1);
        assert_eq!(view.created_at, view.updated_at);
        assert_eq!(view.packages.len(), 2);
        assert_eq!(view.packages[0].line_total.to_string(), "91.00");
        assert_eq!(view.packages[1].line_total.to_string(), "59.97");
        assert!(view.packages.iter().all(|p| p.id > 0));

        let fetched = get_order(&db, &view.id).await?.unwrap();
        assert_eq!(fetched, view);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_order_missing() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_order(&db, "nope").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_update_reconciles_delete_update_insert() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;
        insert_order_package(&db, 7, &order.id, "y").await?;

        let desired = vec![
            DesiredChild::Existing {
                id: 7,
                data: package_line("y-prime", 4, 2500),
            },
            DesiredChild::New(package_line("z", 1, 800)),
        ];
        let summary = update_order(&db, &order.id, replacement(Some(desired))).await?;
        assert_eq!(
            summary,
            ReconcileSummary {
                added: 1,
                updated: 1,
                deleted: 1,
            }
        );

        let view = get_order(&db, &order.id).await?.unwrap();
        let ids: Vec<i64> = view.packages.iter().map(|p| p.id).collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], 7);
        assert!(ids[1] != 5 && ids[1] != 7);

        let updated = &view.packages[0];
        assert_eq!(updated.package_name, "y-prime");
        assert_eq!(updated.quantity, 4);
        assert_eq!(updated.line_total.to_string(), "100.00");
        assert_eq!(view.packages[1].package_name, "z");
        Ok(())
    }

    #[tokio::test]
    async fn test_omitted_packages_are_left_alone() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;
        insert_order_package(&db, 7, &order.id, "y").await?;

        let summary = update_order(&db, &order.id, replacement(None)).await?;
        assert_eq!(summary, ReconcileSummary::default());
        assert_eq!(package_ids(&db, &order.id).await, vec![5, 7]);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_package_list_deletes_all() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;
        insert_order_package(&db, 7, &order.id, "y").await?;

        let summary = update_order(&db, &order.id, replacement(Some(Vec::new()))).await?;
        assert_eq!(summary.deleted, 2);
        assert!(package_ids(&db, &order.id).await.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_reapplying_returned_state_only_updates() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        let first = vec![
            DesiredChild::New(package_line("a", 1, 100)),
            DesiredChild::New(package_line("b", 2, 200)),
        ];
        update_order(&db, &order.id, replacement(Some(first))).await?;
        let ids = package_ids(&db, &order.id).await;
        assert_eq!(ids.len(), 2);

        let second = vec![
            DesiredChild::Existing {
                id: ids[0],
                data: package_line("a", 1, 100),
            },
            DesiredChild::Existing {
                id: ids[1],
                data: package_line("b", 2, 200),
            },
        ];
        let summary = update_order(&db, &order.id, replacement(Some(second))).await?;
        assert_eq!(
            summary,
            ReconcileSummary {
                added: 0,
                updated: 2,
                deleted: 0,
            }
        );
        assert_eq!(package_ids(&db, &order.id).await, ids);
        Ok(())
    }

    #[tokio::test]
    async fn test_children_of_other_orders_are_never_touched() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        let other = create_test_order(&db).await?;
        insert_order_package(&db, 40, &other.id, "theirs").await?;

        // Naming another order's row inserts a new row for this order instead
        let desired = vec![DesiredChild::Existing {
            id: 40,
            data: package_line("mine", 1, 100),
        }];
        let summary = update_order(&db, &order.id, replacement(Some(desired))).await?;
        assert_eq!(summary.added, 1);
        assert_eq!(summary.updated, 0);

        let theirs = get_order(&db, &other.id).await?.unwrap();
        assert_eq!(theirs.packages[0].package_name, "theirs");
        Ok(())
    }

    #[tokio::test]
    async fn test_forged_created_at_is_ignored() -> Result<()> {
        let (db, order) = setup_with_order().await?;

        let mut request = replacement(None);
        request.created_at = Some(order.created_at - Duration::days(365));
        request.fields.customer_name = "Renamed".to_string();
        update_order(&db, &order.id, request).await?;

        let stored = Order::find_by_id(order.id.as_str()).one(&db).await?.unwrap();
        assert_eq!(stored.created_at, order.created_at);
        assert_eq!(stored.customer_name, "Renamed");
        assert_eq!(stored.version, order.version + 1);
        assert!(stored.updated_at >= order.updated_at);
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;

        let mut first = replacement(None);
        first.version = Some(order.version);
        update_order(&db, &order.id, first).await?;

        let mut stale = replacement(Some(Vec::new()));
        stale.version = Some(order.version);
        stale.fields.customer_name = "Lost update".to_string();
        let result = update_order(&db, &order.id, stale).await;
        assert!(matches!(
            result,
            Err(Error::ConcurrentModification { entity: "order", .. })
        ));

        // Nothing from the rejected request was written
        let stored = Order::find_by_id(order.id.as_str()).one(&db).await?.unwrap();
        assert_ne!(stored.customer_name, "Lost update");
        assert_eq!(package_ids(&db, &order.id).await, vec![5]);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_missing_order_is_not_found() -> Result<()> {
        let db = setup_test_db().await?;
        let result = update_order(&db, "missing", replacement(None)).await;
        assert!(matches!(result, Err(Error::OrderNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_reconciliation_leaves_order_unchanged() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;

        let mut request = replacement(Some(vec![
            DesiredChild::Existing {
                id: 5,
                data: package_line("a", 1, 100),
            },
            DesiredChild::Existing {
                id: 5,
                data: package_line("b", 1, 100),
            },
        ]));
        request.fields.customer_name = "Should not stick".to_string();

        let result = update_order(&db, &order.id, request).await;
        assert!(matches!(result, Err(Error::Validation { .. })));

        let view = get_order(&db, &order.id).await?.unwrap();
        assert_eq!(view.customer_name, order.customer_name);
        assert_eq!(view.version, order.version);
        assert_eq!(view.packages[0].package_name, "x");
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_order_cascades() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        insert_order_package(&db, 5, &order.id, "x").await?;
        let booking = insert_booking(&db, &order.id, test_date(), 2, Status::Confirmed).await?;
        insert_booking_package(&db, booking.id, "kayak").await?;

        let deleted = delete_order(&db, &order.id).await?;
        assert_eq!(
            deleted,
            DeletedOrder {
                packages_deleted: 1,
                bookings_deleted: 1,
            }
        );

        assert!(get_order(&db, &order.id).await?.is_none());
        assert_eq!(OrderPackage::find().count(&db).await?, 0);
        assert_eq!(Booking::find().count(&db).await?, 0);
        assert_eq!(BookingPackage::find().count(&db).await?, 0);

        let again = delete_order(&db, &order.id).await;
        assert!(matches!(again, Err(Error::OrderNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_set_order_status_follows_transition_table() -> Result<()> {
        let (db, order) = setup_with_order().await?;
        assert_eq!(order.status, Status::Pending);

        let change = set_order_status(&db, &order.id, Status::Confirmed).await?;
        assert_eq!(change.previous_status, Status::Pending);
        assert_eq!(change.new_status, Status::Confirmed);

        let result = set_order_status(&db, &order.id, Status::Pending).await;
        assert!(matches!(
            result,
            Err(Error::InvalidStatusTransition { .. })
        ));

        let result = set_order_status(&db, "missing", Status::Confirmed).await;
        assert!(matches!(result, Err(Error::OrderNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_order_statistics() -> Result<()> {
        let db = setup_test_db().await?;
        let a = create_test_order(&db).await?;
        let b = create_test_order(&db).await?;
        set_order_status(&db, &b.id, Status::Confirmed).await?;

        let today = Utc::now().date_naive();
        let stats = order_statistics(&db, &StatisticsFilter::default(), today).await?;
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.today_orders, 2);
        assert_eq!(stats.pending_count, 1);
        assert_eq!(stats.confirmed_count, 1);
        assert_eq!(stats.total_revenue, money::from_cents(2 * a.grand_total_cents));
        assert_eq!(stats.outstanding_balance, money::from_cents(2 * a.balance_due_cents));
        assert_eq!(stats.completed_count, 0);
        assert_eq!(stats.cancelled_count, 0);

        let yesterday = today.pred_opt().unwrap();
        let stats = order_statistics(&db, &StatisticsFilter::default(), yesterday).await?;
        assert_eq!(stats.total_orders, 2);
        assert_eq!(stats.today_orders, 0);
        assert_eq!(stats.today_revenue.to_string(), "0.00");

        let merchant = order_statistics(
            &db,
            &StatisticsFilter {
                form_id: None,
                merchant_id: a.merchant_id.clone(),
            },
            today,
        )
        .await?;
        assert_eq!(merchant.total_orders, 2);
        assert_eq!(merchant.today_revenue, money::from_cents(2 * a.grand_total_cents));

        let filtered = order_statistics(
            &db,
            &StatisticsFilter {
                form_id: Some("other-form".to_string()),
                merchant_id: None,
            },
            today,
        )
        .await?;
        assert_eq!(filtered.total_orders, 0);
        assert_eq!(filtered.total_revenue.to_string(), "0.00");
        Ok(())
    }
}
