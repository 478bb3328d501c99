//! Shared test utilities for the booking service.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test rows with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::orders::{self, NewOrder, OrderFields, PackageLine},
    entities::{Order, Status, booking, booking_package, order, order_package},
    errors::{Error, Result},
};
use chrono::{NaiveDate, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, DatabaseConnection, EntityTrait, NotSet, Set};
use std::path::PathBuf;
use uuid::Uuid;

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// A throwaway `SQLite` file behind a multi-connection pool.
///
/// Unlike `sqlite::memory:`, which `SeaORM` limits to a single connection, this
/// lets concurrent transactions actually overlap. The file is removed on drop.
pub struct FileTestDb {
    /// Pooled connection to the file
    pub db: DatabaseConnection,
    path: PathBuf,
}

impl Drop for FileTestDb {
    fn drop(&mut self) {
        for suffix in ["", "-journal", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Creates a file-backed database with `connections` pooled connections and all
/// tables initialized.
pub async fn setup_file_test_db(connections: u32) -> Result<FileTestDb> {
    let path = std::env::temp_dir().join(format!("daytrip-test-{}.sqlite", Uuid::new_v4()));
    let mut options = ConnectOptions::new(format!("sqlite://{}?mode=rwc", path.display()));
    options
        .max_connections(connections)
        .min_connections(connections)
        .sqlx_logging(false);

    let db = sea_orm::Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(FileTestDb { db, path })
}

/// Fixed trip date used across tests.
pub fn test_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
}

/// Order fields with sensible defaults.
///
/// # Defaults
/// * `status`: pending
/// * `grand_total`: 150.00, of which 50.00 deposit paid
pub fn sample_order_fields() -> OrderFields {
    OrderFields {
        form_id: Some("form-island".to_string()),
        merchant_id: Some("merchant-1".to_string()),
        customer_name: "Ada Traveller".to_string(),
        reference_number: Some("REF-001".to_string()),
        status: Status::Pending,
        subtotal_cents: 15_000,
        deposit_paid_cents: 5_000,
        balance_due_cents: 10_000,
        grand_total_cents: 15_000,
    }
}

/// A line item with the given name, quantity and unit price in cents.
pub fn package_line(name: &str, quantity: i32, unit_price_cents: i64) -> PackageLine {
    PackageLine {
        package_id: format!("pkg-{}", name.to_lowercase()),
        package_name: name.to_string(),
        quantity,
        unit_price_cents,
    }
}

/// Creates an order without packages through the order service and returns
/// the stored row.
pub async fn create_test_order(db: &DatabaseConnection) -> Result<order::Model> {
    let view = orders::create_order(
        db,
        NewOrder {
            fields: sample_order_fields(),
            packages: Vec::new(),
        },
    )
    .await?;

    Order::find_by_id(view.id.as_str())
        .one(db)
        .await?
        .ok_or(Error::OrderNotFound { id: view.id })
}

/// Sets up a complete test environment with one order.
/// Returns (db, order) for common test scenarios.
pub async fn setup_with_order() -> Result<(DatabaseConnection, order::Model)> {
    let db = setup_test_db().await?;
    let order = create_test_order(&db).await?;
    Ok((db, order))
}

/// Inserts a line item with an explicit id, bypassing the reconciler.
pub async fn insert_order_package(
    db: &DatabaseConnection,
    id: i64,
    order_id: &str,
    name: &str,
) -> Result<order_package::Model> {
    order_package::ActiveModel {
        id: Set(id),
        order_id: Set(order_id.to_string()),
        package_id: Set(format!("pkg-{name}")),
        package_name: Set(name.to_string()),
        quantity: Set(1),
        unit_price_cents: Set(1_000),
        line_total_cents: Set(1_000),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a booking directly, bypassing the capacity guard.
pub async fn insert_booking(
    db: &DatabaseConnection,
    order_id: &str,
    booking_date: NaiveDate,
    pax_count: i32,
    status: Status,
) -> Result<booking::Model> {
    let now = Utc::now();
    booking::ActiveModel {
        id: NotSet,
        order_id: Set(order_id.to_string()),
        booking_date: Set(booking_date),
        pax_count: Set(pax_count),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Inserts a single-unit package under `booking_id`.
pub async fn insert_booking_package(
    db: &DatabaseConnection,
    booking_id: i64,
    name: &str,
) -> Result<booking_package::Model> {
    booking_package::ActiveModel {
        id: NotSet,
        booking_id: Set(booking_id),
        package_id: Set(format!("pkg-{name}")),
        package_name: Set(name.to_string()),
        quantity: Set(1),
        no_of_pax: Set(1),
        unit_price_cents: Set(2_000),
        line_total_cents: Set(2_000),
    }
    .insert(db)
    .await
    .map_err(Into::into)
}
