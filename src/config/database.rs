//! Database configuration module.
//!
//! Handles the database connection and table creation using `SeaORM`. Tables are
//! generated from the entity definitions with `Schema::create_table_from_entity`,
//! so the schema always matches the Rust structs without hand-written SQL.

use crate::entities::{Booking, BookingDay, BookingPackage, Order, OrderPackage};
use crate::errors::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
};
use tracing::{debug, info, instrument};

/// Default `SQLite` location used when neither config nor environment name one.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://daytrip.sqlite?mode=rwc";

/// Establishes a connection to the database at `database_url`.
///
/// Per-statement `SQLx` logging is switched off; service functions log at the
/// operation level instead.
#[instrument]
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new(database_url.to_owned());
    options.sqlx_logging(false);

    let db = Database::connect(options).await?;
    info!("Database connection established");
    Ok(db)
}

/// Creates all tables (and their indexes) if they do not exist yet.
///
/// Parents are created before children so that foreign keys resolve on every
/// backend.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_entity_table(db, Order).await?;
    create_entity_table(db, OrderPackage).await?;
    create_entity_table(db, Booking).await?;
    create_entity_table(db, BookingPackage).await?;
    create_entity_table(db, BookingDay).await?;
    Ok(())
}

async fn create_entity_table<E>(db: &DatabaseConnection, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut table = schema.create_table_from_entity(entity);
    db.execute(builder.build(table.if_not_exists())).await?;

    for mut index in schema.create_index_from_entity(entity) {
        db.execute(builder.build(index.if_not_exists())).await?;
    }

    debug!(table = entity.table_name(), "Table ensured");
    Ok(())
}
