//! Order entity - the commercial record a customer books against.
//!
//! An order owns its line-item packages and its bookings. Money columns hold
//! integer cents; see [`crate::core::money`] for the decimal boundary.

use super::status::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Server-generated UUID
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Booking form the order was submitted through, if any
    pub form_id: Option<String>,
    /// Merchant the order belongs to, if any
    pub merchant_id: Option<String>,
    /// Customer display name
    pub customer_name: String,
    /// Human-facing reference number
    pub reference_number: Option<String>,
    /// Lifecycle status
    pub status: Status,
    /// Sum of line totals, in cents
    pub subtotal_cents: i64,
    /// Deposit received, in cents
    pub deposit_paid_cents: i64,
    /// Amount still owed, in cents
    pub balance_due_cents: i64,
    /// Final amount including charges, in cents
    pub grand_total_cents: i64,
    /// When the order was created; never changed afterwards
    pub created_at: DateTimeUtc,
    /// Refreshed on every mutation
    pub updated_at: DateTimeUtc,
    /// Server-maintained modification counter used for compare-and-set
    pub version: i64,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One order has many line-item packages
    #[sea_orm(has_many = "super::order_package::Entity")]
    OrderPackages,
    /// One order has many bookings
    #[sea_orm(has_many = "super::booking::Entity")]
    Bookings,
}

impl Related<super::order_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderPackages.def()
    }
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Bookings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
