//! Booking entity - pax reserved for a calendar date under an order.
//!
//! Only bookings in the `confirmed` status count against the daily ceiling.

use super::status::Status;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Booking database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "bookings")]
pub struct Model {
    /// Surrogate id assigned by the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Order this booking was made against
    #[sea_orm(indexed)]
    pub order_id: String,
    /// Trip date, no time component
    #[sea_orm(indexed)]
    pub booking_date: Date,
    /// Number of travellers, always at least one
    pub pax_count: i32,
    /// Lifecycle status
    pub status: Status,
    /// When the booking was created
    pub created_at: DateTimeUtc,
    /// Refreshed on every mutation
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Booking and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each booking belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    /// One booking has many packages
    #[sea_orm(has_many = "super::booking_package::Entity")]
    BookingPackages,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::booking_package::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BookingPackages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
