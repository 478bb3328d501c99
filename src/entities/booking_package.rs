//! Booking package entity - per-package pax and pricing of a booking.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Booking package database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_packages")]
pub struct Model {
    /// Surrogate id assigned by the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning booking
    pub booking_id: i64,
    /// Catalogue package reference
    pub package_id: String,
    /// Package name at booking time
    pub package_name: String,
    /// Number of units
    pub quantity: i32,
    /// Travellers covered by this package
    pub no_of_pax: i32,
    /// Price per unit, in cents
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`
    pub line_total_cents: i64,
}

/// Defines relationships between `BookingPackage` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each package belongs to one booking
    #[sea_orm(
        belongs_to = "super::booking::Entity",
        from = "Column::BookingId",
        to = "super::booking::Column::Id",
        on_delete = "Cascade"
    )]
    Booking,
}

impl Related<super::booking::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Booking.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
