//! Order package entity - one line item of an order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Order line item database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_packages")]
pub struct Model {
    /// Surrogate id assigned by the store
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning order
    pub order_id: String,
    /// Catalogue package reference
    pub package_id: String,
    /// Package name as shown on the order
    pub package_name: String,
    /// Number of units
    pub quantity: i32,
    /// Price per unit, in cents
    pub unit_price_cents: i64,
    /// `unit_price_cents * quantity`
    pub line_total_cents: i64,
}

/// Defines relationships between `OrderPackage` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each package belongs to one order
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
