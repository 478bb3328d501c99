//! Booking day entity - the per-date lock row of the admission guard.
//!
//! Admission upserts this row before summing the date's pax, so two
//! transactions admitting on the same date queue behind each other's write.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Per-date lock row
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "booking_days")]
pub struct Model {
    /// Calendar date being locked
    #[sea_orm(primary_key, auto_increment = false)]
    pub booking_date: Date,
    /// Bumped on every admission attempt for the date
    pub admissions: i64,
}

/// `BookingDay` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
