//! Core business logic, independent of the HTTP layer.
//!
//! Every operation takes a `SeaORM` connection and returns [`crate::errors::Result`].

pub mod bookings;
pub mod capacity;
pub mod lifecycle;
pub mod money;
pub mod orders;
pub mod reconcile;
