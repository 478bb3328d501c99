//! Entity module - SeaORM entity definitions for the booking store.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod booking;
pub mod booking_day;
pub mod booking_package;
pub mod order;
pub mod order_package;
pub mod status;

// Re-export specific types to avoid conflicts
pub use booking::{Column as BookingColumn, Entity as Booking, Model as BookingModel};
pub use booking_day::{Column as BookingDayColumn, Entity as BookingDay, Model as BookingDayModel};
pub use booking_package::{
    Column as BookingPackageColumn, Entity as BookingPackage, Model as BookingPackageModel,
};
pub use order::{Column as OrderColumn, Entity as Order, Model as OrderModel};
pub use order_package::{
    Column as OrderPackageColumn, Entity as OrderPackage, Model as OrderPackageModel,
};
pub use status::Status;
