//! Unified error types for the booking service.
//!
//! Every fallible operation in `core` returns [`Result`]. Capacity rejection is
//! absent from this enum: it is an ordinary admission outcome and is
//! modelled by [`crate::core::capacity::Admission`].

use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Underlying store failure
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// Malformed or missing input
    #[error("Validation failed: {message}")]
    Validation {
        /// Human readable reason
        message: String,
    },

    /// A monetary value was negative, too large or had more than two fraction digits
    #[error("Invalid amount for {field}: {amount}")]
    InvalidAmount {
        /// Field the amount was submitted for
        field: &'static str,
        /// The offending amount, as submitted
        amount: String,
    },

    /// The order referenced by a new booking does not exist
    #[error("Invalid order id: {id}")]
    InvalidOrderReference {
        /// Referenced order id
        id: String,
    },

    /// Order does not exist
    #[error("Order not found: {id}")]
    OrderNotFound {
        /// Requested order id
        id: String,
    },

    /// Booking does not exist
    #[error("Booking not found: {id}")]
    BookingNotFound {
        /// Requested booking id
        id: i64,
    },

    /// Row exists but changed between read and write
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification {
        /// Entity kind, e.g. `"order"`
        entity: &'static str,
        /// Row identifier
        id: String,
    },

    /// Requested status change is not in the transition table
    #[error("Cannot change status from {from} to {to}")]
    InvalidStatusTransition {
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// I/O failure (config file, socket binding)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
