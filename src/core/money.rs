//! Exact money handling.
//!
//! The API speaks `Decimal` with at most two fraction digits; the store keeps
//! integer cents. Conversion never goes through floating point.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Fraction digits carried by every monetary field.
pub const DECIMAL_PLACES: u32 = 2;

/// Upper bound for any single monetary field (100 million).
const MAX_AMOUNT_CENTS: i64 = 10_000_000_000;

/// Maximum units on a single line item.
pub const MAX_QUANTITY: i32 = 9999;

/// Converts a non-negative decimal with at most two fraction digits to cents.
///
/// # Errors
/// Returns [`Error::InvalidAmount`] for negative values, values with more than
/// two significant fraction digits, or values above the per-field maximum.
pub fn to_cents(field: &'static str, amount: Decimal) -> Result<i64> {
    let invalid = || Error::InvalidAmount {
        field,
        amount: amount.to_string(),
    };

    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(invalid());
    }
    if amount.normalize().scale() > DECIMAL_PLACES {
        return Err(invalid());
    }

    let cents = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|c| c.to_i64())
        .ok_or_else(invalid)?;

    if cents > MAX_AMOUNT_CENTS {
        return Err(invalid());
    }
    Ok(cents)
}

/// Cents back to a two-digit decimal (`2500` -> `25.00`).
#[must_use]
pub fn from_cents(cents: i64) -> Decimal {
    Decimal::new(cents, DECIMAL_PLACES)
}

/// Validates a line-item quantity.
pub fn validate_quantity(quantity: i32) -> Result<()> {
    if quantity <= 0 {
        return Err(Error::validation(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if quantity > MAX_QUANTITY {
        return Err(Error::validation(format!(
            "quantity exceeds maximum allowed ({MAX_QUANTITY}), got {quantity}"
        )));
    }
    Ok(())
}

/// `unit_price_cents * quantity`, checked.
pub fn line_total_cents(unit_price_cents: i64, quantity: i32) -> Result<i64> {
    unit_price_cents
        .checked_mul(i64::from(quantity))
        .filter(|total| *total <= MAX_AMOUNT_CENTS)
        .ok_or_else(|| Error::InvalidAmount {
            field: "line_total",
            amount: format!("{} x {quantity}", from_cents(unit_price_cents)),
        })
}
