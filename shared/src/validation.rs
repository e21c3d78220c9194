//! Validation helpers for engine inputs

use rust_decimal::Decimal;

/// Validate that a quantity is strictly positive
pub fn validate_positive_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be positive");
    }
    Ok(())
}

/// Validate a non-zero adjustment delta
pub fn validate_adjustment_change(change: Decimal) -> Result<(), &'static str> {
    if change == Decimal::ZERO {
        return Err("Adjustment quantity change cannot be zero");
    }
    Ok(())
}

/// Validate that a free-text reason is present (adjustments and cancellations)
pub fn validate_reason(reason: &str) -> Result<(), &'static str> {
    if reason.trim().is_empty() {
        return Err("A reason is required");
    }
    Ok(())
}

/// Validate the lot invariant 0 <= reserved <= quantity
pub fn validate_lot_quantities(quantity: Decimal, reserved: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("On-hand quantity cannot be negative");
    }
    if reserved < Decimal::ZERO {
        return Err("Reserved quantity cannot be negative");
    }
    if reserved > quantity {
        return Err("Reserved quantity cannot exceed on-hand quantity");
    }
    Ok(())
}
