//! Fixed-point money amounts
//!
//! Balances and transfer amounts are `Decimal` values with at most
//! [`AMOUNT_SCALE`] fractional digits, matching the `DECIMAL(18,4)` columns
//! they are stored in.

use std::str::FromStr;

use rust_decimal::Decimal;

use super::result::{Error, Result};

/// Number of fractional digits kept for every amount
pub const AMOUNT_SCALE: u32 = 4;

/// Largest value a `DECIMAL(18,4)` column can hold: 99 999 999 999 999.9999
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xA763_FFFF, 0x0DE0_B6B3, 0, false, 4);

/// Validate an amount supplied by a caller
pub fn validate_amount(amount: Decimal) -> Result<Decimal> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(Error::invalid_amount(format!(
            "amount of money can't be negative: {}",
            amount
        )));
    }
    let normalized = amount.normalize();
    if normalized.scale() > AMOUNT_SCALE {
        return Err(Error::invalid_amount(format!(
            "amount {} has more than {} decimal places",
            amount, AMOUNT_SCALE
        )));
    }
    if normalized > MAX_AMOUNT {
        return Err(Error::invalid_amount(format!(
            "amount {} exceeds the maximum of {}",
            amount, MAX_AMOUNT
        )));
    }
    Ok(normalized)
}

/// Parse and validate a textual amount such as `"12.50"`
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let amount = Decimal::from_str(raw.trim())
        .map_err(|_| Error::invalid_amount(format!("'{}' is not a decimal amount", raw)))?;
    validate_amount(amount)
}

/// Render an amount at the storage scale, e.g. `100.0000`
pub fn to_storage_string(amount: Decimal) -> String {
    let mut scaled = amount;
    scaled.rescale(AMOUNT_SCALE);
    scaled.to_string()
}
