//! Arbitrary-precision comparison of x402 amount strings.
//!
//! Amounts travel over the wire as decimal-integer strings (atomic units,
//! e.g. microSTX) so they survive round-trips through JSON numbers without
//! precision loss. They must never be parsed as floats: an `f64` cannot
//! represent `u64::MAX` atomic units exactly, which would let a payment a
//! few units short of the requirement compare as equal or greater.

use num_bigint::BigUint;
use std::str::FromStr;

/// Error parsing an x402 amount string.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid amount string: {0:?}")]
pub struct InvalidAmount(pub String);

/// Parses a decimal-integer amount string into an arbitrary-precision
/// unsigned integer.
///
/// # Errors
///
/// Returns [`InvalidAmount`] if `amount` contains anything other than ASCII
/// decimal digits, or is empty.
pub fn parse_amount(amount: &str) -> Result<BigUint, InvalidAmount> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InvalidAmount(amount.to_owned()));
    }
    BigUint::from_str(amount).map_err(|_| InvalidAmount(amount.to_owned()))
}

/// Returns `true` if `paid` is greater than or equal to `required`,
/// comparing both as arbitrary-precision unsigned integers.
///
/// # Errors
///
/// Returns [`InvalidAmount`] if either string fails to parse as a decimal
/// integer.
pub fn amount_satisfies(paid: &str, required: &str) -> Result<bool, InvalidAmount> {
    let paid = parse_amount(paid)?;
    let required = parse_amount(required)?;
    Ok(paid >= required)
}
