//! Fixed-point helpers.
//!
//! Every amount in the ledger is a raw `u128`. Products of two amounts (or an
//! amount and a rate) are formed in 256 bits so that `a * b / d` is exact
//! before the floor division, and the quotient is checked on the way back to
//! `u128`. Nothing here wraps or saturates.

use ethnum::U256;

use crate::error::MathError;

fn narrow(value: U256) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow);
    }
    Ok(value.as_u128())
}

/// `floor(a * b / denominator)` with a 256-bit intermediate.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    narrow(product / U256::from(denominator))
}

/// `floor(a * b * c / denominator)` with a 256-bit intermediate.
///
/// Used by accrual, where `c` is elapsed seconds and the full triple product
/// can exceed 128 bits long before the result does.
pub fn mul_mul_div(a: u128, b: u128, c: u128, denominator: u128) -> Result<u128, MathError> {
    if denominator == 0 {
        return Err(MathError::DivisionByZero);
    }
    let product = (U256::from(a) * U256::from(b))
        .checked_mul(U256::from(c))
        .ok_or(MathError::Overflow)?;
    narrow(product / U256::from(denominator))
}

/// `10^exp` as a `u128`.
pub fn pow10(exp: u32) -> Result<u128, MathError> {
    10u128.checked_pow(exp).ok_or(MathError::Overflow)
}
