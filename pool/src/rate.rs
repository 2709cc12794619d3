//! Exchange rate between claim tokens and underlying.

use tide_types::params::PRICE_SCALE;
use tide_types::{mul_div, MathError};

/// Totals needed to convert between claim tokens and underlying.
///
/// Built from an already-accrued state; conversions floor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExchangeRate {
    pub total_underlying: u128,
    pub total_supply: u128,
    /// Claim-token base units per underlying base unit in an empty pool.
    pub initial_rate: u128,
}

impl ExchangeRate {
    pub fn new(total_underlying: u128, total_supply: u128, initial_rate: u128) -> Self {
        Self {
            total_underlying,
            total_supply,
            initial_rate,
        }
    }

    fn is_empty(&self) -> bool {
        self.total_supply == 0 || self.total_underlying == 0
    }

    /// Claim tokens that `underlying` buys.
    pub fn ctoken_by_underlying(&self, underlying: u128) -> Result<u128, MathError> {
        if self.is_empty() {
            return underlying
                .checked_mul(self.initial_rate)
                .ok_or(MathError::Overflow);
        }
        mul_div(underlying, self.total_supply, self.total_underlying)
    }

    /// Underlying that `claim` tokens are worth.
    pub fn underlying_by_ctoken(&self, claim: u128) -> Result<u128, MathError> {
        if self.total_supply == 0 {
            if self.initial_rate == 0 {
                return Err(MathError::DivisionByZero);
            }
            return Ok(claim / self.initial_rate);
        }
        mul_div(claim, self.total_underlying, self.total_supply)
    }

    /// Underlying per whole claim token, scaled by `PRICE_SCALE`.
    ///
    /// An empty pool reports the initial price, one whole underlying unit.
    pub fn price_per_token(&self) -> Result<u128, MathError> {
        if self.total_supply == 0 {
            if self.initial_rate == 0 {
                return Err(MathError::DivisionByZero);
            }
            return Ok(PRICE_SCALE / self.initial_rate);
        }
        mul_div(self.total_underlying, PRICE_SCALE, self.total_supply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INITIAL: u128 = 1_000_000_000_000;

    #[test]
    fn test_empty_pool_uses_initial_rate() {
        let rate = ExchangeRate::new(0, 0, INITIAL);
        assert_eq!(rate.ctoken_by_underlying(100_000_000).unwrap(), 100 * PRICE_SCALE);
        assert_eq!(rate.underlying_by_ctoken(PRICE_SCALE).unwrap(), 1_000_000);
        assert_eq!(rate.price_per_token().unwrap(), 1_000_000);
    }

    #[test]
    fn test_price_grows_with_underlying() {
        let rate = ExchangeRate::new(108_000_000, 100 * PRICE_SCALE, INITIAL);
        assert_eq!(rate.price_per_token().unwrap(), 1_080_000);
        assert_eq!(rate.underlying_by_ctoken(100 * PRICE_SCALE).unwrap(), 108_000_000);
        assert_eq!(rate.ctoken_by_underlying(108_000_000).unwrap(), 100 * PRICE_SCALE);
    }

    #[test]
    fn test_conversions_floor() {
        let rate = ExchangeRate::new(3, 10, 1);
        assert_eq!(rate.underlying_by_ctoken(1).unwrap(), 0);
        assert_eq!(rate.ctoken_by_underlying(1).unwrap(), 3);
    }

    #[test]
    fn test_round_trip_never_gains() {
        let rate = ExchangeRate::new(1_234_567, 987_654_321_000_000, INITIAL);
        for u in [1u128, 7, 1_000, 999_999] {
            let claim = rate.ctoken_by_underlying(u).unwrap();
            assert!(rate.underlying_by_ctoken(claim).unwrap() <= u);
        }
    }
}
