//! Interest accrual on the pool's total underlying.
//!
//! `delta = total_underlying × apr × elapsed / (SECONDS_PER_YEAR × APR_COEFFICIENT)`
//!
//! Accrual is applied at the top of every rate-dependent operation, so an
//! APR change only ever affects time after the change. Read-only queries work
//! on an accrued copy and never move `last_accrual`.

use serde::{Deserialize, Serialize};

use tide_types::params::{APR_COEFFICIENT, SECONDS_PER_YEAR};
use tide_types::{mul_mul_div, MathError, Timestamp};

/// Growth of `total_underlying` over `elapsed_secs` at `target_apr`, floored.
pub fn accrual_delta(
    total_underlying: u128,
    target_apr: u64,
    elapsed_secs: u64,
) -> Result<u128, MathError> {
    if total_underlying == 0 || target_apr == 0 || elapsed_secs == 0 {
        return Ok(0);
    }
    mul_mul_div(
        total_underlying,
        u128::from(target_apr),
        u128::from(elapsed_secs),
        u128::from(SECONDS_PER_YEAR) * u128::from(APR_COEFFICIENT),
    )
}

/// The time-dependent part of the pool state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualState {
    pub total_underlying: u128,
    pub target_apr: u64,
    pub last_accrual: Timestamp,
}

impl AccrualState {
    pub fn new(target_apr: u64, start: Timestamp) -> Self {
        Self {
            total_underlying: 0,
            target_apr,
            last_accrual: start,
        }
    }

    /// Income accrued since `last_accrual`, not yet applied.
    pub fn pending_delta(&self, now: Timestamp) -> Result<u128, MathError> {
        accrual_delta(
            self.total_underlying,
            self.target_apr,
            self.last_accrual.elapsed_since(now),
        )
    }

    /// Apply income up to `now`; returns the delta.
    ///
    /// A `now` at or before `last_accrual` is a no-op, so calling this twice
    /// at the same timestamp is idempotent.
    pub fn accrue(&mut self, now: Timestamp) -> Result<u128, MathError> {
        let delta = self.pending_delta(now)?;
        let total = self
            .total_underlying
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        self.total_underlying = total;
        if now > self.last_accrual {
            self.last_accrual = now;
        }
        Ok(delta)
    }

    /// A copy of this state accrued to `now`, plus the delta applied.
    pub fn accrued_at(&self, now: Timestamp) -> Result<(AccrualState, u128), MathError> {
        let mut copy = self.clone();
        let delta = copy.accrue(now)?;
        Ok((copy, delta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EIGHT_PERCENT: u64 = 8_000_000;

    fn funded(total: u128, apr: u64) -> AccrualState {
        let mut state = AccrualState::new(apr, Timestamp::new(0));
        state.total_underlying = total;
        state
    }

    #[test]
    fn test_one_year_at_eight_percent() {
        let mut state = funded(100_000_000, EIGHT_PERCENT);
        let delta = state.accrue(Timestamp::new(SECONDS_PER_YEAR)).unwrap();
        assert_eq!(delta, 8_000_000);
        assert_eq!(state.total_underlying, 108_000_000);
        assert_eq!(state.last_accrual, Timestamp::new(SECONDS_PER_YEAR));
    }

    #[test]
    fn test_accrue_is_idempotent_at_same_time() {
        let mut state = funded(1_000_000_000, EIGHT_PERCENT);
        let now = Timestamp::new(86_400);
        let first = state.accrue(now).unwrap();
        let second = state.accrue(now).unwrap();
        assert!(first > 0);
        assert_eq!(second, 0);
    }

    #[test]
    fn test_zero_apr_accrues_nothing() {
        let mut state = funded(1_000_000, 0);
        assert_eq!(state.accrue(Timestamp::new(SECONDS_PER_YEAR * 10)).unwrap(), 0);
        assert_eq!(state.total_underlying, 1_000_000);
    }

    #[test]
    fn test_earlier_timestamp_does_not_rewind() {
        let mut state = funded(1_000_000, EIGHT_PERCENT);
        state.accrue(Timestamp::new(1_000)).unwrap();
        assert_eq!(state.accrue(Timestamp::new(500)).unwrap(), 0);
        assert_eq!(state.last_accrual, Timestamp::new(1_000));
    }

    #[test]
    fn test_accrued_at_leaves_original_untouched() {
        let state = funded(100_000_000, EIGHT_PERCENT);
        let (copy, delta) = state.accrued_at(Timestamp::new(SECONDS_PER_YEAR)).unwrap();
        assert_eq!(delta, 8_000_000);
        assert_eq!(copy.total_underlying, 108_000_000);
        assert_eq!(state.total_underlying, 100_000_000);
        assert_eq!(state.last_accrual, Timestamp::new(0));
    }

    #[test]
    fn test_large_balance_over_long_horizon_does_not_overflow() {
        // 10^30 base units over a century needs a wide intermediate.
        let state = funded(1_000_000_000_000_000_000_000_000_000_000, 10_000_000);
        let delta = state.pending_delta(Timestamp::new(SECONDS_PER_YEAR * 100)).unwrap();
        assert_eq!(delta, 1_000_000_000_000_000_000_000_000_000_000 * 10);
    }
}
