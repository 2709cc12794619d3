//! Fee splitting for mint and redeem, and management-fee bookkeeping.
//!
//! All rates are integers over `FEE_COEFFICIENT`; every fee is floored, so
//! rounding always favours the pool over the fee recipients.

use serde::{Deserialize, Serialize};

use tide_types::params::FEE_COEFFICIENT;
use tide_types::{mul_div, MathError};

use crate::error::PoolError;
use crate::rate::ExchangeRate;

/// `amount × rate / FEE_COEFFICIENT`, floored.
pub fn fee_of(amount: u128, rate: u64) -> Result<u128, MathError> {
    mul_div(amount, u128::from(rate), u128::from(FEE_COEFFICIENT))
}

/// Reject `rate` above `ceiling`.
pub fn ensure_within(rate: u64, ceiling: u64) -> Result<(), PoolError> {
    if rate > ceiling {
        return Err(PoolError::RateExceedsCeiling { rate, ceiling });
    }
    Ok(())
}

/// Current fee rates of a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub mint_fee_rate: u64,
    pub redeem_fee_rate: u64,
    pub protocol_fee_rate: u64,
    pub interest_cost_fee_rate: u64,
    pub management_fee_rate: u64,
}

/// How a deposit of `underlying` is divided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintSplit {
    pub underlying: u128,
    /// Paid out in underlying to the fee collector; never enters the pool.
    pub interest_cost_fee: u128,
    pub pool_fee: u128,
    pub protocol_fee: u128,
    /// Underlying credited to the recipient's claim.
    pub to_pool: u128,
    pub claim_to_recipient: u128,
    pub claim_to_fee_collector: u128,
    pub claim_to_protocol_collector: u128,
}

impl MintSplit {
    /// Underlying that stays in the pool (everything but the interest-cost fee).
    pub fn retained_underlying(&self) -> u128 {
        self.underlying - self.interest_cost_fee
    }

    pub fn total_claims(&self) -> Result<u128, MathError> {
        self.claim_to_recipient
            .checked_add(self.claim_to_fee_collector)
            .and_then(|sum| sum.checked_add(self.claim_to_protocol_collector))
            .ok_or(MathError::Overflow)
    }
}

/// How a redemption of `claim` tokens is divided.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemSplit {
    pub claim: u128,
    pub gross: u128,
    pub pool_fee: u128,
    pub protocol_fee: u128,
    pub after_fee: u128,
}

impl FeeSchedule {
    /// Split a deposit against an already-accrued exchange rate.
    pub fn split_mint(&self, underlying: u128, rate: &ExchangeRate) -> Result<MintSplit, MathError> {
        let interest_cost_fee = fee_of(underlying, self.interest_cost_fee_rate)?;
        let remainder = underlying
            .checked_sub(interest_cost_fee)
            .ok_or(MathError::Underflow)?;
        let pool_fee = fee_of(remainder, self.mint_fee_rate)?;
        let protocol_fee = fee_of(remainder, self.protocol_fee_rate)?;
        let to_pool = remainder
            .checked_sub(pool_fee)
            .and_then(|r| r.checked_sub(protocol_fee))
            .ok_or(MathError::Underflow)?;

        Ok(MintSplit {
            underlying,
            interest_cost_fee,
            pool_fee,
            protocol_fee,
            to_pool,
            claim_to_recipient: rate.ctoken_by_underlying(to_pool)?,
            claim_to_fee_collector: rate.ctoken_by_underlying(pool_fee)?,
            claim_to_protocol_collector: rate.ctoken_by_underlying(protocol_fee)?,
        })
    }

    /// Split a redemption against an already-accrued exchange rate.
    pub fn split_redeem(&self, claim: u128, rate: &ExchangeRate) -> Result<RedeemSplit, MathError> {
        let gross = rate.underlying_by_ctoken(claim)?;
        let pool_fee = fee_of(gross, self.redeem_fee_rate)?;
        let protocol_fee = fee_of(gross, self.protocol_fee_rate)?;
        let after_fee = gross
            .checked_sub(pool_fee)
            .and_then(|r| r.checked_sub(protocol_fee))
            .ok_or(MathError::Underflow)?;
        Ok(RedeemSplit {
            claim,
            gross,
            pool_fee,
            protocol_fee,
            after_fee,
        })
    }
}

/// Management fee owed on income since the last claim.
///
/// A rate change freezes what was earned at the old rate into
/// `crystallized` and restarts the income baseline, so the fee owed is never
/// recomputed retroactively at a new rate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagementFeeBook {
    pub income_since_last_claim: u128,
    pub crystallized: u128,
}

impl ManagementFeeBook {
    pub fn record_income(&mut self, delta: u128) -> Result<(), MathError> {
        self.income_since_last_claim = self
            .income_since_last_claim
            .checked_add(delta)
            .ok_or(MathError::Overflow)?;
        Ok(())
    }

    /// Fee owed at `rate`, including anything crystallized earlier.
    pub fn pending(&self, rate: u64) -> Result<u128, MathError> {
        fee_of(self.income_since_last_claim, rate)?
            .checked_add(self.crystallized)
            .ok_or(MathError::Overflow)
    }

    /// Fix the fee earned so far at `rate` and restart the income baseline.
    pub fn crystallize(&mut self, rate: u64) -> Result<(), MathError> {
        self.crystallized = self.pending(rate)?;
        self.income_since_last_claim = 0;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.income_since_last_claim = 0;
        self.crystallized = 0;
    }
}
