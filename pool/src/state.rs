//! Complete, serializable state of one pool.

use serde::{Deserialize, Serialize};

use tide_types::params::{
    CLAIM_TOKEN_DECIMALS, FEE_COEFFICIENT, MAX_FEE_RATE, MAX_MANAGEMENT_FEE_RATE,
};
use tide_types::{AccountId, PoolParams, Timestamp};

use crate::accrual::AccrualState;
use crate::error::PoolError;
use crate::fees::{ensure_within, FeeSchedule, ManagementFeeBook};
use crate::ledger::ClaimLedger;
use crate::queue::WithdrawalQueue;
use crate::rate::ExchangeRate;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    /// Claim-token base units per underlying base unit in an empty pool.
    pub initial_ctoken_to_underlying: u128,
    pub apr_ceiling: u64,
    pub accrual: AccrualState,
    pub fees: FeeSchedule,
    pub management: ManagementFeeBook,
    pub capital_lower_bound: u128,
    pub process_period_secs: u64,
    pub depeg_tolerance: Option<u64>,
    pub paused: bool,
    pub fee_collector: AccountId,
    pub protocol_fee_collector: AccountId,
    pub management_fee_collector: AccountId,
    pub ledger: ClaimLedger,
    pub queue: WithdrawalQueue,
}

impl PoolState {
    /// Validate `params` and build an empty pool starting at `genesis`.
    pub fn new(params: &PoolParams, genesis: Timestamp) -> Result<Self, PoolError> {
        validate_params(params)?;
        Ok(Self {
            initial_ctoken_to_underlying: params.initial_ctoken_to_underlying()?,
            apr_ceiling: params.apr_ceiling,
            accrual: AccrualState::new(params.target_apr, genesis),
            fees: FeeSchedule {
                mint_fee_rate: params.mint_fee_rate,
                redeem_fee_rate: params.redeem_fee_rate,
                protocol_fee_rate: params.protocol_fee_rate,
                interest_cost_fee_rate: params.interest_cost_fee_rate,
                management_fee_rate: params.management_fee_rate,
            },
            management: ManagementFeeBook::default(),
            capital_lower_bound: params.capital_lower_bound,
            process_period_secs: params.process_period_secs,
            depeg_tolerance: params.depeg_tolerance,
            paused: false,
            fee_collector: params.fee_collector.clone(),
            protocol_fee_collector: params.protocol_fee_collector.clone(),
            management_fee_collector: params.management_fee_collector.clone(),
            ledger: ClaimLedger::new(),
            queue: WithdrawalQueue::new(),
        })
    }

    /// Exchange rate against the stored (not yet accrued) totals.
    pub fn exchange_rate(&self) -> ExchangeRate {
        self.exchange_rate_with(&self.accrual)
    }

    pub fn exchange_rate_with(&self, accrual: &AccrualState) -> ExchangeRate {
        ExchangeRate::new(
            accrual.total_underlying,
            self.ledger.total_supply(),
            self.initial_ctoken_to_underlying,
        )
    }
}

/// Check every rate against its ceiling and every identity for sanity.
pub fn validate_params(params: &PoolParams) -> Result<(), PoolError> {
    if params.underlying_decimals > CLAIM_TOKEN_DECIMALS {
        return Err(PoolError::InvalidParameter(format!(
            "underlying decimals {} exceed claim-token decimals {}",
            params.underlying_decimals, CLAIM_TOKEN_DECIMALS
        )));
    }
    ensure_within(params.apr_ceiling, FEE_COEFFICIENT)?;
    ensure_within(params.target_apr, params.apr_ceiling)?;
    ensure_within(params.mint_fee_rate, MAX_FEE_RATE)?;
    ensure_within(params.redeem_fee_rate, MAX_FEE_RATE)?;
    ensure_within(params.protocol_fee_rate, MAX_FEE_RATE)?;
    ensure_within(params.interest_cost_fee_rate, MAX_FEE_RATE)?;
    ensure_within(params.management_fee_rate, MAX_MANAGEMENT_FEE_RATE)?;
    if let Some(tolerance) = params.depeg_tolerance {
        ensure_within(tolerance, FEE_COEFFICIENT)?;
    }
    for (name, account) in [
        ("admin", &params.admin),
        ("fee_collector", &params.fee_collector),
        ("protocol_fee_collector", &params.protocol_fee_collector),
        ("management_fee_collector", &params.management_fee_collector),
    ] {
        if !account.is_valid() {
            return Err(PoolError::InvalidParameter(format!("{name} must not be empty")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        let state = PoolState::new(&PoolParams::default(), Timestamp::new(10)).unwrap();
        assert_eq!(state.initial_ctoken_to_underlying, 1_000_000_000_000);
        assert_eq!(state.accrual.last_accrual, Timestamp::new(10));
        assert_eq!(state.ledger.total_supply(), 0);
        assert!(!state.paused);
    }

    #[test]
    fn test_fee_above_one_percent_rejected() {
        let params = PoolParams {
            mint_fee_rate: 10_000_000,
            ..PoolParams::default()
        };
        assert!(matches!(
            PoolState::new(&params, Timestamp::EPOCH),
            Err(PoolError::RateExceedsCeiling { rate: 10_000_000, ceiling: 1_000_000 })
        ));
    }

    #[test]
    fn test_apr_above_ceiling_rejected() {
        let params = PoolParams {
            target_apr: 100_000_000,
            ..PoolParams::default()
        };
        assert!(PoolState::new(&params, Timestamp::EPOCH).is_err());
    }

    #[test]
    fn test_empty_collector_rejected() {
        let params = PoolParams {
            fee_collector: AccountId::new(""),
            ..PoolParams::default()
        };
        assert!(matches!(
            PoolState::new(&params, Timestamp::EPOCH),
            Err(PoolError::InvalidParameter(_))
        ));
    }
}
