//! Pool parameters and the fixed-point constants they are expressed in.

use serde::{Deserialize, Serialize};

use crate::account::AccountId;
use crate::error::MathError;
use crate::math::pow10;

// ── Fixed-point constants ────────────────────────────────────────────────

/// Denominator of every fee rate: `500_000` is 0.5%.
pub const FEE_COEFFICIENT: u64 = 100_000_000;

/// Denominator of the target APR: `8_000_000` is 8% per year.
pub const APR_COEFFICIENT: u64 = FEE_COEFFICIENT;

pub const SECONDS_PER_YEAR: u64 = 365 * 86_400;

/// Ceiling for mint, redeem, protocol and interest-cost fee rates (1%).
pub const MAX_FEE_RATE: u64 = 1_000_000;

/// Ceiling for the management fee rate (100% of income).
pub const MAX_MANAGEMENT_FEE_RATE: u64 = FEE_COEFFICIENT;

/// Default ceiling for the target APR (10%).
pub const DEFAULT_APR_CEILING: u64 = 10_000_000;

pub const CLAIM_TOKEN_DECIMALS: u8 = 18;

/// One whole claim token; also the scale `price_per_token` is reported in.
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// A peg price feed reports 1.0 as this value.
pub const PEG_PRICE: u64 = FEE_COEFFICIENT;

pub const DEFAULT_UNDERLYING_DECIMALS: u8 = 6;

pub const DEFAULT_PROCESS_PERIOD_SECS: u64 = 7 * 86_400;

/// Initial configuration of a pool.
///
/// Everything here except `underlying_decimals` and `apr_ceiling` can be
/// changed later by the holder of the matching role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolParams {
    // ── Denomination ─────────────────────────────────────────────────────
    /// Decimals of the underlying asset (claim tokens always carry 18).
    pub underlying_decimals: u8,

    // ── Yield ────────────────────────────────────────────────────────────
    /// Upper bound accepted by `set_target_apr`, in `APR_COEFFICIENT` units.
    pub apr_ceiling: u64,
    /// Annual growth rate of the underlying, in `APR_COEFFICIENT` units.
    pub target_apr: u64,

    // ── Fees (all in `FEE_COEFFICIENT` units) ────────────────────────────
    pub mint_fee_rate: u64,
    pub redeem_fee_rate: u64,
    pub protocol_fee_rate: u64,
    /// Taken off the top of every deposit, paid out in underlying.
    pub interest_cost_fee_rate: u64,
    /// Share of accrued income owed to the management fee collector.
    pub management_fee_rate: u64,

    // ── Liquidity ────────────────────────────────────────────────────────
    /// Redemptions that would leave less underlying than this are refused.
    pub capital_lower_bound: u128,
    /// Delay between a redeem and the maturity of its withdrawal order.
    pub process_period_secs: u64,
    /// Maximum tolerated peg deviation (fee units); `None` disables the guard.
    pub depeg_tolerance: Option<u64>,

    // ── Identities ───────────────────────────────────────────────────────
    /// Initial holder of every role.
    pub admin: AccountId,
    pub fee_collector: AccountId,
    pub protocol_fee_collector: AccountId,
    pub management_fee_collector: AccountId,
}

impl PoolParams {
    /// Defaults with every identity set to `admin`.
    pub fn with_admin(admin: AccountId) -> Self {
        Self {
            underlying_decimals: DEFAULT_UNDERLYING_DECIMALS,
            apr_ceiling: DEFAULT_APR_CEILING,
            target_apr: 0,
            mint_fee_rate: 0,
            redeem_fee_rate: 0,
            protocol_fee_rate: 0,
            interest_cost_fee_rate: 0,
            management_fee_rate: 0,
            capital_lower_bound: 0,
            process_period_secs: DEFAULT_PROCESS_PERIOD_SECS,
            depeg_tolerance: None,
            fee_collector: admin.clone(),
            protocol_fee_collector: admin.clone(),
            management_fee_collector: admin.clone(),
            admin,
        }
    }

    /// Claim-token base units per underlying base unit in an empty pool.
    ///
    /// `10^(18 - underlying_decimals)`, so 1e12 for a 6-decimal asset.
    pub fn initial_ctoken_to_underlying(&self) -> Result<u128, MathError> {
        let exp = CLAIM_TOKEN_DECIMALS
            .checked_sub(self.underlying_decimals)
            .ok_or(MathError::Underflow)?;
        pow10(u32::from(exp))
    }
}

impl Default for PoolParams {
    fn default() -> Self {
        Self::with_admin(AccountId::new("admin"))
    }
}
