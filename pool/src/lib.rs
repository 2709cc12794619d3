//! Pool engine for a yield-bearing pooled asset.
//!
//! Depositors mint claim tokens against underlying; the underlying grows at
//! a target APR and every claim token's redemption value grows with it.
//! Redemptions burn claim tokens and queue a withdrawal order that matures
//! after a processing delay and is settled once by its owner.
//!
//! This crate handles:
//! - Accrual of interest and the claim/underlying exchange rate
//! - Mint and redeem fee splitting, and the management fee on income
//! - The claim-token ledger and the withdrawal queue
//! - Role checks, the depeg guard, and versioned snapshots
//!
//! Underlying custody is external: see [`Custody`].

pub mod access;
pub mod accrual;
pub mod custody;
pub mod error;
pub mod fees;
pub mod ledger;
pub mod pool;
pub mod queue;
pub mod rate;
pub mod snapshot;
pub mod state;

pub use access::{AccessControl, RoleRegistry};
pub use accrual::{accrual_delta, AccrualState};
pub use custody::{Custody, CustodyError, Payout, PriceFeed};
pub use error::{ErrorKind, PoolError};
pub use fees::{FeeSchedule, ManagementFeeBook, MintSplit, RedeemSplit};
pub use ledger::{ClaimLedger, LedgerError};
pub use pool::Pool;
pub use queue::{OrderId, OrderStatus, QueueError, WithdrawalOrder, WithdrawalQueue};
pub use rate::ExchangeRate;
pub use snapshot::{PoolSnapshot, SnapshotError, CURRENT_SNAPSHOT_VERSION};
pub use state::PoolState;
