//! Pool snapshots: versioned, checksummed serialization of the full state.
//!
//! A snapshot carries its schema version in the first four bytes so older
//! encodings can be recognised and migrated before being decoded as the
//! current schema. Version 1 predates the interest-cost and management fees
//! and charged the withdraw fee at settlement instead of at redeem.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use tide_types::params::DEFAULT_APR_CEILING;
use tide_types::{AccountId, Timestamp};

use crate::access::RoleRegistry;
use crate::accrual::AccrualState;
use crate::custody::Custody;
use crate::fees::{FeeSchedule, ManagementFeeBook};
use crate::ledger::ClaimLedger;
use crate::pool::Pool;
use crate::queue::{WithdrawalOrder, WithdrawalQueue};
use crate::state::PoolState;

pub const CURRENT_SNAPSHOT_VERSION: u32 = 2;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("snapshot checksum mismatch")]
    ChecksumMismatch,

    #[error("snapshot is truncated")]
    Truncated,

    #[error("snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

/// The state of a pool and its role assignments at one point in time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Schema version; always the first field.
    pub version: u32,
    /// Blake2b-256 of the encoded state and roles.
    pub checksum: [u8; 32],
    pub state: PoolState,
    pub roles: RoleRegistry,
}

impl PoolSnapshot {
    pub fn capture(state: &PoolState, roles: &RoleRegistry) -> Result<Self, SnapshotError> {
        Ok(Self {
            version: CURRENT_SNAPSHOT_VERSION,
            checksum: compute_checksum(state, roles)?,
            state: state.clone(),
            roles: roles.clone(),
        })
    }

    /// Whether the checksum matches the state and roles.
    pub fn verify(&self) -> bool {
        compute_checksum(&self.state, &self.roles).is_ok_and(|sum| sum == self.checksum)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SnapshotError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode a snapshot of any supported version, migrating as needed.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SnapshotError> {
        let header: [u8; 4] = bytes
            .get(..4)
            .and_then(|b| b.try_into().ok())
            .ok_or(SnapshotError::Truncated)?;
        match u32::from_le_bytes(header) {
            1 => {
                let v1: PoolSnapshotV1 = bincode::deserialize(bytes)?;
                v1.migrate()
            }
            CURRENT_SNAPSHOT_VERSION => {
                let snapshot: PoolSnapshot = bincode::deserialize(bytes)?;
                if !snapshot.verify() {
                    return Err(SnapshotError::ChecksumMismatch);
                }
                Ok(snapshot)
            }
            other => Err(SnapshotError::UnsupportedVersion(other)),
        }
    }
}

fn compute_checksum(state: &PoolState, roles: &RoleRegistry) -> Result<[u8; 32], SnapshotError> {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(bincode::serialize(state)?);
    hasher.update(bincode::serialize(roles)?);
    let result = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&result);
    Ok(out)
}

// ── Version 1 ──────────────────────────────────────────────────────────

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolSnapshotV1 {
    pub version: u32,
    pub state: PoolStateV1,
    pub roles: RoleRegistry,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolStateV1 {
    pub initial_ctoken_to_underlying: u128,
    pub total_underlying: u128,
    pub target_apr: u64,
    pub last_accrual: Timestamp,
    pub mint_fee_rate: u64,
    pub withdraw_fee_rate: u64,
    pub protocol_fee_rate: u64,
    pub capital_lower_bound: u128,
    pub process_period_secs: u64,
    pub paused: bool,
    pub fee_collector: AccountId,
    pub protocol_fee_collector: AccountId,
    pub ledger: ClaimLedger,
    pub orders: Vec<WithdrawalOrderV1>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalOrderV1 {
    pub id: u64,
    pub owner: AccountId,
    pub underlying_amount: u128,
    pub created_at: Timestamp,
    pub settled: bool,
}

impl PoolSnapshotV1 {
    /// Lift to the current schema.
    ///
    /// New fee rates start at zero and the management collector defaults to
    /// the fee collector. Open v1 orders pay out their full amount: their
    /// withdraw fee was due at settlement, a step the current schema no
    /// longer has.
    pub fn migrate(self) -> Result<PoolSnapshot, SnapshotError> {
        let v1 = self.state;
        let process_period = v1.process_period_secs;
        let orders = v1.orders.into_iter().map(|o| WithdrawalOrder {
            id: o.id,
            owner: o.owner,
            underlying_amount_gross: o.underlying_amount,
            underlying_amount_after_fee: o.underlying_amount,
            protocol_fee_amount: 0,
            pool_fee_amount: 0,
            created_at: o.created_at,
            matures_at: o.created_at.plus_secs(process_period),
            settled: o.settled,
        });
        let state = PoolState {
            initial_ctoken_to_underlying: v1.initial_ctoken_to_underlying,
            apr_ceiling: DEFAULT_APR_CEILING.max(v1.target_apr),
            accrual: AccrualState {
                total_underlying: v1.total_underlying,
                target_apr: v1.target_apr,
                last_accrual: v1.last_accrual,
            },
            fees: FeeSchedule {
                mint_fee_rate: v1.mint_fee_rate,
                redeem_fee_rate: v1.withdraw_fee_rate,
                protocol_fee_rate: v1.protocol_fee_rate,
                interest_cost_fee_rate: 0,
                management_fee_rate: 0,
            },
            management: ManagementFeeBook::default(),
            capital_lower_bound: v1.capital_lower_bound,
            process_period_secs: process_period,
            depeg_tolerance: None,
            paused: v1.paused,
            management_fee_collector: v1.fee_collector.clone(),
            fee_collector: v1.fee_collector,
            protocol_fee_collector: v1.protocol_fee_collector,
            ledger: v1.ledger,
            queue: WithdrawalQueue::from_orders(orders),
        };
        PoolSnapshot::capture(&state, &self.roles)
    }
}

// ── Pool integration ───────────────────────────────────────────────────

impl<C: Custody> Pool<C, RoleRegistry> {
    pub fn snapshot(&self) -> Result<PoolSnapshot, SnapshotError> {
        PoolSnapshot::capture(self.state(), self.access())
    }

    /// Rebuild a pool from a verified snapshot.
    pub fn restore(snapshot: PoolSnapshot, custody: C) -> Result<Self, SnapshotError> {
        if !snapshot.verify() {
            return Err(SnapshotError::ChecksumMismatch);
        }
        Ok(Pool::from_state(snapshot.state, custody, snapshot.roles))
    }
}
