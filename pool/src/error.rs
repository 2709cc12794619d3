//! Pool errors.

use thiserror::Error;

use tide_types::{AccountId, MathError, Role};

use crate::custody::CustodyError;
use crate::ledger::LedgerError;
use crate::queue::QueueError;

/// Coarse classification of every failure a pool operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself is malformed (zero amount, rate above ceiling).
    Validation,
    /// The request is well-formed but the pool cannot honour it right now.
    State,
    /// The caller lacks the required role.
    Authorization,
    /// Withdrawal-order lookups and lifecycle violations.
    Queue,
    /// The custody collaborator refused or failed a transfer.
    ExternalTransfer,
}

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("rate {rate} exceeds ceiling {ceiling}")]
    RateExceedsCeiling { rate: u64, ceiling: u64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("pool is paused")]
    Paused,

    #[error("peg deviation {deviation} exceeds tolerance {tolerance}")]
    Depegged { deviation: u64, tolerance: u64 },

    #[error("redeem would leave {remaining} underlying, below the lower bound {lower_bound}")]
    BelowCapitalLowerBound { remaining: u128, lower_bound: u128 },

    #[error("{account} does not hold role {role}")]
    Unauthorized { account: AccountId, role: Role },

    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("withdrawal queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("custody error: {0}")]
    Custody(#[from] CustodyError),

    #[error("arithmetic error: {0}")]
    Math(#[from] MathError),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::ZeroAmount
            | PoolError::RateExceedsCeiling { .. }
            | PoolError::InvalidParameter(_) => ErrorKind::Validation,
            PoolError::Paused
            | PoolError::Depegged { .. }
            | PoolError::BelowCapitalLowerBound { .. }
            | PoolError::Ledger(_)
            | PoolError::Math(_) => ErrorKind::State,
            PoolError::Unauthorized { .. } => ErrorKind::Authorization,
            PoolError::Queue(_) => ErrorKind::Queue,
            PoolError::Custody(_) => ErrorKind::ExternalTransfer,
        }
    }

    /// Numeric reason code reported to integrators that match on codes
    /// rather than messages.
    pub fn code(&self) -> Option<u16> {
        match self {
            PoolError::Ledger(LedgerError::InsufficientBalance { .. }) => Some(100),
            PoolError::BelowCapitalLowerBound { .. } => Some(102),
            PoolError::Queue(QueueError::NotOwner { .. }) => Some(105),
            PoolError::Queue(QueueError::AlreadySettled(_)) => Some(106),
            PoolError::Queue(QueueError::NotMatured { .. }) => Some(108),
            _ => None,
        }
    }
}
