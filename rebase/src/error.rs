//! Wrapper errors.

use thiserror::Error;

use tide_pool::{ErrorKind, PoolError};
use tide_types::{AccountId, MathError};

#[derive(Debug, Error)]
pub enum RebaseError {
    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("wrapper is paused")]
    Paused,

    #[error("insufficient shares: need {needed}, have {available}")]
    InsufficientShares { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: u128, approved: u128 },

    #[error("account {0} is not a wrapper admin")]
    Unauthorized(AccountId),

    #[error("unsupported wrapper snapshot version {0}")]
    UnsupportedVersion(u32),

    #[error("wrapper snapshot encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Math(#[from] MathError),
}

impl RebaseError {
    /// Classification shared with the pool's error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ZeroAmount | Self::UnsupportedVersion(_) | Self::Encoding(_) => {
                ErrorKind::Validation
            }
            Self::Paused
            | Self::InsufficientShares { .. }
            | Self::InsufficientAllowance { .. }
            | Self::Math(_) => ErrorKind::State,
            Self::Unauthorized(_) => ErrorKind::Authorization,
            Self::Pool(e) => e.kind(),
        }
    }
}
