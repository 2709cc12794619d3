//! Collaborators that hold and move the underlying asset.
//!
//! The pool only does accounting. Every transfer of underlying goes through a
//! [`Custody`] implementation, and the pool commits its own state only after
//! custody reports success.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tide_types::AccountId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CustodyError {
    #[error("insufficient underlying for {account}: need {needed}, available {available}")]
    InsufficientFunds {
        account: AccountId,
        needed: u128,
        available: u128,
    },

    #[error("transfer rejected: {0}")]
    Rejected(String),

    #[error("custody unavailable: {0}")]
    Unavailable(String),
}

/// One outgoing transfer of underlying.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub to: AccountId,
    pub amount: u128,
}

impl Payout {
    pub fn new(to: AccountId, amount: u128) -> Self {
        Self { to, amount }
    }
}

/// Holder of the pool's underlying reserves.
pub trait Custody {
    /// Pull `amount` of underlying from `from` into the reserves.
    fn receive_deposit(&self, from: &AccountId, amount: u128) -> Result<(), CustodyError>;

    /// Pay `amount` of underlying out of the reserves to `to`.
    fn release_withdrawal(&self, to: &AccountId, amount: u128) -> Result<(), CustodyError>;

    /// Pay several recipients. Implementations that can do this atomically
    /// should override the default, which stops at the first failure.
    fn release_batch(&self, payouts: &[Payout]) -> Result<(), CustodyError> {
        for payout in payouts.iter().filter(|p| p.amount > 0) {
            self.release_withdrawal(&payout.to, payout.amount)?;
        }
        Ok(())
    }

    /// Take a deposit and immediately forward part of it.
    ///
    /// The default refunds the depositor when forwarding fails.
    fn receive_and_forward(
        &self,
        from: &AccountId,
        amount: u128,
        forward: &[Payout],
    ) -> Result<(), CustodyError> {
        self.receive_deposit(from, amount)?;
        if let Err(e) = self.release_batch(forward) {
            self.release_withdrawal(from, amount)?;
            return Err(e);
        }
        Ok(())
    }

    /// Current deviation of the underlying from its peg, in fee units.
    fn current_peg_deviation(&self) -> Result<u64, CustodyError> {
        Ok(0)
    }
}

/// Optional oracle for the underlying's market price.
pub trait PriceFeed {
    /// Price of one underlying unit; `PEG_PRICE` means exactly on peg.
    fn peg_price(&self) -> Result<u64, CustodyError>;
}

impl<T: PriceFeed + ?Sized> PriceFeed for std::sync::Arc<T> {
    fn peg_price(&self) -> Result<u64, CustodyError> {
        (**self).peg_price()
    }
}

impl<T: Custody + ?Sized> Custody for std::sync::Arc<T> {
    fn receive_deposit(&self, from: &AccountId, amount: u128) -> Result<(), CustodyError> {
        (**self).receive_deposit(from, amount)
    }

    fn release_withdrawal(&self, to: &AccountId, amount: u128) -> Result<(), CustodyError> {
        (**self).release_withdrawal(to, amount)
    }

    fn release_batch(&self, payouts: &[Payout]) -> Result<(), CustodyError> {
        (**self).release_batch(payouts)
    }

    fn receive_and_forward(
        &self,
        from: &AccountId,
        amount: u128,
        forward: &[Payout],
    ) -> Result<(), CustodyError> {
        (**self).receive_and_forward(from, amount, forward)
    }

    fn current_peg_deviation(&self) -> Result<u64, CustodyError> {
        (**self).current_peg_deviation()
    }
}
