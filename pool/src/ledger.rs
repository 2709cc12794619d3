//! Claim-token ledger: balances, allowances, and total supply.
//!
//! The ledger knows nothing about underlying value or pausing; the pool wraps
//! it with those checks. `sum(balances) == total_supply` holds after every
//! successful call, and a failed call leaves the ledger untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use tide_types::AccountId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("insufficient claim balance: need {needed}, available {available}")]
    InsufficientBalance { needed: u128, available: u128 },

    #[error("insufficient allowance: need {needed}, approved {approved}")]
    InsufficientAllowance { needed: u128, approved: u128 },

    #[error("claim supply overflow")]
    SupplyOverflow,
}

/// Fungible claim-token balances.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimLedger {
    balances: BTreeMap<AccountId, u128>,
    /// owner → spender → remaining allowance. `u128::MAX` never decreases.
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
    total_supply: u128,
}

impl ClaimLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn balance_of(&self, holder: &AccountId) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Number of accounts with a non-zero balance.
    pub fn holder_count(&self) -> usize {
        self.balances.len()
    }

    pub fn holders(&self) -> impl Iterator<Item = (&AccountId, u128)> {
        self.balances.iter().map(|(k, v)| (k, *v))
    }

    /// Fail unless `holder` owns at least `amount`.
    pub fn ensure_balance(&self, holder: &AccountId, amount: u128) -> Result<(), LedgerError> {
        let available = self.balance_of(holder);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Fail unless minting `amount` more would keep the supply in range.
    pub fn ensure_mintable(&self, amount: u128) -> Result<(), LedgerError> {
        self.total_supply
            .checked_add(amount)
            .map(|_| ())
            .ok_or(LedgerError::SupplyOverflow)
    }

    pub fn transfer(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        if amount == 0 || from == to {
            return self.ensure_balance(from, amount);
        }
        self.ensure_balance(from, amount)?;
        self.debit(from, amount);
        self.credit(to, amount);
        Ok(())
    }

    pub fn approve(&mut self, owner: &AccountId, spender: &AccountId, amount: u128) {
        let spenders = self.allowances.entry(owner.clone()).or_default();
        if amount == 0 {
            spenders.remove(spender);
            if spenders.is_empty() {
                self.allowances.remove(owner);
            }
        } else {
            spenders.insert(spender.clone(), amount);
        }
    }

    /// Move `amount` from `owner` to `to` on behalf of `spender`.
    pub fn transfer_from(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), LedgerError> {
        let approved = self.allowance(owner, spender);
        if approved < amount {
            return Err(LedgerError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        self.transfer(owner, to, amount)?;
        if approved != u128::MAX && amount > 0 {
            self.approve(owner, spender, approved - amount);
        }
        Ok(())
    }

    pub fn mint(&mut self, to: &AccountId, amount: u128) -> Result<(), LedgerError> {
        if amount == 0 {
            return Ok(());
        }
        self.total_supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(LedgerError::SupplyOverflow)?;
        self.credit(to, amount);
        Ok(())
    }

    /// Mint to several accounts at once; all or nothing.
    pub fn mint_batch(&mut self, credits: &[(&AccountId, u128)]) -> Result<(), LedgerError> {
        let total = credits
            .iter()
            .try_fold(0u128, |acc, (_, amount)| acc.checked_add(*amount))
            .ok_or(LedgerError::SupplyOverflow)?;
        self.ensure_mintable(total)?;
        for (to, amount) in credits {
            self.mint(to, *amount)?;
        }
        Ok(())
    }

    pub fn burn(&mut self, from: &AccountId, amount: u128) -> Result<(), LedgerError> {
        self.ensure_balance(from, amount)?;
        if amount == 0 {
            return Ok(());
        }
        self.debit(from, amount);
        self.total_supply -= amount;
        Ok(())
    }

    // Callers check the balance first; a credit can never exceed the supply.
    fn debit(&mut self, holder: &AccountId, amount: u128) {
        if let Some(balance) = self.balances.get_mut(holder) {
            *balance -= amount;
            if *balance == 0 {
                self.balances.remove(holder);
            }
        }
    }

    fn credit(&mut self, holder: &AccountId, amount: u128) {
        *self.balances.entry(holder.clone()).or_insert(0) += amount;
    }
}
