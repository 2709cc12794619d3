//! The pool as seen by the wrapper.

use tide_pool::{AccessControl, Custody, MintSplit, Pool, PoolError};
use tide_types::{AccountId, Timestamp};

/// The claim-token operations a wrapper needs from its pool.
pub trait ClaimPool {
    /// Claim-token base units per underlying base unit in an empty pool.
    fn initial_ctoken_to_underlying(&self) -> u128;

    fn underlying_by_ctoken(&self, claim: u128, now: Timestamp) -> Result<u128, PoolError>;

    fn claim_balance_of(&self, holder: &AccountId) -> u128;

    /// Move `amount` claim tokens of `owner` to `to` on `spender`'s allowance.
    fn pull_claims(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError>;

    fn push_claims(&mut self, from: &AccountId, to: &AccountId, amount: u128)
        -> Result<(), PoolError>;

    /// Deposit `underlying` from `caller`, crediting the claim tokens to `recipient`.
    fn mint_claims_for(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        underlying: u128,
        now: Timestamp,
    ) -> Result<MintSplit, PoolError>;
}

impl<C: Custody, A: AccessControl> ClaimPool for Pool<C, A> {
    fn initial_ctoken_to_underlying(&self) -> u128 {
        Pool::initial_ctoken_to_underlying(self)
    }

    fn underlying_by_ctoken(&self, claim: u128, now: Timestamp) -> Result<u128, PoolError> {
        self.get_underlying_by_ctoken(claim, now)
    }

    fn claim_balance_of(&self, holder: &AccountId) -> u128 {
        self.balance_of(holder)
    }

    fn pull_claims(
        &mut self,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        self.transfer_from(spender, owner, to, amount)
    }

    fn push_claims(
        &mut self,
        from: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        self.transfer(from, to, amount)
    }

    fn mint_claims_for(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        underlying: u128,
        now: Timestamp,
    ) -> Result<MintSplit, PoolError> {
        self.mint_for(caller, recipient, underlying, now)
    }
}
