//! Share accounting for the rebasing wrapper.
//!
//! Each share is backed by exactly one claim token held by the wrapper's
//! custody account in the pool ledger. Displayed amounts are derived from
//! shares at call time:
//!
//! ```text
//! total_pooled     = underlying_by_ctoken(total_shares) × initial_rate
//! amount_by_shares = shares × total_pooled / total_shares
//! shares_by_amount = amount × total_shares / total_pooled
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use tide_pool::{AccessControl, RoleRegistry};
use tide_types::{mul_div, AccountId, MathError, Role, Timestamp};

use crate::error::RebaseError;
use crate::source::ClaimPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebasingWrapper {
    /// Pool account holding the claim tokens that back every share.
    custody_account: AccountId,
    shares: BTreeMap<AccountId, u128>,
    total_shares: u128,
    /// owner → spender → displayed amount.
    allowances: BTreeMap<AccountId, BTreeMap<AccountId, u128>>,
    paused: bool,
    roles: RoleRegistry,
}

impl RebasingWrapper {
    pub fn new(custody_account: AccountId, admin: AccountId) -> Self {
        Self {
            custody_account,
            shares: BTreeMap::new(),
            total_shares: 0,
            allowances: BTreeMap::new(),
            paused: false,
            roles: RoleRegistry::new(admin),
        }
    }

    pub fn custody_account(&self) -> &AccountId {
        &self.custody_account
    }

    pub fn total_shares(&self) -> u128 {
        self.total_shares
    }

    pub fn shares_of(&self, holder: &AccountId) -> u128 {
        self.shares.get(holder).copied().unwrap_or(0)
    }

    pub fn holder_count(&self) -> usize {
        self.shares.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    // ── Conversions ──────────────────────────────────────────────────────

    /// Value of every share in 18-decimal display units.
    pub fn total_pooled<P: ClaimPool>(&self, pool: &P, now: Timestamp) -> Result<u128, RebaseError> {
        let underlying = pool.underlying_by_ctoken(self.total_shares, now)?;
        Ok(underlying
            .checked_mul(pool.initial_ctoken_to_underlying())
            .ok_or(MathError::Overflow)?)
    }

    pub fn amount_by_shares<P: ClaimPool>(
        &self,
        pool: &P,
        shares: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        if self.total_shares == 0 {
            return Ok(0);
        }
        let pooled = self.total_pooled(pool, now)?;
        Ok(mul_div(shares, pooled, self.total_shares)?)
    }

    pub fn shares_by_amount<P: ClaimPool>(
        &self,
        pool: &P,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        let pooled = self.total_pooled(pool, now)?;
        if pooled == 0 {
            return Ok(amount);
        }
        Ok(mul_div(amount, self.total_shares, pooled)?)
    }

    pub fn balance_of<P: ClaimPool>(
        &self,
        pool: &P,
        holder: &AccountId,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        self.amount_by_shares(pool, self.shares_of(holder), now)
    }

    pub fn total_supply<P: ClaimPool>(&self, pool: &P, now: Timestamp) -> Result<u128, RebaseError> {
        self.total_pooled(pool, now)
    }

    // ── Wrap / unwrap ────────────────────────────────────────────────────

    /// Pull `claim` tokens from `caller` into custody and credit `recipient`
    /// with the same number of shares.
    ///
    /// `caller` must have approved the custody account in the pool ledger.
    pub fn wrap<P: ClaimPool>(
        &mut self,
        pool: &mut P,
        caller: &AccountId,
        recipient: &AccountId,
        claim: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        if claim == 0 {
            return Err(RebaseError::ZeroAmount);
        }
        self.ensure_active()?;
        self.ensure_issuable(claim)?;

        let custody = self.custody_account.clone();
        pool.pull_claims(&custody, caller, &custody, claim)?;
        self.credit(recipient, claim)?;
        info!(%caller, %recipient, claim, at = %now, "wrapped");
        Ok(claim)
    }

    /// Burn the shares behind `amount` and release that many claim tokens
    /// to `caller`; returns the claim tokens released.
    pub fn unwrap<P: ClaimPool>(
        &mut self,
        pool: &mut P,
        caller: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        if amount == 0 {
            return Err(RebaseError::ZeroAmount);
        }
        self.ensure_active()?;
        let shares = self.shares_by_amount(pool, amount, now)?;
        self.release(pool, caller, shares, now)
    }

    /// Burn every share of `caller`.
    pub fn unwrap_all<P: ClaimPool>(
        &mut self,
        pool: &mut P,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        self.ensure_active()?;
        let shares = self.shares_of(caller);
        self.release(pool, caller, shares, now)
    }

    fn release<P: ClaimPool>(
        &mut self,
        pool: &mut P,
        caller: &AccountId,
        shares: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        if shares == 0 {
            return Err(RebaseError::ZeroAmount);
        }
        self.ensure_shares(caller, shares)?;
        let custody = self.custody_account.clone();
        pool.push_claims(&custody, caller, shares)?;
        self.debit(caller, shares)?;
        info!(%caller, shares, at = %now, "unwrapped");
        Ok(shares)
    }

    /// Deposit underlying into the pool with the claim tokens minted straight
    /// into custody, crediting `caller` with the resulting shares.
    pub fn mint_wrapped<P: ClaimPool>(
        &mut self,
        pool: &mut P,
        caller: &AccountId,
        underlying: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        if underlying == 0 {
            return Err(RebaseError::ZeroAmount);
        }
        self.ensure_active()?;
        let custody = self.custody_account.clone();
        let split = pool.mint_claims_for(caller, &custody, underlying, now)?;
        // Custody now holds at least total_shares + claim, so this cannot overflow.
        self.credit(caller, split.claim_to_recipient)?;
        info!(%caller, underlying, shares = split.claim_to_recipient, "minted wrapped");
        Ok(split.claim_to_recipient)
    }

    // ── Transfers ────────────────────────────────────────────────────────

    /// Move the shares behind `amount` from `caller` to `to`; returns the
    /// shares moved. Sending the full displayed balance moves every share.
    pub fn transfer<P: ClaimPool>(
        &mut self,
        pool: &P,
        caller: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        self.ensure_active()?;
        let shares = self.shares_for_transfer(pool, caller, amount, now)?;
        self.move_shares(caller, to, shares)?;
        Ok(shares)
    }

    pub fn transfer_shares(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        shares: u128,
    ) -> Result<(), RebaseError> {
        self.ensure_active()?;
        self.move_shares(caller, to, shares)
    }

    /// Allow `spender` to move up to `amount` (displayed units) of `caller`'s
    /// balance; `u128::MAX` never decreases.
    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), RebaseError> {
        self.ensure_active()?;
        if amount == 0 {
            if let Some(m) = self.allowances.get_mut(caller) {
                m.remove(spender);
                if m.is_empty() {
                    self.allowances.remove(caller);
                }
            }
        } else {
            self.allowances
                .entry(caller.clone())
                .or_default()
                .insert(spender.clone(), amount);
        }
        Ok(())
    }

    pub fn transfer_from<P: ClaimPool>(
        &mut self,
        pool: &P,
        spender: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        self.ensure_active()?;
        let approved = self.allowance(owner, spender);
        if approved < amount {
            return Err(RebaseError::InsufficientAllowance {
                needed: amount,
                approved,
            });
        }
        let shares = self.shares_for_transfer(pool, owner, amount, now)?;
        self.move_shares(owner, to, shares)?;
        if approved != u128::MAX {
            self.approve(owner, spender, approved - amount)?;
        }
        Ok(shares)
    }

    fn shares_for_transfer<P: ClaimPool>(
        &self,
        pool: &P,
        from: &AccountId,
        amount: u128,
        now: Timestamp,
    ) -> Result<u128, RebaseError> {
        let held = self.shares_of(from);
        if amount > 0 && amount == self.amount_by_shares(pool, held, now)? {
            return Ok(held);
        }
        self.shares_by_amount(pool, amount, now)
    }

    // ── Administration ───────────────────────────────────────────────────

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), RebaseError> {
        self.require_admin(caller)?;
        self.paused = true;
        info!(%caller, "wrapper paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), RebaseError> {
        self.require_admin(caller)?;
        self.paused = false;
        info!(%caller, "wrapper unpaused");
        Ok(())
    }

    pub fn grant_admin(&mut self, caller: &AccountId, account: AccountId) -> Result<bool, RebaseError> {
        Ok(self.roles.grant_role(caller, Role::Admin, account)?)
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn require_admin(&self, caller: &AccountId) -> Result<(), RebaseError> {
        if !self.roles.has_role(caller, Role::Admin) {
            return Err(RebaseError::Unauthorized(caller.clone()));
        }
        Ok(())
    }

    fn ensure_active(&self) -> Result<(), RebaseError> {
        if self.paused {
            return Err(RebaseError::Paused);
        }
        Ok(())
    }

    fn ensure_issuable(&self, shares: u128) -> Result<(), RebaseError> {
        self.total_shares
            .checked_add(shares)
            .ok_or(MathError::Overflow)?;
        Ok(())
    }

    fn ensure_shares(&self, holder: &AccountId, needed: u128) -> Result<(), RebaseError> {
        let available = self.shares_of(holder);
        if available < needed {
            return Err(RebaseError::InsufficientShares { needed, available });
        }
        Ok(())
    }

    fn move_shares(&mut self, from: &AccountId, to: &AccountId, shares: u128) -> Result<(), RebaseError> {
        self.ensure_shares(from, shares)?;
        if shares == 0 || from == to {
            return Ok(());
        }
        self.debit(from, shares)?;
        self.credit(to, shares)
    }

    fn credit(&mut self, holder: &AccountId, shares: u128) -> Result<(), RebaseError> {
        if shares == 0 {
            return Ok(());
        }
        self.total_shares = self
            .total_shares
            .checked_add(shares)
            .ok_or(MathError::Overflow)?;
        *self.shares.entry(holder.clone()).or_insert(0) += shares;
        Ok(())
    }

    fn debit(&mut self, holder: &AccountId, shares: u128) -> Result<(), RebaseError> {
        self.ensure_shares(holder, shares)?;
        let held = self.shares_of(holder) - shares;
        if held == 0 {
            self.shares.remove(holder);
        } else {
            self.shares.insert(holder.clone(), held);
        }
        self.total_shares -= shares;
        Ok(())
    }
}
