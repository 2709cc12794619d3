//! The pool: mint, redeem, settlement, and administration.
//!
//! Every mutating operation runs in three steps: validate and compute on
//! copies of the affected state, perform the custody transfer, then commit.
//! A failure in either of the first two steps leaves the pool untouched.

use std::collections::BTreeSet;

use tracing::{debug, info};

use tide_types::params::{FEE_COEFFICIENT, MAX_FEE_RATE, MAX_MANAGEMENT_FEE_RATE, PEG_PRICE};
use tide_types::{mul_div, AccountId, MathError, PoolParams, Role, Timestamp};

use crate::access::{AccessControl, RoleRegistry};
use crate::accrual::AccrualState;
use crate::custody::{Custody, Payout, PriceFeed};
use crate::error::PoolError;
use crate::fees::{ensure_within, FeeSchedule, ManagementFeeBook, MintSplit, RedeemSplit};
use crate::queue::{NewOrder, OrderId, WithdrawalOrder};
use crate::rate::ExchangeRate;
use crate::state::PoolState;

/// State after accrual to `now`, not yet committed.
struct Accrued {
    accrual: AccrualState,
    management: ManagementFeeBook,
    rate: ExchangeRate,
    income: u128,
}

pub struct Pool<C, A = RoleRegistry> {
    state: PoolState,
    custody: C,
    access: A,
    price_feed: Option<Box<dyn PriceFeed + Send + Sync>>,
    /// Accounts that may never collect fees. Not persisted.
    reserved: BTreeSet<AccountId>,
}

impl<C: Custody, A: AccessControl> Pool<C, A> {
    pub fn new(
        params: &PoolParams,
        custody: C,
        access: A,
        genesis: Timestamp,
    ) -> Result<Self, PoolError> {
        let state = PoolState::new(params, genesis)?;
        info!(
            target_apr = params.target_apr,
            underlying_decimals = params.underlying_decimals,
            "pool created"
        );
        Ok(Self::from_state(state, custody, access))
    }

    pub fn from_state(state: PoolState, custody: C, access: A) -> Self {
        Self {
            state,
            custody,
            access,
            price_feed: None,
            reserved: BTreeSet::new(),
        }
    }

    /// Attach a peg price oracle consulted by the depeg guard.
    pub fn with_price_feed(mut self, feed: impl PriceFeed + Send + Sync + 'static) -> Self {
        self.price_feed = Some(Box::new(feed));
        self
    }

    /// Bar `account` from collecting fees, e.g. the wrapper's custody account.
    ///
    /// Fails if a current collector is already `account`.
    pub fn with_reserved_account(mut self, account: AccountId) -> Result<Self, PoolError> {
        let state = &self.state;
        for collector in [
            &state.fee_collector,
            &state.protocol_fee_collector,
            &state.management_fee_collector,
        ] {
            if *collector == account {
                return Err(reserved_collector(&account));
            }
        }
        self.reserved.insert(account);
        Ok(self)
    }

    pub fn is_reserved(&self, account: &AccountId) -> bool {
        self.reserved.contains(account)
    }

    pub fn state(&self) -> &PoolState {
        &self.state
    }

    pub fn custody(&self) -> &C {
        &self.custody
    }

    pub fn access(&self) -> &A {
        &self.access
    }

    pub fn into_parts(self) -> (PoolState, C, A) {
        (self.state, self.custody, self.access)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    fn accrued(&self, now: Timestamp) -> Result<Accrued, PoolError> {
        let (accrual, income) = self.state.accrual.accrued_at(now)?;
        let mut management = self.state.management.clone();
        management.record_income(income)?;
        let rate = self.state.exchange_rate_with(&accrual);
        Ok(Accrued {
            accrual,
            management,
            rate,
            income,
        })
    }

    /// Exchange rate with interest accrued to `now`.
    pub fn exchange_rate(&self, now: Timestamp) -> Result<ExchangeRate, PoolError> {
        Ok(self.accrued(now)?.rate)
    }

    pub fn total_underlying(&self, now: Timestamp) -> Result<u128, PoolError> {
        Ok(self.accrued(now)?.accrual.total_underlying)
    }

    pub fn total_supply(&self) -> u128 {
        self.state.ledger.total_supply()
    }

    pub fn balance_of(&self, holder: &AccountId) -> u128 {
        self.state.ledger.balance_of(holder)
    }

    pub fn allowance(&self, owner: &AccountId, spender: &AccountId) -> u128 {
        self.state.ledger.allowance(owner, spender)
    }

    pub fn price_per_token(&self, now: Timestamp) -> Result<u128, PoolError> {
        Ok(self.exchange_rate(now)?.price_per_token()?)
    }

    pub fn get_ctoken_by_underlying(&self, underlying: u128, now: Timestamp) -> Result<u128, PoolError> {
        Ok(self.exchange_rate(now)?.ctoken_by_underlying(underlying)?)
    }

    pub fn get_underlying_by_ctoken(&self, claim: u128, now: Timestamp) -> Result<u128, PoolError> {
        Ok(self.exchange_rate(now)?.underlying_by_ctoken(claim)?)
    }

    /// The split `mint` would produce at `now`, absent intervening changes.
    pub fn preview_mint(&self, underlying: u128, now: Timestamp) -> Result<MintSplit, PoolError> {
        let accrued = self.accrued(now)?;
        Ok(self.state.fees.split_mint(underlying, &accrued.rate)?)
    }

    /// The split `redeem` would produce at `now`, absent intervening changes.
    pub fn preview_redeem(&self, claim: u128, now: Timestamp) -> Result<RedeemSplit, PoolError> {
        let accrued = self.accrued(now)?;
        Ok(self.state.fees.split_redeem(claim, &accrued.rate)?)
    }

    pub fn initial_ctoken_to_underlying(&self) -> u128 {
        self.state.initial_ctoken_to_underlying
    }

    pub fn target_apr(&self) -> u64 {
        self.state.accrual.target_apr
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.state.fees
    }

    pub fn capital_lower_bound(&self) -> u128 {
        self.state.capital_lower_bound
    }

    pub fn process_period_secs(&self) -> u64 {
        self.state.process_period_secs
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    /// Id of the latest withdrawal order (0 when none exist).
    pub fn withdrawal_index(&self) -> OrderId {
        self.state.queue.latest_order_id()
    }

    pub fn redeem_index(&self) -> OrderId {
        self.withdrawal_index()
    }

    pub fn withdrawal_details(&self, id: OrderId) -> Option<&WithdrawalOrder> {
        self.state.queue.get(id)
    }

    pub fn redeem_details(&self, id: OrderId) -> Option<&WithdrawalOrder> {
        self.withdrawal_details(id)
    }

    /// Underlying still owed to `owner` across unsettled orders.
    pub fn pending_withdrawal(&self, owner: &AccountId) -> u128 {
        self.state.queue.pending_withdrawal(owner)
    }

    pub fn orders_of<'a>(
        &'a self,
        owner: &'a AccountId,
    ) -> impl Iterator<Item = &'a WithdrawalOrder> + 'a {
        self.state.queue.orders_of(owner)
    }

    /// Management fee owed if it were claimed at `now`.
    pub fn get_pending_management_fee(&self, now: Timestamp) -> Result<u128, PoolError> {
        let accrued = self.accrued(now)?;
        Ok(accrued.management.pending(self.state.fees.management_fee_rate)?)
    }

    /// Management fee owed as of the last accrual.
    pub fn total_unclaim_management_fee(&self) -> Result<u128, PoolError> {
        Ok(self
            .state
            .management
            .pending(self.state.fees.management_fee_rate)?)
    }

    // ── Guards ───────────────────────────────────────────────────────────

    fn ensure_active(&self) -> Result<(), PoolError> {
        if self.state.paused {
            return Err(PoolError::Paused);
        }
        Ok(())
    }

    fn ensure_pegged(&self) -> Result<(), PoolError> {
        let Some(tolerance) = self.state.depeg_tolerance else {
            return Ok(());
        };
        let mut deviation = self.custody.current_peg_deviation()?;
        if let Some(feed) = &self.price_feed {
            let price = feed.peg_price()?;
            let off = mul_div(
                u128::from(price.abs_diff(PEG_PRICE)),
                u128::from(FEE_COEFFICIENT),
                u128::from(PEG_PRICE),
            )?;
            deviation = deviation.max(u64::try_from(off).unwrap_or(u64::MAX));
        }
        if deviation > tolerance {
            return Err(PoolError::Depegged {
                deviation,
                tolerance,
            });
        }
        Ok(())
    }

    fn require(&self, caller: &AccountId, role: Role) -> Result<(), PoolError> {
        self.access.require_role(caller, role)
    }

    fn commit_accrual(&mut self, accrued: Accrued) {
        if accrued.income > 0 {
            debug!(
                income = accrued.income,
                last_accrual = %accrued.accrual.last_accrual,
                "accrued interest"
            );
        }
        self.state.accrual = accrued.accrual;
        self.state.management = accrued.management;
    }

    /// Apply accrued interest up to `now` without any other change.
    pub fn checkpoint(&mut self, now: Timestamp) -> Result<u128, PoolError> {
        let accrued = self.accrued(now)?;
        let income = accrued.income;
        self.commit_accrual(accrued);
        Ok(income)
    }

    // ── Mint / redeem ────────────────────────────────────────────────────

    /// Deposit `underlying` from `caller` and credit the claim tokens to `caller`.
    pub fn mint(
        &mut self,
        caller: &AccountId,
        underlying: u128,
        now: Timestamp,
    ) -> Result<MintSplit, PoolError> {
        self.mint_for(caller, caller, underlying, now)
    }

    /// Deposit `underlying` from `caller` and credit the claim tokens to `recipient`.
    pub fn mint_for(
        &mut self,
        caller: &AccountId,
        recipient: &AccountId,
        underlying: u128,
        now: Timestamp,
    ) -> Result<MintSplit, PoolError> {
        if underlying == 0 {
            return Err(PoolError::ZeroAmount);
        }
        self.ensure_active()?;
        self.ensure_pegged()?;

        let mut accrued = self.accrued(now)?;
        let split = self.state.fees.split_mint(underlying, &accrued.rate)?;
        if split.claim_to_recipient == 0 {
            return Err(PoolError::ZeroAmount);
        }
        accrued.accrual.total_underlying = accrued
            .accrual
            .total_underlying
            .checked_add(split.retained_underlying())
            .ok_or(MathError::Overflow)?;
        self.state.ledger.ensure_mintable(split.total_claims()?)?;

        let fee_collector = self.state.fee_collector.clone();
        let protocol_collector = self.state.protocol_fee_collector.clone();
        let forward = if split.interest_cost_fee > 0 {
            vec![Payout::new(fee_collector.clone(), split.interest_cost_fee)]
        } else {
            Vec::new()
        };
        self.custody.receive_and_forward(caller, underlying, &forward)?;

        self.state.ledger.mint_batch(&[
            (recipient, split.claim_to_recipient),
            (&fee_collector, split.claim_to_fee_collector),
            (&protocol_collector, split.claim_to_protocol_collector),
        ])?;
        self.commit_accrual(accrued);
        info!(
            %caller,
            %recipient,
            underlying,
            claim = split.claim_to_recipient,
            total_underlying = self.state.accrual.total_underlying,
            "minted"
        );
        Ok(split)
    }

    /// Burn `claim` tokens of `caller` and queue a withdrawal order for them.
    pub fn redeem(
        &mut self,
        caller: &AccountId,
        claim: u128,
        now: Timestamp,
    ) -> Result<OrderId, PoolError> {
        if claim == 0 {
            return Err(PoolError::ZeroAmount);
        }
        self.ensure_active()?;
        self.state.ledger.ensure_balance(caller, claim)?;
        self.ensure_pegged()?;

        let mut accrued = self.accrued(now)?;
        let split = self.state.fees.split_redeem(claim, &accrued.rate)?;
        if split.gross == 0 {
            return Err(PoolError::ZeroAmount);
        }
        let remaining = accrued
            .accrual
            .total_underlying
            .checked_sub(split.gross)
            .ok_or(MathError::Underflow)?;
        if remaining < self.state.capital_lower_bound {
            return Err(PoolError::BelowCapitalLowerBound {
                remaining,
                lower_bound: self.state.capital_lower_bound,
            });
        }
        self.state.queue.ensure_capacity(caller, split.after_fee)?;
        accrued.accrual.total_underlying = remaining;

        self.custody.release_batch(&[
            Payout::new(self.state.fee_collector.clone(), split.pool_fee),
            Payout::new(self.state.protocol_fee_collector.clone(), split.protocol_fee),
        ])?;

        self.state.ledger.burn(caller, claim)?;
        self.commit_accrual(accrued);
        let id = self.state.queue.push(
            NewOrder {
                owner: caller.clone(),
                gross: split.gross,
                after_fee: split.after_fee,
                protocol_fee: split.protocol_fee,
                pool_fee: split.pool_fee,
            },
            now,
            now.plus_secs(self.state.process_period_secs),
        )?;
        info!(
            %caller,
            claim,
            gross = split.gross,
            after_fee = split.after_fee,
            order_id = id,
            "redeemed"
        );
        Ok(id)
    }

    // ── Settlement ───────────────────────────────────────────────────────

    /// Pay out a matured withdrawal order to its owner; returns the amount.
    pub fn withdraw_underlying_token_by_id(
        &mut self,
        caller: &AccountId,
        id: OrderId,
        now: Timestamp,
    ) -> Result<u128, PoolError> {
        self.ensure_active()?;
        let amount = self
            .state
            .queue
            .check_settle(id, caller, now)?
            .underlying_amount_after_fee;
        self.custody.release_withdrawal(caller, amount)?;
        self.state.queue.mark_settled(id)?;
        info!(%caller, order_id = id, amount, "withdrawal settled");
        Ok(amount)
    }

    pub fn redeem_underlying_token_by_id(
        &mut self,
        caller: &AccountId,
        id: OrderId,
        now: Timestamp,
    ) -> Result<u128, PoolError> {
        self.withdraw_underlying_token_by_id(caller, id, now)
    }

    // ── Claim token ──────────────────────────────────────────────────────

    pub fn transfer(
        &mut self,
        caller: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        self.ensure_active()?;
        Ok(self.state.ledger.transfer(caller, to, amount)?)
    }

    pub fn approve(
        &mut self,
        caller: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        self.ensure_active()?;
        self.state.ledger.approve(caller, spender, amount);
        Ok(())
    }

    /// Move `amount` of `owner`'s claim tokens to `to`, spending `caller`'s allowance.
    pub fn transfer_from(
        &mut self,
        caller: &AccountId,
        owner: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<(), PoolError> {
        self.ensure_active()?;
        Ok(self.state.ledger.transfer_from(caller, owner, to, amount)?)
    }

    // ── Administration ───────────────────────────────────────────────────

    /// Change the APR; interest up to `now` is applied at the old rate first.
    pub fn set_target_apr(
        &mut self,
        caller: &AccountId,
        apr: u64,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::AprManager)?;
        ensure_within(apr, self.state.apr_ceiling)?;
        let accrued = self.accrued(now)?;
        self.commit_accrual(accrued);
        let old = self.state.accrual.target_apr;
        self.state.accrual.target_apr = apr;
        info!(%caller, old, new = apr, "target APR changed");
        Ok(())
    }

    pub fn set_mint_fee_rate(&mut self, caller: &AccountId, rate: u64) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        ensure_within(rate, MAX_FEE_RATE)?;
        self.state.fees.mint_fee_rate = rate;
        info!(%caller, rate, "mint fee rate changed");
        Ok(())
    }

    pub fn set_redeem_fee_rate(&mut self, caller: &AccountId, rate: u64) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        ensure_within(rate, MAX_FEE_RATE)?;
        self.state.fees.redeem_fee_rate = rate;
        info!(%caller, rate, "redeem fee rate changed");
        Ok(())
    }

    pub fn set_protocol_fee_rate(&mut self, caller: &AccountId, rate: u64) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        ensure_within(rate, MAX_FEE_RATE)?;
        self.state.fees.protocol_fee_rate = rate;
        info!(%caller, rate, "protocol fee rate changed");
        Ok(())
    }

    pub fn set_interest_cost_fee_rate(
        &mut self,
        caller: &AccountId,
        rate: u64,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        ensure_within(rate, MAX_FEE_RATE)?;
        self.state.fees.interest_cost_fee_rate = rate;
        info!(%caller, rate, "interest cost fee rate changed");
        Ok(())
    }

    /// Change the management fee; the fee earned so far is fixed at the old rate.
    pub fn set_management_fee_rate(
        &mut self,
        caller: &AccountId,
        rate: u64,
        now: Timestamp,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        ensure_within(rate, MAX_MANAGEMENT_FEE_RATE)?;
        let mut accrued = self.accrued(now)?;
        accrued
            .management
            .crystallize(self.state.fees.management_fee_rate)?;
        self.commit_accrual(accrued);
        self.state.fees.management_fee_rate = rate;
        info!(%caller, rate, "management fee rate changed");
        Ok(())
    }

    /// Mint the pending management fee as claim tokens to the management
    /// fee collector; returns the claim tokens minted.
    ///
    /// The tokens are priced at the accrued rate before the mint.
    pub fn claim_management_fee(
        &mut self,
        caller: &AccountId,
        now: Timestamp,
    ) -> Result<u128, PoolError> {
        self.require(caller, Role::Admin)?;
        let mut accrued = self.accrued(now)?;
        let fee = accrued
            .management
            .pending(self.state.fees.management_fee_rate)?;
        let claim = accrued.rate.ctoken_by_underlying(fee)?;
        if claim == 0 {
            return Ok(0);
        }
        self.state.ledger.ensure_mintable(claim)?;
        accrued.management.reset();
        let collector = self.state.management_fee_collector.clone();
        self.state.ledger.mint(&collector, claim)?;
        self.commit_accrual(accrued);
        info!(%caller, %collector, fee, claim, "management fee claimed");
        Ok(claim)
    }

    pub fn set_capital_lower_bound(
        &mut self,
        caller: &AccountId,
        lower_bound: u128,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        self.state.capital_lower_bound = lower_bound;
        info!(%caller, lower_bound, "capital lower bound changed");
        Ok(())
    }

    /// Change the maturity delay of orders created from now on.
    pub fn set_process_period(&mut self, caller: &AccountId, secs: u64) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        self.state.process_period_secs = secs;
        info!(%caller, secs, "process period changed");
        Ok(())
    }

    pub fn set_depeg_tolerance(
        &mut self,
        caller: &AccountId,
        tolerance: Option<u64>,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::PoolManager)?;
        if let Some(t) = tolerance {
            ensure_within(t, FEE_COEFFICIENT)?;
        }
        self.state.depeg_tolerance = tolerance;
        info!(%caller, ?tolerance, "depeg tolerance changed");
        Ok(())
    }

    pub fn set_fee_collector(&mut self, caller: &AccountId, account: AccountId) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        self.ensure_collector(&account)?;
        info!(%caller, %account, "fee collector changed");
        self.state.fee_collector = account;
        Ok(())
    }

    pub fn set_protocol_fee_collector(
        &mut self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        self.ensure_collector(&account)?;
        info!(%caller, %account, "protocol fee collector changed");
        self.state.protocol_fee_collector = account;
        Ok(())
    }

    pub fn set_management_fee_collector(
        &mut self,
        caller: &AccountId,
        account: AccountId,
    ) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        self.ensure_collector(&account)?;
        info!(%caller, %account, "management fee collector changed");
        self.state.management_fee_collector = account;
        Ok(())
    }

    pub fn pause(&mut self, caller: &AccountId) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        self.state.paused = true;
        info!(%caller, "pool paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &AccountId) -> Result<(), PoolError> {
        self.require(caller, Role::Admin)?;
        self.state.paused = false;
        info!(%caller, "pool unpaused");
        Ok(())
    }
}

impl<C: Custody> Pool<C, RoleRegistry> {
    pub fn grant_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: AccountId,
    ) -> Result<bool, PoolError> {
        let granted = self.access.grant_role(caller, role, account.clone())?;
        info!(%caller, %role, %account, granted, "role granted");
        Ok(granted)
    }

    pub fn revoke_role(
        &mut self,
        caller: &AccountId,
        role: Role,
        account: &AccountId,
    ) -> Result<bool, PoolError> {
        let revoked = self.access.revoke_role(caller, role, account)?;
        info!(%caller, %role, %account, revoked, "role revoked");
        Ok(revoked)
    }
}

impl<C, A> Pool<C, A> {
    fn ensure_collector(&self, account: &AccountId) -> Result<(), PoolError> {
        ensure_account(account)?;
        if self.reserved.contains(account) {
            return Err(reserved_collector(account));
        }
        Ok(())
    }
}

fn reserved_collector(account: &AccountId) -> PoolError {
    PoolError::InvalidParameter(format!("{account} is reserved and cannot collect fees"))
}

fn ensure_account(account: &AccountId) -> Result<(), PoolError> {
    if !account.is_valid() {
        return Err(PoolError::InvalidParameter("account must not be empty".to_string()));
    }
    Ok(())
}
