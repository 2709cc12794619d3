//! Serialized access to a pool and its wrapper.
//!
//! All mutations take the pool's write lock, so operations are applied one
//! at a time in lock order; queries share the read lock and evaluate accrual
//! at call time. Wrapper operations lock the pool first, then the wrapper.
//! The clock is read only once the locks are held, so operations applied in
//! lock order also carry non-decreasing timestamps.

use std::path::Path;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{info, warn};

use tide_pool::{Custody, MintSplit, OrderId, Pool, PoolError, PoolSnapshot, RoleRegistry, WithdrawalOrder};
use tide_rebase::{RebasingWrapper, WrapperSnapshot};
use tide_types::{AccountId, Timestamp};
use tide_utils::{Clock, StatsCounter};

use crate::config::PoolConfig;
use crate::error::ServiceError;

/// Counters kept by every service.
pub const SERVICE_COUNTERS: &[&str] = &[
    "mints",
    "redeems",
    "settlements",
    "wraps",
    "unwraps",
    "transfers",
    "admin_ops",
    "rejected",
];

const POOL_SNAPSHOT_FILE: &str = "pool.snapshot";
const WRAPPER_SNAPSHOT_FILE: &str = "wrapper.snapshot";

/// Point-in-time view of the pool for reporting.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    pub at: u64,
    pub total_underlying: u128,
    pub total_supply: u128,
    pub price_per_token: u128,
    pub target_apr: u64,
    pub paused: bool,
    pub open_orders: usize,
    pub pending_withdrawals: u128,
    pub pending_management_fee: u128,
    pub wrapped_shares: u128,
    pub wrapped_supply: u128,
}

pub struct PoolService<C, K> {
    pool: RwLock<Pool<C>>,
    wrapper: RwLock<RebasingWrapper>,
    clock: K,
    stats: StatsCounter,
}

impl<C: Custody, K: Clock> PoolService<C, K> {
    /// Start a fresh pool at the clock's current time.
    pub fn new(config: &PoolConfig, custody: C, clock: K) -> Result<Self, ServiceError> {
        config.validate()?;
        let params = config.pool_params();
        let pool = Pool::new(
            &params,
            custody,
            RoleRegistry::new(params.admin.clone()),
            clock.now(),
        )?
        .with_reserved_account(config.wrapper_account())?;
        let wrapper = RebasingWrapper::new(config.wrapper_account(), params.admin.clone());
        Ok(Self::from_parts(pool, wrapper, clock))
    }

    pub fn from_parts(pool: Pool<C>, wrapper: RebasingWrapper, clock: K) -> Self {
        Self {
            pool: RwLock::new(pool),
            wrapper: RwLock::new(wrapper),
            clock,
            stats: StatsCounter::new(SERVICE_COUNTERS),
        }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn stats(&self) -> &StatsCounter {
        &self.stats
    }

    fn record<T, E>(&self, op: &'static str, counter: &str, result: Result<T, E>) -> Result<T, ServiceError>
    where
        E: Into<ServiceError>,
    {
        match result {
            Ok(value) => {
                self.stats.increment(counter);
                Ok(value)
            }
            Err(e) => {
                let err = e.into();
                warn!(op, error = %err, "operation rejected");
                self.stats.increment("rejected");
                Err(err)
            }
        }
    }

    // ── Pool operations ──────────────────────────────────────────────────

    pub async fn mint(&self, caller: &AccountId, underlying: u128) -> Result<MintSplit, ServiceError> {
        let mut pool = self.pool.write().await;
        let result = pool.mint(caller, underlying, self.now());
        self.record("mint", "mints", result)
    }

    pub async fn mint_for(
        &self,
        caller: &AccountId,
        recipient: &AccountId,
        underlying: u128,
    ) -> Result<MintSplit, ServiceError> {
        let mut pool = self.pool.write().await;
        let result = pool.mint_for(caller, recipient, underlying, self.now());
        self.record("mint_for", "mints", result)
    }

    pub async fn redeem(&self, caller: &AccountId, claim: u128) -> Result<OrderId, ServiceError> {
        let mut pool = self.pool.write().await;
        let result = pool.redeem(caller, claim, self.now());
        self.record("redeem", "redeems", result)
    }

    pub async fn settle(&self, caller: &AccountId, id: OrderId) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        let result = pool.withdraw_underlying_token_by_id(caller, id, self.now());
        self.record("settle", "settlements", result)
    }

    pub async fn transfer(&self, caller: &AccountId, to: &AccountId, amount: u128) -> Result<(), ServiceError> {
        let result = self.pool.write().await.transfer(caller, to, amount);
        self.record("transfer", "transfers", result)
    }

    pub async fn approve(
        &self,
        caller: &AccountId,
        spender: &AccountId,
        amount: u128,
    ) -> Result<(), ServiceError> {
        let result = self.pool.write().await.approve(caller, spender, amount);
        self.record("approve", "transfers", result)
    }

    /// Run an administrative operation against the pool at the current time.
    pub async fn administer<T, F>(&self, op: &'static str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Pool<C>, Timestamp) -> Result<T, PoolError>,
    {
        let result = {
            let mut pool = self.pool.write().await;
            f(&mut *pool, self.now())
        };
        if result.is_ok() {
            info!(op, "administrative operation applied");
        }
        self.record(op, "admin_ops", result)
    }

    pub async fn set_target_apr(&self, caller: &AccountId, apr: u64) -> Result<(), ServiceError> {
        self.administer("set_target_apr", |pool, now| pool.set_target_apr(caller, apr, now))
            .await
    }

    pub async fn claim_management_fee(&self, caller: &AccountId) -> Result<u128, ServiceError> {
        self.administer("claim_management_fee", |pool, now| {
            pool.claim_management_fee(caller, now)
        })
        .await
    }

    /// Apply accrued interest up to now; returns the income applied.
    pub async fn checkpoint(&self) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        Ok(pool.checkpoint(self.now())?)
    }

    // ── Wrapper operations ───────────────────────────────────────────────

    pub async fn wrap(&self, caller: &AccountId, recipient: &AccountId, claim: u128) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        let mut wrapper = self.wrapper.write().await;
        let result = wrapper.wrap(&mut *pool, caller, recipient, claim, self.now());
        self.record("wrap", "wraps", result)
    }

    pub async fn unwrap(&self, caller: &AccountId, amount: u128) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        let mut wrapper = self.wrapper.write().await;
        let result = wrapper.unwrap(&mut *pool, caller, amount, self.now());
        self.record("unwrap", "unwraps", result)
    }

    pub async fn unwrap_all(&self, caller: &AccountId) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        let mut wrapper = self.wrapper.write().await;
        let result = wrapper.unwrap_all(&mut *pool, caller, self.now());
        self.record("unwrap_all", "unwraps", result)
    }

    pub async fn mint_wrapped(&self, caller: &AccountId, underlying: u128) -> Result<u128, ServiceError> {
        let mut pool = self.pool.write().await;
        let mut wrapper = self.wrapper.write().await;
        let result = wrapper.mint_wrapped(&mut *pool, caller, underlying, self.now());
        self.record("mint_wrapped", "wraps", result)
    }

    pub async fn wrapped_transfer(
        &self,
        caller: &AccountId,
        to: &AccountId,
        amount: u128,
    ) -> Result<u128, ServiceError> {
        let pool = self.pool.read().await;
        let mut wrapper = self.wrapper.write().await;
        let result = wrapper.transfer(&*pool, caller, to, amount, self.now());
        self.record("wrapped_transfer", "transfers", result)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub async fn price_per_token(&self) -> Result<u128, ServiceError> {
        Ok(self.pool.read().await.price_per_token(self.now())?)
    }

    pub async fn balance_of(&self, holder: &AccountId) -> u128 {
        self.pool.read().await.balance_of(holder)
    }

    pub async fn underlying_value_of(&self, holder: &AccountId) -> Result<u128, ServiceError> {
        let pool = self.pool.read().await;
        Ok(pool.get_underlying_by_ctoken(pool.balance_of(holder), self.now())?)
    }

    pub async fn wrapped_balance_of(&self, holder: &AccountId) -> Result<u128, ServiceError> {
        let pool = self.pool.read().await;
        let wrapper = self.wrapper.read().await;
        Ok(wrapper.balance_of(&*pool, holder, self.now())?)
    }

    pub async fn pending_withdrawal(&self, owner: &AccountId) -> u128 {
        self.pool.read().await.pending_withdrawal(owner)
    }

    pub async fn withdrawal_details(&self, id: OrderId) -> Option<WithdrawalOrder> {
        self.pool.read().await.withdrawal_details(id).cloned()
    }

    /// Run a read-only query against the pool at the current time.
    pub async fn inspect<T>(&self, f: impl FnOnce(&Pool<C>, Timestamp) -> T) -> T {
        let pool = self.pool.read().await;
        f(&*pool, self.now())
    }

    pub async fn summary(&self) -> Result<PoolSummary, ServiceError> {
        let pool = self.pool.read().await;
        let wrapper = self.wrapper.read().await;
        let now = self.now();
        let queue = &pool.state().queue;
        Ok(PoolSummary {
            at: now.as_secs(),
            total_underlying: pool.total_underlying(now)?,
            total_supply: pool.total_supply(),
            price_per_token: pool.price_per_token(now)?,
            target_apr: pool.target_apr(),
            paused: pool.is_paused(),
            open_orders: queue.orders().filter(|o| !o.settled).count(),
            pending_withdrawals: queue.total_pending(),
            pending_management_fee: pool.get_pending_management_fee(now)?,
            wrapped_shares: wrapper.total_shares(),
            wrapped_supply: wrapper.total_supply(&*pool, now)?,
        })
    }

    // ── Persistence ──────────────────────────────────────────────────────

    /// Encoded pool and wrapper snapshots, taken under both read locks.
    pub async fn snapshot(&self) -> Result<(Vec<u8>, Vec<u8>), ServiceError> {
        let pool = self.pool.read().await;
        let wrapper = self.wrapper.read().await;
        let pool_bytes = pool.snapshot()?.to_bytes()?;
        let wrapper_bytes = WrapperSnapshot::capture(&wrapper).to_bytes()?;
        Ok((pool_bytes, wrapper_bytes))
    }

    /// Write both snapshots into `dir`, creating it if needed.
    pub async fn save_to(&self, dir: &Path) -> Result<(), ServiceError> {
        let (pool_bytes, wrapper_bytes) = self.snapshot().await?;
        std::fs::create_dir_all(dir)?;
        write_atomic(&dir.join(POOL_SNAPSHOT_FILE), &pool_bytes)?;
        write_atomic(&dir.join(WRAPPER_SNAPSHOT_FILE), &wrapper_bytes)?;
        info!(dir = %dir.display(), bytes = pool_bytes.len() + wrapper_bytes.len(), "snapshot saved");
        Ok(())
    }

    /// Whether `dir` holds both snapshots written by [`save_to`].
    ///
    /// [`save_to`]: PoolService::save_to
    pub fn has_snapshot(dir: &Path) -> bool {
        dir.join(POOL_SNAPSHOT_FILE).is_file() && dir.join(WRAPPER_SNAPSHOT_FILE).is_file()
    }

    /// Rebuild a service from snapshots previously written by [`save_to`].
    ///
    /// [`save_to`]: PoolService::save_to
    pub fn restore_from(dir: &Path, custody: C, clock: K) -> Result<Self, ServiceError> {
        let pool_bytes = std::fs::read(dir.join(POOL_SNAPSHOT_FILE))?;
        let wrapper_bytes = std::fs::read(dir.join(WRAPPER_SNAPSHOT_FILE))?;
        Self::restore(&pool_bytes, &wrapper_bytes, custody, clock)
    }

    pub fn restore(
        pool_bytes: &[u8],
        wrapper_bytes: &[u8],
        custody: C,
        clock: K,
    ) -> Result<Self, ServiceError> {
        let wrapper = WrapperSnapshot::from_bytes(wrapper_bytes)?.into_wrapper();
        let pool = Pool::restore(PoolSnapshot::from_bytes(pool_bytes)?, custody)?
            .with_reserved_account(wrapper.custody_account().clone())?;
        info!(
            total_supply = pool.total_supply(),
            wrapped_shares = wrapper.total_shares(),
            "service restored"
        );
        Ok(Self::from_parts(pool, wrapper, clock))
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)
}
