//! Scripted replays against an in-memory pool.
//!
//! A script funds some accounts and then applies timed steps in order:
//!
//! ```json
//! {
//!   "funding": { "alice": 1000000000 },
//!   "steps": [
//!     { "op": "mint", "account": "alice", "amount": 1000000 },
//!     { "op": "advance", "secs": 86400 },
//!     { "op": "redeem-all", "account": "alice" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tide_nullables::{NullClock, NullCustody};
use tide_service::{PoolConfig, PoolService, PoolSummary, ServiceError};
use tide_types::AccountId;

type ReplayService = PoolService<Arc<NullCustody>, Arc<NullClock>>;

#[derive(Debug, Deserialize)]
pub struct Script {
    /// Initial time in seconds.
    #[serde(default)]
    pub start: u64,
    /// Underlying credited to each account's wallet before the first step.
    #[serde(default)]
    pub funding: BTreeMap<String, u128>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Step {
    Mint { account: String, amount: u128 },
    Redeem { account: String, claim: u128 },
    RedeemAll { account: String },
    Settle { account: String, order: u64 },
    Transfer { from: String, to: String, amount: u128 },
    /// Approves the wrapper for `claim` and wraps it.
    Wrap { account: String, claim: u128 },
    MintWrapped { account: String, amount: u128 },
    Unwrap { account: String, amount: u128 },
    UnwrapAll { account: String },
    SetApr { apr: u64 },
    ClaimManagementFee,
    /// Underlying paid into the reserves by the yield source.
    Yield { amount: u128 },
    Advance { secs: u64 },
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub at: u64,
    pub op: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountReport {
    pub wallet: u128,
    pub claim_tokens: u128,
    pub claim_value: u128,
    pub wrapped: u128,
    pub pending_withdrawal: u128,
}

#[derive(Debug, Serialize)]
pub struct ReplayReport {
    pub steps: Vec<StepOutcome>,
    pub summary: PoolSummary,
    pub accounts: BTreeMap<String, AccountReport>,
    pub stats: BTreeMap<&'static str, u64>,
}

pub struct Replay {
    service: ReplayService,
    custody: Arc<NullCustody>,
    clock: Arc<NullClock>,
    admin: AccountId,
    wrapper_account: AccountId,
    accounts: Vec<String>,
}

impl Replay {
    pub fn new(config: &PoolConfig, script: &Script) -> Result<Self, ServiceError> {
        let custody = Arc::new(NullCustody::new());
        let clock = Arc::new(NullClock::new(script.start));
        for (name, amount) in &script.funding {
            custody.fund(&AccountId::new(name.as_str()), *amount);
        }
        let service = PoolService::new(config, Arc::clone(&custody), Arc::clone(&clock))?;
        Ok(Self {
            service,
            custody,
            clock,
            admin: config.admin(),
            wrapper_account: config.wrapper_account(),
            accounts: script.funding.keys().cloned().collect(),
        })
    }

    /// Apply every step; with `strict`, stop at the first rejected one.
    pub async fn run(mut self, steps: &[Step], strict: bool) -> Result<ReplayReport, ServiceError> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            self.track(step);
            let at = self.clock.now().as_secs();
            let op = step_name(step).to_string();
            let outcome = match self.apply(step).await {
                Ok(result) => StepOutcome {
                    index,
                    at,
                    op,
                    ok: true,
                    result,
                    error: None,
                },
                Err(e) if strict => return Err(e),
                Err(e) => StepOutcome {
                    index,
                    at,
                    op,
                    ok: false,
                    result: None,
                    error: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }

        let mut accounts = BTreeMap::new();
        for name in &self.accounts {
            let id = AccountId::new(name.as_str());
            accounts.insert(
                name.clone(),
                AccountReport {
                    wallet: self.custody.wallet_balance(&id),
                    claim_tokens: self.service.balance_of(&id).await,
                    claim_value: self.service.underlying_value_of(&id).await?,
                    wrapped: self.service.wrapped_balance_of(&id).await?,
                    pending_withdrawal: self.service.pending_withdrawal(&id).await,
                },
            );
        }

        Ok(ReplayReport {
            steps: outcomes,
            summary: self.service.summary().await?,
            accounts,
            stats: self.service.stats().snapshot(),
        })
    }

    fn track(&mut self, step: &Step) {
        let names: Vec<&String> = match step {
            Step::Mint { account, .. }
            | Step::Redeem { account, .. }
            | Step::RedeemAll { account }
            | Step::Settle { account, .. }
            | Step::Wrap { account, .. }
            | Step::MintWrapped { account, .. }
            | Step::Unwrap { account, .. }
            | Step::UnwrapAll { account } => vec![account],
            Step::Transfer { from, to, .. } => vec![from, to],
            _ => Vec::new(),
        };
        for name in names {
            if !self.accounts.contains(name) {
                self.accounts.push(name.clone());
            }
        }
    }

    async fn apply(&self, step: &Step) -> Result<Option<Value>, ServiceError> {
        let service = &self.service;
        let value = match step {
            Step::Mint { account, amount } => {
                let split = service.mint(&AccountId::new(account.as_str()), *amount).await?;
                Some(json!({
                    "claim": split.claim_to_recipient,
                    "pool_fee": split.pool_fee,
                    "protocol_fee": split.protocol_fee,
                    "interest_cost_fee": split.interest_cost_fee,
                }))
            }
            Step::Redeem { account, claim } => {
                let id = service.redeem(&AccountId::new(account.as_str()), *claim).await?;
                Some(order_json(service, id).await)
            }
            Step::RedeemAll { account } => {
                let id = AccountId::new(account.as_str());
                let claim = service.balance_of(&id).await;
                let order = service.redeem(&id, claim).await?;
                Some(order_json(service, order).await)
            }
            Step::Settle { account, order } => {
                let paid = service.settle(&AccountId::new(account.as_str()), *order).await?;
                Some(json!({ "paid": paid }))
            }
            Step::Transfer { from, to, amount } => {
                service
                    .transfer(&AccountId::new(from.as_str()), &AccountId::new(to.as_str()), *amount)
                    .await?;
                None
            }
            Step::Wrap { account, claim } => {
                let id = AccountId::new(account.as_str());
                service.approve(&id, &self.wrapper_account, *claim).await?;
                let shares = service.wrap(&id, &id, *claim).await?;
                Some(json!({ "shares": shares }))
            }
            Step::MintWrapped { account, amount } => {
                let shares = service
                    .mint_wrapped(&AccountId::new(account.as_str()), *amount)
                    .await?;
                Some(json!({ "shares": shares }))
            }
            Step::Unwrap { account, amount } => {
                let claim = service.unwrap(&AccountId::new(account.as_str()), *amount).await?;
                Some(json!({ "claim": claim }))
            }
            Step::UnwrapAll { account } => {
                let claim = service.unwrap_all(&AccountId::new(account.as_str())).await?;
                Some(json!({ "claim": claim }))
            }
            Step::SetApr { apr } => {
                service.set_target_apr(&self.admin, *apr).await?;
                None
            }
            Step::ClaimManagementFee => {
                let minted = service.claim_management_fee(&self.admin).await?;
                Some(json!({ "claim": minted }))
            }
            Step::Yield { amount } => {
                self.custody.fund_reserves(*amount);
                None
            }
            Step::Advance { secs } => {
                self.clock.advance(*secs);
                Some(json!({ "now": self.clock.now().as_secs() }))
            }
        };
        Ok(value)
    }
}

async fn order_json(service: &ReplayService, id: u64) -> Value {
    match service.withdrawal_details(id).await {
        Some(order) => json!({
            "order": id,
            "gross": order.underlying_amount_gross,
            "after_fee": order.underlying_amount_after_fee,
            "matures_at": order.matures_at.as_secs(),
        }),
        None => json!({ "order": id }),
    }
}

fn step_name(step: &Step) -> &'static str {
    match step {
        Step::Mint { .. } => "mint",
        Step::Redeem { .. } => "redeem",
        Step::RedeemAll { .. } => "redeem-all",
        Step::Settle { .. } => "settle",
        Step::Transfer { .. } => "transfer",
        Step::Wrap { .. } => "wrap",
        Step::MintWrapped { .. } => "mint-wrapped",
        Step::Unwrap { .. } => "unwrap",
        Step::UnwrapAll { .. } => "unwrap-all",
        Step::SetApr { .. } => "set-apr",
        Step::ClaimManagementFee => "claim-management-fee",
        Step::Yield { .. } => "yield",
        Step::Advance { .. } => "advance",
    }
}
