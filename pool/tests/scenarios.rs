//! End-to-end pool scenarios against the in-memory custody:
//! deposit → accrual → redeem → settlement, with fees, roles, failures,
//! and snapshot restore in between.

use std::sync::Arc;

use tide_nullables::{NullCustody, NullPriceFeed, TransferRecord};
use tide_pool::{ErrorKind, Pool, PoolError, PoolSnapshot, RoleRegistry};
use tide_types::params::{PRICE_SCALE, SECONDS_PER_YEAR};
use tide_types::{AccountId, PoolParams, Timestamp};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const USDC: u128 = 1_000_000;
const ONE_PERCENT: u64 = 1_000_000;
const EIGHT_PERCENT: u64 = 8_000_000;
const WEEK: u64 = 7 * 86_400;

fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

fn ts(secs: u64) -> Timestamp {
    Timestamp::new(secs)
}

fn params() -> PoolParams {
    PoolParams {
        fee_collector: acct("fees"),
        protocol_fee_collector: acct("protocol"),
        management_fee_collector: acct("manager"),
        ..PoolParams::with_admin(acct("admin"))
    }
}

fn make_pool(params: PoolParams) -> Pool<NullCustody> {
    let custody = NullCustody::new();
    for name in ["alice", "bob"] {
        custody.fund(&acct(name), 1_000_000 * USDC);
    }
    Pool::new(&params, custody, RoleRegistry::new(params.admin.clone()), ts(0)).unwrap()
}

fn within_bps(actual: u128, expected: u128, bps: u128) -> bool {
    actual.abs_diff(expected) * 10_000 <= expected * bps
}

// ---------------------------------------------------------------------------
// Accrual
// ---------------------------------------------------------------------------

#[test]
fn single_depositor_receives_the_full_year_of_interest() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        ..params()
    });
    let alice = acct("alice");
    pool.mint(&alice, 100_000 * USDC, ts(0)).unwrap();

    let year = ts(SECONDS_PER_YEAR);
    let value = pool
        .get_underlying_by_ctoken(pool.balance_of(&alice), year)
        .unwrap();
    assert!(within_bps(value, 108_000 * USDC, 1));

    // The yield source tops up reserves so the order can be paid in full.
    pool.custody().fund_reserves(8_000 * USDC);
    let id = pool.redeem(&alice, pool.balance_of(&alice), year).unwrap();
    let paid = pool
        .withdraw_underlying_token_by_id(&alice, id, ts(SECONDS_PER_YEAR + WEEK))
        .unwrap();
    assert_eq!(paid, 108_000 * USDC);
    assert_eq!(
        pool.custody().wallet_balance(&alice),
        1_000_000 * USDC + 8_000 * USDC
    );
    assert_eq!(pool.custody().reserves(), 0);
}

#[test]
fn equal_depositors_split_interest_evenly() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        ..params()
    });
    pool.mint(&acct("alice"), 50_000 * USDC, ts(0)).unwrap();
    pool.mint(&acct("bob"), 50_000 * USDC, ts(0)).unwrap();

    let year = ts(SECONDS_PER_YEAR);
    for name in ["alice", "bob"] {
        let value = pool
            .get_underlying_by_ctoken(pool.balance_of(&acct(name)), year)
            .unwrap();
        assert!(within_bps(value, 54_000 * USDC, 1), "{name}: {value}");
    }
}

#[test]
fn late_depositor_pays_the_current_price() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        ..params()
    });
    pool.mint(&acct("alice"), 100_000 * USDC, ts(0)).unwrap();
    let year = ts(SECONDS_PER_YEAR);
    let expected = pool.get_ctoken_by_underlying(54_000 * USDC, year).unwrap();
    let split = pool.mint(&acct("bob"), 54_000 * USDC, year).unwrap();
    assert_eq!(split.claim_to_recipient, expected);
    assert_eq!(split.claim_to_recipient, 50_000 * PRICE_SCALE);
    assert_eq!(pool.price_per_token(year).unwrap(), 1_080_000);
}

// ---------------------------------------------------------------------------
// Fees
// ---------------------------------------------------------------------------

#[test]
fn one_percent_mint_fee_credits_the_collector() {
    let mut pool = make_pool(PoolParams {
        mint_fee_rate: ONE_PERCENT,
        ..params()
    });
    pool.mint(&acct("alice"), 100 * USDC, ts(0)).unwrap();
    assert_eq!(pool.balance_of(&acct("alice")), 99 * PRICE_SCALE);
    assert_eq!(pool.balance_of(&acct("fees")), PRICE_SCALE);
    assert_eq!(pool.custody().reserves(), 100 * USDC);
}

#[test]
fn redeem_fees_are_paid_at_redeem_time() {
    let mut pool = make_pool(PoolParams {
        redeem_fee_rate: ONE_PERCENT,
        protocol_fee_rate: 500_000,
        ..params()
    });
    let alice = acct("alice");
    pool.mint(&alice, 100 * USDC, ts(0)).unwrap();
    let id = pool.redeem(&alice, 100 * PRICE_SCALE, ts(0)).unwrap();

    let order = pool.redeem_details(id).unwrap();
    assert_eq!(order.underlying_amount_gross, 100 * USDC);
    assert_eq!(order.pool_fee_amount, USDC);
    assert_eq!(order.protocol_fee_amount, USDC / 2);
    assert_eq!(order.underlying_amount_after_fee, 98_500_000);
    assert_eq!(pool.custody().wallet_balance(&acct("fees")), USDC);
    assert_eq!(pool.custody().wallet_balance(&acct("protocol")), USDC / 2);

    pool.redeem_underlying_token_by_id(&alice, id, ts(WEEK))
        .unwrap();
    assert_eq!(pool.custody().reserves(), 0);
}

#[test]
fn interest_cost_fee_leaves_in_underlying() {
    let mut pool = make_pool(PoolParams {
        interest_cost_fee_rate: 100_000,
        ..params()
    });
    pool.mint(&acct("alice"), 1_000 * USDC, ts(0)).unwrap();
    assert_eq!(pool.custody().wallet_balance(&acct("fees")), USDC);
    assert_eq!(pool.custody().reserves(), 999 * USDC);
    assert_eq!(pool.total_underlying(ts(0)).unwrap(), 999 * USDC);
    assert_eq!(
        pool.custody().transfers(),
        vec![
            TransferRecord::Deposit {
                from: acct("alice"),
                amount: 1_000 * USDC
            },
            TransferRecord::Release {
                to: acct("fees"),
                amount: USDC
            },
        ]
    );
}

#[test]
fn management_fee_is_ten_percent_of_income() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        management_fee_rate: 10_000_000,
        ..params()
    });
    pool.mint(&acct("alice"), 100_000 * USDC, ts(0)).unwrap();

    let year = ts(SECONDS_PER_YEAR);
    let income = pool.total_underlying(year).unwrap() - 100_000 * USDC;
    let pending = pool.get_pending_management_fee(year).unwrap();
    assert_eq!(pending, income / 10);

    // Claim tokens are priced at the accrued rate before the mint.
    let expected = pool.get_ctoken_by_underlying(pending, year).unwrap();
    let minted = pool.claim_management_fee(&acct("admin"), year).unwrap();
    assert_eq!(minted, expected);
    assert_eq!(pool.balance_of(&acct("manager")), minted);
    assert_eq!(pool.total_underlying(year).unwrap(), 100_000 * USDC + income);

    // Nothing left to claim in the same instant.
    assert_eq!(pool.claim_management_fee(&acct("admin"), year).unwrap(), 0);
}

#[test]
fn management_rate_change_is_not_retroactive() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        management_fee_rate: 10_000_000,
        ..params()
    });
    pool.mint(&acct("alice"), 100_000 * USDC, ts(0)).unwrap();
    let half = SECONDS_PER_YEAR / 2;
    pool.set_management_fee_rate(&acct("admin"), 0, ts(half))
        .unwrap();
    // 10% of the first half-year's 4000 USDC, nothing after.
    assert_eq!(
        pool.get_pending_management_fee(ts(SECONDS_PER_YEAR)).unwrap(),
        400 * USDC
    );
    assert_eq!(pool.total_unclaim_management_fee().unwrap(), 400 * USDC);
}

// ---------------------------------------------------------------------------
// Failures and guards
// ---------------------------------------------------------------------------

#[test]
fn failed_deposit_rolls_everything_back() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        ..params()
    });
    pool.mint(&acct("alice"), 100 * USDC, ts(0)).unwrap();
    let before = pool.state().clone();

    pool.custody().set_fail_deposits(true);
    let err = pool.mint(&acct("bob"), 100 * USDC, ts(3_600)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ExternalTransfer);
    assert_eq!(pool.state(), &before);
    assert_eq!(pool.custody().wallet_balance(&acct("bob")), 1_000_000 * USDC);
}

#[test]
fn unfunded_depositor_is_rejected() {
    let mut pool = make_pool(params());
    let err = pool.mint(&acct("carol"), USDC, ts(0)).unwrap_err();
    assert!(matches!(err, PoolError::Custody(_)));
    assert_eq!(pool.total_supply(), 0);
}

#[test]
fn depeg_guard_blocks_mint_and_redeem() {
    let feed = Arc::new(NullPriceFeed::on_peg());
    let mut pool = make_pool(PoolParams {
        depeg_tolerance: Some(ONE_PERCENT),
        ..params()
    })
    .with_price_feed(Arc::clone(&feed));
    pool.mint(&acct("alice"), 100 * USDC, ts(0)).unwrap();

    feed.set(97_000_000);
    assert!(matches!(
        pool.redeem(&acct("alice"), PRICE_SCALE, ts(0)),
        Err(PoolError::Depegged { .. })
    ));
    feed.set(100_000_000);
    pool.custody().set_peg_deviation(5_000_000);
    assert!(matches!(
        pool.mint(&acct("alice"), USDC, ts(0)),
        Err(PoolError::Depegged { .. })
    ));
    pool.custody().set_peg_deviation(0);
    pool.redeem(&acct("alice"), PRICE_SCALE, ts(0)).unwrap();
}

#[test]
fn queue_settles_each_order_exactly_once() {
    let mut pool = make_pool(params());
    let alice = acct("alice");
    pool.mint(&alice, 100 * USDC, ts(0)).unwrap();
    let first = pool.redeem(&alice, 10 * PRICE_SCALE, ts(0)).unwrap();
    let second = pool.redeem(&alice, 20 * PRICE_SCALE, ts(100)).unwrap();
    assert_eq!((first, second), (1, 2));
    assert_eq!(pool.pending_withdrawal(&alice), 30 * USDC);

    assert_eq!(
        pool.withdraw_underlying_token_by_id(&alice, second, ts(WEEK))
            .unwrap_err()
            .code(),
        Some(108)
    );
    pool.withdraw_underlying_token_by_id(&alice, first, ts(WEEK))
        .unwrap();
    assert_eq!(
        pool.withdraw_underlying_token_by_id(&alice, first, ts(WEEK))
            .unwrap_err()
            .code(),
        Some(106)
    );
    pool.withdraw_underlying_token_by_id(&alice, second, ts(WEEK + 100))
        .unwrap();
    assert_eq!(pool.pending_withdrawal(&alice), 0);
    assert_eq!(pool.orders_of(&alice).filter(|o| o.settled).count(), 2);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[test]
fn restored_pool_continues_identically() {
    let mut pool = make_pool(PoolParams {
        target_apr: EIGHT_PERCENT,
        mint_fee_rate: ONE_PERCENT,
        ..params()
    });
    pool.mint(&acct("alice"), 10_000 * USDC, ts(0)).unwrap();
    pool.mint(&acct("bob"), 5_000 * USDC, ts(1_000)).unwrap();
    let id = pool.redeem(&acct("bob"), PRICE_SCALE, ts(2_000)).unwrap();

    let bytes = pool.snapshot().unwrap().to_bytes().unwrap();
    let custody = NullCustody::new();
    custody.fund_reserves(pool.custody().reserves());
    let mut restored: Pool<NullCustody> =
        Pool::restore(PoolSnapshot::from_bytes(&bytes).unwrap(), custody).unwrap();
    assert_eq!(restored.state(), pool.state());

    let later = ts(SECONDS_PER_YEAR);
    assert_eq!(
        restored.price_per_token(later).unwrap(),
        pool.price_per_token(later).unwrap()
    );
    assert_eq!(
        restored
            .withdraw_underlying_token_by_id(&acct("bob"), id, later)
            .unwrap(),
        pool.withdraw_underlying_token_by_id(&acct("bob"), id, later)
            .unwrap()
    );
}
