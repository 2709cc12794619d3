//! Wrapper behaviour against a live pool over time.

use tide_nullables::NullCustody;
use tide_pool::{Pool, RoleRegistry};
use tide_rebase::{RebasingWrapper, WrapperSnapshot};
use tide_types::params::{PRICE_SCALE, SECONDS_PER_YEAR};
use tide_types::{AccountId, PoolParams, Timestamp};

const USDC: u128 = 1_000_000;

fn acct(name: &str) -> AccountId {
    AccountId::new(name)
}

fn make_pool() -> Pool<NullCustody> {
    let params = PoolParams {
        target_apr: 5_000_000,
        ..PoolParams::with_admin(acct("admin"))
    };
    let custody = NullCustody::new();
    for name in ["alice", "bob"] {
        custody.fund(&acct(name), 10_000 * USDC);
    }
    Pool::new(&params, custody, RoleRegistry::new(acct("admin")), Timestamp::EPOCH).unwrap()
}

#[test]
fn shares_track_claims_and_balances_track_value() {
    let mut pool = make_pool();
    let mut wrapper = RebasingWrapper::new(acct("wrapper"), acct("admin"));

    wrapper
        .mint_wrapped(&mut pool, &acct("alice"), 1_000 * USDC, Timestamp::EPOCH)
        .unwrap();
    let year = Timestamp::new(SECONDS_PER_YEAR);
    assert_eq!(
        wrapper.balance_of(&pool, &acct("alice"), year).unwrap(),
        1_050 * PRICE_SCALE
    );

    // A year later 1050 USDC buys the same number of claim tokens.
    wrapper
        .mint_wrapped(&mut pool, &acct("bob"), 1_050 * USDC, year)
        .unwrap();
    assert_eq!(
        wrapper.shares_of(&acct("bob")),
        wrapper.shares_of(&acct("alice"))
    );
    assert_eq!(
        wrapper.balance_of(&pool, &acct("bob"), year).unwrap(),
        1_050 * PRICE_SCALE
    );
    assert_eq!(
        wrapper.total_shares(),
        pool.balance_of(wrapper.custody_account())
    );
}

#[test]
fn shares_stay_backed_through_a_full_cycle() {
    let mut pool = make_pool();
    let mut wrapper = RebasingWrapper::new(acct("wrapper"), acct("admin"));
    let now = Timestamp::EPOCH;

    pool.mint(&acct("alice"), 500 * USDC, now).unwrap();
    pool.approve(&acct("alice"), wrapper.custody_account(), u128::MAX)
        .unwrap();
    wrapper
        .wrap(&mut pool, &acct("alice"), &acct("alice"), 500 * PRICE_SCALE, now)
        .unwrap();

    let later = Timestamp::new(SECONDS_PER_YEAR / 4);
    let half = wrapper.balance_of(&pool, &acct("alice"), later).unwrap() / 2;
    wrapper
        .transfer(&pool, &acct("alice"), &acct("bob"), half, later)
        .unwrap();

    let bytes = WrapperSnapshot::capture(&wrapper).to_bytes().unwrap();
    let mut wrapper = WrapperSnapshot::from_bytes(&bytes).unwrap().into_wrapper();

    wrapper.unwrap_all(&mut pool, &acct("bob"), later).unwrap();
    wrapper.unwrap_all(&mut pool, &acct("alice"), later).unwrap();
    assert_eq!(wrapper.total_shares(), 0);
    assert_eq!(pool.balance_of(wrapper.custody_account()), 0);
    assert_eq!(
        pool.balance_of(&acct("alice")) + pool.balance_of(&acct("bob")),
        500 * PRICE_SCALE
    );
}

#[test]
fn partial_transfer_moves_matching_shares() {
    let mut pool = make_pool();
    let mut wrapper = RebasingWrapper::new(acct("wrapper"), acct("admin"));
    let (alice, bob) = (acct("alice"), acct("bob"));

    wrapper
        .mint_wrapped(&mut pool, &alice, 10_000 * USDC, Timestamp::EPOCH)
        .unwrap();
    let year = Timestamp::new(SECONDS_PER_YEAR);
    let total_shares = wrapper.total_shares();
    let total_supply = wrapper.total_supply(&pool, year).unwrap();

    let amount = wrapper.balance_of(&pool, &alice, year).unwrap() / 2;
    assert_eq!(amount, 5_250 * PRICE_SCALE);
    let expected_shares = wrapper.shares_by_amount(&pool, amount, year).unwrap();
    let moved = wrapper.transfer(&pool, &alice, &bob, amount, year).unwrap();

    assert_eq!(moved, expected_shares);
    assert_eq!(wrapper.shares_of(&bob), expected_shares);
    assert_eq!(wrapper.balance_of(&pool, &bob, year).unwrap(), amount);
    assert_eq!(
        wrapper.shares_of(&alice) + wrapper.shares_of(&bob),
        total_shares
    );
    assert_eq!(
        wrapper.balance_of(&pool, &alice, year).unwrap()
            + wrapper.balance_of(&pool, &bob, year).unwrap(),
        total_supply
    );
}
