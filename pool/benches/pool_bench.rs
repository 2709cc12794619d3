use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use tide_nullables::NullCustody;
use tide_pool::{accrual_delta, AccrualState, Pool, RoleRegistry};
use tide_types::params::SECONDS_PER_YEAR;
use tide_types::{AccountId, PoolParams, Timestamp};

const USDC: u128 = 1_000_000;

fn make_pool() -> Pool<NullCustody> {
    let params = PoolParams {
        target_apr: 8_000_000,
        mint_fee_rate: 100_000,
        redeem_fee_rate: 100_000,
        ..PoolParams::with_admin(AccountId::new("admin"))
    };
    let custody = NullCustody::new();
    custody.fund(&AccountId::new("alice"), u128::from(u64::MAX));
    Pool::new(
        &params,
        custody,
        RoleRegistry::new(AccountId::new("admin")),
        Timestamp::new(0),
    )
    .unwrap()
}

fn bench_accrual_delta(c: &mut Criterion) {
    let mut group = c.benchmark_group("accrual_delta");

    for tu in [USDC, 1_000_000 * USDC, u128::from(u64::MAX)] {
        group.bench_with_input(BenchmarkId::new("one_year", tu), &tu, |b, &tu| {
            b.iter(|| black_box(accrual_delta(black_box(tu), 8_000_000, SECONDS_PER_YEAR)));
        });
    }

    group.finish();
}

fn bench_accrue_steps(c: &mut Criterion) {
    c.bench_function("accrue_hourly_for_a_day", |b| {
        b.iter_batched(
            || {
                let mut state = AccrualState::new(8_000_000, Timestamp::new(0));
                state.total_underlying = 1_000_000 * USDC;
                state
            },
            |mut state| {
                for hour in 1u64..=24 {
                    let _ = black_box(state.accrue(Timestamp::new(hour * 3_600)));
                }
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_mint_redeem(c: &mut Criterion) {
    let alice = AccountId::new("alice");

    c.bench_function("pool_mint", |b| {
        b.iter_batched(
            make_pool,
            |mut pool| {
                let _ = black_box(pool.mint(&alice, black_box(1_000 * USDC), Timestamp::new(60)));
            },
            criterion::BatchSize::SmallInput,
        );
    });

    c.bench_function("pool_redeem", |b| {
        b.iter_batched(
            || {
                let mut pool = make_pool();
                pool.mint(&alice, 1_000 * USDC, Timestamp::new(0)).unwrap();
                pool
            },
            |mut pool| {
                let claim = pool.balance_of(&alice) / 2;
                let _ = black_box(pool.redeem(&alice, claim, Timestamp::new(3_600)));
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_price_query(c: &mut Criterion) {
    let mut pool = make_pool();
    pool.mint(&AccountId::new("alice"), 1_000_000 * USDC, Timestamp::new(0))
        .unwrap();

    c.bench_function("price_per_token", |b| {
        b.iter(|| black_box(pool.price_per_token(black_box(Timestamp::new(SECONDS_PER_YEAR)))));
    });
}

criterion_group!(
    benches,
    bench_accrual_delta,
    bench_accrue_steps,
    bench_mint_redeem,
    bench_price_query,
);
criterion_main!(benches);
