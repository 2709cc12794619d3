#![no_main]

use libfuzzer_sys::fuzz_target;

use tide_pool::{accrual_delta, AccrualState, ExchangeRate};
use tide_types::Timestamp;

fn word(data: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(buf)
}

// Accrual and conversion arithmetic must never panic, and a conversion
// round trip must never hand back more underlying than it took in.
fuzz_target!(|data: &[u8]| {
    if data.len() < 40 {
        return;
    }

    let total_underlying = u128::from(word(data, 0));
    let apr = word(data, 8);
    let total_supply = u128::from(word(data, 16)) << 32;
    let amount = u128::from(word(data, 24));
    let elapsed = word(data, 32);

    let _ = accrual_delta(total_underlying, apr, elapsed);

    let mut state = AccrualState::new(apr, Timestamp::EPOCH);
    let mut now = Timestamp::EPOCH;
    for step in data[40..].chunks(8).filter(|c| c.len() == 8) {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(step);
        now = now.plus_secs(u64::from_le_bytes(buf) % 10_000_000);
        let _ = state.accrue(now);
    }

    let rate = ExchangeRate::new(total_underlying, total_supply, 1_000_000_000_000);
    let _ = rate.price_per_token();
    if let Ok(claims) = rate.ctoken_by_underlying(amount) {
        if let Ok(back) = rate.underlying_by_ctoken(claims) {
            assert!(back <= amount, "round trip gained {} -> {}", amount, back);
        }
    }
});
