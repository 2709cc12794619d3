use proptest::prelude::*;

use tide_types::{mul_div, mul_mul_div, MathError, Timestamp};

proptest! {
    /// mul_div agrees with plain u128 arithmetic whenever the product fits.
    #[test]
    fn mul_div_matches_narrow_arithmetic(
        a in 0u128..u64::MAX as u128,
        b in 0u128..u64::MAX as u128,
        d in 1u128..u64::MAX as u128,
    ) {
        prop_assert_eq!(mul_div(a, b, d).unwrap(), a * b / d);
    }

    /// floor(a * b / b) == a for any non-zero b, even when a * b overflows u128.
    #[test]
    fn mul_div_inverse(a in any::<u128>(), b in 1u128..) {
        prop_assert_eq!(mul_div(a, b, b).unwrap(), a);
    }

    /// The quotient never exceeds either factor scaled by the denominator ratio.
    #[test]
    fn mul_div_is_monotonic_in_first_factor(
        a in 0u128..1u128 << 100,
        extra in 0u128..1u128 << 20,
        b in 0u128..1u128 << 60,
        d in 1u128..1u128 << 60,
    ) {
        let lo = mul_div(a, b, d);
        let hi = mul_div(a + extra, b, d);
        match (lo, hi) {
            (Ok(lo), Ok(hi)) => prop_assert!(lo <= hi),
            (_, Err(e)) => prop_assert_eq!(e, MathError::Overflow),
            (Err(e), Ok(_)) => prop_assert!(false, "smaller input failed: {e}"),
        }
    }

    /// Splitting the triple product into two steps never beats the exact form.
    #[test]
    fn mul_mul_div_at_least_two_step(
        a in 0u128..1u128 << 96,
        b in 0u128..100_000_000u128,
        c in 0u128..(u32::MAX as u128),
    ) {
        let d = 31_536_000u128 * 100_000_000;
        let exact = mul_mul_div(a, b, c, d).unwrap();
        let two_step = mul_div(mul_div(a, b, d).unwrap(), c, 1).unwrap();
        prop_assert!(exact >= two_step);
    }

    /// Timestamp ordering: new(a) <= new(b) iff a <= b.
    #[test]
    fn timestamp_ordering(a in 0u64..u64::MAX, b in 0u64..u64::MAX) {
        let ta = Timestamp::new(a);
        let tb = Timestamp::new(b);
        prop_assert_eq!(ta <= tb, a <= b);
        prop_assert_eq!(ta == tb, a == b);
    }

    /// Timestamp bincode serialization roundtrip.
    #[test]
    fn timestamp_bincode_roundtrip(secs in any::<u64>()) {
        let ts = Timestamp::new(secs);
        let encoded = bincode::serialize(&ts).unwrap();
        let decoded: Timestamp = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, ts);
    }
}
