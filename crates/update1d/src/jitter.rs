//! Jittered wait durations.
//!
//! A fleet booted at the same moment would otherwise check, find the same
//! release and ask for a reboot in lockstep. Every wait is drawn uniformly
//! from `[value - fuzz/2, value + fuzz/2]`, like update_engine's
//! `FuzzInt`.

use rand::Rng;
use std::time::Duration;

/// Draw a duration uniformly from the closed interval
/// `[value - fuzz/2, value + fuzz/2]`, at nanosecond resolution.
///
/// The lower bound saturates at zero when `fuzz/2` exceeds `value`.
pub fn fuzz_duration<R: Rng + ?Sized>(rng: &mut R, value: Duration, fuzz: Duration) -> Duration {
    let value = saturating_nanos(value);
    let half = saturating_nanos(fuzz) / 2;

    let min = value.saturating_sub(half);
    let max = value.saturating_add(half);

    Duration::from_nanos(rng.gen_range(min..=max))
}

fn saturating_nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn test_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let value = 45 * MINUTE;
        let fuzz = 20 * MINUTE;

        for _ in 0..10_000 {
            let d = fuzz_duration(&mut rng, value, fuzz);
            assert!(d >= 35 * MINUTE, "{:?} below lower bound", d);
            assert!(d <= 55 * MINUTE, "{:?} above upper bound", d);
        }
    }

    #[test]
    fn test_zero_fuzz_is_exact() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(fuzz_duration(&mut rng, 7 * MINUTE, Duration::ZERO), 7 * MINUTE);
    }

    #[test]
    fn test_bounds_are_inclusive() {
        // fuzz of 2ns gives exactly {value-1, value, value+1}
        let mut rng = StdRng::seed_from_u64(3);
        let value = Duration::from_nanos(10);
        let mut seen = [false; 3];
        for _ in 0..1_000 {
            let n = fuzz_duration(&mut rng, value, Duration::from_nanos(2)).as_nanos();
            assert!((9..=11).contains(&n));
            seen[(n - 9) as usize] = true;
        }
        assert_eq!(seen, [true, true, true]);
    }

    #[test]
    fn test_lower_bound_saturates_at_zero() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1_000 {
            let d = fuzz_duration(&mut rng, Duration::from_secs(1), Duration::from_secs(10));
            assert!(d <= Duration::from_secs(6));
        }
    }

    #[test]
    fn test_spread_is_uniform() {
        // Ten equal buckets over [35m, 55m]; a normal distribution centred
        // on 45m would starve the outer buckets.
        let mut rng = StdRng::seed_from_u64(2605);
        let value = 45 * MINUTE;
        let fuzz = 20 * MINUTE;
        let lower = (35 * MINUTE).as_nanos();
        let width = fuzz.as_nanos() / 10;
        let trials = 50_000;

        let mut buckets = [0u32; 10];
        for _ in 0..trials {
            let d = fuzz_duration(&mut rng, value, fuzz).as_nanos();
            let idx = ((d - lower) / width).min(9) as usize;
            buckets[idx] += 1;
        }

        let expected = trials / 10;
        for (i, count) in buckets.iter().enumerate() {
            let deviation = (*count as i64 - expected as i64).abs();
            assert!(
                deviation < (expected / 10) as i64,
                "bucket {} has {} samples, expected about {}",
                i,
                count,
                expected
            );
        }
    }
}
