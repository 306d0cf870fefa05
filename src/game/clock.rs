//! Multiplier growth math for the round clock

use std::time::Duration;

/// Tick period of the engine's multiplier clock.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Exponential growth factor applied per elapsed second.
pub const GROWTH_PER_SECOND: f64 = 1.05;

/// Round to two decimals, half away from zero.
///
/// Payouts and crash comparisons both run on these rounded values, so a
/// multiplier and a crash point that print the same are equal exactly.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Multiplier after `elapsed` time in a running round.
pub fn multiplier_after(elapsed: Duration) -> f64 {
    round2(GROWTH_PER_SECOND.powf(elapsed.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_one() {
        assert_eq!(multiplier_after(Duration::ZERO), 1.00);
        // Sub-tick elapsed times still display as 1.00x.
        assert_eq!(multiplier_after(Duration::from_millis(100)), 1.00);
    }

    #[test]
    fn test_known_elapsed_values() {
        assert_eq!(multiplier_after(Duration::from_secs(1)), 1.05);
        assert_eq!(multiplier_after(Duration::from_secs(10)), 1.63);
        assert_eq!(multiplier_after(Duration::from_millis(17_500)), 2.35);
        assert_eq!(multiplier_after(Duration::from_millis(38_400)), 6.51);
    }

    #[test]
    fn test_monotonic_over_tick_grid() {
        let mut last = 0.0;
        for tick in 0..600 {
            let m = multiplier_after(TICK_INTERVAL * tick);
            assert!(m >= last, "dropped from {} to {} at tick {}", last, m, tick);
            assert!(m >= 1.00);
            last = m;
        }
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        // 2.125 and 2.375 are exact in binary, so the halfway behavior
        // is observable without representation noise.
        assert_eq!(round2(2.125), 2.13);
        assert_eq!(round2(2.375), 2.38);
        assert_eq!(round2(2.344_999_9), 2.34);
        assert_eq!(round2(1.0), 1.0);
    }
}
