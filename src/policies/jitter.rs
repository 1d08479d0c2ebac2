//! # Jitter for restart delays.
//!
//! When several slots of one pool crash together (a bad deploy, a shared
//! dependency going away) their replacements would otherwise be forked in the
//! same instant. [`JitterPolicy`] spreads those restarts out:
//!
//! - [`JitterPolicy::None`] exact delay (default);
//! - [`JitterPolicy::Full`] random delay in `[0, delay]`;
//! - [`JitterPolicy::Equal`] `delay/2 + random[0, delay/2]`;
//! - [`JitterPolicy::Decorrelated`] random delay in `[floor, min(prev × 3, max)]`.

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Use the backoff delay unchanged.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// Half the delay plus a random share of the other half.
    Equal,
    /// Random delay between the floor and three times the base, capped at max.
    ///
    /// Needs extra context; see [`apply_decorrelated`](Self::apply_decorrelated).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns `delay` unchanged here.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => Duration::from_millis(random_between(0, ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                Duration::from_millis(half + random_between(0, half))
            }
        }
    }

    /// Applies decorrelated jitter given the strategy floor, the current base and the ceiling.
    ///
    /// Other variants fall back to [`apply`](Self::apply) on `base`.
    pub fn apply_decorrelated(&self, floor: Duration, base: Duration, max: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(base);
        }

        let floor_ms = millis(floor);
        let upper = millis(base).saturating_mul(3).min(millis(max)).max(floor_ms);
        Duration::from_millis(random_between(floor_ms, upper))
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

fn random_between(lo: u64, hi: u64) -> u64 {
    if lo >= hi {
        return lo;
    }
    rand::rng().random_range(lo..=hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d), d);
    }

    #[test]
    fn test_full_within_bounds() {
        for _ in 0..100 {
            assert!(JitterPolicy::Full.apply(Duration::from_millis(200)) <= Duration::from_millis(200));
        }
    }

    #[test]
    fn test_zero_delay_stays_zero() {
        assert_eq!(JitterPolicy::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(JitterPolicy::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_decorrelated_respects_floor_and_max() {
        let floor = Duration::from_millis(500);
        let max = Duration::from_secs(5);
        for _ in 0..100 {
            let d = JitterPolicy::Decorrelated.apply_decorrelated(floor, Duration::from_secs(4), max);
            assert!(d >= floor && d <= max, "{d:?}");
        }
    }

    #[test]
    fn test_decorrelated_fallback_for_other_variants() {
        let base = Duration::from_millis(300);
        assert_eq!(
            JitterPolicy::None.apply_decorrelated(Duration::from_millis(1), base, Duration::from_secs(1)),
            base
        );
    }
}
