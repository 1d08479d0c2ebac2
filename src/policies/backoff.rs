//! # Backoff strategies for restarting worker processes.
//!
//! [`BackoffStrategy`] is the capability the pool needs from a retry policy:
//! - [`BackoffStrategy::next`] produces the delay before the next restart;
//! - [`BackoffStrategy::reset`] returns the strategy to its initial delay.
//!
//! A single strategy instance is shared by **all** slots of a pool, so the
//! delay escalates with pool-wide instability rather than per slot.
//!
//! [`ExponentialBackoff`] is the default implementation. It is parameterized by:
//! - [`ExponentialBackoff::first`] the initial delay;
//! - [`ExponentialBackoff::max`] the ceiling;
//! - [`ExponentialBackoff::factor`] the multiplicative growth factor;
//! - [`ExponentialBackoff::jitter`] optional randomization.
//!
//! The base delay for the `n`-th call since the last reset is `first × factor^n`,
//! clamped to `max`, then jitter is applied. The base is derived purely from the
//! call counter, so jitter output never feeds back into later delays. A jittered
//! delay is raised to the previous one when it falls below it, keeping the
//! sequence non-decreasing until the next reset.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use slotvisor::{BackoffStrategy, ExponentialBackoff};
//!
//! let mut backoff = ExponentialBackoff::default();
//!
//! assert_eq!(backoff.next(), Duration::from_millis(500));
//! assert_eq!(backoff.next(), Duration::from_millis(1000));
//! assert_eq!(backoff.next(), Duration::from_millis(2000));
//! assert_eq!(backoff.next(), Duration::from_millis(4000));
//! assert_eq!(backoff.next(), Duration::from_millis(5000));
//!
//! backoff.reset();
//! assert_eq!(backoff.next(), Duration::from_millis(500));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Stateful policy producing increasing restart delays.
///
/// Implementations must keep [`next`](Self::next) non-decreasing between
/// resets and bounded by their own ceiling.
pub trait BackoffStrategy: Send + 'static {
    /// Returns the delay before the next restart attempt and advances the strategy.
    fn next(&mut self) -> Duration;

    /// Returns the strategy to its initial delay.
    fn reset(&mut self);

    /// Reports whether this strategy is usable.
    ///
    /// Checked once when the pool is built; an invalid strategy is replaced by
    /// [`ExponentialBackoff::default`].
    fn is_valid(&self) -> bool {
        true
    }
}

/// Exponential restart backoff with a floor and a ceiling.
#[derive(Clone, Copy, Debug)]
pub struct ExponentialBackoff {
    /// Initial delay, returned by the first `next()` after construction or reset.
    pub first: Duration,
    /// Maximum delay.
    pub max: Duration,
    /// Multiplicative growth factor (must be finite and `>= 1.0`).
    pub factor: f64,
    /// Jitter policy applied on top of the base delay.
    pub jitter: JitterPolicy,
    attempt: u32,
    last: Duration,
}

impl Default for ExponentialBackoff {
    /// Returns a strategy with:
    /// - `first = 500ms`;
    /// - `max = 5s`;
    /// - `factor = 2.0`;
    /// - `jitter = None`.
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(5))
    }
}

impl ExponentialBackoff {
    /// Creates a doubling strategy between `first` and `max` without jitter.
    pub fn new(first: Duration, max: Duration) -> Self {
        Self {
            first,
            max,
            factor: 2.0,
            jitter: JitterPolicy::None,
            attempt: 0,
            last: Duration::ZERO,
        }
    }

    /// Overrides the growth factor.
    #[must_use]
    pub fn with_factor(mut self, factor: f64) -> Self {
        self.factor = factor;
        self
    }

    /// Overrides the jitter policy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Number of `next()` calls since construction or the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Computes the un-jittered delay for the given 0-indexed attempt.
    fn base_delay(&self, attempt: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = attempt.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped_secs)
        }
    }
}

impl BackoffStrategy for ExponentialBackoff {
    fn next(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        let jittered = match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        };
        self.last = jittered.max(self.last).min(self.max);
        self.last
    }

    fn reset(&mut self) {
        self.attempt = 0;
        self.last = Duration::ZERO;
    }

    fn is_valid(&self) -> bool {
        !self.first.is_zero()
            && self.max >= self.first
            && self.factor.is_finite()
            && self.factor >= 1.0
    }
}

/// Picks the first valid strategy, falling back to [`ExponentialBackoff::default`].
pub(crate) fn resolve_strategy(
    requested: Option<Box<dyn BackoffStrategy>>,
) -> Box<dyn BackoffStrategy> {
    match requested {
        Some(strategy) if strategy.is_valid() => strategy,
        Some(_) => {
            tracing::warn!("backoff strategy rejected as invalid; using default exponential backoff");
            Box::new(ExponentialBackoff::default())
        }
        None => Box::new(ExponentialBackoff::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(strategy: &mut dyn BackoffStrategy, n: usize) -> Vec<Duration> {
        (0..n).map(|_| strategy.next()).collect()
    }

    #[test]
    fn test_default_sequence_doubles_up_to_ceiling() {
        let mut backoff = ExponentialBackoff::default();
        let ms: Vec<u128> = drain(&mut backoff, 7).iter().map(|d| d.as_millis()).collect();
        assert_eq!(ms, vec![500, 1000, 2000, 4000, 5000, 5000, 5000]);
    }

    #[test]
    fn test_sequence_is_non_decreasing() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(30), Duration::from_secs(3))
            .with_factor(1.7);
        let delays = drain(&mut backoff, 40);
        for pair in delays.windows(2) {
            assert!(pair[0] <= pair[1], "{:?} > {:?}", pair[0], pair[1]);
        }
        assert_eq!(*delays.last().unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn test_reset_returns_to_first() {
        let mut backoff = ExponentialBackoff::default();
        drain(&mut backoff, 5);
        assert_eq!(backoff.attempt(), 5);
        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next(), Duration::from_millis(500));
    }

    #[test]
    fn test_first_exceeds_max_is_invalid() {
        let backoff = ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(5));
        assert!(!backoff.is_valid());
    }

    #[test]
    fn test_shrinking_or_nan_factor_is_invalid() {
        let base = ExponentialBackoff::default();
        assert!(!base.with_factor(0.5).is_valid());
        assert!(!base.with_factor(f64::NAN).is_valid());
        assert!(!base.with_factor(f64::INFINITY).is_valid());
        assert!(base.with_factor(1.0).is_valid());
    }

    #[test]
    fn test_zero_first_is_invalid() {
        let backoff = ExponentialBackoff::new(Duration::ZERO, Duration::from_secs(1));
        assert!(!backoff.is_valid());
    }

    #[test]
    fn test_huge_attempt_clamps_to_max() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(5));
    }

    #[test]
    fn test_equal_jitter_stays_within_half_and_base() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(1000), Duration::from_secs(30))
            .with_factor(1.0)
            .with_jitter(JitterPolicy::Equal);
        for _ in 0..50 {
            let delay = backoff.next();
            assert!(delay >= Duration::from_millis(500));
            assert!(delay <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn test_jittered_sequences_never_decrease_between_resets() {
        for jitter in [JitterPolicy::Full, JitterPolicy::Equal, JitterPolicy::Decorrelated] {
            let mut backoff = ExponentialBackoff::default().with_jitter(jitter);
            for _ in 0..20 {
                let delays = drain(&mut backoff, 12);
                for pair in delays.windows(2) {
                    assert!(pair[0] <= pair[1], "{jitter:?}: {:?} > {:?}", pair[0], pair[1]);
                }
                assert!(delays.iter().all(|d| *d <= Duration::from_secs(5)));
                backoff.reset();
            }
        }
    }

    #[test]
    fn test_reset_lets_jittered_delay_drop_again() {
        let mut backoff = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(5))
            .with_jitter(JitterPolicy::Equal);
        drain(&mut backoff, 10);
        backoff.reset();
        let first = backoff.next();
        assert!(first >= Duration::from_millis(50) && first <= Duration::from_millis(100), "{first:?}");
    }

    struct Constant;

    impl BackoffStrategy for Constant {
        fn next(&mut self) -> Duration {
            Duration::from_millis(42)
        }
        fn reset(&mut self) {}
    }

    #[test]
    fn test_resolve_keeps_valid_custom_strategy() {
        let mut s = resolve_strategy(Some(Box::new(Constant)));
        assert_eq!(s.next(), Duration::from_millis(42));
    }

    #[test]
    fn test_resolve_replaces_invalid_strategy_with_default() {
        let bad = ExponentialBackoff::new(Duration::ZERO, Duration::ZERO);
        let mut s = resolve_strategy(Some(Box::new(bad)));
        assert_eq!(s.next(), Duration::from_millis(500));
    }

    #[test]
    fn test_resolve_none_uses_default() {
        let mut s = resolve_strategy(None);
        assert_eq!(s.next(), Duration::from_millis(500));
        assert_eq!(s.next(), Duration::from_millis(1000));
    }
}
