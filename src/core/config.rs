//! # Global runtime configuration.
//!
//! Provides [`Config`] centralized settings for the pool supervisor.
//!
//! ## Sentinel values
//! - `num_workers = None` (or `<= 0`) → one worker per available CPU
//! - `grace = 0s` → do not wait for workers after asking them to stop
//!
//! ## Environment overrides
//! [`Config::with_env_overrides`] reads:
//! - `SLOTVISOR_NUM_WORKERS`: a non-numeric value means "use the CPU count";
//! - `SLOTVISOR_QUIET_PERIOD_SECS`, `SLOTVISOR_GRACE_SECS`: ignored when unparsable.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::policies::RestartTrigger;

/// Environment variable overriding [`Config::num_workers`].
pub const NUM_WORKERS_ENV: &str = "SLOTVISOR_NUM_WORKERS";
/// Environment variable overriding [`Config::quiet_period`] (seconds).
pub const QUIET_PERIOD_ENV: &str = "SLOTVISOR_QUIET_PERIOD_SECS";
/// Environment variable overriding [`Config::grace`] (seconds).
pub const GRACE_ENV: &str = "SLOTVISOR_GRACE_SECS";

/// Global configuration for the pool supervisor.
///
/// ## Field semantics
/// - `num_workers`: requested pool size (resolved by [`Config::effective_workers`])
/// - `quiet_period`: failure-free time after which backoff returns to its initial delay
/// - `restart_trigger`: which failure event schedules a replacement
/// - `grace`: maximum wait for workers to exit on shutdown (`0s` = no wait)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped by Bus)
///
/// ## Notes
/// All fields are public for flexibility. Prefer the helper accessors to avoid
/// sprinkling sentinel checks across the codebase.
#[derive(Clone, Debug)]
pub struct Config {
    /// Requested number of worker slots.
    ///
    /// `None`, zero and negative values fall back to the CPU count.
    pub num_workers: Option<i64>,

    /// Failure-free period after which the backoff strategy is reset.
    ///
    /// Every failure re-arms a single pool-wide one-shot timer.
    pub quiet_period: Duration,

    /// Which failure event schedules a restart.
    pub restart_trigger: RestartTrigger,

    /// Maximum time to wait for worker processes on shutdown.
    ///
    /// If exceeded, `run` returns `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl Config {
    /// Resolves the pool size.
    ///
    /// Returns the requested count when it is a positive number, otherwise the
    /// number of available CPUs (1 if that cannot be determined).
    pub fn effective_workers(&self) -> usize {
        self.requested_workers().unwrap_or_else(available_cpus)
    }

    /// The requested pool size if it is usable as-is.
    #[inline]
    pub fn requested_workers(&self) -> Option<usize> {
        self.num_workers
            .filter(|n| *n > 0)
            .and_then(|n| usize::try_from(n).ok())
    }

    /// Returns the shutdown grace as an `Option` (`None` = do not wait).
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        (!self.grace.is_zero()).then_some(self.grace)
    }

    /// How long a terminated worker may take to exit before it is killed.
    ///
    /// Half of [`grace`](Self::grace), so killed processes are reaped within
    /// the shutdown wait. Zero grace kills at once.
    #[inline]
    pub fn stop_grace(&self) -> Duration {
        self.grace / 2
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Applies overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup(NUM_WORKERS_ENV) {
            self.num_workers = raw.trim().parse::<i64>().ok();
        }
        if let Some(secs) = lookup(QUIET_PERIOD_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            self.quiet_period = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup(GRACE_ENV).and_then(|v| v.trim().parse::<u64>().ok()) {
            self.grace = Duration::from_secs(secs);
        }
        self
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `num_workers = None` (CPU count)
    /// - `quiet_period = 1h`
    /// - `restart_trigger = RestartTrigger::Disconnect`
    /// - `grace = 10s`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            num_workers: None,
            quiet_period: Duration::from_secs(60 * 60),
            restart_trigger: RestartTrigger::default(),
            grace: Duration::from_secs(10),
            bus_capacity: 1024,
        }
    }
}

fn available_cpus() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_workers(n: Option<i64>) -> Config {
        Config {
            num_workers: n,
            ..Config::default()
        }
    }

    #[test]
    fn test_positive_worker_count_is_used() {
        assert_eq!(with_workers(Some(3)).effective_workers(), 3);
    }

    #[test]
    fn test_invalid_worker_counts_fall_back_to_cpus() {
        for n in [None, Some(0), Some(-4), Some(i64::MIN)] {
            assert_eq!(with_workers(n).effective_workers(), available_cpus(), "{n:?}");
        }
    }

    #[test]
    fn test_non_numeric_override_falls_back_to_cpus() {
        let cfg = with_workers(Some(8)).with_overrides_from(|k| {
            (k == NUM_WORKERS_ENV).then(|| "lots".to_string())
        });
        assert_eq!(cfg.num_workers, None);
        assert_eq!(cfg.effective_workers(), available_cpus());
    }

    #[test]
    fn test_numeric_overrides_apply() {
        let cfg = Config::default().with_overrides_from(|k| match k {
            NUM_WORKERS_ENV => Some(" 6 ".into()),
            QUIET_PERIOD_ENV => Some("30".into()),
            GRACE_ENV => Some("0".into()),
            _ => None,
        });
        assert_eq!(cfg.effective_workers(), 6);
        assert_eq!(cfg.quiet_period, Duration::from_secs(30));
        assert_eq!(cfg.grace_period(), None);
        assert_eq!(cfg.stop_grace(), Duration::ZERO);
    }

    #[test]
    fn test_stop_grace_fits_inside_shutdown_grace() {
        let cfg = Config {
            grace: Duration::from_secs(1),
            ..Config::default()
        };
        assert_eq!(cfg.stop_grace(), Duration::from_millis(500));
        assert!(cfg.stop_grace() < cfg.grace);
    }

    #[test]
    fn test_unparsable_durations_are_ignored() {
        let cfg = Config::default().with_overrides_from(|k| match k {
            QUIET_PERIOD_ENV | GRACE_ENV => Some("soon".into()),
            _ => None,
        });
        assert_eq!(cfg.quiet_period, Duration::from_secs(3600));
        assert_eq!(cfg.grace, Duration::from_secs(10));
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
