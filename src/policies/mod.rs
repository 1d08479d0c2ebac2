//! Restart policies.
//!
//! This module groups the knobs that control **when** a failed slot is
//! restarted and **how long** to wait before forking its replacement.
//!
//! ## Contents
//! - [`BackoffStrategy`]    pool-wide restart delay capability (`next` / `reset`)
//! - [`ExponentialBackoff`] default strategy (500ms → 5s, doubling)
//! - [`JitterPolicy`]       randomization to avoid synchronized restarts
//! - [`RestartTrigger`]     whether a disconnect or only an exit schedules a restart
//!
//! ## Quick wiring
//! ```text
//! failure event ──► RestartTrigger::fires_on? ──► strategy.next() ──► restart after delay
//!                                             └─► re-arm quiet period ──► strategy.reset()
//! ```

mod backoff;
mod jitter;
mod restart;

pub(crate) use backoff::resolve_strategy;
pub use backoff::{BackoffStrategy, ExponentialBackoff};
pub use jitter::JitterPolicy;
pub use restart::RestartTrigger;
