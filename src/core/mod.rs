//! Runtime core: the pool control loop and its lifecycle.
//!
//! The public API from this module is [`Supervisor`], [`SupervisorBuilder`] and
//! [`Config`].
//!
//! Internal modules:
//! - [`pool`]: the single control loop (slot events, restarts, quiet timer, binder passes);
//! - [`supervisor`]: event fan-out, shutdown and grace handling around the pool;
//! - [`builder`]: setup validation and the controller/worker entry point;
//! - [`shutdown`]: cross-platform shutdown signal handling;
//! - [`config`]: runtime settings and environment overrides.

mod builder;
mod config;
mod pool;
mod shutdown;
mod supervisor;

#[cfg(test)]
pub(crate) mod testing;

pub use builder::SupervisorBuilder;
pub use config::{Config, GRACE_ENV, NUM_WORKERS_ENV, QUIET_PERIOD_ENV};
pub use pool::SlotRow;
pub use supervisor::Supervisor;
