//! # Bound task descriptors.
//!
//! [`BoundTaskSpec`] is the unvalidated form handed to the builder, mirroring
//! what an operator would write in configuration. [`BoundTaskSpec::validate`]
//! turns it into a [`BoundTask`] or names the first offending field.
//!
//! ## Rules
//! - `preferred_slot_id` must lie in `[1, num_workers]`;
//! - `start_signal_id` must be non-empty (whitespace does not count);
//! - `worker_function` must be present.
//!
//! ## Example
//! ```rust
//! use slotvisor::BoundTaskSpec;
//!
//! let task = BoundTaskSpec::new(2, "rebuild-index")
//!     .with_worker_function(|binding| println!("index pinned to {}", binding.slot))
//!     .validate(4)
//!     .unwrap();
//! assert_eq!(task.preferred_slot().get(), 2);
//!
//! let err = BoundTaskSpec::new(2, "rebuild-index").validate(4).unwrap_err();
//! assert_eq!(err.field(), "worker_function");
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::slots::SlotId;

use super::task::{BoundTask, SlotBinding, WorkerFnRef};

/// Unvalidated bound task descriptor.
#[derive(Clone)]
pub struct BoundTaskSpec {
    /// Slot id the task is pinned to (1-based).
    pub preferred_slot_id: i64,
    /// Token sent to the worker to activate the task.
    pub start_signal_id: String,
    /// Invoked in the controller on every successful binding.
    pub worker_function: Option<WorkerFnRef>,
}

impl BoundTaskSpec {
    /// Creates a descriptor without a worker function.
    pub fn new(preferred_slot_id: i64, start_signal_id: impl Into<String>) -> Self {
        Self {
            preferred_slot_id,
            start_signal_id: start_signal_id.into(),
            worker_function: None,
        }
    }

    /// Sets the callback invoked on each binding.
    #[must_use]
    pub fn with_worker_function<F>(mut self, f: F) -> Self
    where
        F: Fn(&SlotBinding) + Send + Sync + 'static,
    {
        self.worker_function = Some(Arc::new(f));
        self
    }

    /// Checks the descriptor against a pool of `num_workers` slots.
    ///
    /// # Errors
    /// [`ConfigError::InvalidField`] naming `preferred_slot_id`, `start_signal_id`
    /// or `worker_function`, checked in that order.
    pub fn validate(&self, num_workers: usize) -> Result<BoundTask, ConfigError> {
        let preferred_slot = u32::try_from(self.preferred_slot_id)
            .ok()
            .filter(|id| usize::try_from(*id).is_ok_and(|id| id <= num_workers))
            .and_then(SlotId::new)
            .ok_or_else(|| {
                ConfigError::invalid(
                    "preferred_slot_id",
                    format!("{} is outside [1, {num_workers}]", self.preferred_slot_id),
                )
            })?;

        if self.start_signal_id.trim().is_empty() {
            return Err(ConfigError::invalid("start_signal_id", "must not be empty"));
        }

        let worker_function = self
            .worker_function
            .clone()
            .ok_or_else(|| ConfigError::invalid("worker_function", "must be provided"))?;

        Ok(BoundTask {
            preferred_slot,
            start_signal_id: Arc::from(self.start_signal_id.as_str()),
            worker_function,
            assigned: None,
        })
    }
}

impl fmt::Debug for BoundTaskSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTaskSpec")
            .field("preferred_slot_id", &self.preferred_slot_id)
            .field("start_signal_id", &self.start_signal_id)
            .field("worker_function", &self.worker_function.is_some())
            .finish()
    }
}

/// Validates every descriptor, failing on the first invalid one.
pub(crate) fn validate_all(
    specs: &[BoundTaskSpec],
    num_workers: usize,
) -> Result<Vec<BoundTask>, ConfigError> {
    specs.iter().map(|s| s.validate(num_workers)).collect()
}
