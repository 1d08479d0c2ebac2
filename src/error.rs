//! Error types used by the slotvisor runtime and workers.
//!
//! - [`ConfigError`] invalid setup; returned synchronously before any process is spawned.
//! - [`RuntimeError`] failures of the controller's own run loop.
//! - [`WorkerError`] failures inside a worker process.
//! - [`ClusterError`] any of the above, as returned by [`SupervisorBuilder::start`](crate::SupervisorBuilder::start).
//!
//! Worker crashes, disconnects and rejected sends are **not** errors: the pool
//! retries them under backoff and reports them as [`Event`](crate::Event)s.
//!
//! Every enum provides `as_label` (stable snake_case) for logs and metrics.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::slots::SlotId;

/// # Invalid configuration.
///
/// Programmer errors: never retried.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A configuration field has an unusable value.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Name of the offending field.
    ///
    /// # Example
    /// ```
    /// use slotvisor::BoundTaskSpec;
    ///
    /// let err = BoundTaskSpec::new(0, "sync").validate(4).unwrap_err();
    /// assert_eq!(err.field(), "preferred_slot_id");
    /// ```
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::InvalidField { field, .. } => field,
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::InvalidField { .. } => "config_invalid_field",
        }
    }
}

/// # Errors produced by the controller run loop.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some workers were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck slots: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Slots whose process had not exited.
        stuck: Vec<SlotId>,
    },

    /// The controller could not determine which program to spawn.
    #[error("cannot resolve worker executable: {0}")]
    Executable(#[source] io::Error),

    /// `run` was called on a supervisor that already ran.
    #[error("supervisor is already running")]
    AlreadyRunning,

    /// Registering OS signal handlers failed.
    #[error("cannot listen for shutdown signals: {0}")]
    Signal(#[source] io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Executable(_) => "runtime_executable",
            RuntimeError::AlreadyRunning => "runtime_already_running",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

/// # Errors produced inside a worker process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The control pipe to the controller is gone.
    #[error("controller disconnected")]
    Disconnected,

    /// I/O failure in the worker.
    #[error("io: {0}")]
    Io(#[from] io::Error),

    /// A message could not be encoded or decoded.
    #[error("protocol: {0}")]
    Protocol(#[from] serde_json::Error),

    /// The worker body failed.
    #[error("worker failed: {reason}")]
    Body {
        /// The underlying error message.
        reason: String,
    },
}

impl WorkerError {
    /// Wraps an application failure.
    pub fn body(reason: impl Into<String>) -> Self {
        WorkerError::Body {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            WorkerError::Disconnected => "worker_disconnected",
            WorkerError::Io(_) => "worker_io",
            WorkerError::Protocol(_) => "worker_protocol",
            WorkerError::Body { .. } => "worker_body",
        }
    }
}

/// Any error returned from [`SupervisorBuilder::start`](crate::SupervisorBuilder::start).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ClusterError {
    /// Invalid configuration (controller only).
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Controller run loop failure.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// Worker body failure (worker only).
    #[error(transparent)]
    Worker(#[from] WorkerError),
}

impl ClusterError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ClusterError::Config(e) => e.as_label(),
            ClusterError::Runtime(e) => e.as_label(),
            ClusterError::Worker(e) => e.as_label(),
        }
    }
}
