//! Bound tasks: logical units of work pinned to a preferred slot id.
//!
//! A [`BoundTask`] is activated by sending its start signal to the process in
//! its preferred slot once that process is `Listening`. When the process dies
//! the task waits for the replacement in the same slot; it never moves to a
//! different slot id.

mod reconcile;
mod spec;
mod task;

pub(crate) use spec::validate_all;

pub use reconcile::{ReconcileReport, Reconciled, reconcile};
pub use spec::BoundTaskSpec;
pub use task::{BoundTask, SlotBinding, WorkerFnRef};
