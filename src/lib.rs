//! # slotvisor
//!
//! **Slotvisor** supervises a fixed-size pool of identical worker processes on
//! one host. It launches them, restarts them under a pool-wide exponential
//! backoff when they fail, and pins "bound tasks" to preferred slots,
//! re-activating a task on its slot's replacement process once that process is
//! ready.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  controller process                                    worker processes
//! ┌──────────────────────────────────────────────┐
//! │ Supervisor                                   │      ┌──────────────────┐
//! │  ┌────────────── Pool (one task) ─────────┐  │ fork │ slot 1  #1       │
//! │  │ SlotTable   1..=N ─────────────────────┼──┼─────►│ body(WorkerHandle)│
//! │  │ BackoffStrategy (shared by all slots)  │  │      └──────────────────┘
//! │  │ DelayQueue<PendingRestart>             │  │ stdin: ControllerMessage
//! │  │ quiet-period timer                     │◄─┼───── stdout: WorkerMessage
//! │  │ Vec<BoundTask> ── reconcile() ─────────┼──┼────► Activate{start_signal_id}
//! │  └───────────────┬────────────────────────┘  │
//! │                  ▼ publish(Event)            │
//! │  Bus ──► subscriber_listener ──► SubscriberSet ──► LogWriter / custom
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ### Lifecycle
//! ```text
//! slot:  Starting ──ready──► Listening ──pipe closed──► Disconnected ──exit──► Dead
//!            └─────────────────────exit──────────────────────────────────────┘
//!
//! failure ─► delay = strategy.next() ─► restart same slot id after delay (new instance)
//!         └► re-arm quiet timer ─► (no failure for quiet_period) ─► strategy.reset()
//!
//! Listening ─► reconcile all bound tasks ─► Activate sent once per binding
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / traits                          |
//! |-------------------|---------------------------------------------------------------|---------------------------------------------|
//! | **Supervision**   | Fork, monitor and restart worker processes.                   | [`Supervisor`], [`SupervisorBuilder`]       |
//! | **Policies**      | Pool-wide restart backoff and restart trigger.                | [`BackoffStrategy`], [`ExponentialBackoff`] |
//! | **Bound tasks**   | Sticky task-to-slot binding with failover.                    | [`BoundTaskSpec`], [`reconcile`]            |
//! | **Workers**       | Worker-side handle and control-pipe protocol.                 | [`WorkerHandle`], [`ControllerMessage`]     |
//! | **Subscriber API**| Observe pool events (logging, metrics, custom subscribers).   | [`Subscribe`], [`Event`]                    |
//! | **Errors**        | Typed setup, runtime and worker errors.                       | [`ConfigError`], [`RuntimeError`]           |
//! | **Configuration** | Pool size, quiet period, grace, env overrides.                | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging` (default): exports [`LogWriter`], which renders events through `tracing`.
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use slotvisor::{Config, Supervisor, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     #[cfg(feature = "logging")]
//!     let subs: Vec<Arc<dyn slotvisor::Subscribe>> = vec![Arc::new(slotvisor::LogWriter::new())];
//!     #[cfg(not(feature = "logging"))]
//!     let subs: Vec<Arc<dyn slotvisor::Subscribe>> = Vec::new();
//!
//!     Supervisor::builder(Config::default().with_env_overrides())
//!         .with_subscribers(subs)
//!         .start(|mut worker| async move {
//!             worker.ready(None)?;
//!             while let Some(msg) = worker.recv().await {
//!                 eprintln!("worker {} received {msg:?}", worker.slot_id());
//!             }
//!             Ok::<_, WorkerError>(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```
mod binder;
mod core;
mod error;
mod events;
mod policies;
mod process;
mod slots;
mod subscribers;
mod worker;

// ---- Public re-exports ----

pub use binder::{
    BoundTask, BoundTaskSpec, ReconcileReport, Reconciled, SlotBinding, WorkerFnRef, reconcile,
};
pub use core::{
    Config, GRACE_ENV, NUM_WORKERS_ENV, QUIET_PERIOD_ENV, SlotRow, Supervisor, SupervisorBuilder,
};
pub use error::{ClusterError, ConfigError, RuntimeError, WorkerError};
pub use events::{Bus, Event, EventKind};
pub use policies::{BackoffStrategy, ExponentialBackoff, JitterPolicy, RestartTrigger};
pub use process::{ControllerMessage, ProcessSpawner, Spawn, WorkerLink, WorkerMessage};
pub use slots::{
    ExitInfo, InstanceId, SlotEvent, SlotEventKind, SlotHandle, SlotId, SlotState, SlotTable,
    WorkerSlot,
};
pub use subscribers::{Subscribe, SubscriberSet};
pub use worker::{INSTANCE_ID_ENV, Mode, SLOT_ID_ENV, WorkerHandle};

// Optional: a built-in subscriber that renders events through `tracing`.
// Enable with: `--features logging` (on by default)
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
