//! # Worker slots.
//!
//! A slot is the stable addressing unit of the pool: slot ids `1..=N` never
//! change, while the processes occupying them come and go.
//!
//! - [`SlotId`] / [`InstanceId`] stable slot address / per-process identity
//! - [`SlotState`] `Starting | Listening | Disconnected | Dead`
//! - [`SlotHandle`] the binder's view of a slot (instance, state, send)
//! - [`WorkerSlot`] the real slot backed by a spawned process
//! - [`SlotTable`] controller-owned map of slot id → slot
//! - [`SlotEvent`] lifecycle notification fed to the control loop

mod event;
mod id;
mod slot;
mod state;
mod table;

pub use event::{ExitInfo, SlotEvent, SlotEventKind};
pub use id::{InstanceId, SlotId};
pub use slot::{SlotHandle, WorkerSlot};
pub use state::SlotState;
pub use table::SlotTable;
