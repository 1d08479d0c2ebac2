//! Worker processes: spawning, monitoring, and the control-pipe protocol.
//!
//! - [`Spawn`] seam used by the pool to create processes
//! - [`ProcessSpawner`] re-executes the current binary in worker mode
//! - [`WorkerLink`] controller-side send/terminate handle
//! - [`ControllerMessage`] / [`WorkerMessage`] newline-delimited JSON protocol

mod link;
mod monitor;
mod protocol;
mod spawn;

pub(crate) use monitor::write_loop;
pub use link::WorkerLink;
pub use protocol::{ControllerMessage, WorkerMessage};
pub use spawn::{ProcessSpawner, Spawn};
