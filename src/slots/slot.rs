use crate::process::{ControllerMessage, WorkerLink};

use super::{InstanceId, SlotId, SlotState};

/// What the binder needs to know about a slot.
///
/// Implemented by [`WorkerSlot`] for real processes; tests plug in synthetic
/// slots to drive reconciliation without spawning anything.
pub trait SlotHandle {
    /// The process instance currently occupying the slot.
    fn instance(&self) -> InstanceId;

    /// Current lifecycle state.
    fn state(&self) -> SlotState;

    /// Best-effort delivery; returns whether the message was accepted for delivery.
    fn send(&self, message: ControllerMessage) -> bool;
}

/// The supervisor's view of one worker process.
#[derive(Debug)]
pub struct WorkerSlot {
    id: SlotId,
    instance: InstanceId,
    state: SlotState,
    link: Option<WorkerLink>,
    restart_pending: bool,
}

impl WorkerSlot {
    /// A freshly forked process in `Starting`.
    pub(crate) fn starting(id: SlotId, instance: InstanceId, link: WorkerLink) -> Self {
        Self {
            id,
            instance,
            state: SlotState::Starting,
            link: Some(link),
            restart_pending: false,
        }
    }

    /// An instance whose spawn failed; it is `Dead` from the start.
    pub(crate) fn stillborn(id: SlotId, instance: InstanceId) -> Self {
        Self {
            id,
            instance,
            state: SlotState::Dead,
            link: None,
            restart_pending: false,
        }
    }

    /// Slot id.
    pub fn id(&self) -> SlotId {
        self.id
    }

    pub(crate) fn set_state(&mut self, state: SlotState) {
        self.state = state;
    }

    /// True once a replacement has been scheduled for this instance.
    pub(crate) fn restart_pending(&self) -> bool {
        self.restart_pending
    }

    pub(crate) fn mark_restart_pending(&mut self) {
        self.restart_pending = true;
    }

    /// Asks the process to stop; see [`WorkerLink::terminate`].
    pub(crate) fn terminate(&self) {
        if let Some(link) = &self.link {
            link.terminate();
        }
    }
}

impl SlotHandle for WorkerSlot {
    fn instance(&self) -> InstanceId {
        self.instance
    }

    fn state(&self) -> SlotState {
        self.state
    }

    fn send(&self, message: ControllerMessage) -> bool {
        match &self.link {
            Some(link) if !self.state.is_failed() => link.send(message),
            _ => false,
        }
    }
}
