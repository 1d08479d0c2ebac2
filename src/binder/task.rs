use std::fmt;
use std::sync::Arc;

use crate::slots::{InstanceId, SlotId};

/// Callback invoked in the controller each time a bound task is (re)bound.
pub type WorkerFnRef = Arc<dyn Fn(&SlotBinding) + Send + Sync + 'static>;

/// Which process a bound task believes it is running on.
///
/// A cache, not a guarantee: it is trusted only while the slot still holds
/// the same instance and that instance is `Listening`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotBinding {
    /// Slot the task was activated on.
    pub slot: SlotId,
    /// Process instance that accepted the activation.
    pub instance: InstanceId,
}

/// A validated bound task, owned by the controller for its whole lifetime.
pub struct BoundTask {
    pub(crate) preferred_slot: SlotId,
    pub(crate) start_signal_id: Arc<str>,
    pub(crate) worker_function: WorkerFnRef,
    pub(crate) assigned: Option<SlotBinding>,
}

impl BoundTask {
    /// Slot id this task is pinned to.
    pub fn preferred_slot(&self) -> SlotId {
        self.preferred_slot
    }

    /// Start signal sent with the activation message.
    pub fn start_signal_id(&self) -> &str {
        &self.start_signal_id
    }

    /// Current (possibly stale) binding.
    pub fn assigned(&self) -> Option<SlotBinding> {
        self.assigned
    }
}

impl fmt::Debug for BoundTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundTask")
            .field("preferred_slot", &self.preferred_slot)
            .field("start_signal_id", &self.start_signal_id)
            .field("assigned", &self.assigned)
            .finish_non_exhaustive()
    }
}
