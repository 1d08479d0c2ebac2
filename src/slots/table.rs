use std::collections::BTreeMap;

use super::{InstanceId, SlotHandle, SlotId, SlotState, WorkerSlot};

/// Controller-owned table of slots keyed by stable slot id.
///
/// Owned by the control loop and passed explicitly to the binder; nothing
/// reaches it as ambient state.
#[derive(Debug)]
pub struct SlotTable<S = WorkerSlot> {
    slots: BTreeMap<SlotId, S>,
}

impl<S> Default for SlotTable<S> {
    fn default() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }
}

impl<S> SlotTable<S> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the slot under `id`, returning the previous occupant.
    pub fn insert(&mut self, id: SlotId, slot: S) -> Option<S> {
        self.slots.insert(id, slot)
    }

    /// Looks up a slot.
    pub fn get(&self, id: SlotId) -> Option<&S> {
        self.slots.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: SlotId) -> Option<&mut S> {
        self.slots.get_mut(&id)
    }

    /// Iterates slots in slot-id order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &S)> {
        self.slots.iter().map(|(id, s)| (*id, s))
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the table has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<S: SlotHandle> SlotTable<S> {
    /// Returns the slot only if it is still occupied by `instance`.
    pub fn current(&self, id: SlotId, instance: InstanceId) -> Option<&S> {
        self.get(id).filter(|s| s.instance() == instance)
    }

    /// `(slot, instance, state)` rows in slot-id order.
    pub fn snapshot(&self) -> Vec<(SlotId, InstanceId, SlotState)> {
        self.iter()
            .map(|(id, s)| (id, s.instance(), s.state()))
            .collect()
    }
}
