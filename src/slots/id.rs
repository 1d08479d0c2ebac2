use std::fmt;
use std::num::NonZeroU32;

/// Stable identifier of one pool member, `1..=N`.
///
/// A slot id outlives the processes that occupy it: when a worker dies, its
/// replacement is forked under the same id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(NonZeroU32);

impl SlotId {
    /// Returns `None` for zero.
    pub fn new(id: u32) -> Option<Self> {
        NonZeroU32::new(id).map(Self)
    }

    /// Returns the numeric id.
    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Iterates `1..=count`.
    pub fn all(count: usize) -> impl Iterator<Item = SlotId> {
        let count = u32::try_from(count).unwrap_or(u32::MAX);
        (1..=count).filter_map(SlotId::new)
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one spawned process.
///
/// Allocated from a pool-wide counter and never reused, so a cached
/// `(SlotId, InstanceId)` pair goes stale the moment its slot is refilled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub(crate) u64);

impl InstanceId {
    /// Returns the numeric id.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
