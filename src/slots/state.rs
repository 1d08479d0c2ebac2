use std::fmt;

/// Observable lifecycle state of a slot's current process.
///
/// ```text
/// fork ──► Starting ──ready──► Listening
///             │                   │
///             └──────┬────────────┘
///                    ▼
///     Disconnected ──exit──► Dead ──backoff──► (new instance) Starting
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    /// Process forked, readiness not yet signalled.
    Starting,
    /// Process signalled readiness and accepts activation messages.
    Listening,
    /// Control pipe closed; the process is going away.
    Disconnected,
    /// Process exited (or could not be spawned).
    Dead,
}

impl SlotState {
    /// True for `Listening`.
    #[inline]
    pub fn is_listening(self) -> bool {
        matches!(self, SlotState::Listening)
    }

    /// True for `Disconnected` and `Dead`.
    #[inline]
    pub fn is_failed(self) -> bool {
        matches!(self, SlotState::Disconnected | SlotState::Dead)
    }

    /// Short stable label for logs.
    pub fn as_label(self) -> &'static str {
        match self {
            SlotState::Starting => "starting",
            SlotState::Listening => "listening",
            SlotState::Disconnected => "disconnected",
            SlotState::Dead => "dead",
        }
    }
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}
