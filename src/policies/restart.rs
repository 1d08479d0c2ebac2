//! # Which failure signal schedules a restart.
//!
//! A worker process can be observed failing in two ways:
//! - its control pipe closes (**disconnect**), usually the first sign;
//! - the operating system reports that it **exited**.
//!
//! ```text
//! RestartTrigger::Disconnect → restart on whichever comes first (default)
//! RestartTrigger::Exit       → restart only once the process has exited
//! ```
//!
//! In both cases a given process instance schedules at most one restart.

/// Failure signal that schedules a replacement process.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RestartTrigger {
    /// Restart on the first failure signal seen for an instance.
    #[default]
    Disconnect,
    /// Restart only after the process has exited.
    Exit,
}

impl RestartTrigger {
    /// Returns true if a failure observed as `disconnect` (or exit) should schedule a restart.
    pub(crate) fn fires_on(&self, disconnect: bool) -> bool {
        match self {
            RestartTrigger::Disconnect => true,
            RestartTrigger::Exit => !disconnect,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_trigger_fires_on_both() {
        assert!(RestartTrigger::Disconnect.fires_on(true));
        assert!(RestartTrigger::Disconnect.fires_on(false));
    }

    #[test]
    fn test_exit_trigger_ignores_disconnect() {
        assert!(!RestartTrigger::Exit.fires_on(true));
        assert!(RestartTrigger::Exit.fires_on(false));
    }
}
