use super::{InstanceId, SlotId};

/// Lifecycle notification about one process instance.
///
/// Produced by process monitors, consumed by the single dispatch point of the
/// pool's control loop.
#[derive(Debug, Clone, PartialEq)]
pub struct SlotEvent {
    /// Slot the instance occupies.
    pub slot: SlotId,
    /// Process instance the event is about.
    pub instance: InstanceId,
    /// What happened.
    pub kind: SlotEventKind,
}

/// What happened to a process instance.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEventKind {
    /// Readiness signal received.
    Listening {
        /// Address reported by the worker, if any.
        address: Option<String>,
    },
    /// Application payload received from the worker.
    Payload {
        /// Arbitrary JSON data.
        data: serde_json::Value,
    },
    /// Control pipe closed.
    Disconnected,
    /// Process exited.
    Exited(ExitInfo),
}

/// How a process ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if any (unix).
    pub signal: Option<i32>,
}

impl ExitInfo {
    /// Human-readable reason, e.g. `code 1`, `signal 9`.
    pub fn describe(&self) -> String {
        match (self.code, self.signal) {
            (Some(code), _) => format!("code {code}"),
            (None, Some(sig)) => format!("signal {sig}"),
            (None, None) => "no code/signal".to_string(),
        }
    }
}

impl From<std::process::ExitStatus> for ExitInfo {
    fn from(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl SlotEvent {
    pub(crate) fn new(slot: SlotId, instance: InstanceId, kind: SlotEventKind) -> Self {
        Self {
            slot,
            instance,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_prefers_code() {
        let info = ExitInfo {
            code: Some(3),
            signal: None,
        };
        assert_eq!(info.describe(), "code 3");
        assert_eq!(ExitInfo::default().describe(), "no code/signal");
        let killed = ExitInfo {
            code: None,
            signal: Some(9),
        };
        assert_eq!(killed.describe(), "signal 9");
    }
}
