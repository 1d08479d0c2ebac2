//! Control-pipe protocol between the controller and its workers.
//!
//! Messages are JSON-serialized and newline-delimited. The controller writes
//! [`ControllerMessage`]s to the worker's stdin; the worker writes
//! [`WorkerMessage`]s to its stdout.

use serde::{Deserialize, Serialize};

/// Controller → worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerMessage {
    /// Start the bound task identified by `start_signal_id` in this worker.
    Activate {
        /// Deduplication key of the bound task.
        start_signal_id: String,
    },
    /// Application-defined payload.
    Payload {
        /// Arbitrary JSON data.
        data: serde_json::Value,
    },
    /// The controller is shutting down; exit promptly.
    Shutdown,
}

/// Worker → controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// Readiness signal: the worker accepts activation messages from now on.
    Listening {
        /// Address the worker bound to, for observability only.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
    /// Application-defined payload.
    Payload {
        /// Arbitrary JSON data.
        data: serde_json::Value,
    },
}

impl ControllerMessage {
    /// Activation message for a bound task.
    pub fn activate(start_signal_id: impl Into<String>) -> Self {
        Self::Activate {
            start_signal_id: start_signal_id.into(),
        }
    }

    /// Serializes to a JSON line (with trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        to_line(self)
    }

    /// Parses one JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

impl WorkerMessage {
    /// Serializes to a JSON line (with trailing newline).
    pub fn to_line(&self) -> Result<String, serde_json::Error> {
        to_line(self)
    }

    /// Parses one JSON line.
    pub fn from_line(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line.trim())
    }
}

fn to_line<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut json = serde_json::to_string(msg)?;
    json.push('\n');
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_wire_format() {
        let line = ControllerMessage::activate("sync-feeds").to_line().unwrap();
        assert_eq!(line, "{\"type\":\"activate\",\"start_signal_id\":\"sync-feeds\"}\n");
    }

    #[test]
    fn test_listening_without_address() {
        let msg = WorkerMessage::from_line("{\"type\":\"listening\"}").unwrap();
        assert_eq!(msg, WorkerMessage::Listening { address: None });
    }

    #[test]
    fn test_listening_with_address_and_trailing_whitespace() {
        let msg = WorkerMessage::from_line("{\"type\":\"listening\",\"address\":\"127.0.0.1:8080\"}\r\n").unwrap();
        assert_eq!(
            msg,
            WorkerMessage::Listening {
                address: Some("127.0.0.1:8080".into())
            }
        );
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(ControllerMessage::from_line("{\"type\":\"reboot\"}").is_err());
        assert!(WorkerMessage::from_line("not json").is_err());
    }
}
