use crate::error::ConfigError;
use crate::slots::{InstanceId, SlotId};

/// Environment variable carrying the slot id of a spawned worker.
pub const SLOT_ID_ENV: &str = "SLOTVISOR_SLOT_ID";
/// Environment variable carrying the instance id of a spawned worker.
pub const INSTANCE_ID_ENV: &str = "SLOTVISOR_INSTANCE_ID";

/// Role of the current process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Owns the pool; never runs the worker body.
    Controller,
    /// Spawned pool member; runs the worker body only.
    Worker {
        /// Slot this process occupies.
        slot: SlotId,
        /// Identity of this process.
        instance: InstanceId,
    },
}

impl Mode {
    /// Detects the role from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidField`] if the worker variables are present but malformed.
    pub fn detect() -> Result<Self, ConfigError> {
        Self::from_vars(
            std::env::var(SLOT_ID_ENV).ok().as_deref(),
            std::env::var(INSTANCE_ID_ENV).ok().as_deref(),
        )
    }

    pub(crate) fn from_vars(slot: Option<&str>, instance: Option<&str>) -> Result<Self, ConfigError> {
        let Some(slot) = slot else {
            return Ok(Mode::Controller);
        };

        let slot = slot
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(SlotId::new)
            .ok_or_else(|| ConfigError::invalid(SLOT_ID_ENV, format!("expected a positive integer, got {slot:?}")))?;

        let instance = match instance {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| ConfigError::invalid(INSTANCE_ID_ENV, format!("expected an integer, got {raw:?}")))?,
            None => 0,
        };

        Ok(Mode::Worker {
            slot,
            instance: InstanceId(instance),
        })
    }

    /// True in the controller process.
    pub fn is_controller(&self) -> bool {
        matches!(self, Mode::Controller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_slot_means_controller() {
        assert_eq!(Mode::from_vars(None, None).unwrap(), Mode::Controller);
    }

    #[test]
    fn test_worker_vars_parsed() {
        let mode = Mode::from_vars(Some("3"), Some("17")).unwrap();
        assert_eq!(
            mode,
            Mode::Worker {
                slot: SlotId::new(3).unwrap(),
                instance: InstanceId(17)
            }
        );
        assert!(!mode.is_controller());
    }

    #[test]
    fn test_zero_slot_rejected() {
        let err = Mode::from_vars(Some("0"), None).unwrap_err();
        assert!(err.to_string().contains(SLOT_ID_ENV));
    }

    #[test]
    fn test_bad_instance_rejected() {
        assert!(Mode::from_vars(Some("1"), Some("x")).is_err());
    }
}
