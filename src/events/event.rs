//! # Runtime events emitted by the pool supervisor.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Process events**: spawn, readiness, disconnect, exit, payloads
//! - **Restart events**: scheduled/superseded restarts and backoff resets
//! - **Binding events**: bound task activations
//! - **Shutdown & subscriber events**: runtime termination and fan-out health
//!
//! The [`Event`] struct carries optional metadata (slot, instance, delay,
//! reason, address, start signal) filled in according to the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use slotvisor::{Event, EventKind, SlotId};
//!
//! let slot = SlotId::new(2).unwrap();
//! let ev = Event::new(EventKind::RestartScheduled)
//!     .with_slot(slot)
//!     .with_delay(Duration::from_millis(500))
//!     .with_reason("exit code 1");
//!
//! assert_eq!(ev.kind, EventKind::RestartScheduled);
//! assert_eq!(ev.slot, Some(slot));
//! assert_eq!(ev.delay_ms, Some(500));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::slots::{InstanceId, SlotId};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name>` and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: `subscriber=<name> reason=<full|closed>`
    SubscriberOverflow,

    // === Shutdown events ===
    /// Shutdown requested (OS signal or cancellation token).
    ShutdownRequested,

    /// All worker processes exited within the grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some processes did not exit in time.
    ///
    /// Sets:
    /// - `reason`: stuck slot ids
    GraceExceeded,

    // === Process events ===
    /// A process was spawned into a slot.
    ///
    /// Sets:
    /// - `slot`, `instance`
    WorkerSpawned,

    /// Spawning a process failed; treated as a process failure.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `reason`: OS error
    SpawnFailed,

    /// The process signalled readiness; the slot is `Listening`.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `address`: advertised address, if any
    WorkerListening,

    /// The control pipe closed.
    ///
    /// Sets:
    /// - `slot`, `instance`
    WorkerDisconnected,

    /// The process exited.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `reason`: exit code or signal
    WorkerExited,

    /// The process sent an application payload.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `reason`: payload rendered as JSON
    WorkerPayload,

    // === Restart events ===
    /// A replacement process was scheduled.
    ///
    /// Sets:
    /// - `slot`, `instance` (the instance being replaced)
    /// - `delay_ms`: backoff delay
    /// - `reason`: failure description
    RestartScheduled,

    /// A scheduled restart fired but the slot already holds a newer process.
    ///
    /// Sets:
    /// - `slot`, `instance` (the instance that was to be replaced)
    RestartSuperseded,

    /// The quiet period elapsed without failures; backoff returned to its initial delay.
    BackoffReset,

    // === Binding events ===
    /// A bound task was activated on a process.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `start_signal`
    TaskBound,

    /// A listening process refused a bound task's activation.
    ///
    /// Sets:
    /// - `slot`, `instance`
    /// - `start_signal`
    TaskActivationRejected,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Slot the event concerns.
    pub slot: Option<SlotId>,
    /// Process instance the event concerns.
    pub instance: Option<InstanceId>,
    /// Backoff delay in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Human-readable reason (errors, exit status, payloads).
    pub reason: Option<Arc<str>>,
    /// Address advertised by a listening worker.
    pub address: Option<Arc<str>>,
    /// Start signal of a bound task.
    pub start_signal: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            slot: None,
            instance: None,
            delay_ms: None,
            reason: None,
            address: None,
            start_signal: None,
        }
    }

    /// Attaches a slot id.
    #[inline]
    pub fn with_slot(mut self, slot: SlotId) -> Self {
        self.slot = Some(slot);
        self
    }

    /// Attaches a process instance.
    #[inline]
    pub fn with_instance(mut self, instance: InstanceId) -> Self {
        self.instance = Some(instance);
        self
    }

    /// Attaches both slot and instance.
    #[inline]
    pub fn for_process(self, slot: SlotId, instance: InstanceId) -> Self {
        self.with_slot(slot).with_instance(instance)
    }

    /// Attaches a backoff delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an advertised address.
    #[inline]
    pub fn with_address(mut self, address: impl Into<Arc<str>>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attaches a bound task's start signal.
    #[inline]
    pub fn with_start_signal(mut self, signal: impl Into<Arc<str>>) -> Self {
        self.start_signal = Some(signal.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} panic={info}"))
    }

    /// Backoff delay as a [`Duration`], if set.
    pub fn delay(&self) -> Option<Duration> {
        self.delay_ms.map(|ms| Duration::from_millis(u64::from(ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::BackoffReset);
        let b = Event::new(EventKind::BackoffReset);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_delay_saturates_at_u32() {
        let ev = Event::new(EventKind::RestartScheduled).with_delay(Duration::from_secs(u64::MAX));
        assert_eq!(ev.delay_ms, Some(u32::MAX));
        assert_eq!(ev.delay(), Some(Duration::from_millis(u64::from(u32::MAX))));
    }

    #[test]
    fn test_for_process_sets_both_ids() {
        let slot = SlotId::new(3).unwrap();
        let ev = Event::new(EventKind::WorkerSpawned).for_process(slot, InstanceId(9));
        assert_eq!(ev.slot, Some(slot));
        assert_eq!(ev.instance, Some(InstanceId(9)));
    }
}
