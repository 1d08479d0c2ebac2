//! # LogWriter: events rendered through `tracing`
//!
//! A subscriber that turns every [`Event`] into one `tracing` record under the
//! `slotvisor` target. Failures log at `warn`, everything else at `info` or `debug`.
//!
//! ## Example output (fmt layer)
//! ```text
//! INFO slotvisor: worker spawned slot=1 instance=1
//! INFO slotvisor: worker listening slot=1 instance=1 address="127.0.0.1:40113"
//! INFO slotvisor: task bound slot=1 instance=1 start_signal="sync"
//! WARN slotvisor: worker exited slot=1 instance=1 reason="code 1"
//! WARN slotvisor: restart scheduled slot=1 instance=1 delay_ms=500
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};

use super::Subscribe;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        // `Option` fields are recorded only when present.
        let slot = e.slot.map(|s| s.get());
        let instance = e.instance.map(|i| i.get());
        let reason = e.reason.as_deref();

        match e.kind {
            EventKind::WorkerSpawned => {
                tracing::info!(target: "slotvisor", slot, instance, "worker spawned");
            }
            EventKind::SpawnFailed => {
                tracing::warn!(target: "slotvisor", slot, instance, reason, "spawn failed");
            }
            EventKind::WorkerListening => {
                let address = e.address.as_deref();
                tracing::info!(target: "slotvisor", slot, instance, address, "worker listening");
            }
            EventKind::WorkerDisconnected => {
                tracing::warn!(target: "slotvisor", slot, instance, "worker disconnected");
            }
            EventKind::WorkerExited => {
                tracing::warn!(target: "slotvisor", slot, instance, reason, "worker exited");
            }
            EventKind::WorkerPayload => {
                tracing::debug!(target: "slotvisor", slot, instance, reason, "worker payload");
            }
            EventKind::RestartScheduled => {
                tracing::warn!(target: "slotvisor", slot, instance, delay_ms = e.delay_ms, reason, "restart scheduled");
            }
            EventKind::RestartSuperseded => {
                tracing::debug!(target: "slotvisor", slot, instance, "restart superseded");
            }
            EventKind::BackoffReset => {
                tracing::info!(target: "slotvisor", "backoff reset after quiet period");
            }
            EventKind::TaskBound => {
                let start_signal = e.start_signal.as_deref();
                tracing::info!(target: "slotvisor", slot, instance, start_signal, "task bound");
            }
            EventKind::TaskActivationRejected => {
                let start_signal = e.start_signal.as_deref();
                tracing::warn!(target: "slotvisor", slot, instance, start_signal, "task activation rejected");
            }
            EventKind::ShutdownRequested => {
                tracing::info!(target: "slotvisor", "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(target: "slotvisor", "all workers stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::warn!(target: "slotvisor", reason, "grace exceeded");
            }
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "slotvisor", kind = ?e.kind, reason, "subscriber issue");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
