//! # Pool control loop.
//!
//! [`Pool`] owns everything mutable about a running pool: the slot table, the
//! bound tasks, the shared backoff strategy, the pending restarts and the
//! quiet-period timer. It is driven by a single task, so none of it is locked.
//!
//! ```text
//!            ┌──────────── select! ─────────────┐
//! SlotEvent ─┤ Listening   → mark, reconcile    │
//!            │ Disconnected/Exited → on_failure │──► strategy.next() ─► DelayQueue
//!            │ Payload     → publish            │                   └─► re-arm quiet timer
//! DelayQueue ┤ due restart → fork (or superseded)│
//! quiet      ┤ elapsed     → strategy.reset()   │
//! stop       ┤             → return             │
//!            └──────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - Events from an instance that no longer occupies its slot never change state.
//! - Each instance schedules at most one restart.
//! - A restart whose slot already holds a newer instance is a no-op.
//! - A failed spawn counts as a failure of the instance it was meant to start.
//! - There is at most one quiet-period timer; every failure re-arms it.

use std::pin::Pin;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Sleep};
use tokio_util::time::DelayQueue;

use crate::binder::{self, BoundTask, Reconciled};
use crate::events::{Bus, Event, EventKind};
use crate::policies::{BackoffStrategy, RestartTrigger};
use crate::process::Spawn;
use crate::slots::{
    InstanceId, SlotEvent, SlotEventKind, SlotHandle, SlotId, SlotState, SlotTable, WorkerSlot,
};

/// One row of [`SlotTable::snapshot`].
pub type SlotRow = (SlotId, InstanceId, SlotState);

/// Replacement waiting for its backoff delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PendingRestart {
    pub slot: SlotId,
    pub replaces: InstanceId,
}

/// Settings the control loop needs from [`Config`](crate::Config).
#[derive(Clone, Copy, Debug)]
pub(crate) struct PoolSettings {
    pub workers: usize,
    pub quiet_period: Duration,
    pub trigger: RestartTrigger,
}

enum Wake {
    Slot(SlotEvent),
    Restart(PendingRestart),
    Quiet,
}

pub(crate) struct Pool<P: Spawn> {
    settings: PoolSettings,
    table: SlotTable<WorkerSlot>,
    tasks: Vec<BoundTask>,
    backoff: Box<dyn BackoffStrategy>,
    spawner: P,
    bus: Bus,
    events_tx: mpsc::UnboundedSender<SlotEvent>,
    events_rx: mpsc::UnboundedReceiver<SlotEvent>,
    next_instance: u64,
    restarts: DelayQueue<PendingRestart>,
    quiet: Option<Pin<Box<Sleep>>>,
    quiet_armed: bool,
    stopping: bool,
    rows: watch::Sender<Vec<SlotRow>>,
}

impl<P: Spawn> Pool<P> {
    pub(crate) fn new(
        settings: PoolSettings,
        tasks: Vec<BoundTask>,
        backoff: Box<dyn BackoffStrategy>,
        spawner: P,
        bus: Bus,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (rows, _) = watch::channel(Vec::new());
        Self {
            settings,
            table: SlotTable::new(),
            tasks,
            backoff,
            spawner,
            bus,
            events_tx,
            events_rx,
            next_instance: 0,
            restarts: DelayQueue::new(),
            quiet: None,
            quiet_armed: false,
            stopping: false,
            rows,
        }
    }

    /// Receiver of the slot table as last published by the loop.
    pub(crate) fn rows(&self) -> watch::Receiver<Vec<SlotRow>> {
        self.rows.subscribe()
    }

    /// Creates every slot and spawns its first process.
    pub(crate) fn populate(&mut self) {
        for slot in SlotId::all(self.settings.workers) {
            self.fork(slot);
        }
        self.publish_rows();
    }

    /// Runs the control loop until `stop` completes; returns its output.
    ///
    /// Populates the pool first if that has not happened yet.
    pub(crate) async fn drive<F: Future>(&mut self, stop: F) -> F::Output {
        if self.table.is_empty() {
            self.populate();
        }
        tokio::pin!(stop);

        loop {
            let wake = tokio::select! {
                out = &mut stop => return out,
                Some(ev) = self.events_rx.recv() => Wake::Slot(ev),
                Some(due) = self.restarts.next(), if !self.restarts.is_empty() => {
                    Wake::Restart(due.into_inner())
                }
                () = quiet_timer(&mut self.quiet), if self.quiet_armed => Wake::Quiet,
            };

            match wake {
                Wake::Slot(ev) => self.on_slot_event(ev),
                Wake::Restart(due) => self.restart_due(due),
                Wake::Quiet => self.quiet_elapsed(),
            }
            self.publish_rows();
        }
    }

    /// Stops restarting and asks every process to exit.
    pub(crate) fn stop_all(&mut self) {
        self.stopping = true;
        self.restarts.clear();
        self.quiet_armed = false;
        for (_, slot) in self.table.iter() {
            slot.terminate();
        }
    }

    /// Processes slot events until every slot is `Dead` or `grace` runs out.
    ///
    /// Returns the slots still alive on timeout.
    pub(crate) async fn wait_stopped(&mut self, grace: Duration) -> Result<(), Vec<SlotId>> {
        let drained = tokio::time::timeout(grace, async {
            while !self.all_dead() {
                match self.events_rx.recv().await {
                    Some(ev) => self.on_slot_event(ev),
                    None => break,
                }
            }
        })
        .await;
        self.publish_rows();

        match drained {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(self
                .table
                .iter()
                .filter(|(_, s)| s.state() != SlotState::Dead)
                .map(|(id, _)| id)
                .collect()),
        }
    }

    fn all_dead(&self) -> bool {
        self.table.iter().all(|(_, s)| s.state() == SlotState::Dead)
    }

    fn fork(&mut self, slot: SlotId) {
        self.next_instance += 1;
        let instance = InstanceId(self.next_instance);

        match self.spawner.spawn(slot, instance, self.events_tx.clone()) {
            Ok(link) => {
                self.table
                    .insert(slot, WorkerSlot::starting(slot, instance, link));
                self.publish(Event::new(EventKind::WorkerSpawned).for_process(slot, instance));
            }
            Err(err) => {
                tracing::warn!(%slot, %instance, error = %err, "failed to spawn worker");
                self.table.insert(slot, WorkerSlot::stillborn(slot, instance));
                self.publish(
                    Event::new(EventKind::SpawnFailed)
                        .for_process(slot, instance)
                        .with_reason(err.to_string()),
                );
                self.on_failure(slot, instance, false, format!("spawn failed: {err}"));
            }
        }
    }

    fn on_slot_event(&mut self, ev: SlotEvent) {
        let SlotEvent {
            slot,
            instance,
            kind,
        } = ev;

        let current = self
            .table
            .get(slot)
            .is_some_and(|s| s.instance() == instance);
        if !current {
            tracing::debug!(%slot, %instance, "ignoring event from replaced instance");
            if let SlotEventKind::Exited(info) = kind {
                self.publish(
                    Event::new(EventKind::WorkerExited)
                        .for_process(slot, instance)
                        .with_reason(info.describe()),
                );
            }
            return;
        }

        match kind {
            SlotEventKind::Listening { address } => {
                if !self.transition(slot, SlotState::Listening) {
                    return;
                }
                let mut ev = Event::new(EventKind::WorkerListening).for_process(slot, instance);
                if let Some(addr) = address {
                    ev = ev.with_address(addr);
                }
                self.publish(ev);
                if !self.stopping {
                    self.reconcile();
                }
            }
            SlotEventKind::Payload { data } => {
                self.publish(
                    Event::new(EventKind::WorkerPayload)
                        .for_process(slot, instance)
                        .with_reason(data.to_string()),
                );
            }
            SlotEventKind::Disconnected => {
                if !self.transition(slot, SlotState::Disconnected) {
                    return;
                }
                self.publish(Event::new(EventKind::WorkerDisconnected).for_process(slot, instance));
                self.on_failure(slot, instance, true, "disconnected".to_string());
            }
            SlotEventKind::Exited(info) => {
                self.transition(slot, SlotState::Dead);
                let reason = info.describe();
                self.publish(
                    Event::new(EventKind::WorkerExited)
                        .for_process(slot, instance)
                        .with_reason(reason.clone()),
                );
                self.on_failure(slot, instance, false, reason);
            }
        }
    }

    /// Moves the current occupant of `slot` to `next`; failed states are final.
    fn transition(&mut self, slot: SlotId, next: SlotState) -> bool {
        let Some(ws) = self.table.get_mut(slot) else {
            return false;
        };
        let allowed = match ws.state() {
            SlotState::Dead => false,
            SlotState::Disconnected => next == SlotState::Dead,
            SlotState::Starting | SlotState::Listening => true,
        };
        if allowed {
            ws.set_state(next);
        }
        allowed
    }

    fn on_failure(&mut self, slot: SlotId, instance: InstanceId, disconnect: bool, reason: String) {
        if self.stopping || !self.settings.trigger.fires_on(disconnect) {
            return;
        }
        let Some(ws) = self
            .table
            .get_mut(slot)
            .filter(|s| s.instance() == instance && !s.restart_pending())
        else {
            return;
        };
        ws.mark_restart_pending();

        let delay = self.backoff.next();
        self.restarts.insert(
            PendingRestart {
                slot,
                replaces: instance,
            },
            delay,
        );
        self.arm_quiet();

        tracing::debug!(%slot, %instance, ?delay, "restart scheduled");
        self.publish(
            Event::new(EventKind::RestartScheduled)
                .for_process(slot, instance)
                .with_delay(delay)
                .with_reason(reason),
        );
    }

    fn arm_quiet(&mut self) {
        let deadline = Instant::now() + self.settings.quiet_period;
        if let Some(sleep) = self.quiet.as_mut() {
            sleep.as_mut().reset(deadline);
        } else {
            self.quiet = Some(Box::pin(tokio::time::sleep_until(deadline)));
        }
        self.quiet_armed = true;
    }

    fn restart_due(&mut self, due: PendingRestart) {
        if self.stopping {
            return;
        }
        let superseded = self
            .table
            .get(due.slot)
            .is_some_and(|s| s.instance() != due.replaces);
        if superseded {
            self.publish(
                Event::new(EventKind::RestartSuperseded).for_process(due.slot, due.replaces),
            );
            return;
        }
        self.fork(due.slot);
    }

    fn quiet_elapsed(&mut self) {
        self.quiet_armed = false;
        self.backoff.reset();
        tracing::debug!("quiet period elapsed; backoff reset");
        self.publish(Event::new(EventKind::BackoffReset));
    }

    fn reconcile(&mut self) {
        let report = binder::reconcile(&mut self.tasks, &self.table);
        for (task, outcome) in self.tasks.iter().zip(&report.outcomes) {
            let ev = match *outcome {
                Reconciled::Bound(b) => Event::new(EventKind::TaskBound).for_process(b.slot, b.instance),
                Reconciled::Rejected(slot) => {
                    let mut ev = Event::new(EventKind::TaskActivationRejected).with_slot(slot);
                    if let Some(s) = self.table.get(slot) {
                        ev = ev.with_instance(s.instance());
                    }
                    ev
                }
                Reconciled::Kept(_) | Reconciled::Pending(_) => continue,
            };
            self.bus.publish(ev.with_start_signal(task.start_signal_id()));
        }
    }

    fn publish(&self, ev: Event) {
        self.bus.publish(ev);
    }

    fn publish_rows(&self) {
        self.rows.send_replace(self.table.snapshot());
    }
}

async fn quiet_timer(quiet: &mut Option<Pin<Box<Sleep>>>) {
    match quiet {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
