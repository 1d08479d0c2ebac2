//! # Supervisor: runs the pool, fans out events, and shuts down gracefully.
//!
//! The [`Supervisor`] owns the event bus, the subscriber list and the pool
//! control loop. It is created by [`SupervisorBuilder`](crate::SupervisorBuilder)
//! after configuration has been validated.
//!
//! ## High-level architecture
//! ```text
//! run():
//!   subscriber_listener(): Bus.subscribe() ─► SubscriberSet::emit(Event)
//!   Pool::drive(stop):
//!       populate (one process per slot)
//!       loop { slot events | due restarts | quiet timer }
//!
//! Shutdown path (OS signal or cancellation token):
//!   Bus.publish(ShutdownRequested)
//!   Pool::stop_all()              → Shutdown message + stop token per process
//!   Pool::wait_stopped(cfg.grace)
//!       ├─ all Dead       → Bus.publish(AllStoppedWithin)
//!       └─ timeout        → Bus.publish(GraceExceeded), RuntimeError::GraceExceeded
//!   listener drains the bus, subscriber queues are flushed
//! ```

use std::sync::{Arc, Mutex};

use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::core::{
    builder::SupervisorBuilder,
    config::Config,
    pool::{Pool, SlotRow},
    shutdown,
};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::process::{ProcessSpawner, Spawn};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Runs a pool of worker processes until shutdown.
pub struct Supervisor<P: Spawn = ProcessSpawner> {
    cfg: Config,
    bus: Bus,
    subscribers: Vec<Arc<dyn Subscribe>>,
    pool: Mutex<Option<Pool<P>>>,
    rows: watch::Receiver<Vec<SlotRow>>,
    token: CancellationToken,
    handle_signals: bool,
}

impl Supervisor {
    /// Starts building a supervisor.
    pub fn builder(cfg: Config) -> SupervisorBuilder {
        SupervisorBuilder::new(cfg)
    }
}

impl<P: Spawn> Supervisor<P> {
    pub(crate) fn new_internal(
        cfg: Config,
        bus: Bus,
        subscribers: Vec<Arc<dyn Subscribe>>,
        pool: Pool<P>,
        token: CancellationToken,
        handle_signals: bool,
    ) -> Self {
        let rows = pool.rows();
        Self {
            cfg,
            bus,
            subscribers,
            pool: Mutex::new(Some(pool)),
            rows,
            token,
            handle_signals,
        }
    }

    /// The event bus; subscribe here for raw events.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Token that stops the pool when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Requests shutdown; `run` returns once workers have stopped.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Current `(slot, instance, state)` rows in slot order.
    pub fn snapshot(&self) -> Vec<SlotRow> {
        self.rows.borrow().clone()
    }

    /// Populates the pool and supervises it until a shutdown signal or cancellation.
    ///
    /// # Errors
    /// - [`RuntimeError::AlreadyRunning`] if called twice;
    /// - [`RuntimeError::Signal`] if signal handlers cannot be installed
    ///   (workers are still stopped first);
    /// - [`RuntimeError::GraceExceeded`] if processes outlive [`Config::grace`].
    pub async fn run(&self) -> Result<(), RuntimeError> {
        let mut pool = self
            .pool
            .lock()
            .ok()
            .and_then(|mut guard| guard.take())
            .ok_or(RuntimeError::AlreadyRunning)?;

        let listener_done = CancellationToken::new();
        let listener = self.subscriber_listener(listener_done.clone());

        let stopped = pool
            .drive(stop_requested(self.token.clone(), self.handle_signals))
            .await;
        if let Err(err) = &stopped {
            tracing::error!(error = %err, "stopping pool");
        }
        self.bus.publish(Event::new(EventKind::ShutdownRequested));

        pool.stop_all();
        let res = self.wait_all_with_grace(&mut pool).await;

        listener_done.cancel();
        let _ = listener.await;
        stopped.and(res)
    }

    async fn wait_all_with_grace(&self, pool: &mut Pool<P>) -> Result<(), RuntimeError> {
        let Some(grace) = self.cfg.grace_period() else {
            return Ok(());
        };
        match pool.wait_stopped(grace).await {
            Ok(()) => {
                self.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(stuck) => {
                let listed: Vec<String> = stuck.iter().map(ToString::to_string).collect();
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(listed.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Forwards bus events to the subscriber set until `done`, then flushes it.
    fn subscriber_listener(&self, done: CancellationToken) -> tokio::task::JoinHandle<()> {
        let mut rx = self.bus.subscribe();
        let set = SubscriberSet::new(self.subscribers.clone(), self.bus.clone());
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    ev = rx.recv() => match ev {
                        Ok(ev) => set.emit(ev),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(skipped = n, "subscriber listener lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                    () = done.cancelled() => break,
                }
            }
            set.shutdown().await;
        })
    }
}

async fn stop_requested(token: CancellationToken, signals: bool) -> Result<(), RuntimeError> {
    if !signals {
        token.cancelled().await;
        return Ok(());
    }
    tokio::select! {
        () = token.cancelled() => Ok(()),
        res = shutdown::wait_for_shutdown_signal() => res.map_err(RuntimeError::Signal),
    }
}
