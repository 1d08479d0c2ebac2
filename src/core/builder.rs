//! # Supervisor builder and process entry point.
//!
//! [`SupervisorBuilder`] collects the optional setup inputs (subscribers,
//! backoff strategy, bound tasks, cancellation) and either builds a
//! [`Supervisor`] or, via [`SupervisorBuilder::start`], acts as the single
//! entry point shared by the controller and its workers:
//!
//! ```text
//! start(body)
//!   ├─ Mode::Worker     → body(WorkerHandle) once, nothing else
//!   └─ Mode::Controller → validate ─► build ─► Supervisor::run()   (body never called)
//! ```
//!
//! Validation happens before anything is spawned; an invalid bound task is a
//! [`ConfigError`] naming the offending field.
//!
//! ## Example
//! ```no_run
//! use slotvisor::{BoundTaskSpec, Config, Supervisor, WorkerError};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cfg = Config { num_workers: Some(4), ..Config::default() }.with_env_overrides();
//!
//!     Supervisor::builder(cfg)
//!         .with_bound_tasks(vec![
//!             BoundTaskSpec::new(1, "reindex").with_worker_function(|b| {
//!                 println!("reindex runs on slot {} ({})", b.slot, b.instance);
//!             }),
//!         ])
//!         .start(|mut worker| async move {
//!             worker.ready(None)?;
//!             while let Some(msg) = worker.recv().await {
//!                 println!("slot {} got {msg:?}", worker.slot_id());
//!             }
//!             Ok::<_, WorkerError>(())
//!         })
//!         .await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::binder::{self, BoundTaskSpec};
use crate::error::{ClusterError, ConfigError, RuntimeError, WorkerError};
use crate::events::Bus;
use crate::policies::{BackoffStrategy, resolve_strategy};
use crate::process::{ProcessSpawner, Spawn};
use crate::subscribers::Subscribe;
use crate::worker::{self, Mode, WorkerHandle};

use super::{
    config::Config,
    pool::{Pool, PoolSettings},
    supervisor::Supervisor,
};

/// Builder for constructing a [`Supervisor`].
pub struct SupervisorBuilder {
    cfg: Config,
    subscribers: Vec<Arc<dyn Subscribe>>,
    backoff: Option<Box<dyn BackoffStrategy>>,
    bound_tasks: Vec<BoundTaskSpec>,
    token: Option<CancellationToken>,
    handle_signals: bool,
}

impl SupervisorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            backoff: None,
            bound_tasks: Vec::new(),
            token: None,
            handle_signals: true,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive pool events through dedicated workers with bounded queues.
    #[must_use]
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Sets the pool-wide restart backoff.
    ///
    /// A strategy whose [`is_valid`](BackoffStrategy::is_valid) is false is
    /// replaced by the default [`ExponentialBackoff`](crate::ExponentialBackoff).
    #[must_use]
    pub fn with_backoff<B: BackoffStrategy>(mut self, backoff: B) -> Self {
        self.backoff = Some(Box::new(backoff));
        self
    }

    /// Sets the bound tasks; validated when the supervisor is built.
    #[must_use]
    pub fn with_bound_tasks(mut self, tasks: Vec<BoundTaskSpec>) -> Self {
        self.bound_tasks = tasks;
        self
    }

    /// Stops the pool when `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Whether SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere) stop the pool. Defaults to true.
    #[must_use]
    pub fn with_signal_handling(mut self, enabled: bool) -> Self {
        self.handle_signals = enabled;
        self
    }

    /// Builds a supervisor that re-executes the current binary in each slot.
    ///
    /// # Errors
    /// [`ClusterError::Config`] for invalid bound tasks (checked first), or
    /// [`RuntimeError::Executable`] if the current executable cannot be resolved.
    pub fn build(self) -> Result<Supervisor, ClusterError> {
        let workers = self.resolve_workers();
        let tasks = binder::validate_all(&self.bound_tasks, workers)?;
        let spawner = ProcessSpawner::current_process()
            .map_err(RuntimeError::Executable)?
            .with_stop_grace(self.cfg.stop_grace());
        Ok(self.assemble(workers, tasks, spawner))
    }

    /// Builds a supervisor around a custom [`Spawn`] implementation.
    ///
    /// # Errors
    /// [`ConfigError::InvalidField`] for invalid bound tasks.
    pub fn build_with_spawner<P: Spawn>(self, spawner: P) -> Result<Supervisor<P>, ConfigError> {
        let workers = self.resolve_workers();
        let tasks = binder::validate_all(&self.bound_tasks, workers)?;
        Ok(self.assemble(workers, tasks, spawner))
    }

    /// Runs the current process in the role the environment assigns it.
    ///
    /// In a worker, `body` is called exactly once and the process then exits:
    /// status 0 when it returns `Ok`, 1 on `Err`, 101 if it panics. In the
    /// controller, `body` is never called; the pool runs until shutdown.
    ///
    /// # Errors
    /// See [`ClusterError`].
    pub async fn start<F, Fut>(self, body: F) -> Result<(), ClusterError>
    where
        F: FnOnce(WorkerHandle) -> Fut,
        Fut: Future<Output = Result<(), WorkerError>>,
    {
        match Mode::detect()? {
            Mode::Worker { slot, instance } => {
                let code = worker::run_stdio(slot, instance, body).await;
                std::process::exit(code)
            }
            Mode::Controller => {
                drop(body);
                self.build()?.run().await?;
                Ok(())
            }
        }
    }

    /// Controller entry point with an explicit spawner; `body` is never called.
    ///
    /// # Errors
    /// See [`ClusterError`].
    pub async fn start_with<P, F, Fut>(self, spawner: P, body: F) -> Result<(), ClusterError>
    where
        P: Spawn,
        F: FnOnce(WorkerHandle) -> Fut,
        Fut: Future<Output = Result<(), WorkerError>>,
    {
        drop(body);
        self.build_with_spawner(spawner)?.run().await?;
        Ok(())
    }

    fn resolve_workers(&self) -> usize {
        let workers = self.cfg.effective_workers();
        if self.cfg.requested_workers().is_none() {
            match self.cfg.num_workers {
                Some(requested) => {
                    tracing::warn!(requested, workers, "invalid worker count; using available CPUs");
                }
                None => tracing::debug!(workers, "worker count defaults to available CPUs"),
            }
        }
        workers
    }

    fn assemble<P: Spawn>(
        self,
        workers: usize,
        tasks: Vec<binder::BoundTask>,
        spawner: P,
    ) -> Supervisor<P> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let settings = PoolSettings {
            workers,
            quiet_period: self.cfg.quiet_period,
            trigger: self.cfg.restart_trigger,
        };
        let backoff = resolve_strategy(self.backoff);
        let pool = Pool::new(settings, tasks, backoff, spawner, bus.clone());

        Supervisor::new_internal(
            self.cfg,
            bus,
            self.subscribers,
            pool,
            self.token.unwrap_or_default(),
            self.handle_signals,
        )
    }
}
