//! # Example: bound_tasks
//!
//! Pins two tasks to slots and shows them following their slot across crashes.
//!
//! Shows how to:
//! - Declare [`BoundTaskSpec`]s with a controller-side callback.
//! - Handle [`ControllerMessage::Activate`] in the worker body.
//! - Observe failover: the `flaky` task crashes its worker, the slot is
//!   restarted under backoff, and the task is re-activated on the new process.
//!
//! ## Flow
//! ```text
//! slot 1 ready ──► Activate{"metrics"}  (once, stays bound)
//! slot 2 ready ──► Activate{"flaky"}    ──► worker exits after 2s
//!        └─► restart after 500ms, 1s, 2s ... ──► ready ──► Activate{"flaky"} again
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=info cargo run --example bound_tasks
//! ```

use std::sync::Arc;
use std::time::Duration;

use slotvisor::{
    BoundTaskSpec, Config, ControllerMessage, ExponentialBackoff, LogWriter, Subscribe, Supervisor,
    WorkerError, WorkerHandle,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cfg = Config {
        num_workers: Some(2),
        quiet_period: Duration::from_secs(30),
        ..Config::default()
    };
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    Supervisor::builder(cfg.with_env_overrides())
        .with_subscribers(subs)
        .with_backoff(ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(8)))
        .with_bound_tasks(vec![
            BoundTaskSpec::new(1, "metrics").with_worker_function(|b| {
                tracing::info!(slot = %b.slot, instance = %b.instance, "metrics exporter bound");
            }),
            BoundTaskSpec::new(2, "flaky").with_worker_function(|b| {
                tracing::info!(slot = %b.slot, instance = %b.instance, "flaky job bound");
            }),
        ])
        .start(worker)
        .await?;
    Ok(())
}

async fn worker(mut handle: WorkerHandle) -> Result<(), WorkerError> {
    handle.ready(None)?;

    let mut crash_at = None;
    loop {
        let deadline = crash_at;
        let crash = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            () = crash => return Err(WorkerError::body("flaky job crashed")),
            msg = handle.recv() => match msg {
                Some(ControllerMessage::Activate { start_signal_id }) => {
                    tracing::info!(slot = %handle.slot_id(), %start_signal_id, "task activated");
                    if start_signal_id == "flaky" {
                        crash_at = Some(tokio::time::Instant::now() + Duration::from_secs(2));
                    }
                    handle.send(serde_json::json!({ "started": start_signal_id }))?;
                }
                Some(ControllerMessage::Shutdown) | None => return Ok(()),
                Some(other) => tracing::debug!(?other, "ignored"),
            },
        }
    }
}
