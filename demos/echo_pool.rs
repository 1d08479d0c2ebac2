//! # Example: echo_pool
//!
//! A pool of TCP echo servers, one per slot, supervised by the same binary.
//!
//! Shows how to:
//! - Use [`SupervisorBuilder::start`] as the single entry point for controller and workers.
//! - Signal readiness with the bound address ([`WorkerHandle::ready`]).
//! - Attach the built-in [`LogWriter`] and log through `tracing-subscriber`.
//!
//! ## Flow
//! ```text
//! controller ──fork──► worker (slot 1..=N)
//!                         ├─► bind 127.0.0.1:0
//!                         ├─► ready(addr)   ──► WorkerListening
//!                         └─► echo connections until Shutdown / pipe closed
//! kill a worker (kill <pid>) ──► WorkerExited ──► RestartScheduled ──► WorkerSpawned
//! ```
//!
//! ## Run
//! ```bash
//! SLOTVISOR_NUM_WORKERS=3 RUST_LOG=info cargo run --example echo_pool
//! ```
//! Workers log to stderr; stdout is the control pipe.

use std::sync::Arc;

use slotvisor::{
    Config, ControllerMessage, LogWriter, Subscribe, Supervisor, SupervisorBuilder, WorkerError,
    WorkerHandle,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];
    let builder: SupervisorBuilder = Supervisor::builder(Config::default().with_env_overrides())
        .with_subscribers(subs);

    builder.start(echo_worker).await?;
    Ok(())
}

async fn echo_worker(mut worker: WorkerHandle) -> Result<(), WorkerError> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    worker.ready(Some(addr.to_string()))?;
    tracing::info!(slot = %worker.slot_id(), %addr, "echo worker listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                tracing::debug!(%peer, "accepted");
                tokio::spawn(echo(stream));
            }
            msg = worker.recv() => match msg {
                Some(ControllerMessage::Shutdown) | None => break,
                Some(other) => tracing::info!(?other, "ignoring controller message"),
            },
        }
    }
    Ok(())
}

async fn echo(mut stream: TcpStream) {
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(n) => {
                if stream.write_all(&buf[..n]).await.is_err() {
                    return;
                }
            }
        }
    }
}
