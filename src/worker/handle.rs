//! # Worker-side handle to the controller.
//!
//! The worker body receives a [`WorkerHandle`]. It is the worker's only link
//! to the controller:
//! - [`WorkerHandle::ready`] emits the readiness signal (slot becomes `Listening`);
//! - [`WorkerHandle::recv`] yields activation messages and payloads;
//! - [`WorkerHandle::send`] sends application payloads back.
//!
//! The controller talks over the worker's stdin/stdout, so worker code must
//! log to stderr (the default for `tracing-subscriber`'s fmt layer is stdout;
//! configure `with_writer(std::io::stderr)`).

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::WorkerError;
use crate::process::{ControllerMessage, WorkerMessage, write_loop};
use crate::slots::{InstanceId, SlotId};

/// Upper bound on flushing queued messages after the worker body returns.
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Handle given to the worker body in a spawned worker process.
#[derive(Debug)]
pub struct WorkerHandle {
    slot: SlotId,
    instance: InstanceId,
    outbox: mpsc::UnboundedSender<WorkerMessage>,
    inbox: mpsc::UnboundedReceiver<ControllerMessage>,
}

impl WorkerHandle {
    /// Slot this worker occupies.
    pub fn slot_id(&self) -> SlotId {
        self.slot
    }

    /// Identity of this worker process.
    pub fn instance_id(&self) -> InstanceId {
        self.instance
    }

    /// Signals readiness; the controller marks the slot `Listening` and
    /// activates the bound tasks pinned to it.
    pub fn ready(&self, address: Option<String>) -> Result<(), WorkerError> {
        self.push(WorkerMessage::Listening { address })
    }

    /// Sends an application payload to the controller.
    pub fn send(&self, data: serde_json::Value) -> Result<(), WorkerError> {
        self.push(WorkerMessage::Payload { data })
    }

    /// Next message from the controller; `None` once the controller is gone.
    pub async fn recv(&mut self) -> Option<ControllerMessage> {
        self.inbox.recv().await
    }

    fn push(&self, msg: WorkerMessage) -> Result<(), WorkerError> {
        self.outbox.send(msg).map_err(|_| WorkerError::Disconnected)
    }
}

/// Background pipes behind a [`WorkerHandle`].
pub(crate) struct Pipes {
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Pipes {
    /// Waits briefly for queued messages to be written, then stops reading.
    pub(crate) async fn close(self) {
        if tokio::time::timeout(FLUSH_TIMEOUT, self.writer).await.is_err() {
            tracing::debug!("worker outbox not drained before exit");
        }
        self.reader.abort();
    }
}

/// Connects a handle to the controller over `reader` (controller → worker) and `writer`.
pub(crate) fn connect<R, W>(
    slot: SlotId,
    instance: InstanceId,
    reader: R,
    writer: W,
) -> (WorkerHandle, Pipes)
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(write_loop(writer, outbox_rx));
    let reader = tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match ControllerMessage::from_line(&line) {
                Ok(msg) => {
                    if inbox_tx.send(msg).is_err() {
                        break;
                    }
                }
                Err(err) => tracing::warn!(error = %err, "ignoring malformed controller message"),
            }
        }
    });

    let handle = WorkerHandle {
        slot,
        instance,
        outbox: outbox_tx,
        inbox: inbox_rx,
    };
    (handle, Pipes { reader, writer })
}
