use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ControllerMessage;

/// Controller-side handle to one spawned process.
///
/// Sends are queued to the task writing the process's control pipe; they never
/// block the control loop.
#[derive(Debug, Clone)]
pub struct WorkerLink {
    outbox: mpsc::UnboundedSender<ControllerMessage>,
    stop: CancellationToken,
}

impl WorkerLink {
    /// Wraps a message queue and a stop token.
    pub fn new(outbox: mpsc::UnboundedSender<ControllerMessage>, stop: CancellationToken) -> Self {
        Self { outbox, stop }
    }

    /// Queues `message`; false once the pipe writer has gone away.
    pub fn send(&self, message: ControllerMessage) -> bool {
        self.outbox.send(message).is_ok()
    }

    /// Sends [`ControllerMessage::Shutdown`] and fires the stop token.
    ///
    /// The process monitor kills the process if it has not exited shortly after.
    pub fn terminate(&self) {
        let _ = self.outbox.send(ControllerMessage::Shutdown);
        self.stop.cancel();
    }

    /// True once [`terminate`](Self::terminate) was called.
    pub fn is_terminating(&self) -> bool {
        self.stop.is_cancelled()
    }
}
