//! Per-instance process monitor.
//!
//! One monitor task runs for every spawned process. It owns the [`Child`],
//! forwards what the worker writes on its stdout to the control loop as
//! [`SlotEvent`]s, and writes queued [`ControllerMessage`](super::ControllerMessage)s to its stdin.
//!
//! ```text
//! worker stdout ──lines──► monitor ──SlotEvent──► control loop
//! control loop ──WorkerLink::send──► outbox ──writer──► worker stdin
//!
//! EOF on stdout  ─► Disconnected ─► kill, close stdin ─► wait ─► Exited
//! stop token     ─► flush queue, close stdin ─► wait (≤ stop_grace) ─► kill ─► Exited
//! ```
//!
//! A slot never holds two live processes: a disconnected worker is killed
//! before its `Exited` event is reported.

use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdout};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::slots::{ExitInfo, InstanceId, SlotEvent, SlotEventKind, SlotId};

use super::WorkerMessage;

pub(crate) struct Monitor {
    pub slot: SlotId,
    pub instance: InstanceId,
    pub events: mpsc::UnboundedSender<SlotEvent>,
    pub stop: CancellationToken,
    /// How long a terminated worker gets to exit on its own before it is killed.
    pub stop_grace: Duration,
}

impl Monitor {
    fn emit(&self, kind: SlotEventKind) {
        let _ = self.events.send(SlotEvent::new(self.slot, self.instance, kind));
    }

    /// Drives one process until it has exited.
    pub(crate) async fn run(
        self,
        mut child: Child,
        stdout: ChildStdout,
        mut writer: tokio::task::JoinHandle<()>,
    ) {
        let stopped = self.read_until_closed(stdout).await;

        let status = if stopped {
            let deadline = Instant::now() + self.stop_grace;
            let _ = tokio::time::timeout_at(deadline, &mut writer).await;
            writer.abort();
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    tracing::debug!(slot = %self.slot, instance = %self.instance, "worker ignored shutdown; killing");
                    let _ = child.start_kill();
                    child.wait().await
                }
            }
        } else {
            self.emit(SlotEventKind::Disconnected);
            let _ = child.start_kill();
            writer.abort();
            child.wait().await
        };

        let info = match status {
            Ok(status) => ExitInfo::from(status),
            Err(err) => {
                tracing::warn!(slot = %self.slot, instance = %self.instance, error = %err, "failed to reap worker");
                ExitInfo::default()
            }
        };
        self.emit(SlotEventKind::Exited(info));
    }

    /// Forwards worker messages until EOF (false) or the stop token fires (true).
    async fn read_until_closed(&self, stdout: ChildStdout) -> bool {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            tokio::select! {
                _ = self.stop.cancelled() => return true,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.forward(&line),
                    Ok(None) => return false,
                    Err(err) => {
                        tracing::debug!(slot = %self.slot, instance = %self.instance, error = %err, "control pipe read failed");
                        return false;
                    }
                },
            }
        }
    }

    fn forward(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        match WorkerMessage::from_line(line) {
            Ok(WorkerMessage::Listening { address }) => {
                self.emit(SlotEventKind::Listening { address });
            }
            Ok(WorkerMessage::Payload { data }) => {
                self.emit(SlotEventKind::Payload { data });
            }
            Err(err) => {
                tracing::warn!(slot = %self.slot, instance = %self.instance, error = %err, "ignoring malformed worker message");
            }
        }
    }
}

/// Writes queued messages as JSON lines until the queue closes or a write fails.
pub(crate) async fn write_loop<T, W>(mut pipe: W, mut outbox: mpsc::UnboundedReceiver<T>)
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    while let Some(msg) = outbox.recv().await {
        if write_line(&mut pipe, &msg).await.is_err() {
            break;
        }
    }
}

/// Like [`write_loop`], but once `stop` fires writes what is already queued
/// and returns, closing the worker's stdin.
pub(crate) async fn feed_stdin<T, W>(
    mut pipe: W,
    mut outbox: mpsc::UnboundedReceiver<T>,
    stop: CancellationToken,
) where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    loop {
        tokio::select! {
            biased;
            msg = outbox.recv() => match msg {
                Some(msg) => {
                    if write_line(&mut pipe, &msg).await.is_err() {
                        return;
                    }
                }
                None => return,
            },
            () = stop.cancelled() => break,
        }
    }
    while let Ok(msg) = outbox.try_recv() {
        if write_line(&mut pipe, &msg).await.is_err() {
            return;
        }
    }
    let _ = pipe.shutdown().await;
}

async fn write_line<T, W>(pipe: &mut W, msg: &T) -> std::io::Result<()>
where
    T: Serialize,
    W: AsyncWrite + Unpin,
{
    let mut line = match serde_json::to_string(msg) {
        Ok(line) => line,
        Err(err) => {
            tracing::warn!(error = %err, "dropping unserializable message");
            return Ok(());
        }
    };
    line.push('\n');
    pipe.write_all(line.as_bytes()).await?;
    pipe.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ControllerMessage;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_write_loop_emits_json_lines() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (client, mut server) = tokio::io::duplex(1024);

        tx.send(ControllerMessage::activate("a")).unwrap();
        tx.send(ControllerMessage::Shutdown).unwrap();
        drop(tx);
        write_loop(client, rx).await;

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(ControllerMessage::from_line(lines[0]).unwrap(), ControllerMessage::activate("a"));
        assert_eq!(ControllerMessage::from_line(lines[1]).unwrap(), ControllerMessage::Shutdown);
    }

    #[tokio::test]
    async fn test_feed_stdin_flushes_queue_then_closes_on_stop() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (client, mut server) = tokio::io::duplex(1024);
        let stop = CancellationToken::new();

        tx.send(ControllerMessage::activate("a")).unwrap();
        tx.send(ControllerMessage::Shutdown).unwrap();
        stop.cancel();
        feed_stdin(client, rx, stop).await;

        let mut out = String::new();
        server.read_to_string(&mut out).await.unwrap();
        let msgs: Vec<ControllerMessage> = out
            .lines()
            .map(|l| ControllerMessage::from_line(l).unwrap())
            .collect();
        assert_eq!(msgs, vec![ControllerMessage::activate("a"), ControllerMessage::Shutdown]);
        assert!(tx.send(ControllerMessage::Shutdown).is_err());
    }
}
