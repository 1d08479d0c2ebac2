//! Worker process spawning.
//!
//! The controller re-executes its own binary with its own arguments; the
//! child recognizes worker mode from the environment variables set here
//! (see [`Mode::detect`](crate::Mode::detect)).

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::slots::{InstanceId, SlotEvent, SlotId};
use crate::worker::{INSTANCE_ID_ENV, SLOT_ID_ENV};

use super::{
    WorkerLink,
    monitor::{Monitor, feed_stdin},
};

/// Creates the process that occupies a slot.
///
/// Implementations must report the instance's lifecycle on `events` and
/// eventually emit [`SlotEventKind::Exited`](crate::SlotEventKind::Exited)
/// once the process is gone, including after [`WorkerLink::terminate`].
pub trait Spawn: Send + 'static {
    /// Starts one process for `slot`.
    fn spawn(
        &mut self,
        slot: SlotId,
        instance: InstanceId,
        events: mpsc::UnboundedSender<SlotEvent>,
    ) -> io::Result<WorkerLink>;
}

/// Time a terminated worker gets to exit before it is killed, unless overridden.
pub(crate) const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(2);

/// Spawns real OS processes running the current executable.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
    stop_grace: Duration,
}

impl ProcessSpawner {
    /// Re-executes the current binary with the current arguments.
    pub fn current_process() -> io::Result<Self> {
        let program = std::env::current_exe()?;
        let args = std::env::args_os().skip(1).collect();
        Ok(Self::new(program, args))
    }

    /// Runs `program` with `args` in each slot.
    ///
    /// `program` must call [`SupervisorBuilder::start`](crate::SupervisorBuilder::start)
    /// (or otherwise speak the control-pipe protocol) to act as a worker.
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            envs: Vec::new(),
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }

    /// How long a terminated worker may take to exit before it is killed (default 2s).
    ///
    /// Stdin is closed as soon as termination is requested.
    #[must_use]
    pub fn with_stop_grace(mut self, stop_grace: Duration) -> Self {
        self.stop_grace = stop_grace;
        self
    }

    /// Adds an environment variable passed to every worker.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

impl Spawn for ProcessSpawner {
    fn spawn(
        &mut self,
        slot: SlotId,
        instance: InstanceId,
        events: mpsc::UnboundedSender<SlotEvent>,
    ) -> io::Result<WorkerLink> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k, v)))
            .env(SLOT_ID_ENV, slot.get().to_string())
            .env(INSTANCE_ID_ENV, instance.get().to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("worker stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("worker stdout not captured"))?;

        let (outbox_tx, outbox_rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();

        let writer = tokio::spawn(feed_stdin(stdin, outbox_rx, stop.clone()));
        let monitor = Monitor {
            slot,
            instance,
            events,
            stop: stop.clone(),
            stop_grace: self.stop_grace,
        };
        tokio::spawn(monitor.run(child, stdout, writer));

        tracing::debug!(%slot, %instance, program = %self.program.display(), "spawned worker process");
        Ok(WorkerLink::new(outbox_tx, stop))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::process::ControllerMessage;
    use crate::slots::{ExitInfo, SlotEventKind};

    fn shell(script: &str) -> ProcessSpawner {
        ProcessSpawner::new("sh", vec!["-c".into(), script.into()])
    }

    async fn collect_until_exit(
        rx: &mut mpsc::UnboundedReceiver<SlotEvent>,
        within: Duration,
    ) -> Vec<SlotEventKind> {
        let mut kinds = Vec::new();
        tokio::time::timeout(within, async {
            while let Some(ev) = rx.recv().await {
                let done = matches!(ev.kind, SlotEventKind::Exited(_));
                kinds.push(ev.kind);
                if done {
                    break;
                }
            }
        })
        .await
        .expect("worker did not exit in time");
        kinds
    }

    #[tokio::test]
    async fn test_listening_then_disconnect_then_exit_code() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = shell(r#"echo '{"type":"listening","address":"127.0.0.1:1"}'; exit 3"#);
        let _link = spawner
            .spawn(SlotId::new(1).unwrap(), InstanceId(1), tx)
            .unwrap();

        let kinds = collect_until_exit(&mut rx, Duration::from_secs(10)).await;
        assert_eq!(
            kinds,
            vec![
                SlotEventKind::Listening {
                    address: Some("127.0.0.1:1".into())
                },
                SlotEventKind::Disconnected,
                SlotEventKind::Exited(ExitInfo {
                    code: Some(3),
                    signal: None
                }),
            ]
        );
    }

    #[tokio::test]
    async fn test_terminate_closes_stdin_so_worker_exits_cleanly() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = shell(r#"echo '{"type":"listening"}'; cat >/dev/null; exit 0"#)
            .with_stop_grace(Duration::from_secs(30));
        let link = spawner
            .spawn(SlotId::new(1).unwrap(), InstanceId(1), tx)
            .unwrap();

        let first = rx.recv().await.map(|ev| ev.kind);
        assert_eq!(first, Some(SlotEventKind::Listening { address: None }));

        assert!(link.send(ControllerMessage::activate("sync")));
        link.terminate();

        let kinds = collect_until_exit(&mut rx, Duration::from_secs(10)).await;
        assert_eq!(
            kinds.last(),
            Some(&SlotEventKind::Exited(ExitInfo {
                code: Some(0),
                signal: None
            }))
        );
    }

    #[tokio::test]
    async fn test_stubborn_worker_is_killed_after_stop_grace() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut spawner = shell(r#"echo '{"type":"listening"}'; exec sleep 60"#)
            .with_stop_grace(Duration::from_millis(200));
        let link = spawner
            .spawn(SlotId::new(2).unwrap(), InstanceId(7), tx)
            .unwrap();

        let first = rx.recv().await.map(|ev| ev.kind);
        assert_eq!(first, Some(SlotEventKind::Listening { address: None }));

        let started = std::time::Instant::now();
        link.terminate();
        let kinds = collect_until_exit(&mut rx, Duration::from_secs(10)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!kinds.contains(&SlotEventKind::Disconnected));
        assert_eq!(
            kinds.last(),
            Some(&SlotEventKind::Exited(ExitInfo {
                code: None,
                signal: Some(9)
            }))
        );
    }

    #[tokio::test]
    async fn test_missing_program_is_a_spawn_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut spawner = ProcessSpawner::new("/nonexistent/slotvisor-worker", Vec::new());
        assert!(spawner.spawn(SlotId::new(1).unwrap(), InstanceId(1), tx).is_err());
    }
}
