//! In-process stand-in for [`ProcessSpawner`](crate::ProcessSpawner).

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::process::{ControllerMessage, Spawn, WorkerLink};
use crate::slots::{ExitInfo, InstanceId, SlotEvent, SlotEventKind, SlotId};

/// A fake process: emits `Exited` when terminated, otherwise only what the test injects.
pub(crate) struct FakeProcess {
    pub slot: SlotId,
    pub instance: InstanceId,
    events: mpsc::UnboundedSender<SlotEvent>,
    outbox: Mutex<mpsc::UnboundedReceiver<ControllerMessage>>,
    received: Mutex<Vec<ControllerMessage>>,
}

impl FakeProcess {
    fn emit(&self, kind: SlotEventKind) {
        let _ = self.events.send(SlotEvent::new(self.slot, self.instance, kind));
    }
}

#[derive(Default)]
struct State {
    spawned: Vec<Arc<FakeProcess>>,
    fail_next: usize,
    stubborn: HashSet<SlotId>,
}

#[derive(Clone, Default)]
pub(crate) struct FakeSpawner {
    state: Arc<Mutex<State>>,
}

impl FakeSpawner {
    /// Successfully spawned processes, in spawn order.
    pub fn spawned(&self) -> Vec<Arc<FakeProcess>> {
        self.state.lock().unwrap().spawned.clone()
    }

    /// Makes the next `n` spawn calls fail.
    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().fail_next = n;
    }

    /// Processes in `slot` ignore termination requests.
    pub fn ignore_stop_for(&self, slot: SlotId) {
        self.state.lock().unwrap().stubborn.insert(slot);
    }

    /// Waits until at least `n` processes have been spawned.
    pub async fn wait_for(&self, n: usize) {
        while self.spawned().len() < n {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn process(&self, idx: usize) -> Arc<FakeProcess> {
        Arc::clone(&self.state.lock().unwrap().spawned[idx])
    }

    /// Process `idx` signals readiness.
    pub fn listen(&self, idx: usize) {
        self.process(idx).emit(SlotEventKind::Listening {
            address: Some(format!("127.0.0.1:{}", 9000 + idx)),
        });
    }

    /// Process `idx` closes its control pipe.
    pub fn disconnect(&self, idx: usize) {
        self.process(idx).emit(SlotEventKind::Disconnected);
    }

    /// Process `idx` exits.
    pub fn exit(&self, idx: usize, code: Option<i32>) {
        self.process(idx)
            .emit(SlotEventKind::Exited(ExitInfo { code, signal: None }));
    }

    /// Every message process `idx` received so far (shutdown requests excluded).
    pub fn received(&self, idx: usize) -> Vec<ControllerMessage> {
        let proc = self.process(idx);
        let mut outbox = proc.outbox.lock().unwrap();
        let mut received = proc.received.lock().unwrap();
        while let Ok(msg) = outbox.try_recv() {
            if msg != ControllerMessage::Shutdown {
                received.push(msg);
            }
        }
        received.clone()
    }
}

impl Spawn for FakeSpawner {
    fn spawn(
        &mut self,
        slot: SlotId,
        instance: InstanceId,
        events: mpsc::UnboundedSender<SlotEvent>,
    ) -> io::Result<WorkerLink> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(io::Error::new(io::ErrorKind::NotFound, "no such program"));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let stop = CancellationToken::new();
        let proc = Arc::new(FakeProcess {
            slot,
            instance,
            events,
            outbox: Mutex::new(rx),
            received: Mutex::new(Vec::new()),
        });

        if !state.stubborn.contains(&slot) {
            let proc = Arc::clone(&proc);
            let stop = stop.clone();
            tokio::spawn(async move {
                stop.cancelled().await;
                proc.emit(SlotEventKind::Exited(ExitInfo::default()));
            });
        }
        state.spawned.push(proc);
        Ok(WorkerLink::new(tx, stop))
    }
}
