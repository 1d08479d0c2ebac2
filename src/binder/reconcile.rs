//! # Reconciliation pass.
//!
//! [`reconcile`] walks every bound task in declaration order and makes sure each
//! one is active on a live process of its preferred slot:
//!
//! ```text
//! assigned && same instance && Listening ──► Kept       (no send)
//! otherwise: clear assignment
//!   preferred slot Listening ── send Activate ── accepted ──► Bound   (callback runs)
//!                                             └─ refused  ──► Rejected
//!   preferred slot missing / not Listening ────────────────► Pending
//! ```
//!
//! The pass is synchronous and never yields, so all tasks see the same table
//! and sends to one slot leave in list order. Running it twice in a row sends
//! nothing the second time.

use crate::process::ControllerMessage;
use crate::slots::{SlotHandle, SlotId, SlotTable};

use super::task::{BoundTask, SlotBinding};

/// What happened to one task during a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciled {
    /// Still active on the same live instance; nothing sent.
    Kept(SlotBinding),
    /// Activation accepted by a new instance.
    Bound(SlotBinding),
    /// The preferred slot was listening but refused the activation.
    Rejected(SlotId),
    /// No listening process in the preferred slot yet.
    Pending(SlotId),
}

/// Outcomes of one pass, index-aligned with the task list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// One entry per task, in declaration order.
    pub outcomes: Vec<Reconciled>,
}

impl ReconcileReport {
    /// Number of activation messages sent and accepted.
    pub fn bound(&self) -> usize {
        self.count(|o| matches!(o, Reconciled::Bound(_)))
    }

    /// Number of activation messages refused.
    pub fn rejected(&self) -> usize {
        self.count(|o| matches!(o, Reconciled::Rejected(_)))
    }

    /// Number of tasks still waiting for their slot.
    pub fn pending(&self) -> usize {
        self.count(|o| matches!(o, Reconciled::Pending(_)))
    }

    fn count(&self, pred: impl Fn(&Reconciled) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}

/// Runs one full reconciliation pass over `tasks` against `table`.
pub fn reconcile<S: SlotHandle>(tasks: &mut [BoundTask], table: &SlotTable<S>) -> ReconcileReport {
    let outcomes = tasks.iter_mut().map(|task| reconcile_one(task, table)).collect();
    ReconcileReport { outcomes }
}

fn reconcile_one<S: SlotHandle>(task: &mut BoundTask, table: &SlotTable<S>) -> Reconciled {
    if let Some(binding) = task.assigned {
        let live = table
            .current(binding.slot, binding.instance)
            .is_some_and(|s| s.state().is_listening());
        if live {
            return Reconciled::Kept(binding);
        }
        tracing::debug!(
            slot = %binding.slot,
            instance = %binding.instance,
            start_signal = %task.start_signal_id,
            "bound task lost its process"
        );
        task.assigned = None;
    }

    let slot_id = task.preferred_slot;
    let Some(slot) = table.get(slot_id).filter(|s| s.state().is_listening()) else {
        return Reconciled::Pending(slot_id);
    };

    let activate = ControllerMessage::activate(task.start_signal_id.as_ref());
    if !slot.send(activate) {
        return Reconciled::Rejected(slot_id);
    }

    let binding = SlotBinding {
        slot: slot_id,
        instance: slot.instance(),
    };
    task.assigned = Some(binding);
    (task.worker_function)(&binding);
    Reconciled::Bound(binding)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::binder::BoundTaskSpec;
    use crate::slots::{InstanceId, SlotState};

    #[derive(Clone, Default)]
    struct Outbox(Arc<Mutex<Vec<(SlotId, InstanceId, ControllerMessage)>>>);

    impl Outbox {
        fn sent(&self) -> Vec<(SlotId, InstanceId, ControllerMessage)> {
            self.0.lock().unwrap().clone()
        }
    }

    struct FakeSlot {
        id: SlotId,
        instance: InstanceId,
        state: SlotState,
        accepts: bool,
        outbox: Outbox,
    }

    impl SlotHandle for FakeSlot {
        fn instance(&self) -> InstanceId {
            self.instance
        }

        fn state(&self) -> SlotState {
            self.state
        }

        fn send(&self, message: ControllerMessage) -> bool {
            if self.accepts {
                self.outbox.0.lock().unwrap().push((self.id, self.instance, message));
            }
            self.accepts
        }
    }

    fn slot(n: u32) -> SlotId {
        SlotId::new(n).unwrap()
    }

    fn put(table: &mut SlotTable<FakeSlot>, outbox: &Outbox, n: u32, instance: u64, state: SlotState) {
        table.insert(
            slot(n),
            FakeSlot {
                id: slot(n),
                instance: InstanceId(instance),
                state,
                accepts: true,
                outbox: outbox.clone(),
            },
        );
    }

    fn task(n: i64, signal: &str, calls: &Arc<Mutex<Vec<SlotBinding>>>) -> BoundTask {
        let calls = Arc::clone(calls);
        BoundTaskSpec::new(n, signal)
            .with_worker_function(move |b| calls.lock().unwrap().push(*b))
            .validate(4)
            .unwrap()
    }

    #[test]
    fn test_no_workers_leaves_task_pending() {
        let calls = Arc::default();
        let mut tasks = vec![task(1, "sync", &calls)];
        let table = SlotTable::<FakeSlot>::new();

        let report = reconcile(&mut tasks, &table);
        assert_eq!(report.outcomes, vec![Reconciled::Pending(slot(1))]);
        assert!(tasks[0].assigned().is_none());
        assert!(calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_starting_slot_gets_no_send() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 1, 1, SlotState::Starting);
        let mut tasks = vec![task(1, "sync", &calls)];

        let report = reconcile(&mut tasks, &table);
        assert_eq!(report.pending(), 1);
        assert!(outbox.sent().is_empty());
        assert!(tasks[0].assigned().is_none());
    }

    #[test]
    fn test_unassigned_task_binds_to_listening_slot() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 1, 1, SlotState::Listening);
        put(&mut table, &outbox, 2, 2, SlotState::Listening);
        let mut tasks = vec![task(2, "sync", &calls)];

        let report = reconcile(&mut tasks, &table);
        let binding = SlotBinding {
            slot: slot(2),
            instance: InstanceId(2),
        };
        assert_eq!(report.outcomes, vec![Reconciled::Bound(binding)]);
        assert_eq!(tasks[0].assigned(), Some(binding));
        assert_eq!(*calls.lock().unwrap(), vec![binding]);
        assert_eq!(
            outbox.sent(),
            vec![(slot(2), InstanceId(2), ControllerMessage::activate("sync"))]
        );
    }

    #[test]
    fn test_repeated_pass_does_not_resend() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 1, 1, SlotState::Listening);
        let mut tasks = vec![task(1, "sync", &calls)];

        reconcile(&mut tasks, &table);
        let second = reconcile(&mut tasks, &table);

        assert!(matches!(second.outcomes[0], Reconciled::Kept(_)));
        assert_eq!(outbox.sent().len(), 1);
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_failover_to_replacement_instance_of_same_slot() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 1, 1, SlotState::Listening);
        put(&mut table, &outbox, 2, 2, SlotState::Listening);
        let mut tasks = vec![task(1, "sync", &calls)];
        reconcile(&mut tasks, &table);

        // Slot 1 dies; another slot stays up but must not take the task.
        put(&mut table, &outbox, 1, 1, SlotState::Dead);
        let report = reconcile(&mut tasks, &table);
        assert_eq!(report.outcomes, vec![Reconciled::Pending(slot(1))]);
        assert!(tasks[0].assigned().is_none());

        // Replacement process starts, then becomes ready.
        put(&mut table, &outbox, 1, 3, SlotState::Starting);
        reconcile(&mut tasks, &table);
        put(&mut table, &outbox, 1, 3, SlotState::Listening);
        reconcile(&mut tasks, &table);
        reconcile(&mut tasks, &table);

        let sent = outbox.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], (slot(1), InstanceId(3), ControllerMessage::activate("sync")));
        assert_eq!(
            tasks[0].assigned(),
            Some(SlotBinding {
                slot: slot(1),
                instance: InstanceId(3)
            })
        );
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_replacement_already_listening_is_detected_by_instance() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 1, 1, SlotState::Listening);
        let mut tasks = vec![task(1, "sync", &calls)];
        reconcile(&mut tasks, &table);

        // The pass observing the dead instance was missed entirely.
        put(&mut table, &outbox, 1, 7, SlotState::Listening);
        let report = reconcile(&mut tasks, &table);

        assert_eq!(report.bound(), 1);
        assert_eq!(outbox.sent().len(), 2);
        assert_eq!(tasks[0].assigned().map(|b| b.instance), Some(InstanceId(7)));
    }

    #[test]
    fn test_two_tasks_on_one_slot_sent_in_order() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        put(&mut table, &outbox, 3, 1, SlotState::Listening);
        let mut tasks = vec![task(3, "first", &calls), task(3, "second", &calls)];

        let report = reconcile(&mut tasks, &table);
        assert_eq!(report.bound(), 2);
        let signals: Vec<_> = outbox.sent().into_iter().map(|(_, _, m)| m).collect();
        assert_eq!(
            signals,
            vec![
                ControllerMessage::activate("first"),
                ControllerMessage::activate("second")
            ]
        );
    }

    #[test]
    fn test_rejected_send_leaves_task_unassigned() {
        let calls = Arc::default();
        let outbox = Outbox::default();
        let mut table = SlotTable::new();
        table.insert(
            slot(1),
            FakeSlot {
                id: slot(1),
                instance: InstanceId(1),
                state: SlotState::Listening,
                accepts: false,
                outbox: outbox.clone(),
            },
        );
        let mut tasks = vec![task(1, "sync", &calls)];

        let report = reconcile(&mut tasks, &table);
        assert_eq!(report.outcomes, vec![Reconciled::Rejected(slot(1))]);
        assert_eq!(report.rejected(), 1);
        assert!(tasks[0].assigned().is_none());
        assert!(calls.lock().unwrap().is_empty());
    }
}
