//! Overlapping calls into one machine while a hook is suspended.

mod common;

use common::capture_reports;
use state_lifecycle::core::{EnterContext, HookResult};
use state_lifecycle::{
    async_trait, unit_states, MachineError, MachinePhase, State, StateMachine,
};
use std::sync::Arc;
use tokio::sync::Notify;

unit_states! { Idle, Flee }

/// Parks inside `on_enter` until released.
struct Gate {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

#[async_trait]
impl State for Gate {
    async fn on_enter(&self, _cx: EnterContext<'_>) -> HookResult {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

fn gated_machine() -> (StateMachine, Arc<Notify>, Arc<Notify>) {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let machine = StateMachine::new();
    machine.add_state(Idle).unwrap();
    machine
        .add_state(Gate {
            entered: entered.clone(),
            release: release.clone(),
        })
        .unwrap();
    machine.add_state(Flee).unwrap();
    (machine, entered, release)
}

#[tokio::test]
async fn overlapping_transition_is_rejected() {
    let (machine, entered, release) = gated_machine();
    machine.initialize().await.unwrap();
    let reports = capture_reports(&machine);

    let first = machine.transition_to("Gate", None);
    let second = async {
        entered.notified().await;
        assert!(machine.is_transitioning());
        let outcome = machine.transition_to("Flee", None).await;
        assert_eq!(machine.current_state().unwrap().name(), "Idle");
        release.notify_one();
        outcome
    };
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_ok());
    assert_eq!(second.unwrap_err(), MachineError::TransitionInProgress);
    assert_eq!(machine.current_state().unwrap().name(), "Gate");
    assert!(!machine.is_transitioning());
    assert_eq!(reports.lock().len(), 1);
}

#[tokio::test]
async fn registry_is_frozen_during_a_transition() {
    let (machine, entered, release) = gated_machine();
    machine.initialize().await.unwrap();
    let flee = machine.states_named("Flee").remove(0);

    let first = machine.transition_to("Gate", None);
    let meddle = async {
        entered.notified().await;
        let added = machine.add_state(Idle);
        let removed = machine.remove_state(&flee);
        let cleared = machine.clear();
        release.notify_one();
        (added, removed, cleared)
    };
    let (first, (added, removed, cleared)) = tokio::join!(first, meddle);

    assert!(first.is_ok());
    assert_eq!(added.unwrap_err(), MachineError::RegistryBusy);
    assert_eq!(removed, Err(MachineError::RegistryBusy));
    assert_eq!(cleared, Err(MachineError::RegistryBusy));
    assert_eq!(machine.states().len(), 3);
}

#[tokio::test]
async fn dropping_a_suspended_transition_frees_the_machine() {
    let (machine, entered, _release) = gated_machine();
    machine.initialize().await.unwrap();

    {
        let first = machine.transition_to("Gate", None);
        tokio::pin!(first);
        tokio::select! {
            _ = &mut first => panic!("gate should hold the transition"),
            _ = entered.notified() => {}
        }
    }

    assert!(!machine.is_transitioning());
    assert_eq!(machine.current_state().unwrap().name(), "Idle");
    machine.transition_to("Flee", None).await.unwrap();
    assert_eq!(machine.current_state().unwrap().name(), "Flee");
}

#[tokio::test]
async fn dropping_a_suspended_reinitialize_keeps_the_old_state() {
    let (machine, entered, _release) = gated_machine();
    machine.initialize().await.unwrap();
    machine.update(0.5).await;
    let gate = machine.states_named("Gate").remove(0);
    assert!(machine.set_initial_state(&gate));

    {
        let init = machine.initialize();
        tokio::pin!(init);
        tokio::select! {
            _ = &mut init => panic!("gate should hold initialize"),
            _ = entered.notified() => {}
        }
    }

    assert_eq!(machine.phase(), MachinePhase::Ready);
    assert!(!machine.is_transitioning());
    assert_eq!(machine.current_state().unwrap().name(), "Idle");
    assert_eq!(machine.time_in_state(), 0.5);
    machine.transition_to("Flee", None).await.unwrap();
}

#[tokio::test]
async fn dropping_a_first_initialize_allows_a_retry() {
    let (machine, entered, release) = gated_machine();
    let gate = machine.states_named("Gate").remove(0);
    assert!(machine.set_initial_state(&gate));

    {
        let init = machine.initialize();
        tokio::pin!(init);
        tokio::select! {
            _ = &mut init => panic!("gate should hold initialize"),
            _ = entered.notified() => {}
        }
    }

    assert_eq!(machine.phase(), MachinePhase::Uninitialized);
    assert!(machine.current_state().is_none());
    assert_eq!(
        machine.transition_to("Flee", None).await.unwrap_err(),
        MachineError::NotInitialized
    );

    release.notify_one();
    let initial = machine.initialize().await.unwrap().unwrap();
    assert_eq!(initial.id(), gate.id());
    assert_eq!(machine.phase(), MachinePhase::Ready);
}

#[tokio::test]
async fn machine_is_shareable_across_tasks() {
    let machine = Arc::new(StateMachine::new());
    machine.add_state(Idle).unwrap();
    machine.add_state(Flee).unwrap();
    machine.initialize().await.unwrap();

    let worker = machine.clone();
    tokio::spawn(async move {
        worker.transition_to("Flee", None).await.unwrap();
        worker.update(0.1).await;
    })
    .await
    .unwrap();

    assert_eq!(machine.current_state().unwrap().name(), "Flee");
}
