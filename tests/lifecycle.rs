//! End-to-end lifecycle behaviour of a machine in registry mode.

mod common;

use common::{capture_reports, init_tracing, log, Probe};
use parking_lot::Mutex;
use state_lifecycle::core::{payload, EnterContext, Hook, HookResult};
use state_lifecycle::registry::StateFactory;
use state_lifecycle::{
    async_trait, unit_states, MachineError, MachinePhase, Severity, State, StateEntry,
    StateMachine,
};
use std::sync::Arc;

unit_states! { Idle, Chase }

#[tokio::test]
async fn round_trip_runs_exit_before_enter() {
    init_tracing();
    let log = log();
    let machine = StateMachine::new();
    let a = machine.add_state(Probe::new("A", &log)).unwrap();
    machine.add_state(Probe::new("B", &log)).unwrap();
    machine.set_initial_state(&a);

    machine.initialize().await.unwrap();
    machine.transition_to("B", None).await.unwrap();
    assert_eq!(machine.current_state().unwrap().name(), "B");

    machine.transition_to("A", None).await.unwrap();
    assert_eq!(machine.current_state().unwrap().id(), a.id());
    assert_eq!(
        *log.lock(),
        vec!["enter:A", "exit:A", "enter:B", "exit:B", "enter:A"]
    );
}

#[tokio::test]
async fn unknown_name_leaves_state_and_reports_once() {
    let log = log();
    let machine = StateMachine::new();
    machine.add_state(Probe::new("A", &log)).unwrap();
    machine.initialize().await.unwrap();
    let reports = capture_reports(&machine);

    let err = machine.transition_to("Nowhere", None).await.unwrap_err();

    assert!(matches!(err, MachineError::NotFound { .. }));
    assert_eq!(machine.current_state().unwrap().name(), "A");
    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].error, err);
    assert_eq!(reports[0].severity, Severity::Error);
}

#[tokio::test]
async fn failing_enter_still_lands_on_target() {
    let log = log();
    let machine = StateMachine::new();
    machine.add_state(Probe::new("A", &log)).unwrap();
    let b = machine.add_state(Probe::new("B", &log).failing_enter()).unwrap();
    machine.initialize().await.unwrap();
    let reports = capture_reports(&machine);

    let record = machine.transition_to(&b, None).await.unwrap();

    assert_eq!(machine.current_state().unwrap().id(), b.id());
    assert_eq!(record.failed_hooks, vec![Hook::Enter]);
    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        &reports[0].error,
        MachineError::HookFailure { state, hook: Hook::Enter, .. } if *state == b.id()
    ));
}

#[tokio::test]
async fn failing_exit_does_not_skip_enter() {
    let log = log();
    let machine = StateMachine::new();
    machine.add_state(Probe::new("A", &log).failing_exit()).unwrap();
    machine.add_state(Probe::new("B", &log)).unwrap();
    machine.initialize().await.unwrap();

    let record = machine.transition_to("B", None).await.unwrap();

    assert_eq!(record.failed_hooks, vec![Hook::Exit]);
    assert_eq!(*log.lock(), vec!["enter:A", "exit:A", "enter:B"]);
    assert_eq!(machine.current_state().unwrap().name(), "B");
}

#[tokio::test]
async fn update_reaches_only_the_current_state() {
    let log = log();
    let machine = StateMachine::new();
    machine.add_state(Probe::new("A", &log).failing_update()).unwrap();
    machine.add_state(Probe::new("B", &log)).unwrap();
    machine.initialize().await.unwrap();
    let reports = capture_reports(&machine);

    machine.update(0.5).await;
    machine.update(0.25).await;

    assert_eq!(*log.lock(), vec!["enter:A", "update:A", "update:A"]);
    assert_eq!(machine.current_state().unwrap().name(), "A");
    assert_eq!(machine.time_in_state(), 0.75);
    assert!(reports.lock().iter().all(|r| matches!(
        r.error,
        MachineError::HookFailure {
            hook: Hook::Update,
            ..
        }
    )));
    assert_eq!(reports.lock().len(), 2);

    machine.transition_to("B", None).await.unwrap();
    assert_eq!(machine.time_in_state(), 0.0);
}

#[tokio::test]
async fn empty_machine_initializes_with_a_warning() {
    let machine = StateMachine::new();
    let reports = capture_reports(&machine);

    assert!(machine.initialize().await.unwrap().is_none());
    assert_eq!(machine.phase(), MachinePhase::Ready);
    assert!(machine.current_state().is_none());
    {
        let reports = reports.lock();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].error, MachineError::EmptyRegistry);
        assert_eq!(reports[0].severity, Severity::Warning);
    }

    machine.update(1.0).await;
    assert_eq!(reports.lock().len(), 1);
}

#[tokio::test]
async fn payload_reaches_on_enter() {
    struct Greeter {
        seen: Arc<Mutex<Option<String>>>,
    }

    #[async_trait]
    impl State for Greeter {
        async fn on_enter(&self, cx: EnterContext<'_>) -> HookResult {
            *self.seen.lock() = cx.data_as::<String>().cloned();
            Ok(())
        }
    }

    let seen = Arc::new(Mutex::new(None));
    let machine = StateMachine::new();
    machine.add_state(Idle).unwrap();
    machine.add_state(Greeter { seen: seen.clone() }).unwrap();
    machine.initialize().await.unwrap();

    machine
        .transition_to("Greeter", Some(payload(String::from("hello"))))
        .await
        .unwrap();

    assert_eq!(seen.lock().as_deref(), Some("hello"));
}

#[tokio::test]
async fn transition_by_type_and_name() {
    let machine = StateMachine::new();
    machine.add_state(Idle).unwrap();
    let chase = machine.add_state(Chase).unwrap();
    let sprint = machine
        .add_state_ref(StateEntry::named(Chase, "Sprint"))
        .unwrap();
    machine.initialize().await.unwrap();

    machine.transition_to_type::<Chase>(None, None).await.unwrap();
    assert_eq!(machine.current_state().unwrap().id(), chase.id());

    machine
        .transition_to_type::<Chase>(Some("Sprint"), None)
        .await
        .unwrap();
    assert_eq!(machine.current_state().unwrap().id(), sprint.id());

    let err = machine
        .transition_to_type::<Idle>(Some("Sprint"), None)
        .await
        .unwrap_err();
    assert!(matches!(err, MachineError::NotFound { .. }));
    assert_eq!(machine.current_state().unwrap().id(), sprint.id());
}

#[tokio::test]
async fn reinitialize_forgets_current_without_exit() {
    let log = log();
    let machine = StateMachine::new();
    machine.add_state(Probe::new("A", &log)).unwrap();
    machine.add_state(Probe::new("B", &log)).unwrap();
    machine.initialize().await.unwrap();
    machine.transition_to("B", None).await.unwrap();

    machine.initialize().await.unwrap();

    assert_eq!(
        *log.lock(),
        vec!["enter:A", "exit:A", "enter:B", "enter:A"]
    );
    assert_eq!(machine.current_state().unwrap().name(), "A");
}

#[tokio::test]
async fn broken_constructors_are_skipped() {
    let machine = StateMachine::builder()
        .factory(
            StateFactory::new()
                .with("broken", || -> anyhow::Result<Idle> {
                    anyhow::bail!("missing asset")
                })
                .with_default::<Chase>("chase"),
        )
        .state_type("broken")
        .state_type("chase")
        .build()
        .unwrap();
    let reports = capture_reports(&machine);

    let initial = machine.initialize().await.unwrap().unwrap();

    assert!(initial.is::<Chase>());
    assert_eq!(machine.states().len(), 1);
    let reports = reports.lock();
    assert_eq!(reports.len(), 1);
    assert!(matches!(
        &reports[0].error,
        MachineError::InstantiationFailure { tag, reason }
            if tag == "broken" && reason.contains("missing asset")
    ));
}

#[tokio::test]
async fn states_are_managed_at_runtime() {
    let machine = StateMachine::new();
    let idle = machine.add_state(Idle).unwrap();
    let chase = machine.add_state(Chase).unwrap();
    machine.initialize().await.unwrap();

    assert!(matches!(
        machine.remove_state(&idle),
        Err(MachineError::StateIsCurrent { .. })
    ));
    assert_eq!(machine.remove_state(&chase), Ok(true));
    assert_eq!(machine.remove_state(&chase), Ok(false));
    assert!(!machine.set_initial_state(&chase));

    let late = machine.add_state(Chase).unwrap();
    assert!(machine.set_initial_state(&late));
    assert_eq!(machine.current_state().unwrap().id(), idle.id());

    machine.clear().unwrap();
    assert_eq!(machine.phase(), MachinePhase::Uninitialized);
    assert!(machine.states().is_empty());
    assert!(machine.current_state().is_none());
    assert!(machine.history().is_empty());
}

#[tokio::test]
async fn initialize_action_runs_once_per_state() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let machine = StateMachine::new();
    let sink = seen.clone();
    machine.set_state_initialize_action(move |state| sink.lock().push(state.name().to_owned()));

    machine.add_state(Idle).unwrap();
    assert!(seen.lock().is_empty());

    machine.initialize().await.unwrap();
    assert_eq!(*seen.lock(), vec!["Idle"]);

    machine.add_state(Chase).unwrap();
    assert_eq!(*seen.lock(), vec!["Idle", "Chase"]);
}

#[tokio::test]
async fn history_follows_the_path() {
    let machine = StateMachine::builder()
        .state(Idle)
        .state(Chase)
        .history_limit(2)
        .build()
        .unwrap();
    machine.initialize().await.unwrap();
    machine.transition_to("Chase", None).await.unwrap();
    machine.transition_to("Idle", None).await.unwrap();

    let history = machine.history();
    let path: Vec<_> = history.path().into_iter().map(|s| s.name.as_str()).collect();
    assert_eq!(history.len(), 2);
    assert_eq!(path, vec!["Idle", "Chase", "Idle"]);
    assert!(history.transitions().all(|record| record.is_clean()));
}

#[tokio::test]
async fn type_ties_resolve_in_registration_order() {
    let machine = StateMachine::new();
    machine.add_state(Idle).unwrap();
    let first = machine.add_state(Chase).unwrap();
    machine.add_state(Chase).unwrap();
    machine.initialize().await.unwrap();

    for _ in 0..20 {
        machine.transition_to_type::<Chase>(None, None).await.unwrap();
        assert_eq!(machine.current_state().unwrap().id(), first.id());
        machine.transition_to("Idle", None).await.unwrap();
    }
}
