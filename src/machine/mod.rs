//! The state machine façade.
//!
//! `StateMachine` ties the registry, the optional transition graph and the
//! lifecycle dispatcher together and exposes the host-facing API:
//! initialization, transitions by identity/name/type/edge, per-tick updates
//! and runtime changes to the state set.
//!
//! # Single flight
//!
//! One lifecycle operation runs at a time. While an `initialize` or a
//! transition is suspended inside a hook, another `transition_to` fails at
//! once with `TransitionInProgress`, and adding or removing states or edges
//! fails with `RegistryBusy`. A hook may therefore call back into its own
//! machine without deadlocking, and the state set never changes under a
//! transition. `on_update` hooks get the same freeze on the state set but
//! may still switch states. Nothing times out: a hook that never resumes
//! holds the machine until its future is dropped.

mod flight;
mod handle;
mod target;

pub use handle::MachineHandle;
pub use target::TransitionTarget;

use crate::builder::StateMachineBuilder;
use crate::config::{EdgeDecl, StateDecl, TransitionMode};
use crate::core::{
    Payload, State, StateEntry, StateId, StateRef, TransitionHistory, TransitionRecord,
    DEFAULT_HISTORY_LIMIT,
};
use crate::dispatch::{Dispatched, LifecycleDispatcher};
use crate::error::MachineError;
use crate::graph::TransitionGraph;
use crate::registry::{StateFactory, StateRegistry};
use crate::report::{Report, ReportSink, Reporter};
use flight::Flight;
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Callback run once per state when it is wired into a machine, used by
/// hosts to inject dependencies.
pub type InitializeAction = Arc<dyn Fn(&StateRef) + Send + Sync>;

/// Lifecycle of the machine itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MachinePhase {
    Uninitialized,
    Initializing,
    Ready,
}

/// Declarations resolved on the next `initialize`.
#[derive(Default)]
pub(crate) struct Pending {
    pub(crate) states: Vec<StateDecl>,
    pub(crate) edges: Vec<EdgeDecl>,
}

pub(crate) struct Settings {
    pub(crate) mode: TransitionMode,
    pub(crate) factory: StateFactory,
    pub(crate) initialize_action: Option<InitializeAction>,
    pub(crate) report_sink: Option<ReportSink>,
    pub(crate) seed: Option<u64>,
    pub(crate) history_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: TransitionMode::Registry,
            factory: StateFactory::new(),
            initialize_action: None,
            report_sink: None,
            seed: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

pub(crate) struct MachineInner {
    mode: TransitionMode,
    registry: RwLock<StateRegistry>,
    graph: Option<RwLock<TransitionGraph>>,
    dispatcher: LifecycleDispatcher,
    factory: StateFactory,
    pending: Mutex<Pending>,
    initialize_action: RwLock<Option<InitializeAction>>,
    reporter: Reporter,
    rng: Mutex<StdRng>,
    history: Mutex<TransitionHistory>,
    phase: RwLock<MachinePhase>,
    in_flight: AtomicBool,
    updating: AtomicBool,
}

impl MachineInner {
    fn new(settings: Settings) -> Self {
        let reporter = Reporter::new();
        reporter.set_sink(settings.report_sink);
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let graph = match settings.mode {
            TransitionMode::Graph => Some(RwLock::new(TransitionGraph::new())),
            TransitionMode::Registry => None,
        };

        Self {
            mode: settings.mode,
            registry: RwLock::new(StateRegistry::new()),
            graph,
            dispatcher: LifecycleDispatcher::new(reporter.clone()),
            factory: settings.factory,
            pending: Mutex::new(Pending::default()),
            initialize_action: RwLock::new(settings.initialize_action),
            reporter,
            rng: Mutex::new(rng),
            history: Mutex::new(TransitionHistory::new(settings.history_limit)),
            phase: RwLock::new(MachinePhase::Uninitialized),
            in_flight: AtomicBool::new(false),
            updating: AtomicBool::new(false),
        }
    }

    fn set_phase(&self, phase: MachinePhase) {
        *self.phase.write() = phase;
    }

    fn run_initialize_action(&self, state: &StateRef) {
        // Cloned out so the callback runs without the lock held.
        let action = self.initialize_action.read().clone();
        if let Some(action) = action {
            action(state);
        }
    }

    /// Arm a rollback of phase and current state for an `initialize` that
    /// may be dropped before it finishes.
    fn rollback_point(&self) -> Rollback<'_> {
        let current = self.dispatcher.current();
        Rollback {
            inner: self,
            phase: *self.phase.read(),
            elapsed: self.dispatcher.time_in_state(),
            current,
            armed: true,
        }
    }

    fn record(&self, dispatched: &Dispatched) -> TransitionRecord {
        let record = dispatched.record();
        self.history.lock().record(record.clone());
        record
    }
}

/// Restores phase and current state when dropped while armed.
///
/// States instantiated and edges connected before the drop stay in place.
struct Rollback<'a> {
    inner: &'a MachineInner,
    phase: MachinePhase,
    current: Option<StateRef>,
    elapsed: f32,
    armed: bool,
}

impl Rollback<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.inner
            .dispatcher
            .restore(self.current.as_ref(), self.elapsed);
        self.inner.set_phase(self.phase);
        tracing::debug!(phase = ?self.phase, "initialize dropped, machine restored");
    }
}

/// A state machine for one entity.
///
/// All methods take `&self`; the machine is shared with its states through
/// [`MachineHandle`]s.
///
/// # Example
///
/// ```rust
/// use state_lifecycle::{StateMachine, State};
///
/// struct Idle;
/// impl State for Idle {}
///
/// struct Walk;
/// impl State for Walk {}
///
/// # tokio_test_block(async {
/// let machine = StateMachine::new();
/// machine.add_state(Idle).unwrap();
/// machine.add_state(Walk).unwrap();
///
/// machine.initialize().await.unwrap();
/// assert_eq!(machine.current_state().unwrap().name(), "Idle");
///
/// machine.transition_to("Walk", None).await.unwrap();
/// assert_eq!(machine.current_state().unwrap().name(), "Walk");
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct StateMachine {
    inner: Arc<MachineInner>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// An empty machine in registry mode.
    pub fn new() -> Self {
        Self::from_settings(Settings::default())
    }

    /// An empty machine in graph mode.
    pub fn with_graph() -> Self {
        Self::from_settings(Settings {
            mode: TransitionMode::Graph,
            ..Settings::default()
        })
    }

    pub fn builder() -> StateMachineBuilder {
        StateMachineBuilder::new()
    }

    pub(crate) fn from_settings(settings: Settings) -> Self {
        Self::from_inner(Arc::new(MachineInner::new(settings)))
    }

    pub(crate) fn from_inner(inner: Arc<MachineInner>) -> Self {
        Self { inner }
    }

    pub fn handle(&self) -> MachineHandle {
        MachineHandle::new(&self.inner)
    }

    pub fn phase(&self) -> MachinePhase {
        *self.inner.phase.read()
    }

    pub fn mode(&self) -> TransitionMode {
        self.inner.mode
    }

    pub fn current_state(&self) -> Option<StateRef> {
        self.inner.dispatcher.current()
    }

    /// Snapshot of the registered states in insertion order.
    pub fn states(&self) -> Vec<StateRef> {
        self.inner.registry.read().states().to_vec()
    }

    /// Registered states carrying `name`, in insertion order.
    pub fn states_named(&self, name: &str) -> Vec<StateRef> {
        self.inner
            .registry
            .read()
            .find_by_name(name)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn history(&self) -> TransitionHistory {
        self.inner.history.lock().clone()
    }

    /// Seconds of `update` time accumulated in the current state.
    pub fn time_in_state(&self) -> f32 {
        self.inner.dispatcher.time_in_state()
    }

    /// Whether a lifecycle operation is currently in flight.
    pub fn is_transitioning(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    pub fn factory(&self) -> &StateFactory {
        &self.inner.factory
    }

    /// Install the dependency-injection callback.
    ///
    /// `initialize` runs it for every registered state; states added after
    /// initialization get it when they are registered.
    pub fn set_state_initialize_action<F>(&self, action: F)
    where
        F: Fn(&StateRef) + Send + Sync + 'static,
    {
        *self.inner.initialize_action.write() = Some(Arc::new(action));
    }

    pub fn set_report_sink<F>(&self, sink: F)
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        self.inner.reporter.set_sink(Some(Arc::new(sink)));
    }

    /// Bring the machine up, or back up.
    ///
    /// Forgets the current state without exiting it, instantiates declared
    /// state types, runs the injection callback for every state, resolves
    /// declared edges and enters the initial state. An empty machine ends up
    /// ready with no current state and a warning report.
    ///
    /// Dropping the future before it completes puts the previous phase and
    /// current state back.
    pub async fn initialize(&self) -> Result<Option<StateRef>, MachineError> {
        let Some(_flight) = Flight::acquire(&self.inner.in_flight) else {
            return self.fail(MachineError::TransitionInProgress);
        };
        let rollback = self.inner.rollback_point();
        self.inner.set_phase(MachinePhase::Initializing);
        self.inner.dispatcher.reset();

        let pending = std::mem::take(&mut *self.inner.pending.lock());
        for decl in &pending.states {
            self.instantiate_declared(decl);
        }
        for state in self.states() {
            self.inner.run_initialize_action(&state);
        }
        for edge in &pending.edges {
            if let Err(err) = self.connect_names(&edge.from, &edge.to) {
                self.inner.reporter.report(&err);
            }
        }

        let initial = self.inner.registry.read().initial_state().cloned();
        let Some(initial) = initial else {
            self.inner.reporter.report(&MachineError::EmptyRegistry);
            self.inner.set_phase(MachinePhase::Ready);
            rollback.disarm();
            return Ok(None);
        };

        let dispatched = self.inner.dispatcher.transition(initial.clone(), None).await;
        self.inner.record(&dispatched);
        self.inner.set_phase(MachinePhase::Ready);
        rollback.disarm();
        tracing::debug!(initial = initial.name(), "state machine initialized");
        Ok(Some(initial))
    }

    /// Resolve `target` and run the exit-then-enter protocol.
    ///
    /// Resolution failures leave the current state untouched and are
    /// reported once. Hook failures are reported but the transition still
    /// completes.
    pub async fn transition_to(
        &self,
        target: impl Into<TransitionTarget>,
        data: Option<Payload>,
    ) -> Result<TransitionRecord, MachineError> {
        let target = target.into();
        let Some(_flight) = Flight::acquire(&self.inner.in_flight) else {
            return self.fail(MachineError::TransitionInProgress);
        };
        if self.phase() != MachinePhase::Ready {
            return self.fail(MachineError::NotInitialized);
        }

        let resolved = match self.resolve(&target) {
            Ok(resolved) => resolved,
            Err(err) => return self.fail(err),
        };
        let dispatched = self.inner.dispatcher.transition(resolved, data).await;
        Ok(self.inner.record(&dispatched))
    }

    pub async fn transition_to_name(
        &self,
        name: &str,
        data: Option<Payload>,
    ) -> Result<TransitionRecord, MachineError> {
        self.transition_to(TransitionTarget::from(name), data).await
    }

    /// Transition to the first state of type `S`, optionally with `name`.
    pub async fn transition_to_type<S: State>(
        &self,
        name: Option<&str>,
        data: Option<Payload>,
    ) -> Result<TransitionRecord, MachineError> {
        let target = match name {
            Some(name) => TransitionTarget::of_type_named::<S>(name),
            None => TransitionTarget::of_type::<S>(),
        };
        self.transition_to(target, data).await
    }

    /// Forward a tick to the current state. Failures are reported only.
    ///
    /// While `on_update` runs, the state set and edges are frozen but the
    /// hook may still call `transition_to`. A nested `update` is ignored.
    pub async fn update(&self, delta: f32) {
        let Some(_updating) = Flight::acquire(&self.inner.updating) else {
            tracing::warn!("update ignored, another update is running");
            return;
        };
        self.inner.dispatcher.update(delta).await;
    }

    pub fn add_state<S: State>(&self, state: S) -> Result<StateRef, MachineError> {
        self.add_state_ref(StateEntry::new(state))
    }

    /// Register a pre-built entry. Does not trigger a transition.
    pub fn add_state_ref(&self, state: StateRef) -> Result<StateRef, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        let run_action = self.phase() == MachinePhase::Ready;
        self.register(state, run_action)
    }

    /// Build a state from a factory tag and register it.
    pub fn add_state_type(&self, tag: &str) -> Result<StateRef, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        let state = match self.inner.factory.instantiate(tag) {
            Ok(state) => state,
            Err(err) => return self.fail(err),
        };
        let run_action = self.phase() == MachinePhase::Ready;
        self.register(state, run_action)
    }

    /// Unregister a state and drop its edges.
    ///
    /// Returns `Ok(false)` when the state was not registered. The current
    /// state cannot be removed.
    pub fn remove_state(&self, state: &StateRef) -> Result<bool, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        if self.inner.dispatcher.current_id() == Some(state.id()) {
            let err = MachineError::StateIsCurrent {
                name: state.name().to_owned(),
            };
            tracing::warn!(error = %err, "state not removed");
            return Err(err);
        }

        if self.inner.registry.write().unregister(state.id()).is_none() {
            return Ok(false);
        }
        let pruned = self
            .inner
            .graph
            .as_ref()
            .map_or(0, |graph| graph.write().prune(state.id()));
        tracing::debug!(state = state.name(), pruned_edges = pruned, "state removed");
        Ok(true)
    }

    /// Mark `state` as the one `initialize` enters. Returns false, changing
    /// nothing, unless the state is registered here and no lifecycle
    /// operation is running.
    pub fn set_initial_state(&self, state: &StateRef) -> bool {
        let Ok(_flight) = self.acquire_for_mutation() else {
            return false;
        };
        self.inner.registry.write().set_initial(state.id())
    }

    /// Drop every state, edge, declaration and history record.
    pub fn clear(&self) -> Result<(), MachineError> {
        let _flight = self.acquire_for_mutation()?;
        self.inner.dispatcher.reset();
        self.inner.registry.write().clear();
        if let Some(graph) = &self.inner.graph {
            graph.write().clear();
        }
        *self.inner.pending.lock() = Pending::default();
        self.inner.history.lock().clear();
        self.inner.set_phase(MachinePhase::Uninitialized);
        tracing::debug!("state machine cleared");
        Ok(())
    }

    /// Permit `from -> to`. Returns false if the edge already existed.
    pub fn add_edge(&self, from: &StateRef, to: &StateRef) -> Result<bool, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        let graph = self.graph()?;
        {
            let registry = self.inner.registry.read();
            for state in [from, to] {
                if !registry.contains(state.id()) {
                    return Err(MachineError::NotFound {
                        target: TransitionTarget::from(state).to_string(),
                    });
                }
            }
        }
        Ok(graph.write().add_edge(from.id(), to.id()))
    }

    pub fn remove_edge(&self, from: &StateRef, to: &StateRef) -> Result<bool, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        Ok(self.graph()?.write().remove_edge(from.id(), to.id()))
    }

    /// Add edges from every state named `from` to every state named `to`.
    /// Returns how many new edges were added.
    pub fn connect(&self, from: &str, to: &str) -> Result<usize, MachineError> {
        let _flight = self.acquire_for_mutation()?;
        self.connect_names(from, to)
    }

    pub fn has_edge(&self, from: &StateRef, to: &StateRef) -> bool {
        self.inner
            .graph
            .as_ref()
            .is_some_and(|graph| graph.read().has_edge(from.id(), to.id()))
    }

    /// Targets reachable from `state` along edges, in edge order. Always
    /// empty in registry mode.
    pub fn available_transitions(&self, state: &StateRef) -> Vec<StateId> {
        self.inner
            .graph
            .as_ref()
            .map(|graph| graph.read().targets_from(state.id()))
            .unwrap_or_default()
    }

    pub(crate) fn declare(&self, states: Vec<StateDecl>, edges: Vec<EdgeDecl>) {
        let mut pending = self.inner.pending.lock();
        pending.states.extend(states);
        pending.edges.extend(edges);
    }

    /// Bind, run the injection callback, append. The callback runs with no
    /// lock held.
    pub(crate) fn register(
        &self,
        state: StateRef,
        run_action: bool,
    ) -> Result<StateRef, MachineError> {
        if self.inner.registry.read().contains(state.id()) {
            let err = MachineError::AlreadyRegistered {
                name: state.name().to_owned(),
            };
            tracing::warn!(error = %err, "state not registered");
            return Err(err);
        }
        state.bind(&self.handle())?;
        if run_action {
            self.inner.run_initialize_action(&state);
        }
        self.inner.registry.write().register(state.clone())?;
        tracing::debug!(state = state.name(), id = %state.id(), "state registered");
        Ok(state)
    }

    fn instantiate_declared(&self, decl: &StateDecl) {
        let state = match self
            .inner
            .factory
            .instantiate_named(&decl.tag, decl.name.as_deref())
        {
            Ok(state) => state,
            Err(err) => {
                self.inner.reporter.report(&err);
                return;
            }
        };
        match self.register(state, false) {
            Ok(state) if decl.initial => {
                self.inner.registry.write().set_initial(state.id());
            }
            Ok(_) => {}
            Err(err) => self.inner.reporter.report(&err),
        }
    }

    fn connect_names(&self, from: &str, to: &str) -> Result<usize, MachineError> {
        let graph = self.graph()?;
        let registry = self.inner.registry.read();
        let sources = registry.find_by_name(from);
        let targets = registry.find_by_name(to);
        for (name, matches) in [(from, &sources), (to, &targets)] {
            if matches.is_empty() {
                return Err(MachineError::NotFound {
                    target: TransitionTarget::from(name).to_string(),
                });
            }
        }

        let mut graph = graph.write();
        let mut added = 0;
        for source in &sources {
            for target in &targets {
                if graph.add_edge(source.id(), target.id()) {
                    added += 1;
                }
            }
        }
        Ok(added)
    }

    fn resolve(&self, target: &TransitionTarget) -> Result<StateRef, MachineError> {
        let current = self.inner.dispatcher.current();
        let registry = self.inner.registry.read();
        let graph = self.inner.graph.as_ref().map(|graph| graph.read());
        let not_found = || MachineError::NotFound {
            target: target.to_string(),
        };

        let resolved = match target {
            TransitionTarget::Id(id) => registry.get(*id).cloned().ok_or_else(not_found)?,
            TransitionTarget::Name(name) => registry
                .pick_by_name(name, &mut *self.inner.rng.lock())?
                .clone(),
            TransitionTarget::Type {
                type_id,
                type_name,
                name,
            } => registry
                .find_by_type_id(*type_id, type_name, name.as_deref())?
                .clone(),
            TransitionTarget::Edge(index) => {
                let graph = graph.as_ref().ok_or_else(not_found)?;
                let from = current.as_ref().ok_or_else(not_found)?;
                graph
                    .target_at(from.id(), *index)
                    .and_then(|id| registry.get(id))
                    .cloned()
                    .ok_or_else(not_found)?
            }
        };

        if let Some(graph) = &graph {
            if !graph.permits(current.as_ref().map(|c| c.id()), resolved.id()) {
                return Err(MachineError::TransitionNotAllowed {
                    from: current
                        .as_ref()
                        .map(|c| c.name().to_owned())
                        .unwrap_or_default(),
                    to: resolved.name().to_owned(),
                });
            }
        }
        Ok(resolved)
    }

    fn graph(&self) -> Result<&RwLock<TransitionGraph>, MachineError> {
        self.inner.graph.as_ref().ok_or(MachineError::GraphDisabled)
    }

    fn acquire_for_mutation(&self) -> Result<Flight<'_>, MachineError> {
        let flight = if self.inner.updating.load(Ordering::Acquire) {
            None
        } else {
            Flight::acquire(&self.inner.in_flight)
        };
        flight.ok_or_else(|| {
            tracing::warn!("registry change rejected while a lifecycle hook is running");
            MachineError::RegistryBusy
        })
    }

    fn fail<T>(&self, err: MachineError) -> Result<T, MachineError> {
        self.inner.reporter.report(&err);
        Err(err)
    }
}

impl fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("mode", &self.mode())
            .field("phase", &self.phase())
            .field("states", &self.inner.registry.read().len())
            .field("current", &self.current_state().map(|s| s.name().to_owned()))
            .finish()
    }
}
