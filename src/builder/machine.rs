//! Builder for constructing state machines.

use crate::builder::error::BuildError;
use crate::config::{EdgeDecl, MachineConfig, StateDecl, TransitionMode};
use crate::core::{State, StateEntry, StateRef, DEFAULT_HISTORY_LIMIT};
use crate::machine::{InitializeAction, Settings, StateMachine};
use crate::registry::StateFactory;
use crate::report::{Report, ReportSink};
use std::sync::Arc;

/// Fluent builder for [`StateMachine`].
///
/// # Example
///
/// ```
/// use state_lifecycle::{unit_states, StateMachine};
/// use state_lifecycle::registry::StateFactory;
///
/// unit_states! { Idle, Chase }
///
/// let machine = StateMachine::builder()
///     .graph()
///     .factory(StateFactory::new().with_default::<Chase>("chase"))
///     .initial(Idle)
///     .state_type("chase")
///     .edge("Idle", "Chase")
///     .seed(7)
///     .build()
///     .unwrap();
///
/// assert_eq!(machine.states().len(), 1);
/// ```
pub struct StateMachineBuilder {
    mode: TransitionMode,
    factory: StateFactory,
    states: Vec<(StateRef, bool)>,
    declared: Vec<StateDecl>,
    edges: Vec<EdgeDecl>,
    initialize_action: Option<InitializeAction>,
    report_sink: Option<ReportSink>,
    seed: Option<u64>,
    history_limit: usize,
}

impl StateMachineBuilder {
    pub fn new() -> Self {
        Self {
            mode: TransitionMode::Registry,
            factory: StateFactory::new(),
            states: Vec::new(),
            declared: Vec::new(),
            edges: Vec::new(),
            initialize_action: None,
            report_sink: None,
            seed: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Add a state instance.
    pub fn state<S: State>(self, state: S) -> Self {
        self.state_ref(StateEntry::new(state))
    }

    /// Add a pre-built entry, e.g. one created with [`StateEntry::named`].
    pub fn state_ref(mut self, state: StateRef) -> Self {
        self.states.push((state, false));
        self
    }

    /// Add a state instance and mark it initial.
    pub fn initial<S: State>(self, state: S) -> Self {
        self.initial_ref(StateEntry::new(state))
    }

    pub fn initial_ref(mut self, state: StateRef) -> Self {
        self.states.push((state, true));
        self
    }

    /// Declare a state to be built from a factory tag on `initialize`.
    pub fn state_type(self, tag: impl Into<String>) -> Self {
        self.declare(StateDecl::new(tag))
    }

    pub fn initial_type(self, tag: impl Into<String>) -> Self {
        self.declare(StateDecl::new(tag).as_initial())
    }

    pub fn declare(mut self, decl: StateDecl) -> Self {
        self.declared.push(decl);
        self
    }

    pub fn mode(mut self, mode: TransitionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Switch to graph mode.
    pub fn graph(self) -> Self {
        self.mode(TransitionMode::Graph)
    }

    /// Permit transitions from every state named `from` to every state named
    /// `to`. Names are resolved on `initialize`.
    pub fn edge(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.edges.push(EdgeDecl::new(from, to));
        self
    }

    pub fn factory(mut self, factory: StateFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Dependency-injection callback; see
    /// [`StateMachine::set_state_initialize_action`].
    pub fn on_state_initialize<F>(mut self, action: F) -> Self
    where
        F: Fn(&StateRef) + Send + Sync + 'static,
    {
        self.initialize_action = Some(Arc::new(action));
        self
    }

    pub fn report_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Report) + Send + Sync + 'static,
    {
        self.report_sink = Some(Arc::new(sink));
        self
    }

    /// Seed the duplicate-name tie-break for reproducible runs.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Apply a declarative config on top of what was set so far.
    ///
    /// Every config issue is returned together rather than the first one.
    pub fn config(mut self, config: MachineConfig) -> Result<Self, BuildError> {
        let issues = config.issues();
        if !issues.is_empty() {
            return Err(BuildError::InvalidConfig { issues });
        }

        self.mode = config.mode;
        self.declared.extend(config.states);
        self.edges.extend(config.edges);
        self.history_limit = config.history_limit;
        self.seed = config.seed.or(self.seed);
        Ok(self)
    }

    /// Build the state machine.
    /// Returns an error if the collected declarations contradict each other.
    pub fn build(self) -> Result<StateMachine, BuildError> {
        if !self.edges.is_empty() && self.mode != TransitionMode::Graph {
            return Err(BuildError::EdgesRequireGraph);
        }
        let count = self.states.iter().filter(|(_, initial)| *initial).count()
            + self.declared.iter().filter(|decl| decl.initial).count();
        if count > 1 {
            return Err(BuildError::MultipleInitialStates { count });
        }
        if let Some(decl) = self
            .declared
            .iter()
            .find(|decl| !self.factory.contains(&decl.tag))
        {
            return Err(BuildError::MissingFactory {
                tag: decl.tag.clone(),
            });
        }

        let machine = StateMachine::from_settings(Settings {
            mode: self.mode,
            factory: self.factory,
            initialize_action: self.initialize_action,
            report_sink: self.report_sink,
            seed: self.seed,
            history_limit: self.history_limit,
        });
        for (state, initial) in self.states {
            let state = machine.register(state, false)?;
            if initial {
                machine.set_initial_state(&state);
            }
        }
        machine.declare(self.declared, self.edges);

        Ok(machine)
    }
}

impl Default for StateMachineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
