//! Error taxonomy shared by the registry, graph, dispatcher and machine.

use crate::core::{Hook, StateId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How loudly a reported error is logged.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// Errors raised by the state machine.
///
/// None of these ever interrupt the host: resolution and lifecycle failures
/// are reported and returned as values, hook failures are only reported.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MachineError {
    #[error("no state matches {target}")]
    NotFound { target: String },

    #[error("no edge from '{from}' to '{to}'")]
    TransitionNotAllowed { from: String, to: String },

    #[error("{hook} of state '{name}' ({state}) failed: {message}")]
    HookFailure {
        state: StateId,
        name: String,
        hook: Hook,
        message: String,
    },

    #[error("could not instantiate state type '{tag}': {reason}")]
    InstantiationFailure { tag: String, reason: String },

    #[error("machine has no registered states")]
    EmptyRegistry,

    #[error("machine is not initialized")]
    NotInitialized,

    #[error("another transition is already in flight")]
    TransitionInProgress,

    #[error("states and edges cannot change while a transition is in flight")]
    RegistryBusy,

    #[error("state '{name}' is already registered")]
    AlreadyRegistered { name: String },

    #[error("state '{name}' belongs to another machine")]
    ForeignState { name: String },

    #[error("state '{name}' is the current state")]
    StateIsCurrent { name: String },

    #[error("transition graph is not enabled on this machine")]
    GraphDisabled,
}

impl MachineError {
    pub fn severity(&self) -> Severity {
        match self {
            Self::EmptyRegistry | Self::AlreadyRegistered { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// True for failures that leave the machine untouched because the
    /// requested target could not be resolved or reached.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::TransitionNotAllowed { .. }
        )
    }
}
