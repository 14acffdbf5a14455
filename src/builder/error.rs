//! Errors raised while assembling a machine.

use crate::config::ConfigIssue;
use crate::error::MachineError;
use thiserror::Error;

/// Errors that can occur when building a state machine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    #[error("No factory registered for state tag '{tag}'. Call .factory(..) first")]
    MissingFactory { tag: String },

    #[error("Edges were declared but the machine is not in graph mode. Call .graph()")]
    EdgesRequireGraph,

    #[error("{count} states are marked initial, at most one may be")]
    MultipleInitialStates { count: usize },

    #[error("Invalid config: {}", join_issues(.issues))]
    InvalidConfig { issues: Vec<ConfigIssue> },

    #[error("State registration failed: {0}")]
    Registration(#[from] MachineError),
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
