//! Declarative machine configuration.
//!
//! A `MachineConfig` describes a machine by data: the transition mode, the
//! state type tags to instantiate, the edges between them by name, and a
//! few tunables. Hosts load it from JSON and hand it to the builder.
//!
//! Validation uses Stillwater's `Validation` so that every problem in a
//! config is reported in one pass rather than one at a time.
//!
//! # Example
//!
//! ```rust
//! use state_lifecycle::config::{MachineConfig, TransitionMode};
//!
//! let config = MachineConfig::from_json_str(
//!     r#"{
//!         "mode": "graph",
//!         "states": [
//!             { "tag": "idle", "initial": true },
//!             { "tag": "chase" }
//!         ],
//!         "edges": [{ "from": "Idle", "to": "Chase" }]
//!     }"#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.mode, TransitionMode::Graph);
//! assert!(config.validate().is_success());
//! ```

mod error;

pub use error::{ConfigError, ConfigIssue};

use crate::core::DEFAULT_HISTORY_LIMIT;
use serde::{Deserialize, Serialize};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;

/// How the machine decides whether a resolved target may be entered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionMode {
    /// Any registered state is reachable from any other.
    #[default]
    Registry,
    /// Only states joined by an edge from the current state are reachable.
    Graph,
}

/// A state to build from a factory tag when the machine initializes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDecl {
    pub tag: String,
    /// Overrides the name the state reports for itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub initial: bool,
}

impl StateDecl {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            name: None,
            initial: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn as_initial(mut self) -> Self {
        self.initial = true;
        self
    }
}

/// An edge between two states, by state name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeDecl {
    pub from: String,
    pub to: String,
}

impl EdgeDecl {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MachineConfig {
    pub mode: TransitionMode,
    pub states: Vec<StateDecl>,
    pub edges: Vec<EdgeDecl>,
    /// Transition records kept in history; zero disables recording.
    pub history_limit: usize,
    /// Seed for the duplicate-name tie-break. Random when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            mode: TransitionMode::default(),
            states: Vec::new(),
            edges: Vec::new(),
            history_limit: DEFAULT_HISTORY_LIMIT,
            seed: None,
        }
    }
}

type Check = Validation<(), NonEmptyVec<ConfigIssue>>;

impl MachineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the config, accumulating every issue found.
    pub fn validate(&self) -> Check {
        let mut checks = vec![self.check_single_initial(), self.check_edges_need_graph()];
        checks.extend(self.states.iter().enumerate().map(check_tag));
        checks.extend(self.edges.iter().enumerate().map(check_endpoints));

        Validation::all_vec(checks).map(|_| ())
    }

    /// Every issue [`validate`](Self::validate) finds, as a plain list.
    pub fn issues(&self) -> Vec<ConfigIssue> {
        match self.validate() {
            Validation::Success(_) => Vec::new(),
            Validation::Failure(issues) => issues.iter().cloned().collect(),
        }
    }

    fn check_single_initial(&self) -> Check {
        let count = self.states.iter().filter(|s| s.initial).count();
        if count > 1 {
            Validation::fail(ConfigIssue::MultipleInitial { count })
        } else {
            Validation::success(())
        }
    }

    fn check_edges_need_graph(&self) -> Check {
        if !self.edges.is_empty() && self.mode != TransitionMode::Graph {
            Validation::fail(ConfigIssue::EdgesWithoutGraph {
                count: self.edges.len(),
            })
        } else {
            Validation::success(())
        }
    }
}

fn check_tag((index, decl): (usize, &StateDecl)) -> Check {
    if decl.tag.trim().is_empty() {
        Validation::fail(ConfigIssue::EmptyTag { index })
    } else {
        Validation::success(())
    }
}

fn check_endpoints((index, edge): (usize, &EdgeDecl)) -> Check {
    if edge.from.trim().is_empty() || edge.to.trim().is_empty() {
        Validation::fail(ConfigIssue::EmptyEdgeEndpoint { index })
    } else {
        Validation::success(())
    }
}
