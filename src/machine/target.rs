//! The ways a caller can name the state to transition to.

use crate::core::{State, StateId, StateRef};
use crate::registry::describe_type;
use std::any::TypeId;
use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionTarget {
    /// A registered state by identity.
    Id(StateId),
    /// Any state carrying this name; ties are broken at random.
    Name(String),
    /// The first state of a concrete type, optionally with a given name.
    /// Unlike `Name`, ties resolve deterministically in registration order.
    Type {
        type_id: TypeId,
        type_name: &'static str,
        name: Option<String>,
    },
    /// The n-th outgoing edge of the current state (graph mode only).
    Edge(usize),
}

impl TransitionTarget {
    pub fn of_type<S: State>() -> Self {
        Self::Type {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            name: None,
        }
    }

    pub fn of_type_named<S: State>(name: impl Into<String>) -> Self {
        Self::Type {
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            name: Some(name.into()),
        }
    }

    pub fn edge(index: usize) -> Self {
        Self::Edge(index)
    }
}

impl fmt::Display for TransitionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "state {id}"),
            Self::Name(name) => write!(f, "state '{name}'"),
            Self::Type {
                type_name, name, ..
            } => f.write_str(&describe_type(type_name, name.as_deref())),
            Self::Edge(index) => write!(f, "edge #{index} of the current state"),
        }
    }
}

impl From<&StateRef> for TransitionTarget {
    fn from(state: &StateRef) -> Self {
        Self::Id(state.id())
    }
}

impl From<StateId> for TransitionTarget {
    fn from(id: StateId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for TransitionTarget {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for TransitionTarget {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}
