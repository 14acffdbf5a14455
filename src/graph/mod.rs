//! Explicit transition graph.
//!
//! When a machine runs in graph mode a transition is only permitted along a
//! directed edge from the current state to the target. Edges are ordered by
//! insertion; that order defines edge indices for index-based transitions.

use crate::core::StateId;
use serde::{Deserialize, Serialize};

/// Directed permission to go from one state to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub from: StateId,
    pub to: StateId,
}

impl Edge {
    pub fn new(from: StateId, to: StateId) -> Self {
        Self { from, to }
    }

    pub fn touches(&self, id: StateId) -> bool {
        self.from == id || self.to == id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionGraph {
    edges: Vec<Edge>,
}

impl TransitionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `from -> to`. Returns false if the edge already existed.
    pub fn add_edge(&mut self, from: StateId, to: StateId) -> bool {
        let edge = Edge::new(from, to);
        if self.edges.contains(&edge) {
            return false;
        }
        self.edges.push(edge);
        true
    }

    /// Remove `from -> to`. Returns false if there was no such edge.
    pub fn remove_edge(&mut self, from: StateId, to: StateId) -> bool {
        let before = self.edges.len();
        self.edges.retain(|e| *e != Edge::new(from, to));
        self.edges.len() != before
    }

    pub fn has_edge(&self, from: StateId, to: StateId) -> bool {
        self.edges.contains(&Edge::new(from, to))
    }

    /// Whether a machine currently in `current` may move to `to`.
    ///
    /// Without a current state nothing is constrained yet.
    pub fn permits(&self, current: Option<StateId>, to: StateId) -> bool {
        current.is_none_or(|from| self.has_edge(from, to))
    }

    /// Targets reachable from `from`, in edge insertion order.
    pub fn targets_from(&self, from: StateId) -> Vec<StateId> {
        self.edges
            .iter()
            .filter(|e| e.from == from)
            .map(|e| e.to)
            .collect()
    }

    /// The `index`-th outgoing target of `from`.
    pub fn target_at(&self, from: StateId, index: usize) -> Option<StateId> {
        self.edges
            .iter()
            .filter(|e| e.from == from)
            .nth(index)
            .map(|e| e.to)
    }

    /// Drop every edge touching `id`. Returns how many were removed.
    pub fn prune(&mut self, id: StateId) -> usize {
        let before = self.edges.len();
        self.edges.retain(|e| !e.touches(id));
        before - self.edges.len()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn clear(&mut self) {
        self.edges.clear();
    }
}
