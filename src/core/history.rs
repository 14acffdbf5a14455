//! Transition history tracking.
//!
//! Keeps a bounded record of the transitions a machine completed, oldest
//! first. Records are plain serializable values so hosts can ship them to
//! their own diagnostics.

use super::state::{Hook, StateId, StateRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;

/// Default number of records a machine retains.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Identity and name of a state at the time a record was taken.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSummary {
    pub id: StateId,
    pub name: String,
}

impl From<&StateRef> for StateSummary {
    fn from(state: &StateRef) -> Self {
        Self {
            id: state.id(),
            name: state.name().to_owned(),
        }
    }
}

/// Record of a single completed transition.
///
/// `from` is `None` for the transition performed by `initialize`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: Option<StateSummary>,
    pub to: StateSummary,
    pub timestamp: DateTime<Utc>,
    /// Hooks that failed while the transition ran.
    pub failed_hooks: Vec<Hook>,
}

impl TransitionRecord {
    pub fn is_clean(&self) -> bool {
        self.failed_hooks.is_empty()
    }
}

/// Bounded, ordered history of transitions.
///
/// Once `limit` records are held, recording a new one evicts the oldest.
/// A limit of zero disables recording.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    limit: usize,
    records: VecDeque<TransitionRecord>,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl TransitionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            records: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a record, evicting the oldest when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// States traversed: the `from` of the oldest record (when present),
    /// then the `to` of every record.
    pub fn path(&self) -> Vec<&StateSummary> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(from) = self.records.front().and_then(|r| r.from.as_ref()) {
            path.push(from);
        }
        path.extend(self.records.iter().map(|r| &r.to));
        path
    }

    /// Time between the oldest and newest retained record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
