//! Ordered set of registered states and the lookups over it.
//!
//! Entries are unique by identity; names may repeat. Insertion order is
//! preserved and doubles as the fallback for picking the initial state.

mod factory;

pub use factory::{Constructor, StateFactory};

use crate::core::{State, StateId, StateRef};
use crate::error::MachineError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::any::TypeId;

#[derive(Debug, Default)]
pub struct StateRegistry {
    entries: Vec<StateRef>,
    initial: Option<StateId>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a state. A state already present by identity is rejected and
    /// the registry is left untouched.
    pub fn register(&mut self, state: StateRef) -> Result<(), MachineError> {
        if self.contains(state.id()) {
            return Err(MachineError::AlreadyRegistered {
                name: state.name().to_owned(),
            });
        }
        self.entries.push(state);
        Ok(())
    }

    /// Remove by identity. Unmarks the initial state if it was this one.
    pub fn unregister(&mut self, id: StateId) -> Option<StateRef> {
        let index = self.entries.iter().position(|s| s.id() == id)?;
        if self.initial == Some(id) {
            self.initial = None;
        }
        Some(self.entries.remove(index))
    }

    pub fn contains(&self, id: StateId) -> bool {
        self.entries.iter().any(|s| s.id() == id)
    }

    pub fn get(&self, id: StateId) -> Option<&StateRef> {
        self.entries.iter().find(|s| s.id() == id)
    }

    /// Every entry carrying `name`, in insertion order.
    pub fn find_by_name(&self, name: &str) -> Vec<&StateRef> {
        self.entries.iter().filter(|s| s.name() == name).collect()
    }

    /// Resolve a name to a single entry.
    ///
    /// Several entries sharing the name are a tie broken uniformly at random,
    /// not by insertion order.
    pub fn pick_by_name<R: Rng + ?Sized>(
        &self,
        name: &str,
        rng: &mut R,
    ) -> Result<&StateRef, MachineError> {
        let matches = self.find_by_name(name);
        match matches.as_slice() {
            [only] => Ok(*only),
            many => many
                .choose(rng)
                .copied()
                .ok_or_else(|| MachineError::NotFound {
                    target: format!("state '{name}'"),
                }),
        }
    }

    /// First entry whose concrete type is `S`, optionally also matching
    /// `name`.
    pub fn find_by_type<S: State>(&self, name: Option<&str>) -> Result<&StateRef, MachineError> {
        self.find_by_type_id(TypeId::of::<S>(), std::any::type_name::<S>(), name)
    }

    pub fn find_by_type_id(
        &self,
        type_id: TypeId,
        type_name: &str,
        name: Option<&str>,
    ) -> Result<&StateRef, MachineError> {
        self.entries
            .iter()
            .filter(|s| s.type_id() == type_id)
            .find(|s| name.is_none_or(|n| s.name() == n))
            .ok_or_else(|| MachineError::NotFound {
                target: describe_type(type_name, name),
            })
    }

    /// Mark a registered state as initial. Returns false, changing nothing,
    /// when `id` is not registered.
    pub fn set_initial(&mut self, id: StateId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.initial = Some(id);
        true
    }

    pub fn clear_initial(&mut self) {
        self.initial = None;
    }

    pub fn initial_marker(&self) -> Option<StateId> {
        self.initial
    }

    /// The marked entry, else the first registered one.
    pub fn initial_state(&self) -> Option<&StateRef> {
        self.initial
            .and_then(|id| self.get(id))
            .or_else(|| self.entries.first())
    }

    pub fn states(&self) -> &[StateRef] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &StateRef> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.initial = None;
    }
}

pub(crate) fn describe_type(type_name: &str, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("type {type_name} named '{name}'"),
        None => format!("type {type_name}"),
    }
}
