//! Host-supplied table of constructible state types.
//!
//! The machine never discovers state types on its own. Hosts register a
//! constructor per type tag and the machine calls it when a tag has to be
//! turned into a live state.

use crate::core::{State, StateEntry, StateRef};
use crate::error::MachineError;
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

/// Builds a fresh state for one type tag, optionally under a given name.
pub type Constructor = Box<dyn Fn(Option<&str>) -> anyhow::Result<StateRef> + Send + Sync>;

#[derive(Default)]
pub struct StateFactory {
    constructors: BTreeMap<String, Constructor>,
}

impl StateFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fallible constructor under `tag`. A later registration for
    /// the same tag replaces the earlier one.
    pub fn register<S, F>(&mut self, tag: impl Into<String>, constructor: F)
    where
        S: State,
        F: Fn() -> anyhow::Result<S> + Send + Sync + 'static,
    {
        self.constructors.insert(
            tag.into(),
            Box::new(move |name: Option<&str>| -> anyhow::Result<StateRef> {
                let state = constructor()?;
                Ok(match name {
                    Some(name) => StateEntry::named(state, name),
                    None => StateEntry::new(state),
                })
            }),
        );
    }

    /// Register `S::default()` under `tag`.
    pub fn register_default<S: State + Default>(&mut self, tag: impl Into<String>) {
        self.register(tag, || Ok(S::default()));
    }

    /// Chainable form of [`register`](Self::register).
    pub fn with<S, F>(mut self, tag: impl Into<String>, constructor: F) -> Self
    where
        S: State,
        F: Fn() -> anyhow::Result<S> + Send + Sync + 'static,
    {
        self.register(tag, constructor);
        self
    }

    /// Chainable form of [`register_default`](Self::register_default).
    pub fn with_default<S: State + Default>(mut self, tag: impl Into<String>) -> Self {
        self.register_default::<S>(tag);
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors.contains_key(tag)
    }

    /// Registered tags in sorted order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Build a new state for `tag`, named by its `State::name`.
    pub fn instantiate(&self, tag: &str) -> Result<StateRef, MachineError> {
        self.instantiate_named(tag, None)
    }

    /// Build a new state for `tag`, overriding its name when `name` is set.
    ///
    /// An unknown tag, a constructor error and a panicking constructor all
    /// come back as `InstantiationFailure`.
    pub fn instantiate_named(
        &self,
        tag: &str,
        name: Option<&str>,
    ) -> Result<StateRef, MachineError> {
        let failure = |reason: String| MachineError::InstantiationFailure {
            tag: tag.to_owned(),
            reason,
        };
        let constructor = self
            .constructors
            .get(tag)
            .ok_or_else(|| failure("no constructor registered for this tag".into()))?;

        match panic::catch_unwind(AssertUnwindSafe(|| constructor(name))) {
            Ok(Ok(state)) => Ok(state),
            Ok(Err(err)) => Err(failure(format!("{err:#}"))),
            Err(panic) => Err(failure(format!(
                "constructor panicked: {}",
                crate::dispatch::panic_message(panic.as_ref())
            ))),
        }
    }
}

impl fmt::Debug for StateFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateFactory")
            .field("tags", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
