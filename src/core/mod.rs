//! Core state types.
//!
//! This module contains the building blocks every other layer works with:
//! - The `State` trait and its lifecycle hook contexts
//! - `StateEntry`, the registered wrapper carrying identity and type tag
//! - Bounded transition history

mod history;
mod state;

pub use history::{StateSummary, TransitionHistory, TransitionRecord, DEFAULT_HISTORY_LIMIT};
pub use state::{
    payload, EnterContext, ExitContext, Hook, HookResult, Payload, State, StateEntry, StateId,
    StateRef, UpdateContext,
};
