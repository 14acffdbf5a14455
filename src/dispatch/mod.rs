//! Lifecycle dispatch.
//!
//! The dispatcher is the only place hooks are awaited and the only place the
//! current state changes:
//!
//! - **Transitions**: `on_exit` of the previous state, then `on_enter` of the
//!   target, then the current pointer moves
//! - **Updates**: ticks go to the current state only
//! - **Isolation**: a hook returning `Err` or panicking is reported and
//!   never aborts the protocol

mod lifecycle;
mod unwind;

pub use lifecycle::{Dispatched, LifecycleDispatcher};
pub(crate) use unwind::panic_message;
