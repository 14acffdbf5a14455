//! Builder API for assembling state machines.
//!
//! [`StateMachineBuilder`] collects states, factory tags, edges and
//! tunables, checks them together and produces a [`StateMachine`] that is
//! ready for [`initialize`](crate::machine::StateMachine::initialize).
//! Declarations that name states (factory tags and edges) are resolved
//! when the machine initializes, not when it is built.
//!
//! [`StateMachine`]: crate::machine::StateMachine

pub mod error;
pub mod machine;
pub mod macros;

pub use error::BuildError;
pub use machine::StateMachineBuilder;
