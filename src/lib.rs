//! State Lifecycle: an async state machine for game and simulation entities
//!
//! Each entity owns a [`StateMachine`] holding a set of behaviour objects
//! ("states"). At most one of them is current. Moving between states runs
//! the previous state's exit hook and then the target's enter hook; host
//! ticks are forwarded to the current state only.
//!
//! # Core Concepts
//!
//! - **State**: a behaviour object implementing the async [`State`] hooks
//! - **Registry**: the ordered set of states a machine owns, addressed by
//!   identity, name or concrete type
//! - **Graph mode**: optional directed edges restricting which states may
//!   follow the current one
//! - **Reports**: lifecycle failures never abort the machine; they go to
//!   `tracing` and to an optional host sink
//!
//! # Example
//!
//! ```rust
//! use state_lifecycle::core::{payload, EnterContext, HookResult};
//! use state_lifecycle::{async_trait, State, StateMachine};
//!
//! struct Idle;
//! impl State for Idle {}
//!
//! struct Chase;
//!
//! #[async_trait]
//! impl State for Chase {
//!     async fn on_enter(&self, cx: EnterContext<'_>) -> HookResult {
//!         let target = cx.data_as::<&'static str>().copied().unwrap_or("nobody");
//!         println!("chasing {target}");
//!         Ok(())
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let machine = StateMachine::new();
//! machine.add_state(Idle).unwrap();
//! machine.add_state(Chase).unwrap();
//!
//! machine.initialize().await.unwrap();
//! machine
//!     .transition_to("Chase", Some(payload("player")))
//!     .await
//!     .unwrap();
//! machine.update(0.016).await;
//!
//! assert_eq!(machine.current_state().unwrap().name(), "Chase");
//! assert_eq!(machine.history().len(), 2);
//! # });
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod graph;
pub mod machine;
pub mod registry;
pub mod report;

pub use async_trait::async_trait;

// Re-export commonly used types
pub use builder::{BuildError, StateMachineBuilder};
pub use config::{MachineConfig, TransitionMode};
pub use core::{payload, Payload, State, StateEntry, StateId, StateRef};
pub use error::{MachineError, Severity};
pub use machine::{MachineHandle, MachinePhase, StateMachine, TransitionTarget};
pub use report::Report;
