//! The `State` trait and the registered wrapper the machine works with.
//!
//! User code implements [`State`] for its behaviour types. The machine never
//! stores those types directly: each one is wrapped in a [`StateEntry`] that
//! carries the identity, display name, concrete type tag and the
//! back-reference to the owning machine.

use crate::error::MachineError;
use crate::machine::MachineHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Result returned by every lifecycle hook.
///
/// Hook failures never escape the machine; they are reported and the
/// transition or update carries on.
pub type HookResult = anyhow::Result<()>;

/// Opaque data handed to `on_enter` by the caller of a transition.
pub type Payload = Arc<dyn Any + Send + Sync>;

/// Shared handle to a registered state. Clones share identity.
pub type StateRef = Arc<StateEntry>;

/// Wrap a value as a transition [`Payload`].
pub fn payload<T: Any + Send + Sync>(value: T) -> Payload {
    Arc::new(value)
}

/// Identity of a registered state.
///
/// Minted once when a [`StateEntry`] is built; two entries never share an id
/// even if they wrap equal values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(Uuid);

impl StateId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which lifecycle hook a report or record refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Hook {
    Enter,
    Exit,
    Update,
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enter => "on_enter",
            Self::Exit => "on_exit",
            Self::Update => "on_update",
        };
        f.write_str(name)
    }
}

/// A unit of behaviour with asynchronous lifecycle hooks.
///
/// Every hook has a no-op default, so a marker type only needs an empty
/// `impl`. Hooks take `&self`; states that carry mutable data keep it behind
/// interior mutability. A hook may suspend (await a timer, a channel, ...)
/// and the machine awaits it before moving on.
///
/// # Example
///
/// ```rust
/// use state_lifecycle::core::{EnterContext, HookResult, State};
/// use state_lifecycle::async_trait;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// #[derive(Default)]
/// struct Patrol {
///     laps: AtomicU32,
/// }
///
/// #[async_trait]
/// impl State for Patrol {
///     async fn on_enter(&self, _cx: EnterContext<'_>) -> HookResult {
///         self.laps.store(0, Ordering::Relaxed);
///         Ok(())
///     }
/// }
///
/// assert_eq!(Patrol::default().name(), "Patrol");
/// ```
#[async_trait]
pub trait State: Any + Send + Sync {
    /// Display name used for name-based lookups.
    ///
    /// Defaults to the unqualified type name.
    fn name(&self) -> &str {
        short_type_name(std::any::type_name::<Self>())
    }

    /// Called after the previous state exited, before this state becomes
    /// current.
    async fn on_enter(&self, _cx: EnterContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called while this state is still current, before the next state
    /// enters.
    async fn on_exit(&self, _cx: ExitContext<'_>) -> HookResult {
        Ok(())
    }

    /// Called once per host tick while this state is current.
    async fn on_update(&self, _cx: UpdateContext<'_>) -> HookResult {
        Ok(())
    }
}

/// Arguments of [`State::on_enter`].
#[derive(Clone, Copy)]
pub struct EnterContext<'a> {
    /// The entry being entered (the hook's own registration).
    pub state: &'a StateRef,
    /// The state that was current before, if any.
    pub previous: Option<&'a StateRef>,
    /// Caller supplied payload.
    pub data: Option<&'a Payload>,
}

impl<'a> EnterContext<'a> {
    /// Downcast the payload to a concrete type.
    pub fn data_as<T: Any>(&self) -> Option<&'a T> {
        self.data.and_then(|data| data.downcast_ref::<T>())
    }
}

/// Arguments of [`State::on_exit`].
#[derive(Clone, Copy)]
pub struct ExitContext<'a> {
    pub state: &'a StateRef,
    /// The state about to be entered.
    pub next: &'a StateRef,
}

/// Arguments of [`State::on_update`].
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    pub state: &'a StateRef,
    /// Seconds since the previous tick.
    pub delta: f32,
    /// Seconds spent in this state, including `delta`.
    pub elapsed: f32,
}

/// A state as registered with a machine.
///
/// Holds the behaviour twice over the same allocation: once as
/// `dyn State` for dispatch and once as `dyn Any` for type queries and
/// downcasts.
pub struct StateEntry {
    id: StateId,
    name: String,
    type_id: TypeId,
    type_name: &'static str,
    behaviour: Arc<dyn State>,
    any: Arc<dyn Any + Send + Sync>,
    machine: OnceLock<MachineHandle>,
}

impl StateEntry {
    /// Wrap a behaviour, naming it with [`State::name`].
    pub fn new<S: State>(state: S) -> StateRef {
        let name = state.name().to_owned();
        Self::named(state, name)
    }

    /// Wrap a behaviour under an explicit name.
    pub fn named<S: State>(state: S, name: impl Into<String>) -> StateRef {
        let concrete = Arc::new(state);
        Arc::new(Self {
            id: StateId::new(),
            name: name.into(),
            type_id: TypeId::of::<S>(),
            type_name: std::any::type_name::<S>(),
            behaviour: concrete.clone(),
            any: concrete,
            machine: OnceLock::new(),
        })
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Concrete type tag of the wrapped behaviour.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn behaviour(&self) -> &dyn State {
        self.behaviour.as_ref()
    }

    pub fn is<S: State>(&self) -> bool {
        self.type_id == TypeId::of::<S>()
    }

    pub fn downcast_ref<S: State>(&self) -> Option<&S> {
        self.any.downcast_ref::<S>()
    }

    /// The machine this state was registered with, if any.
    ///
    /// Non-owning: the handle does not keep the machine alive.
    pub fn machine(&self) -> Option<&MachineHandle> {
        self.machine.get()
    }

    /// Bind the back-reference. The first binding wins for the lifetime of
    /// the entry.
    pub(crate) fn bind(&self, owner: &MachineHandle) -> Result<(), MachineError> {
        let bound = self.machine.get_or_init(|| owner.clone());
        if bound.same_machine(owner) {
            Ok(())
        } else {
            Err(MachineError::ForeignState {
                name: self.name.clone(),
            })
        }
    }
}

impl fmt::Debug for StateEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateEntry")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("type", &self.type_name)
            .field("bound", &self.machine.get().is_some())
            .finish()
    }
}

/// Strip the module path (and any generic arguments) from a type name.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
