//! Non-owning back-reference from a state to its machine.

use super::{MachineInner, StateMachine};
use std::fmt;
use std::sync::{Arc, Weak};

/// Weak handle to a machine.
///
/// States receive one at registration. Holding it does not keep the machine
/// alive; [`upgrade`](Self::upgrade) fails once the machine is gone.
#[derive(Clone)]
pub struct MachineHandle {
    inner: Weak<MachineInner>,
}

impl MachineHandle {
    pub(crate) fn new(inner: &Arc<MachineInner>) -> Self {
        Self {
            inner: Arc::downgrade(inner),
        }
    }

    pub fn upgrade(&self) -> Option<StateMachine> {
        self.inner.upgrade().map(StateMachine::from_inner)
    }

    pub fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }

    pub fn same_machine(&self, other: &MachineHandle) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for MachineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MachineHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}
