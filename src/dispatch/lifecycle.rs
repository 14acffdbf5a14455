//! Exit-then-enter protocol and per-tick forwarding.

use super::unwind::CatchUnwind;
use crate::core::{
    EnterContext, ExitContext, Hook, Payload, StateEntry, StateId, StateRef, StateSummary,
    TransitionRecord, UpdateContext,
};
use crate::error::MachineError;
use crate::report::Reporter;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

/// Runs lifecycle hooks and owns the machine's notion of "current".
///
/// Nothing else writes the current state. The pointer is non-owning: the
/// registry owns the entries.
pub struct LifecycleDispatcher {
    current: RwLock<Option<Weak<StateEntry>>>,
    elapsed: Mutex<f32>,
    reporter: Reporter,
}

/// What a completed transition did.
#[derive(Debug)]
pub struct Dispatched {
    pub previous: Option<StateRef>,
    pub target: StateRef,
    /// `HookFailure` errors raised during the transition, already reported.
    pub failures: Vec<MachineError>,
}

impl Dispatched {
    pub fn record(&self) -> TransitionRecord {
        TransitionRecord {
            from: self.previous.as_ref().map(StateSummary::from),
            to: StateSummary::from(&self.target),
            timestamp: Utc::now(),
            failed_hooks: self
                .failures
                .iter()
                .filter_map(|failure| match failure {
                    MachineError::HookFailure { hook, .. } => Some(*hook),
                    _ => None,
                })
                .collect(),
        }
    }
}

impl LifecycleDispatcher {
    pub fn new(reporter: Reporter) -> Self {
        Self {
            current: RwLock::new(None),
            elapsed: Mutex::new(0.0),
            reporter,
        }
    }

    pub fn current(&self) -> Option<StateRef> {
        self.current.read().as_ref().and_then(Weak::upgrade)
    }

    pub fn current_id(&self) -> Option<StateId> {
        self.current().map(|state| state.id())
    }

    /// Seconds accumulated by `update` since the current state was entered.
    pub fn time_in_state(&self) -> f32 {
        *self.elapsed.lock()
    }

    /// Forget the current state without running any hook.
    pub(crate) fn reset(&self) {
        *self.current.write() = None;
        *self.elapsed.lock() = 0.0;
    }

    /// Put back a current state and its elapsed time without running any
    /// hook.
    pub(crate) fn restore(&self, current: Option<&StateRef>, elapsed: f32) {
        *self.current.write() = current.map(Arc::downgrade);
        *self.elapsed.lock() = elapsed;
    }

    /// Move to `target`.
    ///
    /// The previous state's `on_exit` completes before `target.on_enter`
    /// starts. A failing hook is reported and the protocol continues; the
    /// current state becomes `target` once both phases are done, whatever
    /// the hooks returned.
    pub async fn transition(&self, target: StateRef, data: Option<Payload>) -> Dispatched {
        let previous = self.current();
        let mut failures = Vec::new();

        if let Some(previous) = &previous {
            let cx = ExitContext {
                state: previous,
                next: &target,
            };
            if let Err(err) = CatchUnwind::new(previous.behaviour().on_exit(cx)).await {
                failures.push(self.hook_failed(previous, Hook::Exit, &err));
            }
        }

        let cx = EnterContext {
            state: &target,
            previous: previous.as_ref(),
            data: data.as_ref(),
        };
        if let Err(err) = CatchUnwind::new(target.behaviour().on_enter(cx)).await {
            failures.push(self.hook_failed(&target, Hook::Enter, &err));
        }

        *self.current.write() = Some(Arc::downgrade(&target));
        *self.elapsed.lock() = 0.0;

        tracing::debug!(
            from = previous.as_ref().map(|s| s.name()).unwrap_or("<none>"),
            to = target.name(),
            failures = failures.len(),
            "transition complete"
        );

        Dispatched {
            previous,
            target,
            failures,
        }
    }

    /// Forward a tick to the current state. Without one this does nothing.
    ///
    /// Returns the reported failure, if the hook failed.
    pub async fn update(&self, delta: f32) -> Option<MachineError> {
        let current = self.current()?;
        let elapsed = {
            let mut elapsed = self.elapsed.lock();
            *elapsed += delta;
            *elapsed
        };

        let cx = UpdateContext {
            state: &current,
            delta,
            elapsed,
        };
        let outcome = CatchUnwind::new(current.behaviour().on_update(cx)).await;
        outcome
            .err()
            .map(|err| self.hook_failed(&current, Hook::Update, &err))
    }

    fn hook_failed(&self, state: &StateRef, hook: Hook, err: &anyhow::Error) -> MachineError {
        let failure = MachineError::HookFailure {
            state: state.id(),
            name: state.name().to_owned(),
            hook,
            message: format!("{err:#}"),
        };
        self.reporter.report(&failure);
        failure
    }
}
