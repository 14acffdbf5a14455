//! Error-reporting channel.
//!
//! Failures the machine absorbs (unresolvable targets, failing hooks,
//! states that could not be constructed) are surfaced here instead of being
//! propagated: every report becomes a `tracing` event and, when the host
//! installed one, a call to its sink.

use crate::error::{MachineError, Severity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// A single diagnostic emitted by a machine.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub severity: Severity,
    pub error: MachineError,
    pub at: DateTime<Utc>,
}

/// Host callback receiving every report.
pub type ReportSink = Arc<dyn Fn(&Report) + Send + Sync>;

/// Fans reports out to `tracing` and the optional host sink.
#[derive(Clone, Default)]
pub struct Reporter {
    sink: Arc<RwLock<Option<ReportSink>>>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: ReportSink) -> Self {
        let reporter = Self::new();
        reporter.set_sink(Some(sink));
        reporter
    }

    pub fn set_sink(&self, sink: Option<ReportSink>) {
        *self.sink.write() = sink;
    }

    pub fn report(&self, error: &MachineError) {
        let report = Report {
            severity: error.severity(),
            error: error.clone(),
            at: Utc::now(),
        };
        log(&report);

        // Clone out so the sink may replace itself.
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink(&report);
        }
    }
}

fn log(report: &Report) {
    match (&report.error, report.severity) {
        (
            MachineError::HookFailure {
                state,
                name,
                hook,
                message,
            },
            _,
        ) => {
            tracing::error!(%state, state_name = %name, %hook, error = %message, "lifecycle hook failed");
        }
        (MachineError::InstantiationFailure { tag, reason }, _) => {
            tracing::error!(%tag, %reason, "state instantiation failed, entry skipped");
        }
        (error, Severity::Warning) => tracing::warn!(%error, "state machine warning"),
        (error, Severity::Error) => tracing::error!(%error, "state machine error"),
    }
}
