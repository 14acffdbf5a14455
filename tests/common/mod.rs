//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use anyhow::bail;
use parking_lot::Mutex;
use state_lifecycle::core::{EnterContext, ExitContext, HookResult, UpdateContext};
use state_lifecycle::{async_trait, Report, State, StateMachine};
use std::sync::Arc;

/// Ordered record of hook calls across every probe sharing it.
pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

/// A state that writes `enter:<name>`, `exit:<name>` and `update:<name>` to
/// a shared log and can be told to fail any of its hooks.
pub struct Probe {
    name: String,
    log: Log,
    fail_enter: bool,
    fail_exit: bool,
    fail_update: bool,
}

impl Probe {
    pub fn new(name: &str, log: &Log) -> Self {
        Self {
            name: name.to_owned(),
            log: log.clone(),
            fail_enter: false,
            fail_exit: false,
            fail_update: false,
        }
    }

    pub fn failing_enter(mut self) -> Self {
        self.fail_enter = true;
        self
    }

    pub fn failing_exit(mut self) -> Self {
        self.fail_exit = true;
        self
    }

    pub fn failing_update(mut self) -> Self {
        self.fail_update = true;
        self
    }

    fn push(&self, event: &str) {
        self.log.lock().push(format!("{event}:{}", self.name));
    }
}

#[async_trait]
impl State for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn on_enter(&self, _cx: EnterContext<'_>) -> HookResult {
        tokio::task::yield_now().await;
        self.push("enter");
        if self.fail_enter {
            bail!("{} refused to enter", self.name);
        }
        Ok(())
    }

    async fn on_exit(&self, _cx: ExitContext<'_>) -> HookResult {
        tokio::task::yield_now().await;
        self.push("exit");
        if self.fail_exit {
            bail!("{} refused to exit", self.name);
        }
        Ok(())
    }

    async fn on_update(&self, _cx: UpdateContext<'_>) -> HookResult {
        self.push("update");
        if self.fail_update {
            bail!("{} failed to tick", self.name);
        }
        Ok(())
    }
}

/// Collect every report the machine emits from now on.
pub fn capture_reports(machine: &StateMachine) -> Arc<Mutex<Vec<Report>>> {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = reports.clone();
    machine.set_report_sink(move |report| sink.lock().push(report.clone()));
    reports
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
