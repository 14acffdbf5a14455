//! A guard that patrols, spots an intruder, chases it and gives up.
//!
//! Run with `RUST_LOG=state_lifecycle=debug cargo run --example guard_patrol`
//! to see the machine's own tracing output.

use state_lifecycle::core::{payload, EnterContext, ExitContext, HookResult, UpdateContext};
use state_lifecycle::registry::StateFactory;
use state_lifecycle::{async_trait, State, StateMachine, TransitionTarget};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Patrol {
    waypoint: AtomicU32,
}

#[async_trait]
impl State for Patrol {
    async fn on_update(&self, cx: UpdateContext<'_>) -> HookResult {
        let waypoint = self.waypoint.fetch_add(1, Ordering::Relaxed);
        tracing::info!(waypoint, elapsed = cx.elapsed, "patrolling");
        Ok(())
    }
}

#[derive(Default)]
struct Chase;

#[async_trait]
impl State for Chase {
    async fn on_enter(&self, cx: EnterContext<'_>) -> HookResult {
        let intruder = cx.data_as::<String>().map(String::as_str).unwrap_or("someone");
        tracing::info!(intruder, "alarm raised");
        // Stand-in for an animation the hook waits on.
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn on_exit(&self, _cx: ExitContext<'_>) -> HookResult {
        anyhow::bail!("lost sight of the intruder")
    }
}

#[derive(Default)]
struct Search;
impl State for Search {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let machine = StateMachine::builder()
        .graph()
        .factory(
            StateFactory::new()
                .with_default::<Patrol>("patrol")
                .with_default::<Chase>("chase")
                .with_default::<Search>("search"),
        )
        .initial_type("patrol")
        .state_type("chase")
        .state_type("search")
        .edge("Patrol", "Chase")
        .edge("Chase", "Search")
        .edge("Search", "Patrol")
        .report_sink(|report| {
            eprintln!("[{:?}] {}", report.severity, report.error);
        })
        .build()?;

    machine.initialize().await?;
    for _ in 0..3 {
        machine.update(0.5).await;
    }

    machine
        .transition_to("Chase", Some(payload(String::from("thief"))))
        .await?;

    // Not reachable from Chase; reported and ignored.
    let _ = machine.transition_to("Patrol", None).await;

    machine.transition_to(TransitionTarget::edge(0), None).await?;
    machine.transition_to_name("Patrol", None).await?;

    for record in machine.history().transitions() {
        let from = record.from.as_ref().map_or("<start>", |s| s.name.as_str());
        println!("{from} -> {} (failed hooks: {:?})", record.to.name, record.failed_hooks);
    }
    Ok(())
}
