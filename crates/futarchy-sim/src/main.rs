//! futarchy-sim: replay a seeded order flow against a futarchy market.
//!
//! Usage: `futarchy-sim [config.toml]`. Without an argument the config path
//! is read from `FUTARCHY_SIM_CONFIG`; without either, defaults are used.
//! The scenario report is printed to stdout as JSON and logs go to stderr.

use std::path::PathBuf;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use futarchy_sim::{run_scenario, EventBus, SimConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = SimConfig::load(std::env::args().nth(1).map(PathBuf::from))?;

    // 2. Initialize tracing at the configured level
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("futarchy={}", config.logging.level).parse()?),
        )
        .init();

    info!(seed = config.flow.seed, batches = config.flow.batches, "futarchy simulator starting");

    // 3. Log lifecycle events as they are emitted
    let event_bus = EventBus::new(1024);
    let mut events = event_bus.subscribe();
    let listener = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => debug!(event = event.name(), %json, "market event"),
                    Err(e) => warn!(event = event.name(), error = %e, "unserializable event"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event listener lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    // 4. Run the scenario
    let report = run_scenario(&config, &event_bus).await?;
    drop(event_bus);
    listener.await?;

    // 5. Print the report
    println!("{}", serde_json::to_string_pretty(&report)?);

    info!(
        committed = report.committed_batches,
        rolled_back = report.rolled_back_batches,
        "futarchy simulator finished"
    );
    Ok(())
}
