//! Handoff Runner - Moves every bot's eligible items to one counterparty
//!
//! Runs the fleet against the in-memory paper platform:
//! 1. Loads the fleet settings file
//! 2. Logs each starting bot in and registers its eligible items
//! 3. Has the receiver open a trade with every bot waiting to trade
//! 4. Writes the final fleet state to state/fleet.json

use tracing::info;

use handoff_runner::{Config, FleetRunner, PaperPlatform};

/// Settings file used when HANDOFF_CONFIG is unset
const DEFAULT_CONFIG_PATH: &str = "settings.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let path = std::env::var("HANDOFF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load(&path)?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level())
        .init();

    info!("Starting Handoff Runner with {}...", path);

    let paper = config
        .paper
        .clone()
        .ok_or_else(|| anyhow::anyhow!("No paper platform configured in {}", path))?;
    if config.use_separate_processes {
        anyhow::bail!("use_separate_processes is not supported");
    }

    let (platform, events) = PaperPlatform::new(paper.receiver);
    let outcome = FleetRunner::new(config, platform, events).run().await?;

    for report in &outcome.reports {
        info!(
            "Bot {} ({:?}): {} negotiations, {} hand-offs, stopped: {}",
            report.bot, report.role, report.negotiations, report.handoffs, report.stopped
        );
    }
    info!(
        "Done: {} items received, {} bots still waiting",
        outcome.items_received,
        outcome.registry.ready.len()
    );
    Ok(())
}
