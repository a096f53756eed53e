use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use meadow::{
    engine::{EngineBuilder, EngineSettings},
    scenario::ScenarioLoader,
    systems::{FaunaSystem, VegetationSystem},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Fuzzy-logic predator/prey meadow runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/meadow.yaml")]
    scenario: PathBuf,

    /// Override tick count (uses scenario default when omitted)
    #[arg(long)]
    ticks: Option<u64>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log a census every N ticks (0 disables periodic reports)
    #[arg(long)]
    report_every: Option<u64>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;
    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }
    let ticks = scenario.ticks(cli.ticks);
    let report_every = cli.report_every.unwrap_or(scenario.report_every);
    let mut world = scenario.build_world()?;

    let settings = EngineSettings {
        scenario_name: scenario.name.clone(),
        seed: scenario.seed,
    };
    let mut engine = EngineBuilder::new(settings)
        .with_system(FaunaSystem::from_config(
            &scenario.herbivores,
            &scenario.predators,
        )?)
        .with_system(VegetationSystem::new(scenario.vegetation))
        .build();

    let mut extinct_at = None;
    engine.run_with_hook(&mut world, ticks, |summary| {
        if report_every > 0 && summary.tick % report_every == 0 {
            info!("{}", summary.census);
        }
        let census = summary.census;
        if extinct_at.is_none() && census.herbivores + census.predators == 0 {
            extinct_at = Some(summary.tick);
        }
    })?;

    if let Some(tick) = extinct_at {
        info!(tick, "all animals died out");
    }
    info!(
        "Scenario '{}' completed for {} ticks. Final census: {}",
        scenario.name,
        ticks,
        world.census()
    );
    Ok(())
}
