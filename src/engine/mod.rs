//! Tick loop: runs registered systems in order, each with its own stream.

use anyhow::{Context, Result};
use tracing::{info, trace};

use crate::{
    rng::{RngManager, SystemRng},
    world::{Census, World},
};

pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
}

pub struct EngineBuilder {
    settings: EngineSettings,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    pub fn push_system(&mut self, system: impl System + 'static) {
        self.systems.push(Box::new(system));
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: RngManager::new(self.settings.seed),
            systems: self.systems,
            settings: self.settings,
        }
    }
}

/// What the hook sees after every completed tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub census: Census,
}

pub struct Engine {
    rng: RngManager,
    systems: Vec<Box<dyn System>>,
    settings: EngineSettings,
}

impl Engine {
    pub fn run(&mut self, world: &mut World, ticks: u64) -> Result<()> {
        self.run_with_hook(world, ticks, |_| {})
    }

    pub fn run_with_hook<F>(&mut self, world: &mut World, ticks: u64, mut hook: F) -> Result<()>
    where
        F: FnMut(&TickSummary),
    {
        info!(
            scenario = %self.settings.scenario_name,
            seed = self.rng.seed(),
            ticks,
            "run started"
        );
        for _ in 0..ticks {
            let current_tick = world.tick();
            for system in &mut self.systems {
                let mut rng_stream = self.rng.stream(system.name());
                let ctx = SystemContext {
                    tick: current_tick,
                    scenario_name: &self.settings.scenario_name,
                };
                system
                    .run(&ctx, world, &mut rng_stream)
                    .with_context(|| format!("system '{}' failed at tick {current_tick}", system.name()))?;
            }
            world.advance_time();
            let summary = TickSummary {
                tick: world.tick(),
                census: world.census(),
            };
            trace!(census = %summary.census, "tick complete");
            hook(&summary);
        }
        info!(census = %world.census(), "run finished");
        Ok(())
    }
}

pub struct SystemContext<'a> {
    pub tick: u64,
    pub scenario_name: &'a str,
}

pub trait System {
    fn name(&self) -> &str;
    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()>;
}
