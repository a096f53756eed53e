use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::debug;

use crate::{
    behavior::{Behavior, BehaviorError, HerbivoreBehavior, PredatorBehavior, StepOutcome},
    config::{HerbivoreConfig, PredatorConfig},
    engine::{System, SystemContext},
    organism::Species,
    rng::SystemRng,
    world::World,
};

/// Steps every living animal once per tick, in shuffled order.
pub struct FaunaSystem {
    herbivores: HerbivoreBehavior,
    predators: PredatorBehavior,
}

impl FaunaSystem {
    pub fn new(herbivores: HerbivoreBehavior, predators: PredatorBehavior) -> Self {
        Self {
            herbivores,
            predators,
        }
    }

    pub fn from_config(
        herbivores: &HerbivoreConfig,
        predators: &PredatorConfig,
    ) -> Result<Self, BehaviorError> {
        Ok(Self::new(
            HerbivoreBehavior::new(herbivores.clone())?,
            PredatorBehavior::new(predators.clone())?,
        ))
    }
}

impl System for FaunaSystem {
    fn name(&self) -> &str {
        "fauna"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        // Animals born or killed this tick do not change the work list.
        let mut ids = world.organism_ids();
        ids.shuffle(rng);

        let (mut starved, mut skipped) = (0usize, 0usize);
        for id in ids {
            let outcome = match world.species_of(id) {
                Some(Species::Herbivore) => self.herbivores.step(world, id, rng),
                Some(Species::Predator) => self.predators.step(world, id, rng),
                None => StepOutcome::Skipped,
            };
            match outcome {
                StepOutcome::Starved => starved += 1,
                StepOutcome::Skipped => skipped += 1,
                StepOutcome::Acted => {}
            }
        }
        debug!(tick = ctx.tick, starved, skipped, "fauna stepped");
        Ok(())
    }
}
