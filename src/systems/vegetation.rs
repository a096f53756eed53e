use anyhow::Result;
use rand::{seq::SliceRandom, Rng};
use tracing::trace;

use crate::{
    config::VegetationConfig,
    engine::{System, SystemContext},
    rng::SystemRng,
    spatial::Pos,
    world::World,
};

/// Grows vegetation: patches spread to neighbours, and fresh patches sprout
/// at random so the resource never dies out for good.
pub struct VegetationSystem {
    config: VegetationConfig,
}

impl VegetationSystem {
    pub fn new(config: VegetationConfig) -> Self {
        Self { config }
    }
}

impl Default for VegetationSystem {
    fn default() -> Self {
        Self::new(VegetationConfig::default())
    }
}

impl System for VegetationSystem {
    fn name(&self) -> &str {
        "vegetation"
    }

    fn run(
        &mut self,
        ctx: &SystemContext,
        world: &mut World,
        rng: &mut SystemRng<'_>,
    ) -> Result<()> {
        let mut spread = 0usize;
        for id in world.resource_ids() {
            if !rng.gen_bool(self.config.spread_chance) {
                continue;
            }
            let Some(pos) = world.position_of(id) else {
                continue;
            };
            let Some(target) = world.grid().neighbors(pos, 1).choose(rng).copied() else {
                continue;
            };
            if world.spawn_resource(target).is_some() {
                spread += 1;
            }
        }

        let mut sprouted = false;
        if rng.gen_bool(self.config.sprout_chance) {
            let grid = world.grid();
            let cell = Pos::new(rng.gen_range(0..grid.width()), rng.gen_range(0..grid.height()));
            sprouted = world.spawn_resource(cell).is_some();
        }
        trace!(tick = ctx.tick, spread, sprouted, "vegetation grew");
        Ok(())
    }
}
