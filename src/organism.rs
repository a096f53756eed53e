//! Shared animal state: energy, hunger, lifecycle and reproduction.

use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::{BirthSite, HungerTier},
    spatial::Pos,
    world::{EntityId, World},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Species {
    Herbivore,
    Predator,
}

/// Per-species transient counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesState {
    Herbivore { sprint_cooldown: u32 },
    Predator { breeding_cooldown: u32 },
}

impl SpeciesState {
    pub fn fresh(species: Species) -> Self {
        match species {
            Species::Herbivore => SpeciesState::Herbivore { sprint_cooldown: 0 },
            Species::Predator => SpeciesState::Predator {
                breeding_cooldown: 0,
            },
        }
    }

    pub fn species(&self) -> Species {
        match self {
            SpeciesState::Herbivore { .. } => Species::Herbivore,
            SpeciesState::Predator { .. } => Species::Predator,
        }
    }

    fn cooldown_mut(&mut self) -> &mut u32 {
        match self {
            SpeciesState::Herbivore { sprint_cooldown } => sprint_cooldown,
            SpeciesState::Predator { breeding_cooldown } => breeding_cooldown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vitality {
    Alive,
    Starved,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organism {
    pub energy: f64,
    pub max_energy: f64,
    pub age: u64,
    /// Ticks since the last successful meal
    pub hunger: u32,
    pub state: SpeciesState,
}

impl Organism {
    pub fn new(species: Species, energy: f64, max_energy: f64) -> Self {
        Self {
            energy: energy.clamp(0.0, max_energy),
            max_energy,
            age: 0,
            hunger: 0,
            state: SpeciesState::fresh(species),
        }
    }

    pub fn species(&self) -> Species {
        self.state.species()
    }

    pub fn energy_fraction(&self) -> f64 {
        if self.max_energy <= 0.0 {
            return 0.0;
        }
        (self.energy / self.max_energy).clamp(0.0, 1.0)
    }

    /// Energy at or above `fraction` of max energy.
    pub fn has_energy_fraction(&self, fraction: f64) -> bool {
        self.energy >= fraction * self.max_energy
    }

    pub fn vitality(&self) -> Vitality {
        if self.energy <= 0.0 {
            Vitality::Starved
        } else {
            Vitality::Alive
        }
    }

    /// The species cooldown: sprint for herbivores, breeding for predators.
    pub fn cooldown(&self) -> u32 {
        match self.state {
            SpeciesState::Herbivore { sprint_cooldown } => sprint_cooldown,
            SpeciesState::Predator { breeding_cooldown } => breeding_cooldown,
        }
    }

    pub fn set_cooldown(&mut self, ticks: u32) {
        *self.state.cooldown_mut() = ticks;
    }

    /// Start-of-step bookkeeping: cooldown down, age and hunger up.
    pub fn begin_tick(&mut self) {
        let cooldown = self.state.cooldown_mut();
        *cooldown = cooldown.saturating_sub(1);
        self.age += 1;
        self.hunger = self.hunger.saturating_add(1);
    }

    /// Apply the first tier whose threshold the hunger counter exceeds.
    ///
    /// `tiers` must be ordered by descending threshold.
    pub fn apply_hunger(&mut self, tiers: &[HungerTier], rng: &mut dyn RngCore) -> Vitality {
        if let Some(tier) = tiers.iter().find(|tier| self.hunger > tier.threshold) {
            if tier.chance >= 1.0 || rng.gen_bool(tier.chance.max(0.0)) {
                self.energy = (self.energy - tier.loss).max(0.0);
            }
        }
        self.vitality()
    }

    pub fn spend(&mut self, amount: f64) -> Vitality {
        self.energy = (self.energy - amount.max(0.0)).max(0.0);
        self.vitality()
    }

    /// Gain energy up to `max_energy` and reset hunger.
    pub fn feed(&mut self, amount: f64) {
        self.energy = (self.energy + amount.max(0.0)).min(self.max_energy);
        self.hunger = 0;
    }

    /// Parent's remaining energy and the newborn's starting energy.
    pub fn energy_split(&self, split: EnergySplit) -> (f64, f64) {
        let before = self.energy;
        let parent = before * split.retain_fraction;
        let offspring = (before * split.offspring_fraction).min(self.max_energy);
        (parent, offspring)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySplit {
    pub retain_fraction: f64,
    pub offspring_fraction: f64,
}

/// Everything reproduction needs besides the parent itself.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BirthPlan {
    pub split: EnergySplit,
    pub site: BirthSite,
    /// Cooldown the parent starts after a successful birth.
    pub cooldown_ticks: Option<u32>,
}

/// Cells a newborn of `species` may be placed in around `pos`.
pub fn birth_cells(world: &World, pos: Pos, species: Species, site: BirthSite) -> Vec<Pos> {
    match site {
        BirthSite::Adjacent => world
            .grid()
            .neighbors(pos, 1)
            .into_iter()
            .filter(|cell| {
                world
                    .grid()
                    .is_empty_where(*cell, |id| world.species_of(id) == Some(species))
            })
            .collect(),
        BirthSite::Nearby => world.grid().neighborhood(pos, 1, true),
    }
}

/// Produce one offspring next to `parent`.
///
/// All-or-nothing: when no cell is available, the parent has no position,
/// or the split would leave either side without energy, neither the parent
/// nor the world changes.
pub fn reproduce(
    world: &mut World,
    parent: EntityId,
    plan: &BirthPlan,
    rng: &mut dyn RngCore,
) -> Option<EntityId> {
    let pos = world.position_of(parent)?;
    let organism = world.organism(parent)?;
    let species = organism.species();
    let max_energy = organism.max_energy;
    let (parent_energy, offspring_energy) = organism.energy_split(plan.split);
    if offspring_energy <= 0.0 || parent_energy <= 0.0 {
        return None;
    }

    let cells = birth_cells(world, pos, species, plan.site);
    let Some(cell) = cells.choose(rng).copied() else {
        debug!(%parent, "no room to give birth");
        return None;
    };

    let newborn = Organism::new(species, offspring_energy, max_energy);
    let child = match world.spawn_organism(newborn, cell) {
        Ok(child) => child,
        Err(err) => {
            debug!(%parent, %err, "offspring placement failed");
            return None;
        }
    };
    if let Some(organism) = world.organism_mut(parent) {
        organism.energy = parent_energy;
        if let Some(ticks) = plan.cooldown_ticks {
            organism.set_cooldown(ticks);
        }
    }
    debug!(%parent, %child, ?species, energy = offspring_energy, "offspring born");
    Some(child)
}
