//! Per-species decision making and action execution
//!
//! Each species implements [`Behavior`]: metabolize, perceive, decide, act.
//! Behaviors hold only immutable configuration and a rule base; all mutable
//! state lives in the [`World`] and is reached by [`EntityId`].

pub mod herbivore;
pub mod predator;

use std::fmt;

use rand::{seq::SliceRandom, RngCore};
use thiserror::Error;
use tracing::{debug, trace};

pub use herbivore::{HerbivoreBehavior, Movement};
pub use predator::{Hunting, PredatorBehavior};

use crate::{
    config::ConfigError,
    fuzzy::FuzzyError,
    organism::{Organism, Species, Vitality},
    perception::Perception,
    spatial::Pos,
    world::{EntityId, World},
};

/// Why a behavior could not be built from its configuration
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BehaviorError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("rule base rejected: {0}")]
    Brain(#[from] FuzzyError),
}

/// Discrete result of one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionBundle<C> {
    pub choice: C,
    pub breed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Dead, removed or not this behavior's species. Nothing happened.
    Skipped,
    Starved,
    /// Survived metabolism and acted. The organism may still have died
    /// while acting (a sprint can exhaust it).
    Acted,
}

pub trait Behavior {
    type Choice: Copy + fmt::Debug;

    fn species(&self) -> Species;

    /// Hunger-driven energy decay, after the per-tick counters moved.
    fn metabolize(&self, organism: &mut Organism, rng: &mut dyn RngCore) -> Vitality;

    /// `None` when the organism has no position.
    fn perceive(&self, world: &World, id: EntityId) -> Option<Perception>;

    fn decide(&self, organism: &Organism, perception: &Perception)
        -> ActionBundle<Self::Choice>;

    fn act(
        &self,
        world: &mut World,
        id: EntityId,
        action: ActionBundle<Self::Choice>,
        rng: &mut dyn RngCore,
    );

    /// One full tick for `id`. A no-op for ids that are gone.
    fn step(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) -> StepOutcome {
        let Some(organism) = world.organism_mut(id) else {
            return StepOutcome::Skipped;
        };
        if organism.species() != self.species() {
            return StepOutcome::Skipped;
        }

        organism.begin_tick();
        if self.metabolize(organism, rng) == Vitality::Starved {
            debug!(%id, species = ?self.species(), "starved");
            world.despawn(id);
            return StepOutcome::Starved;
        }

        let Some(perception) = self.perceive(world, id) else {
            trace!(%id, "no position, skipping action");
            return StepOutcome::Acted;
        };
        let Some(organism) = world.organism(id) else {
            return StepOutcome::Skipped;
        };
        let action = self.decide(organism, &perception);
        trace!(%id, choice = ?action.choice, breed = action.breed, "decided");
        self.act(world, id, action, rng);
        StepOutcome::Acted
    }
}

/// Move `id` to `target`; failures are logged and leave it in place.
pub(crate) fn relocate(world: &mut World, id: EntityId, target: Pos) -> bool {
    match world.move_entity(id, target) {
        Ok(()) => true,
        Err(err) => {
            debug!(%id, %err, "move rejected");
            false
        }
    }
}

/// Uniformly random Moore neighbour.
pub(crate) fn random_move(world: &mut World, id: EntityId, rng: &mut dyn RngCore) -> bool {
    let Some(pos) = world.position_of(id) else {
        return false;
    };
    let cells = world.grid().neighbors(pos, 1);
    match cells.choose(rng) {
        Some(cell) => relocate(world, id, *cell),
        None => false,
    }
}

/// Single greedy step that strictly shortens the Manhattan distance to
/// `target`. Stays put when no neighbour is closer.
pub(crate) fn step_toward(world: &mut World, id: EntityId, target: Pos) -> bool {
    let Some(pos) = world.position_of(id) else {
        return false;
    };
    let grid = world.grid();
    let current = grid.manhattan(pos, target);
    let best = grid
        .neighbors(pos, 1)
        .into_iter()
        .map(|cell| (grid.manhattan(cell, target), cell))
        .filter(|(distance, _)| *distance < current)
        .min_by_key(|(distance, _)| *distance);
    match best {
        Some((_, cell)) => relocate(world, id, cell),
        None => false,
    }
}
