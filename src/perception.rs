//! Radius-bounded sensing
//!
//! A scan covers the observer's own cell plus every cell within Chebyshev
//! radius `R`, but reports distance as Manhattan distance across the torus.
//! Proximities are bucketed into `0..=NOT_DETECTED`, where the top bucket
//! means nothing of that kind was found.

use crate::{
    fuzzy::Inputs,
    spatial::Pos,
    world::{EntityId, Role, World},
};

/// Proximity reported when a scan finds nothing.
pub const NOT_DETECTED: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub id: EntityId,
    pub pos: Pos,
    pub distance: u32,
}

/// Everything of one role found by a single scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sighting {
    hits: Vec<Hit>,
}

impl Sighting {
    pub fn hits(&self) -> &[Hit] {
        &self.hits
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn count(&self) -> usize {
        self.hits.len()
    }

    /// Closest hit; the first one scanned wins a tie.
    pub fn nearest(&self) -> Option<&Hit> {
        self.hits.iter().min_by_key(|hit| hit.distance)
    }

    pub fn proximity(&self) -> u32 {
        self.nearest()
            .map_or(NOT_DETECTED, |hit| hit.distance.min(NOT_DETECTED))
    }

    /// Distinct cells holding at least one hit, in scan order.
    pub fn cells(&self) -> Vec<Pos> {
        let mut cells: Vec<Pos> = Vec::new();
        for hit in &self.hits {
            if !cells.contains(&hit.pos) {
                cells.push(hit.pos);
            }
        }
        cells
    }
}

/// Look for occupants with `role` around `observer`.
///
/// Returns `None` when the observer has no position. The observer itself
/// is never reported.
pub fn scan(world: &World, observer: EntityId, radius: u32, role: Role) -> Option<Sighting> {
    let origin = world.position_of(observer)?;
    Some(scan_from(world, origin, radius, role, Some(observer)))
}

pub fn scan_from(
    world: &World,
    origin: Pos,
    radius: u32,
    role: Role,
    exclude: Option<EntityId>,
) -> Sighting {
    let grid = world.grid();
    let mut hits = Vec::new();
    for cell in grid.neighborhood(origin, radius, true) {
        let distance = grid.manhattan(origin, cell);
        hits.extend(
            world
                .occupants_with_role(cell, role)
                .filter(|id| Some(*id) != exclude)
                .map(|id| Hit {
                    id,
                    pos: cell,
                    distance,
                }),
        );
    }
    Sighting { hits }
}

/// Crisp inputs for one decision. Fields a species does not sense stay
/// `None` and never reach the rule base.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Perception {
    pub energy_fraction: f64,
    pub food_proximity: Option<u32>,
    pub predator_proximity: Option<u32>,
    pub prey_proximity: Option<u32>,
    pub prey_count: Option<usize>,
}

impl Perception {
    pub fn new(energy_fraction: f64) -> Self {
        Self {
            energy_fraction: energy_fraction.clamp(0.0, 1.0),
            ..Self::default()
        }
    }

    pub fn to_inputs(&self) -> Inputs {
        let mut inputs = Inputs::new().with("energy", self.energy_fraction);
        if let Some(proximity) = self.food_proximity {
            inputs.set("food_proximity", proximity as f64);
        }
        if let Some(proximity) = self.predator_proximity {
            inputs.set("predator_proximity", proximity as f64);
        }
        if let Some(proximity) = self.prey_proximity {
            inputs.set("prey_proximity", proximity as f64);
        }
        if let Some(count) = self.prey_count {
            inputs.set("prey_count", count as f64);
        }
        inputs
    }
}
