use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    organism::{Organism, Species},
    spatial::{Grid, GridError, Pos},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What an occupant is, from the point of view of a scanning animal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Resource,
    Prey,
    Predator,
}

impl From<Species> for Role {
    fn from(species: Species) -> Self {
        match species {
            Species::Herbivore => Role::Prey,
            Species::Predator => Role::Predator,
        }
    }
}

/// Read-only population figures for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Census {
    pub tick: u64,
    pub herbivores: usize,
    pub predators: usize,
    pub resources: usize,
    pub animal_energy: f64,
}

impl fmt::Display for Census {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tick {}: {} herbivores, {} predators, {} resource patches",
            self.tick, self.herbivores, self.predators, self.resources
        )
    }
}

/// Arena of every entity in the simulation.
///
/// Organisms and resource patches are owned here and referenced everywhere
/// else by [`EntityId`]. Removing an entity drops it from the arena and the
/// grid together, so a stale id simply resolves to nothing.
pub struct World {
    next_entity: u64,
    tick: u64,
    grid: Grid,
    pub(crate) organisms: HashMap<EntityId, Organism>,
    pub(crate) resources: HashSet<EntityId>,
}

impl World {
    pub fn new(grid: Grid) -> Self {
        Self {
            next_entity: 0,
            tick: 0,
            grid,
            organisms: HashMap::new(),
            resources: HashSet::new(),
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn advance_time(&mut self) {
        self.tick += 1;
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn spawn_organism(&mut self, organism: Organism, pos: Pos) -> Result<EntityId, GridError> {
        let id = EntityId(self.next_entity);
        self.grid.place(id, pos)?;
        self.next_entity += 1;
        self.organisms.insert(id, organism);
        Ok(id)
    }

    /// Adds a resource patch unless the cell already has one.
    pub fn spawn_resource(&mut self, pos: Pos) -> Option<EntityId> {
        if !self.grid.contains(pos) || self.has_resource(pos) {
            return None;
        }
        let id = EntityId(self.next_entity);
        self.grid.place(id, pos).ok()?;
        self.next_entity += 1;
        self.resources.insert(id);
        Some(id)
    }

    /// Removes an organism or resource patch from the world. Returns false
    /// when the id was already gone.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        let known = self.organisms.remove(&id).is_some() | self.resources.remove(&id);
        if known {
            if let Err(err) = self.grid.remove(id) {
                debug!(%id, %err, "despawned entity had no cell");
            }
        }
        known
    }

    pub fn organism(&self, id: EntityId) -> Option<&Organism> {
        self.organisms.get(&id)
    }

    pub fn organism_mut(&mut self, id: EntityId) -> Option<&mut Organism> {
        self.organisms.get_mut(&id)
    }

    pub fn is_alive(&self, id: EntityId) -> bool {
        self.organisms.contains_key(&id)
    }

    pub fn position_of(&self, id: EntityId) -> Option<Pos> {
        self.grid.position_of(id)
    }

    pub fn move_entity(&mut self, id: EntityId, pos: Pos) -> Result<(), GridError> {
        self.grid.move_to(id, pos)
    }

    pub fn species_of(&self, id: EntityId) -> Option<Species> {
        self.organisms.get(&id).map(Organism::species)
    }

    pub fn role_of(&self, id: EntityId) -> Option<Role> {
        if self.resources.contains(&id) {
            return Some(Role::Resource);
        }
        self.species_of(id).map(Role::from)
    }

    pub fn occupants_with_role(&self, pos: Pos, role: Role) -> impl Iterator<Item = EntityId> + '_ {
        self.grid
            .occupants(pos)
            .iter()
            .copied()
            .filter(move |id| self.role_of(*id) == Some(role))
    }

    pub fn resource_at(&self, pos: Pos) -> Option<EntityId> {
        self.occupants_with_role(pos, Role::Resource).next()
    }

    pub fn has_resource(&self, pos: Pos) -> bool {
        self.resource_at(pos).is_some()
    }

    /// Removes the patch in `pos`, if any.
    pub fn consume_resource(&mut self, pos: Pos) -> bool {
        match self.resource_at(pos) {
            Some(id) => self.despawn(id),
            None => false,
        }
    }

    pub fn organism_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.organisms.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn resource_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.resources.iter().copied().collect();
        ids.sort();
        ids
    }

    pub fn count(&self, species: Species) -> usize {
        self.organisms
            .values()
            .filter(|o| o.species() == species)
            .count()
    }

    pub fn census(&self) -> Census {
        Census {
            tick: self.tick,
            herbivores: self.count(Species::Herbivore),
            predators: self.count(Species::Predator),
            resources: self.resources.len(),
            // Summed in id order so the total is reproducible bit for bit.
            animal_energy: self
                .organism_ids()
                .iter()
                .filter_map(|id| self.organisms.get(id))
                .map(|o| o.energy)
                .sum(),
        }
    }
}
