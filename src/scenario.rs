use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use rand::{seq::SliceRandom, Rng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    config::{ConfigError, GridConfig, HerbivoreConfig, PredatorConfig, VegetationConfig},
    organism::{Organism, Species},
    rng,
    spatial::{Grid, Pos},
    world::World,
};

fn default_report_every() -> u64 {
    50
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default)]
    pub ticks: Option<u64>,
    /// Census log interval for the runner
    #[serde(default = "default_report_every")]
    pub report_every: u64,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub vegetation: VegetationConfig,
    #[serde(default)]
    pub herbivores: HerbivoreConfig,
    #[serde(default)]
    pub predators: PredatorConfig,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let scenario = Scenario::from_yaml(&data)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        Ok(scenario)
    }
}

impl Scenario {
    /// Built-in balance on the default grid.
    pub fn new(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            seed,
            ticks: None,
            report_every: default_report_every(),
            grid: GridConfig::default(),
            vegetation: VegetationConfig::default(),
            herbivores: HerbivoreConfig::default(),
            predators: PredatorConfig::default(),
        }
    }

    pub fn from_yaml(data: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(data).context("Invalid scenario YAML")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grid.validate()?;
        self.vegetation.validate()?;
        self.herbivores.validate()?;
        self.predators.validate()
    }

    pub fn ticks(&self, override_ticks: Option<u64>) -> u64 {
        override_ticks.or(self.ticks).unwrap_or(500)
    }

    /// Fresh world with the initial vegetation and animals scattered at
    /// random, drawn from the scenario's "populate" stream.
    pub fn build_world(&self) -> Result<World> {
        self.validate()?;
        let mut rng = rng::detached(self.seed, "populate");
        let grid = Grid::with_wrapping(self.grid.width, self.grid.height, self.grid.torus)?;
        let mut world = World::new(grid);

        let patches = self.vegetation.initial_patches.min(world.grid().cell_count());
        let mut cells: Vec<Pos> = (0..self.grid.height)
            .flat_map(|y| (0..self.grid.width).map(move |x| Pos::new(x, y)))
            .collect();
        let (chosen, _) = cells.partial_shuffle(&mut rng, patches);
        for pos in chosen.iter() {
            world.spawn_resource(*pos);
        }

        for _ in 0..self.herbivores.count {
            let energy = self.herbivores.initial_energy.sample(&mut rng);
            let organism = Organism::new(Species::Herbivore, energy, self.herbivores.max_energy);
            world.spawn_organism(organism, self.random_cell(&mut rng))?;
        }
        for _ in 0..self.predators.count {
            let energy = self.predators.initial_energy.sample(&mut rng);
            let organism = Organism::new(Species::Predator, energy, self.predators.max_energy);
            world.spawn_organism(organism, self.random_cell(&mut rng))?;
        }

        let census = world.census();
        info!(
            scenario = %self.name,
            width = self.grid.width,
            height = self.grid.height,
            herbivores = census.herbivores,
            predators = census.predators,
            patches = census.resources,
            "world populated"
        );
        Ok(world)
    }

    fn random_cell(&self, rng: &mut dyn RngCore) -> Pos {
        Pos::new(
            rng.gen_range(0..self.grid.width),
            rng.gen_range(0..self.grid.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "name: tiny\nseed: 7\n";

    #[test]
    fn test_minimal_file_uses_defaults() {
        let scenario = Scenario::from_yaml(MINIMAL).unwrap();
        assert_eq!(scenario.grid, GridConfig::default());
        assert_eq!(scenario.herbivores, HerbivoreConfig::default());
        assert_eq!(scenario.ticks(None), 500);
        assert_eq!(scenario.ticks(Some(3)), 3);
    }

    #[test]
    fn test_partial_override() {
        let yaml = "
name: sparse
seed: 1
grid:
  width: 12
  height: 8
herbivores:
  count: 4
  hunger_tiers:
    - { threshold: 5, loss: 1.0 }
    - { threshold: 0, loss: 0.5, chance: 0.5 }
predators:
  count: 1
  breeding:
    chance: 0.2
    energy_threshold: 0.8
    retain_fraction: 0.5
    offspring_fraction: 0.3
    site: nearby
    strength_threshold: 0.4
";
        let scenario = Scenario::from_yaml(yaml).unwrap();
        assert_eq!(scenario.grid.width, 12);
        assert!(scenario.grid.torus);
        assert_eq!(scenario.herbivores.count, 4);
        assert_eq!(scenario.herbivores.hunger_tiers[0].chance, 1.0);
        assert_eq!(scenario.herbivores.max_energy, 100.0);
        assert_eq!(scenario.predators.breeding.offspring_fraction, 0.3);
    }

    #[test]
    fn test_partial_nested_blocks_keep_species_defaults() {
        let yaml = "
name: nested
seed: 2
herbivores:
  initial_energy: { min: 60.0 }
  breeding: { chance: 0.2 }
predators:
  initial_energy: { max: 80.0 }
  breeding: { site: nearby }
";
        let scenario = Scenario::from_yaml(yaml).unwrap();

        let herbivores = &scenario.herbivores;
        let defaults = HerbivoreConfig::default();
        assert_eq!(herbivores.initial_energy.min, 60.0);
        assert_eq!(herbivores.initial_energy.max, defaults.initial_energy.max);
        assert_eq!(herbivores.breeding.chance, 0.2);
        assert_eq!(
            herbivores.breeding.energy_threshold,
            defaults.breeding.energy_threshold
        );

        let predators = &scenario.predators;
        let defaults = PredatorConfig::default();
        assert_eq!(predators.initial_energy.min, defaults.initial_energy.min);
        assert_eq!(predators.initial_energy.max, 80.0);
        assert_eq!(predators.breeding.site, crate::config::BirthSite::Nearby);
        assert_eq!(predators.breeding.chance, defaults.breeding.chance);
        assert_eq!(predators.breeding.strength_threshold, 0.5);
    }

    #[test]
    fn test_partial_override_still_validated() {
        let yaml = "name: bad\nseed: 1\npredators: { breeding: { retain_fraction: 0.0 } }\n";
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("retain_fraction"), "{err:#}");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let yaml = "name: bad\nseed: 1\ngrid: { width: 0, height: 4 }\n";
        let err = Scenario::from_yaml(yaml).unwrap_err();
        assert!(format!("{err:#}").contains("grid"), "{err:#}");
    }

    #[test]
    fn test_build_world_populates_deterministically() {
        let mut scenario = Scenario::new("small", 42);
        scenario.grid = GridConfig {
            width: 10,
            height: 10,
            torus: true,
        };
        scenario.vegetation.initial_patches = 30;
        scenario.herbivores.count = 12;
        scenario.predators.count = 3;

        let a = scenario.build_world().unwrap();
        let b = scenario.build_world().unwrap();

        let census = a.census();
        assert_eq!(census.herbivores, 12);
        assert_eq!(census.predators, 3);
        assert_eq!(census.resources, 30);
        let positions = |w: &World| {
            w.organism_ids()
                .into_iter()
                .map(|id| w.position_of(id))
                .collect::<Vec<_>>()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_more_patches_than_cells_fills_grid() {
        let mut scenario = Scenario::new("dense", 1);
        scenario.grid = GridConfig {
            width: 3,
            height: 3,
            torus: true,
        };
        scenario.vegetation.initial_patches = 100;
        scenario.herbivores.count = 0;
        scenario.predators.count = 0;

        let world = scenario.build_world().unwrap();
        assert_eq!(world.census().resources, 9);
    }
}
