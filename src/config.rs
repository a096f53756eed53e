//! Tunable parameters for the grid, vegetation and both animal species.
//!
//! Every field has a serde default equal to the built-in balance, so a
//! scenario file only needs to name what it changes. The balance was tuned
//! by hand and none of these numbers are invariants.

use rand::{Rng, RngCore};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field}: {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn check_probability(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("probability {value} is outside [0, 1]")))
    }
}

fn check_fraction(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(invalid(field, format!("fraction {value} is outside [0, 1]")))
    }
}

fn certain() -> f64 {
    1.0
}

/// One step of hunger-driven energy decay.
///
/// Applies when the hunger counter exceeds `threshold`; `chance` makes the
/// loss stochastic.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HungerTier {
    pub threshold: u32,
    pub loss: f64,
    #[serde(default = "certain")]
    pub chance: f64,
}

impl HungerTier {
    pub const fn new(threshold: u32, loss: f64) -> Self {
        Self {
            threshold,
            loss,
            chance: 1.0,
        }
    }

    pub const fn with_chance(mut self, chance: f64) -> Self {
        self.chance = chance;
        self
    }
}

fn validate_tiers(field: &str, tiers: &[HungerTier]) -> Result<(), ConfigError> {
    if tiers.windows(2).any(|pair| pair[0].threshold <= pair[1].threshold) {
        return Err(invalid(field, "thresholds must be strictly descending"));
    }
    for tier in tiers {
        if !(tier.loss >= 0.0) {
            return Err(invalid(field, format!("loss {} must be non-negative", tier.loss)));
        }
        check_probability(field, tier.chance)?;
    }
    Ok(())
}

/// Uniform band for starting energy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyBand {
    pub min: f64,
    pub max: f64,
}

impl EnergyBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }

    fn validate(&self, field: &str, max_energy: f64) -> Result<(), ConfigError> {
        if !(self.min > 0.0 && self.min <= self.max && self.max <= max_energy) {
            return Err(invalid(
                field,
                format!(
                    "band [{}, {}] must lie within (0, {max_energy}]",
                    self.min, self.max
                ),
            ));
        }
        Ok(())
    }
}

/// Where a newborn goes relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BirthSite {
    /// A Moore neighbour with no occupant of the parent's species.
    Adjacent,
    /// Any cell of the Moore neighbourhood, parent's cell included.
    Nearby,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreedingConfig {
    /// Second, independent trial after the brain votes to breed.
    pub chance: f64,
    /// Minimum energy as a fraction of max energy.
    pub energy_threshold: f64,
    /// Share of pre-birth energy the parent keeps.
    pub retain_fraction: f64,
    /// Share of pre-birth energy handed to the newborn.
    pub offspring_fraction: f64,
    pub site: BirthSite,
    /// Aggregated "yes" strength the brain needs before breeding is allowed.
    pub strength_threshold: f64,
}

impl BreedingConfig {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        check_probability(&format!("{field}.chance"), self.chance)?;
        check_fraction(&format!("{field}.energy_threshold"), self.energy_threshold)?;
        check_fraction(&format!("{field}.retain_fraction"), self.retain_fraction)?;
        check_fraction(&format!("{field}.offspring_fraction"), self.offspring_fraction)?;
        check_fraction(&format!("{field}.strength_threshold"), self.strength_threshold)?;
        if self.retain_fraction <= 0.0 {
            return Err(invalid(
                &format!("{field}.retain_fraction"),
                "must be positive or the parent starves on giving birth",
            ));
        }
        if self.retain_fraction + self.offspring_fraction > 1.0 {
            return Err(invalid(
                field,
                "retain_fraction + offspring_fraction exceeds 1 and would create energy",
            ));
        }
        Ok(())
    }

    pub fn herbivore() -> Self {
        Self {
            chance: 0.1,
            energy_threshold: 0.4,
            retain_fraction: 0.5,
            offspring_fraction: 0.4,
            site: BirthSite::Adjacent,
            strength_threshold: 0.3,
        }
    }

    pub fn predator() -> Self {
        Self {
            chance: 0.05,
            energy_threshold: 0.9,
            retain_fraction: 0.5,
            offspring_fraction: 0.4,
            site: BirthSite::Adjacent,
            strength_threshold: 0.5,
        }
    }
}

// The nested blocks below have species-specific defaults, so a partial
// block is read as overrides and laid over the owning species' values.

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BandOverrides {
    min: Option<f64>,
    max: Option<f64>,
}

impl BandOverrides {
    fn over(self, base: EnergyBand) -> EnergyBand {
        EnergyBand {
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BreedingOverrides {
    chance: Option<f64>,
    energy_threshold: Option<f64>,
    retain_fraction: Option<f64>,
    offspring_fraction: Option<f64>,
    site: Option<BirthSite>,
    strength_threshold: Option<f64>,
}

impl BreedingOverrides {
    fn over(self, base: BreedingConfig) -> BreedingConfig {
        BreedingConfig {
            chance: self.chance.unwrap_or(base.chance),
            energy_threshold: self.energy_threshold.unwrap_or(base.energy_threshold),
            retain_fraction: self.retain_fraction.unwrap_or(base.retain_fraction),
            offspring_fraction: self.offspring_fraction.unwrap_or(base.offspring_fraction),
            site: self.site.unwrap_or(base.site),
            strength_threshold: self.strength_threshold.unwrap_or(base.strength_threshold),
        }
    }
}

const HERBIVORE_BAND: EnergyBand = EnergyBand::new(40.0, 60.0);
const PREDATOR_BAND: EnergyBand = EnergyBand::new(70.0, 90.0);

fn herbivore_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EnergyBand, D::Error> {
    Ok(BandOverrides::deserialize(deserializer)?.over(HERBIVORE_BAND))
}

fn predator_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EnergyBand, D::Error> {
    Ok(BandOverrides::deserialize(deserializer)?.over(PREDATOR_BAND))
}

fn herbivore_breeding<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BreedingConfig, D::Error> {
    Ok(BreedingOverrides::deserialize(deserializer)?.over(BreedingConfig::herbivore()))
}

fn predator_breeding<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BreedingConfig, D::Error> {
    Ok(BreedingOverrides::deserialize(deserializer)?.over(BreedingConfig::predator()))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprintConfig {
    pub energy_cost: f64,
    pub cooldown_ticks: u32,
    /// Chance of covering two cells instead of one
    pub long_step_chance: f64,
}

impl Default for SprintConfig {
    fn default() -> Self {
        Self {
            energy_cost: 3.0,
            cooldown_ticks: 6,
            long_step_chance: 0.75,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FleeConfig {
    pub distance_weight: f64,
    pub alignment_weight: f64,
    pub food_bonus: f64,
    /// Cells scoring within this margin of the best are equally likely.
    pub tie_tolerance: f64,
}

impl Default for FleeConfig {
    fn default() -> Self {
        Self {
            distance_weight: 1.0,
            alignment_weight: 0.6,
            food_bonus: 0.25,
            tie_tolerance: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HerbivoreConfig {
    pub count: usize,
    #[serde(deserialize_with = "herbivore_band")]
    pub initial_energy: EnergyBand,
    pub max_energy: f64,
    pub hunger_tiers: Vec<HungerTier>,
    pub resource_energy: f64,
    #[serde(deserialize_with = "herbivore_breeding")]
    pub breeding: BreedingConfig,
    pub food_scan_radius: u32,
    pub predator_scan_radius: u32,
    pub food_search_radius: u32,
    pub sprint: SprintConfig,
    pub flee: FleeConfig,
}

impl Default for HerbivoreConfig {
    fn default() -> Self {
        Self {
            count: 120,
            initial_energy: HERBIVORE_BAND,
            max_energy: 100.0,
            hunger_tiers: vec![
                HungerTier::new(20, 0.4),
                HungerTier::new(10, 0.2),
                HungerTier::new(0, 0.1).with_chance(0.2),
            ],
            resource_energy: 20.0,
            breeding: BreedingConfig::herbivore(),
            food_scan_radius: 3,
            predator_scan_radius: 3,
            food_search_radius: 1,
            sprint: SprintConfig::default(),
            flee: FleeConfig::default(),
        }
    }
}

impl HerbivoreConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_energy > 0.0) {
            return Err(invalid("herbivores.max_energy", "must be positive"));
        }
        self.initial_energy
            .validate("herbivores.initial_energy", self.max_energy)?;
        validate_tiers("herbivores.hunger_tiers", &self.hunger_tiers)?;
        if self.resource_energy < 0.0 {
            return Err(invalid("herbivores.resource_energy", "must be non-negative"));
        }
        self.breeding.validate("herbivores.breeding")?;
        check_probability("herbivores.sprint.long_step_chance", self.sprint.long_step_chance)?;
        if self.sprint.energy_cost < 0.0 {
            return Err(invalid("herbivores.sprint.energy_cost", "must be non-negative"));
        }
        if self.food_scan_radius == 0 || self.predator_scan_radius == 0 {
            return Err(invalid("herbivores", "scan radii must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredatorConfig {
    pub count: usize,
    #[serde(deserialize_with = "predator_band")]
    pub initial_energy: EnergyBand,
    pub max_energy: f64,
    pub hunger_tiers: Vec<HungerTier>,
    pub prey_energy: f64,
    #[serde(deserialize_with = "predator_breeding")]
    pub breeding: BreedingConfig,
    pub breeding_cooldown_ticks: u32,
    pub scan_radius: u32,
    pub chase_radius: u32,
    pub stalk_radius: u32,
}

impl Default for PredatorConfig {
    fn default() -> Self {
        Self {
            count: 20,
            initial_energy: PREDATOR_BAND,
            max_energy: 150.0,
            hunger_tiers: vec![
                HungerTier::new(15, 0.8),
                HungerTier::new(7, 0.4),
                HungerTier::new(0, 0.2),
            ],
            prey_energy: 30.0,
            breeding: BreedingConfig::predator(),
            breeding_cooldown_ticks: 40,
            scan_radius: 4,
            chase_radius: 3,
            stalk_radius: 2,
        }
    }
}

impl PredatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_energy > 0.0) {
            return Err(invalid("predators.max_energy", "must be positive"));
        }
        self.initial_energy
            .validate("predators.initial_energy", self.max_energy)?;
        validate_tiers("predators.hunger_tiers", &self.hunger_tiers)?;
        if self.prey_energy < 0.0 {
            return Err(invalid("predators.prey_energy", "must be non-negative"));
        }
        self.breeding.validate("predators.breeding")?;
        if self.scan_radius == 0 || self.chase_radius == 0 || self.stalk_radius == 0 {
            return Err(invalid("predators", "search radii must be at least 1"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VegetationConfig {
    pub initial_patches: usize,
    pub spread_chance: f64,
    /// Chance per tick that one random cell sprouts a fresh patch.
    pub sprout_chance: f64,
}

impl Default for VegetationConfig {
    fn default() -> Self {
        Self {
            initial_patches: 600,
            spread_chance: 0.05,
            sprout_chance: 0.5,
        }
    }
}

impl VegetationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("vegetation.spread_chance", self.spread_chance)?;
        check_probability("vegetation.sprout_chance", self.sprout_chance)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: u32,
    pub height: u32,
    pub torus: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            width: 50,
            height: 50,
            torus: true,
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid("grid", "width and height must be non-zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        HerbivoreConfig::default().validate().unwrap();
        PredatorConfig::default().validate().unwrap();
        VegetationConfig::default().validate().unwrap();
        GridConfig::default().validate().unwrap();
    }

    #[test]
    fn test_energy_creating_split_rejected() {
        let mut config = HerbivoreConfig::default();
        config.breeding.offspring_fraction = 0.8;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("would create energy"), "{err}");
    }

    #[test]
    fn test_zero_retain_fraction_rejected() {
        let mut config = PredatorConfig::default();
        config.breeding.retain_fraction = 0.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("retain_fraction"), "{err}");
    }

    #[test]
    fn test_unsorted_tiers_rejected() {
        let mut config = PredatorConfig::default();
        config.hunger_tiers = vec![HungerTier::new(0, 0.2), HungerTier::new(7, 0.4)];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_probability_bounds() {
        let mut config = VegetationConfig::default();
        config.spread_chance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_initial_band_within_max() {
        let mut config = PredatorConfig::default();
        config.initial_energy = EnergyBand {
            min: 10.0,
            max: 200.0,
        };
        assert!(config.validate().is_err());
    }
}
