//! Grazers: eat vegetation, evade predators, breed when safe and fed.

use rand::{seq::SliceRandom, Rng, RngCore};
use tracing::debug;

use super::{BehaviorError, random_move, relocate, step_toward, ActionBundle, Behavior};
use crate::{
    config::HerbivoreConfig,
    fuzzy::{FuzzyError, FuzzyRule, FuzzyVariable, Membership, OutputVariable, RuleBase},
    organism::{reproduce, BirthPlan, EnergySplit, Organism, Species, Vitality},
    perception::{scan, Perception},
    spatial::Pos,
    world::{EntityId, Role, World},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Movement {
    Wander,
    SeekFood,
    SeekPartner,
    Flee,
    Sprint,
}

impl Movement {
    /// Tie-break order, strongest first.
    pub const PRIORITY: [Movement; 5] = [
        Movement::Sprint,
        Movement::Flee,
        Movement::SeekFood,
        Movement::SeekPartner,
        Movement::Wander,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            Movement::Wander => "wander",
            Movement::SeekFood => "seek_food",
            Movement::SeekPartner => "seek_partner",
            Movement::Flee => "flee",
            Movement::Sprint => "sprint",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|movement| movement.label() == label)
    }
}

const MOVEMENT: &str = "movement";
const REPRODUCTION: &str = "reproduction";

fn energy_variable() -> FuzzyVariable {
    FuzzyVariable::new("energy")
        .with_set(
            "low",
            Membership::Falling {
                full: 0.0,
                zero: 0.3,
            },
        )
        .with_set(
            "medium",
            Membership::Triangle {
                left: 0.1,
                peak: 0.4,
                right: 0.7,
            },
        )
        .with_set(
            "high",
            Membership::Rising {
                zero: 0.5,
                full: 1.0,
            },
        )
        .with_set(
            "full",
            Membership::Rising {
                zero: 0.85,
                full: 1.0,
            },
        )
}

/// Rule base for grazers. `breed_threshold` is the minimum "yes" strength.
pub fn brain(breed_threshold: f64) -> Result<RuleBase, FuzzyError> {
    let food = FuzzyVariable::new("food_proximity")
        .with_set(
            "near",
            Membership::Falling {
                full: 0.0,
                zero: 3.0,
            },
        )
        .with_set(
            "medium",
            Membership::Triangle {
                left: 1.0,
                peak: 3.0,
                right: 5.0,
            },
        )
        .with_set(
            "far",
            Membership::Rising {
                zero: 3.0,
                full: 6.0,
            },
        );
    let predator = FuzzyVariable::new("predator_proximity")
        .with_set(
            "very_near",
            Membership::Falling {
                full: 0.0,
                zero: 2.0,
            },
        )
        .with_set(
            "near",
            Membership::Falling {
                full: 0.0,
                zero: 4.0,
            },
        )
        .with_set(
            "medium",
            Membership::Triangle {
                left: 1.5,
                peak: 3.75,
                right: 6.0,
            },
        )
        .with_set(
            "far",
            Membership::Rising {
                zero: 3.0,
                full: 6.0,
            },
        );

    let priority = Movement::PRIORITY.map(Movement::label);
    let movement = |category: Movement| (MOVEMENT, category.label());

    RuleBase::builder()
        .with_input(energy_variable())
        .with_input(food)
        .with_input(predator)
        .with_output(OutputVariable::choice(
            MOVEMENT,
            &priority,
            Movement::Wander.label(),
        ))
        .with_output(OutputVariable::flag(
            REPRODUCTION,
            "yes",
            "no",
            breed_threshold,
        ))
        .with_rules([
            // Danger first
            FuzzyRule::new(
                &[("predator_proximity", "very_near")],
                movement(Movement::Sprint),
                1.0,
            ),
            FuzzyRule::new(
                &[("predator_proximity", "near")],
                movement(Movement::Flee),
                0.85,
            ),
            FuzzyRule::new(
                &[("predator_proximity", "medium"), ("energy", "low")],
                movement(Movement::Flee),
                0.7,
            ),
            FuzzyRule::new(
                &[("predator_proximity", "medium"), ("energy", "medium")],
                movement(Movement::Flee),
                0.6,
            ),
            // Food
            FuzzyRule::new(
                &[
                    ("energy", "medium"),
                    ("predator_proximity", "medium"),
                    ("food_proximity", "near"),
                ],
                movement(Movement::SeekFood),
                0.65,
            ),
            FuzzyRule::new(
                &[
                    ("energy", "low"),
                    ("food_proximity", "near"),
                    ("predator_proximity", "far"),
                ],
                movement(Movement::SeekFood),
                0.9,
            ),
            FuzzyRule::new(
                &[
                    ("energy", "low"),
                    ("food_proximity", "medium"),
                    ("predator_proximity", "far"),
                ],
                movement(Movement::SeekFood),
                0.8,
            ),
            FuzzyRule::new(
                &[
                    ("energy", "medium"),
                    ("food_proximity", "near"),
                    ("predator_proximity", "far"),
                ],
                movement(Movement::SeekFood),
                0.7,
            ),
            FuzzyRule::new(
                &[("energy", "medium"), ("predator_proximity", "far")],
                movement(Movement::Wander),
                0.6,
            ),
            // Mates
            FuzzyRule::new(
                &[("energy", "high"), ("predator_proximity", "far")],
                movement(Movement::SeekPartner),
                0.7,
            ),
            FuzzyRule::new(
                &[("energy", "full"), ("predator_proximity", "far")],
                movement(Movement::SeekPartner),
                0.9,
            ),
            FuzzyRule::new(
                &[("energy", "full"), ("predator_proximity", "medium")],
                movement(Movement::SeekPartner),
                0.6,
            ),
            // Reproduction
            FuzzyRule::new(
                &[("energy", "high"), ("predator_proximity", "far")],
                (REPRODUCTION, "yes"),
                0.9,
            ),
            FuzzyRule::new(&[("energy", "full")], (REPRODUCTION, "yes"), 1.0),
            FuzzyRule::new(
                &[("energy", "medium"), ("predator_proximity", "far")],
                (REPRODUCTION, "yes"),
                0.6,
            ),
            FuzzyRule::new(&[("energy", "low")], (REPRODUCTION, "no"), 0.7),
            FuzzyRule::new(
                &[("predator_proximity", "near")],
                (REPRODUCTION, "no"),
                0.9,
            ),
        ])
        .build()
}

pub struct HerbivoreBehavior {
    config: HerbivoreConfig,
    brain: RuleBase,
}

impl HerbivoreBehavior {
    pub fn new(config: HerbivoreConfig) -> Result<Self, BehaviorError> {
        config.validate()?;
        let brain = brain(config.breeding.strength_threshold)?;
        Ok(Self { config, brain })
    }

    pub fn config(&self) -> &HerbivoreConfig {
        &self.config
    }

    /// Nearest patch within the search radius, own cell included.
    fn seek_food(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let Some(pos) = world.position_of(id) else {
            return;
        };
        let grid = world.grid();
        let target = grid
            .neighborhood(pos, self.config.food_search_radius, true)
            .into_iter()
            .filter(|cell| world.has_resource(*cell))
            .min_by_key(|cell| grid.manhattan(pos, *cell));
        match target {
            Some(cell) if cell == pos => {}
            Some(cell) => {
                step_toward(world, id, cell);
            }
            None => {
                random_move(world, id, rng);
            }
        }
    }

    /// Neighbouring cell chosen with odds proportional to the herbivores in it.
    fn seek_partner(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let Some(pos) = world.position_of(id) else {
            return;
        };
        let crowds: Vec<(Pos, usize)> = world
            .grid()
            .neighbors(pos, 1)
            .into_iter()
            .map(|cell| (cell, world.occupants_with_role(cell, Role::Prey).count()))
            .collect();
        match crowds.choose_weighted(rng, |(_, herd)| *herd) {
            Ok((cell, _)) => {
                let cell = *cell;
                relocate(world, id, cell);
            }
            Err(_) => {
                random_move(world, id, rng);
            }
        }
    }

    fn flee(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let Some(pos) = world.position_of(id) else {
            return;
        };
        let Some(predators) = scan(world, id, self.config.predator_scan_radius, Role::Predator)
        else {
            return;
        };
        let Some(nearest) = predators.nearest() else {
            random_move(world, id, rng);
            return;
        };

        let weights = self.config.flee;
        let grid = world.grid();
        let threats = predators.cells();
        let away = grid.delta(nearest.pos, pos);
        let scored: Vec<(Pos, f64)> = grid
            .neighbors(pos, 1)
            .into_iter()
            .map(|cell| {
                let gap = threats
                    .iter()
                    .map(|threat| grid.manhattan(cell, *threat))
                    .min()
                    .unwrap_or(0) as f64;
                let alignment = cosine(away, grid.delta(pos, cell));
                let food = if world.has_resource(cell) {
                    weights.food_bonus
                } else {
                    0.0
                };
                (
                    cell,
                    weights.distance_weight * gap + weights.alignment_weight * alignment + food,
                )
            })
            .collect();

        let best = scored
            .iter()
            .map(|(_, score)| *score)
            .fold(f64::NEG_INFINITY, f64::max);
        let contenders: Vec<Pos> = scored
            .iter()
            .filter(|(_, score)| *score >= best - weights.tie_tolerance)
            .map(|(cell, _)| *cell)
            .collect();
        match contenders.choose(rng) {
            Some(cell) => {
                let cell = *cell;
                relocate(world, id, cell);
            }
            None => {
                random_move(world, id, rng);
            }
        }
    }

    fn sprint(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let sprint = self.config.sprint;
        let Some(organism) = world.organism_mut(id) else {
            return;
        };
        if organism.cooldown() > 0 {
            self.flee(world, id, rng);
            return;
        }
        if organism.spend(sprint.energy_cost) == Vitality::Starved {
            debug!(%id, "exhausted by sprint");
            world.despawn(id);
            return;
        }
        organism.set_cooldown(sprint.cooldown_ticks);

        let (Some(pos), Some(predators)) = (
            world.position_of(id),
            scan(world, id, self.config.predator_scan_radius, Role::Predator),
        ) else {
            return;
        };
        let Some(nearest) = predators.nearest() else {
            self.flee(world, id, rng);
            return;
        };
        let (dx, dy) = world.grid().delta(nearest.pos, pos);
        let (sx, sy) = if dx == 0 && dy == 0 {
            // Co-located: every direction leads away.
            let directions: Vec<(i64, i64)> = (-1..=1)
                .flat_map(|x| (-1..=1).map(move |y| (x, y)))
                .filter(|d| *d != (0, 0))
                .collect();
            directions.choose(rng).copied().unwrap_or((1, 0))
        } else {
            (dx.signum(), dy.signum())
        };

        let mut strides = Vec::with_capacity(2);
        if rng.gen_bool(sprint.long_step_chance) {
            strides.push(2);
        }
        strides.push(1);
        for stride in strides {
            let Ok(target) = world.grid().offset(pos, sx * stride, sy * stride) else {
                continue;
            };
            if relocate(world, id, target) {
                return;
            }
        }
        self.flee(world, id, rng);
    }

    /// Eat the patch in the current cell, if any.
    fn graze(&self, world: &mut World, id: EntityId) -> bool {
        let Some(pos) = world.position_of(id) else {
            return false;
        };
        if !world.consume_resource(pos) {
            return false;
        }
        if let Some(organism) = world.organism_mut(id) {
            organism.feed(self.config.resource_energy);
        }
        true
    }

    fn try_breed(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let breeding = self.config.breeding;
        let Some(organism) = world.organism(id) else {
            return;
        };
        if !organism.has_energy_fraction(breeding.energy_threshold) {
            return;
        }
        if !rng.gen_bool(breeding.chance) {
            return;
        }
        let plan = BirthPlan {
            split: EnergySplit {
                retain_fraction: breeding.retain_fraction,
                offspring_fraction: breeding.offspring_fraction,
            },
            site: breeding.site,
            cooldown_ticks: None,
        };
        reproduce(world, id, &plan, rng);
    }
}

/// Cosine of the angle between two displacement vectors; 0 when either is null.
fn cosine(a: (i64, i64), b: (i64, i64)) -> f64 {
    let (ax, ay) = (a.0 as f64, a.1 as f64);
    let (bx, by) = (b.0 as f64, b.1 as f64);
    let norms = ax.hypot(ay) * bx.hypot(by);
    if norms == 0.0 {
        return 0.0;
    }
    (ax * bx + ay * by) / norms
}

impl Behavior for HerbivoreBehavior {
    type Choice = Movement;

    fn species(&self) -> Species {
        Species::Herbivore
    }

    fn metabolize(&self, organism: &mut Organism, rng: &mut dyn RngCore) -> Vitality {
        organism.apply_hunger(&self.config.hunger_tiers, rng)
    }

    fn perceive(&self, world: &World, id: EntityId) -> Option<Perception> {
        let organism = world.organism(id)?;
        let food = scan(world, id, self.config.food_scan_radius, Role::Resource)?;
        let predators = scan(world, id, self.config.predator_scan_radius, Role::Predator)?;
        Some(Perception {
            food_proximity: Some(food.proximity()),
            predator_proximity: Some(predators.proximity()),
            ..Perception::new(organism.energy_fraction())
        })
    }

    fn decide(&self, organism: &Organism, perception: &Perception) -> ActionBundle<Movement> {
        let decision = self.brain.decide(&perception.to_inputs());
        let mut choice = decision
            .choice(MOVEMENT)
            .and_then(Movement::from_label)
            .unwrap_or(Movement::Wander);
        if choice == Movement::Sprint && organism.cooldown() > 0 {
            choice = Movement::Flee;
        }
        ActionBundle {
            choice,
            breed: decision.flag(REPRODUCTION),
        }
    }

    fn act(
        &self,
        world: &mut World,
        id: EntityId,
        action: ActionBundle<Movement>,
        rng: &mut dyn RngCore,
    ) {
        match action.choice {
            Movement::Wander => {
                random_move(world, id, rng);
            }
            Movement::SeekFood => self.seek_food(world, id, rng),
            Movement::SeekPartner => self.seek_partner(world, id, rng),
            Movement::Flee => self.flee(world, id, rng),
            Movement::Sprint => self.sprint(world, id, rng),
        }
        if !world.is_alive(id) {
            return;
        }
        self.graze(world, id);
        if action.breed {
            self.try_breed(world, id, rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;
    use crate::spatial::Grid;

    fn behavior() -> HerbivoreBehavior {
        HerbivoreBehavior::new(HerbivoreConfig::default()).unwrap()
    }

    fn senses(energy: f64, food: u32, predator: u32) -> Perception {
        Perception {
            food_proximity: Some(food),
            predator_proximity: Some(predator),
            ..Perception::new(energy)
        }
    }

    fn grazer(world: &mut World, energy: f64, pos: Pos) -> EntityId {
        world
            .spawn_organism(Organism::new(Species::Herbivore, energy, 100.0), pos)
            .unwrap()
    }

    #[test]
    fn test_full_and_safe_seeks_partner_and_breeds() {
        let organism = Organism::new(Species::Herbivore, 100.0, 100.0);
        let action = behavior().decide(&organism, &senses(1.0, 6, 6));
        assert_eq!(action.choice, Movement::SeekPartner);
        assert!(action.breed);
    }

    #[test]
    fn test_co_located_predator_triggers_sprint_unless_cooling_down() {
        let behavior = behavior();
        let mut organism = Organism::new(Species::Herbivore, 50.0, 100.0);
        for (energy, food) in [(0.0, 0), (0.5, 3), (1.0, 6)] {
            let action = behavior.decide(&organism, &senses(energy, food, 0));
            assert_eq!(action.choice, Movement::Sprint);
        }
        organism.set_cooldown(3);
        let action = behavior.decide(&organism, &senses(0.5, 3, 0));
        assert_eq!(action.choice, Movement::Flee);
    }

    #[test]
    fn test_hungry_and_safe_seeks_food() {
        let organism = Organism::new(Species::Herbivore, 10.0, 100.0);
        let action = behavior().decide(&organism, &senses(0.1, 1, 6));
        assert_eq!(action.choice, Movement::SeekFood);
        assert!(!action.breed);
    }

    #[test]
    fn test_seek_food_steps_onto_patch_and_eats() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(10, 10).unwrap());
        let id = grazer(&mut world, 30.0, Pos::new(5, 5));
        world.spawn_resource(Pos::new(6, 6));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        let action = ActionBundle {
            choice: Movement::SeekFood,
            breed: false,
        };
        behavior.act(&mut world, id, action, &mut rng);

        assert_eq!(world.position_of(id), Some(Pos::new(6, 6)));
        assert!(!world.has_resource(Pos::new(6, 6)));
        let organism = world.organism(id).unwrap();
        assert_eq!(organism.energy, 50.0);
        assert_eq!(organism.hunger, 0);
    }

    #[test]
    fn test_grazing_caps_energy() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(10, 10).unwrap());
        let id = grazer(&mut world, 95.0, Pos::new(2, 2));
        world.spawn_resource(Pos::new(2, 2));

        assert!(behavior.graze(&mut world, id));
        assert_eq!(world.organism(id).unwrap().energy, 100.0);
        assert!(!behavior.graze(&mut world, id));
    }

    #[test]
    fn test_flee_increases_distance() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(20, 20).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(10, 10));
        world
            .spawn_organism(Organism::new(Species::Predator, 80.0, 150.0), Pos::new(8, 10))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        behavior.flee(&mut world, id, &mut rng);

        let pos = world.position_of(id).unwrap();
        assert!(world.grid().manhattan(pos, Pos::new(8, 10)) > 2);
    }

    #[test]
    fn test_sprint_pays_cost_and_starts_cooldown() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(20, 20).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(10, 10));
        world
            .spawn_organism(Organism::new(Species::Predator, 80.0, 150.0), Pos::new(9, 10))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        behavior.sprint(&mut world, id, &mut rng);

        let organism = world.organism(id).unwrap();
        assert_eq!(organism.energy, 47.0);
        assert_eq!(organism.cooldown(), 6);
        let pos = world.position_of(id).unwrap();
        assert!(pos == Pos::new(11, 10) || pos == Pos::new(12, 10));
    }

    #[test]
    fn test_sprint_can_exhaust() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(20, 20).unwrap());
        let id = grazer(&mut world, 2.0, Pos::new(10, 10));
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        behavior.sprint(&mut world, id, &mut rng);
        assert!(!world.is_alive(id));
        assert!(world.grid().is_empty(Pos::new(10, 10)));
    }

    #[test]
    fn test_flee_without_predator_in_range_wanders() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(20, 20).unwrap());
        let start = Pos::new(10, 10);
        let id = grazer(&mut world, 50.0, start);
        let mut rng = ChaCha8Rng::seed_from_u64(12);

        behavior.flee(&mut world, id, &mut rng);

        let pos = world.position_of(id).unwrap();
        assert_eq!(world.grid().chebyshev(start, pos), 1);
    }

    #[test]
    fn test_sprint_on_cooldown_acts_as_flee_without_cost() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(20, 20).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(10, 10));
        world.organism_mut(id).unwrap().set_cooldown(3);
        let threat = Pos::new(9, 10);
        world
            .spawn_organism(Organism::new(Species::Predator, 80.0, 150.0), threat)
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        let action = ActionBundle {
            choice: Movement::Sprint,
            breed: false,
        };
        behavior.act(&mut world, id, action, &mut rng);

        let organism = world.organism(id).unwrap();
        assert_eq!(organism.energy, 50.0);
        assert_eq!(organism.cooldown(), 3);
        let pos = world.position_of(id).unwrap();
        assert!(pos == Pos::new(11, 9) || pos == Pos::new(11, 11), "{pos:?}");
    }

    #[test]
    fn test_sprint_into_wall_falls_back_to_flee() {
        let behavior = behavior();
        let mut world = World::new(Grid::with_wrapping(10, 10, false).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(0, 5));
        world
            .spawn_organism(Organism::new(Species::Predator, 80.0, 150.0), Pos::new(1, 5))
            .unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        behavior.sprint(&mut world, id, &mut rng);

        let organism = world.organism(id).unwrap();
        assert_eq!(organism.energy, 47.0);
        assert_eq!(organism.cooldown(), 6);
        let pos = world.position_of(id).unwrap();
        assert!(pos == Pos::new(0, 4) || pos == Pos::new(0, 6), "{pos:?}");
    }

    #[test]
    fn test_breeding_allowed_at_exact_threshold() {
        let mut config = HerbivoreConfig::default();
        config.breeding.chance = 1.0;
        config.breeding.energy_threshold = 0.5;
        let behavior = HerbivoreBehavior::new(config).unwrap();
        let mut world = World::new(Grid::new(10, 10).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(4, 4));
        let mut rng = ChaCha8Rng::seed_from_u64(1);

        behavior.try_breed(&mut world, id, &mut rng);
        assert_eq!(world.count(Species::Herbivore), 2);
        assert_eq!(world.organism(id).unwrap().energy, 25.0);
    }

    #[test]
    fn test_invalid_config_rejected_at_construction() {
        let mut config = HerbivoreConfig::default();
        config.sprint.long_step_chance = 2.0;
        assert!(matches!(
            HerbivoreBehavior::new(config),
            Err(BehaviorError::Config(_))
        ));
    }

    #[test]
    fn test_seek_partner_joins_herd() {
        let behavior = behavior();
        let mut world = World::new(Grid::new(10, 10).unwrap());
        let id = grazer(&mut world, 50.0, Pos::new(5, 5));
        grazer(&mut world, 50.0, Pos::new(6, 5));
        grazer(&mut world, 50.0, Pos::new(6, 5));
        let mut rng = ChaCha8Rng::seed_from_u64(8);

        behavior.seek_partner(&mut world, id, &mut rng);
        assert_eq!(world.position_of(id), Some(Pos::new(6, 5)));
    }
}
