//! Hunters: chase or stalk herbivores, conserve energy when prey is scarce.

use rand::{seq::SliceRandom, Rng, RngCore};
use tracing::debug;

use super::{BehaviorError, random_move, step_toward, ActionBundle, Behavior};
use crate::{
    config::PredatorConfig,
    fuzzy::{FuzzyError, FuzzyRule, FuzzyVariable, Membership, OutputVariable, RuleBase},
    organism::{reproduce, BirthPlan, EnergySplit, Organism, Species, Vitality},
    perception::{scan, Perception},
    world::{EntityId, Role, World},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hunting {
    Conserve,
    Stalk,
    Chase,
}

impl Hunting {
    /// Tie-break order, strongest first.
    pub const PRIORITY: [Hunting; 3] = [Hunting::Chase, Hunting::Stalk, Hunting::Conserve];

    pub const fn label(self) -> &'static str {
        match self {
            Hunting::Conserve => "conserve",
            Hunting::Stalk => "stalk",
            Hunting::Chase => "chase",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::PRIORITY.into_iter().find(|hunting| hunting.label() == label)
    }
}

const HUNTING: &str = "hunting";
const REPRODUCTION: &str = "reproduction";

pub fn brain(breed_threshold: f64) -> Result<RuleBase, FuzzyError> {
    let energy = FuzzyVariable::new("energy")
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
        );
    let prey = FuzzyVariable::new("prey_proximity")
        .with_set(
            "near",
            Membership::Falling {
                full: 0.0,
                zero: 4.0,
            },
        )
        .with_set(
            "medium",
            Membership::Trapezoid {
                left: 1.0,
                left_top: 3.0,
                right_top: 4.0,
                right: 6.0,
            },
        )
        .with_set(
            "far",
            Membership::Rising {
                zero: 2.0,
                full: 6.0,
            },
        );
    let count = FuzzyVariable::new("prey_count")
        .with_set(
            "few",
            Membership::Falling {
                full: 0.0,
                zero: 2.0,
            },
        )
        .with_set(
            "some",
            Membership::Triangle {
                left: 1.0,
                peak: 3.0,
                right: 5.0,
            },
        )
        .with_set(
            "many",
            Membership::Rising {
                zero: 3.0,
                full: 6.0,
            },
        );

    let priority = Hunting::PRIORITY.map(Hunting::label);
    let hunting = |category: Hunting| (HUNTING, category.label());

    RuleBase::builder()
        .with_input(energy)
        .with_input(prey)
        .with_input(count)
        .with_output(OutputVariable::choice(
            HUNTING,
            &priority,
            Hunting::Conserve.label(),
        ))
        .with_output(OutputVariable::flag(
            REPRODUCTION,
            "yes",
            "no",
            breed_threshold,
        ))
        .with_rules([
            FuzzyRule::new(
                &[("energy", "low"), ("prey_proximity", "near")],
                hunting(Hunting::Chase),
                1.0,
            ),
            FuzzyRule::new(
                &[("energy", "low"), ("prey_proximity", "medium")],
                hunting(Hunting::Chase),
                0.9,
            ),
            FuzzyRule::new(
                &[("energy", "medium"), ("prey_proximity", "near")],
                hunting(Hunting::Chase),
                0.9,
            ),
            FuzzyRule::new(
                &[("energy", "medium"), ("prey_count", "many")],
                hunting(Hunting::Chase),
                0.8,
            ),
            FuzzyRule::new(
                &[("energy", "medium"), ("prey_count", "some")],
                hunting(Hunting::Stalk),
                0.7,
            ),
            FuzzyRule::new(
                &[("energy", "high"), ("prey_proximity", "near")],
                hunting(Hunting::Chase),
                0.9,
            ),
            FuzzyRule::new(
                &[
                    ("energy", "high"),
                    ("prey_proximity", "far"),
                    ("prey_count", "few"),
                ],
                hunting(Hunting::Conserve),
                0.5,
            ),
            FuzzyRule::new(&[("prey_proximity", "near")], hunting(Hunting::Chase), 0.8),
            FuzzyRule::new(&[("energy", "high")], (REPRODUCTION, "yes"), 0.7),
            FuzzyRule::new(&[("energy", "low")], (REPRODUCTION, "no"), 0.9),
            FuzzyRule::new(&[("energy", "medium")], (REPRODUCTION, "no"), 0.6),
        ])
        .build()
}

pub struct PredatorBehavior {
    config: PredatorConfig,
    brain: RuleBase,
}

impl PredatorBehavior {
    pub fn new(config: PredatorConfig) -> Result<Self, BehaviorError> {
        config.validate()?;
        let brain = brain(config.breeding.strength_threshold)?;
        Ok(Self { config, brain })
    }

    pub fn config(&self) -> &PredatorConfig {
        &self.config
    }

    /// Kill and eat one herbivore sharing the predator's cell.
    pub fn eat(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) -> Option<EntityId> {
        let pos = world.position_of(id)?;
        let prey: Vec<EntityId> = world.occupants_with_role(pos, Role::Prey).collect();
        let victim = *prey.choose(rng)?;
        world.despawn(victim);
        world.organism_mut(id)?.feed(self.config.prey_energy);
        debug!(predator = %id, prey = %victim, "kill");
        Some(victim)
    }

    fn chase(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        if self.eat(world, id, rng).is_some() {
            return;
        }
        let target = scan(world, id, self.config.chase_radius, Role::Prey)
            .and_then(|sighting| sighting.nearest().map(|hit| hit.pos));
        match target {
            Some(target) => {
                step_toward(world, id, target);
            }
            None => {
                random_move(world, id, rng);
            }
        }
        self.eat(world, id, rng);
    }

    fn stalk(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let cells = scan(world, id, self.config.stalk_radius, Role::Prey)
            .map(|sighting| sighting.cells())
            .unwrap_or_default();
        match cells.choose(rng) {
            Some(target) => {
                let target = *target;
                step_toward(world, id, target);
            }
            None => {
                random_move(world, id, rng);
            }
        }
        self.eat(world, id, rng);
    }

    fn conserve(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        random_move(world, id, rng);
        self.eat(world, id, rng);
    }

    fn try_breed(&self, world: &mut World, id: EntityId, rng: &mut dyn RngCore) {
        let breeding = self.config.breeding;
        let Some(organism) = world.organism(id) else {
            return;
        };
        if organism.cooldown() > 0 || !organism.has_energy_fraction(breeding.energy_threshold) {
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
            cooldown_ticks: Some(self.config.breeding_cooldown_ticks),
        };
        reproduce(world, id, &plan, rng);
    }
}

impl Behavior for PredatorBehavior {
    type Choice = Hunting;

    fn species(&self) -> Species {
        Species::Predator
    }

    fn metabolize(&self, organism: &mut Organism, rng: &mut dyn RngCore) -> Vitality {
        organism.apply_hunger(&self.config.hunger_tiers, rng)
    }

    fn perceive(&self, world: &World, id: EntityId) -> Option<Perception> {
        let organism = world.organism(id)?;
        let prey = scan(world, id, self.config.scan_radius, Role::Prey)?;
        Some(Perception {
            prey_proximity: Some(prey.proximity()),
            prey_count: Some(prey.count()),
            ..Perception::new(organism.energy_fraction())
        })
    }

    fn decide(&self, _organism: &Organism, perception: &Perception) -> ActionBundle<Hunting> {
        let decision = self.brain.decide(&perception.to_inputs());
        ActionBundle {
            choice: decision
                .choice(HUNTING)
                .and_then(Hunting::from_label)
                .unwrap_or(Hunting::Conserve),
            breed: decision.flag(REPRODUCTION),
        }
    }

    fn act(
        &self,
        world: &mut World,
        id: EntityId,
        action: ActionBundle<Hunting>,
        rng: &mut dyn RngCore,
    ) {
        match action.choice {
            Hunting::Chase => self.chase(world, id, rng),
            Hunting::Stalk => self.stalk(world, id, rng),
            Hunting::Conserve => self.conserve(world, id, rng),
        }
        if action.breed {
            self.try_breed(world, id, rng);
        }
    }
}
