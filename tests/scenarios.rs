use meadow::{
    behavior::{Behavior, HerbivoreBehavior, Hunting, Movement, PredatorBehavior},
    config::{BirthSite, HerbivoreConfig, PredatorConfig},
    organism::{reproduce, BirthPlan, EnergySplit, Organism, Species},
    perception::{Perception, NOT_DETECTED},
    spatial::{Grid, Pos},
    world::World,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn herbivores() -> HerbivoreBehavior {
    HerbivoreBehavior::new(HerbivoreConfig::default()).expect("herbivore brain builds")
}

fn predators() -> PredatorBehavior {
    PredatorBehavior::new(PredatorConfig::default()).expect("predator brain builds")
}

#[test]
fn test_full_energy_no_predator_seeks_partner_and_breeds() {
    let organism = Organism::new(Species::Herbivore, 100.0, 100.0);
    let perception = Perception {
        food_proximity: Some(NOT_DETECTED),
        predator_proximity: Some(NOT_DETECTED),
        ..Perception::new(1.0)
    };

    let action = herbivores().decide(&organism, &perception);

    assert_eq!(action.choice, Movement::SeekPartner);
    assert!(action.breed);
}

#[test]
fn test_co_located_predator_sprint_or_flee() {
    let behavior = herbivores();
    let mut world = World::new(Grid::new(12, 12).unwrap());
    let cell = Pos::new(6, 6);
    let prey = world
        .spawn_organism(Organism::new(Species::Herbivore, 50.0, 100.0), cell)
        .unwrap();
    world
        .spawn_organism(Organism::new(Species::Predator, 80.0, 150.0), cell)
        .unwrap();

    let perception = behavior.perceive(&world, prey).unwrap();
    assert_eq!(perception.predator_proximity, Some(0));

    for energy in [0.05, 0.5, 1.0] {
        for food in [0, 3, NOT_DETECTED] {
            let mut organism = Organism::new(Species::Herbivore, energy * 100.0, 100.0);
            let senses = Perception {
                food_proximity: Some(food),
                predator_proximity: Some(0),
                ..Perception::new(energy)
            };
            assert_eq!(behavior.decide(&organism, &senses).choice, Movement::Sprint);

            organism.set_cooldown(2);
            assert_eq!(behavior.decide(&organism, &senses).choice, Movement::Flee);
        }
    }
}

#[test]
fn test_hungry_predator_chases_and_eats_co_located_prey() {
    let behavior = predators();
    let mut world = World::new(Grid::new(12, 12).unwrap());
    let cell = Pos::new(3, 9);
    let hunter = world
        .spawn_organism(Organism::new(Species::Predator, 30.0, 150.0), cell)
        .unwrap();
    let prey = world
        .spawn_organism(Organism::new(Species::Herbivore, 50.0, 100.0), cell)
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(21);

    let perception = behavior.perceive(&world, hunter).unwrap();
    assert_eq!(perception.prey_proximity, Some(0));
    assert!((perception.energy_fraction - 0.2).abs() < 1e-9);

    let organism = world.organism(hunter).unwrap().clone();
    let action = behavior.decide(&organism, &perception);
    assert_eq!(action.choice, Hunting::Chase);

    behavior.act(&mut world, hunter, action, &mut rng);

    assert!(!world.is_alive(prey));
    assert_eq!(world.count(Species::Herbivore), 0);
    assert_eq!(world.organism(hunter).unwrap().energy, 60.0);
}

#[test]
fn test_predator_meal_is_capped_at_max_energy() {
    let behavior = predators();
    let mut world = World::new(Grid::new(8, 8).unwrap());
    let cell = Pos::new(1, 1);
    let hunter = world
        .spawn_organism(Organism::new(Species::Predator, 135.0, 150.0), cell)
        .unwrap();
    world
        .spawn_organism(Organism::new(Species::Herbivore, 50.0, 100.0), cell)
        .unwrap();
    let mut rng = ChaCha8Rng::seed_from_u64(2);

    behavior.eat(&mut world, hunter, &mut rng).unwrap();
    assert_eq!(world.organism(hunter).unwrap().energy, 150.0);
}

#[test]
fn test_neighbors_wrap_on_ten_by_ten_torus() {
    let grid = Grid::new(10, 10).unwrap();
    let cells = grid.neighbors(Pos::new(0, 0), 1);

    assert_eq!(cells.len(), 8);
    for expected in [Pos::new(9, 9), Pos::new(9, 0), Pos::new(0, 9)] {
        assert!(cells.contains(&expected), "missing {expected:?}");
    }
}

#[test]
fn test_reproduction_without_free_cell_is_atomic() {
    let mut world = World::new(Grid::new(10, 10).unwrap());
    let center = Pos::new(5, 5);
    let parent = world
        .spawn_organism(Organism::new(Species::Predator, 140.0, 150.0), center)
        .unwrap();
    for cell in world.grid().neighbors(center, 1) {
        world
            .spawn_organism(Organism::new(Species::Predator, 10.0, 150.0), cell)
            .unwrap();
    }
    let before = world.census();
    let plan = BirthPlan {
        split: EnergySplit {
            retain_fraction: 0.5,
            offspring_fraction: 0.4,
        },
        site: BirthSite::Adjacent,
        cooldown_ticks: Some(40),
    };
    let mut rng = ChaCha8Rng::seed_from_u64(1);

    assert!(reproduce(&mut world, parent, &plan, &mut rng).is_none());

    let parent_state = world.organism(parent).unwrap();
    assert_eq!(parent_state.energy, 140.0);
    assert_eq!(parent_state.cooldown(), 0);
    assert_eq!(world.census(), before);
}
