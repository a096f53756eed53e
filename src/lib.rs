//! Predator/prey ecosystem on a toroidal grid, driven by per-species fuzzy
//! rule bases.

pub mod behavior;
pub mod config;
pub mod engine;
pub mod fuzzy;
pub mod organism;
pub mod perception;
pub mod rng;
pub mod scenario;
pub mod spatial;
pub mod systems;
pub mod world;

pub use engine::{Engine, EngineBuilder, TickSummary};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{Census, World};
