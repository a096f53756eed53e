mod fauna;
mod vegetation;

pub use fauna::FaunaSystem;
pub use vegetation::VegetationSystem;
