pub mod dynamics;
pub mod params;

pub use dynamics::{ModelVariant, PlantDynamics, PlantModel, State};
pub use params::PhysicalParams;
