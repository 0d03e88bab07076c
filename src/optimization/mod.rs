//! Particle-swarm search over controller gains.

pub mod artifact;
pub mod campaign;
pub mod config;
pub mod pso;

pub use artifact::GainResultArtifact;
pub use campaign::{optimize_controller, Campaign, CampaignOutput};
pub use config::{InertiaWeight, OptimizationConfig};
pub use pso::{
    constriction_factor, CancellationToken, OptimizationResult, OptimizationStatus,
    OptimizerStalled, Particle, PsoOptimizer,
};
