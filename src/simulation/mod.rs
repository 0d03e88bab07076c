//! Closed-loop simulation of one controller against the plant, scenario
//! generation, scoring, and the multi-scenario robust evaluator.

pub mod config;
pub mod evaluator;
pub mod fitness;
pub mod metrics;
pub mod robust;
pub mod scenarios;

pub use config::{SafetyEnvelope, SimulationConfig};
pub use evaluator::{simulate, Divergence, DivergenceCause, ScenarioEvaluator, ScenarioOutcome};
pub use fitness::{CostFunction, FitnessRecord, PenaltyTargets, PenaltyWeights};
pub use metrics::{ChatteringConfig, ScenarioMetrics, Trajectory};
pub use robust::{RobustEvaluation, RobustEvaluator};
pub use scenarios::{ClassWeights, Scenario, ScenarioClass, ScenarioMix, ScenarioSet};
