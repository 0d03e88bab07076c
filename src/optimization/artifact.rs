use serde::{Deserialize, Serialize};

use crate::controllers::ControllerKind;
use crate::optimization::pso::{OptimizationResult, OptimizationStatus, OptimizerStalled};
use crate::simulation::{FitnessRecord, RobustEvaluation};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NamedGain {
    pub name: String,
    pub value: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RobustSummary {
    pub mean: f64,
    pub worst: f64,
    pub costs: Vec<f64>,
    pub unstable_scenarios: usize,
}

/// Outcome of one optimization campaign, ready to be persisted by the caller.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GainResultArtifact {
    pub controller_type: ControllerKind,
    pub gains: Vec<NamedGain>,
    pub best_cost: f64,
    /// Metrics of the best candidate on its worst scenario.
    pub fitness: FitnessRecord,
    pub robust: RobustSummary,
    pub status: OptimizationStatus,
    pub stalled: Option<OptimizerStalled>,
    pub iterations: usize,
    pub seed: u64,
    pub cost_history: Vec<f64>,
    /// RFC 3339 timestamp.
    pub created_at: String,
}

impl GainResultArtifact {
    pub fn new(
        kind: ControllerKind,
        result: &OptimizationResult,
        robust: &RobustEvaluation,
        seed: u64,
    ) -> Self {
        let gains = kind
            .gain_names()
            .iter()
            .zip(&result.best_position)
            .map(|(name, &value)| NamedGain {
                name: (*name).to_owned(),
                value,
            })
            .collect();
        Self {
            controller_type: kind,
            gains,
            best_cost: result.best_cost,
            fitness: robust.fitness(),
            robust: RobustSummary {
                mean: robust.mean,
                worst: robust.worst,
                costs: robust.costs.clone(),
                unstable_scenarios: robust.unstable_scenarios,
            },
            status: result.status,
            stalled: result.stalled,
            iterations: result.iterations,
            seed,
            cost_history: result.cost_history.clone(),
            created_at: chrono::Local::now().to_rfc3339(),
        }
    }

    pub fn gain_values(&self) -> Vec<f64> {
        self.gains.iter().map(|g| g.value).collect()
    }
}
