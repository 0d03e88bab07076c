//! Scalar cost of one scenario outcome.
//!
//! `cost = tracking_rms + Σ max(0, metric − target) · weight` over the
//! chattering index, tracking RMS and effort RMS. A diverged scenario costs a
//! fixed instability penalty instead.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::simulation::evaluator::ScenarioOutcome;
use crate::simulation::metrics::ScenarioMetrics;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PenaltyWeights {
    pub chattering: f64,
    pub tracking: f64,
    pub effort: f64,
}

impl Default for PenaltyWeights {
    fn default() -> Self {
        Self {
            chattering: 0.01,
            tracking: 10.0,
            effort: 0.1,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct PenaltyTargets {
    pub chattering: f64,
    /// rad
    pub tracking: f64,
    /// N
    pub effort: f64,
}

impl Default for PenaltyTargets {
    fn default() -> Self {
        Self {
            chattering: 300.0,
            tracking: 0.1,
            effort: 20.0,
        }
    }
}

/// Individual penalty contributions, already weighted.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Penalties {
    pub chattering: f64,
    pub tracking: f64,
    pub effort: f64,
}

impl Penalties {
    pub fn total(&self) -> f64 {
        self.chattering + self.tracking + self.effort
    }
}

/// Immutable score of one candidate on one scenario (or, for the optimizer,
/// on a whole scenario set). Metric fields are zero for unstable outcomes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FitnessRecord {
    pub cost: f64,
    pub tracking_rms: f64,
    pub effort_rms: f64,
    pub chattering_index: f64,
    pub penalties: Penalties,
    pub stable: bool,
}

impl FitnessRecord {
    /// Record for a cost that does not come from a simulation, such as an
    /// analytic test function.
    pub fn from_cost(cost: f64) -> Self {
        Self {
            cost,
            tracking_rms: 0.0,
            effort_rms: 0.0,
            chattering_index: 0.0,
            penalties: Penalties::default(),
            stable: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct CostFunction {
    pub weights: PenaltyWeights,
    pub targets: PenaltyTargets,
    pub instability_penalty: f64,
}

impl Default for CostFunction {
    fn default() -> Self {
        Self {
            weights: PenaltyWeights::default(),
            targets: PenaltyTargets::default(),
            instability_penalty: 1000.0,
        }
    }
}

impl CostFunction {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("penalty_weights.chattering", self.weights.chattering),
            ("penalty_weights.tracking", self.weights.tracking),
            ("penalty_weights.effort", self.weights.effort),
            ("penalty_targets.chattering", self.targets.chattering),
            ("penalty_targets.tracking", self.targets.tracking),
            ("penalty_targets.effort", self.targets.effort),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if !(self.instability_penalty.is_finite() && self.instability_penalty > 0.0) {
            return Err(ConfigError::invalid(
                "instability_penalty",
                format!("must be positive, got {}", self.instability_penalty),
            ));
        }
        Ok(())
    }

    pub fn score(&self, outcome: &ScenarioOutcome) -> FitnessRecord {
        match outcome {
            ScenarioOutcome::Completed(metrics) => self.score_metrics(metrics),
            ScenarioOutcome::Diverged(_) => self.unstable(),
        }
    }

    pub fn score_metrics(&self, metrics: &ScenarioMetrics) -> FitnessRecord {
        let excess = |value: f64, target: f64, weight: f64| (value - target).max(0.0) * weight;
        let penalties = Penalties {
            chattering: excess(
                metrics.chattering_index,
                self.targets.chattering,
                self.weights.chattering,
            ),
            tracking: excess(
                metrics.tracking_rms,
                self.targets.tracking,
                self.weights.tracking,
            ),
            effort: excess(metrics.effort_rms, self.targets.effort, self.weights.effort),
        };
        FitnessRecord {
            cost: metrics.tracking_rms + penalties.total(),
            tracking_rms: metrics.tracking_rms,
            effort_rms: metrics.effort_rms,
            chattering_index: metrics.chattering_index,
            penalties,
            stable: true,
        }
    }

    pub fn unstable(&self) -> FitnessRecord {
        FitnessRecord {
            stable: false,
            ..FitnessRecord::from_cost(self.instability_penalty)
        }
    }
}
