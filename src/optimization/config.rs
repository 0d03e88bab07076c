use serde::{Deserialize, Serialize};

use crate::controllers::{ControllerConfig, ControllerKind, GainBounds};
use crate::error::ConfigError;
use crate::simulation::{
    ChatteringConfig, CostFunction, PenaltyTargets, PenaltyWeights, ScenarioMix, SimulationConfig,
};

/// Either a fixed inertia weight or a linear schedule `[hi, lo]`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(untagged)]
pub enum InertiaWeight {
    Constant(f64),
    Schedule([f64; 2]),
}

impl Default for InertiaWeight {
    fn default() -> Self {
        InertiaWeight::Schedule([0.9, 0.4])
    }
}

impl InertiaWeight {
    /// `hi` on the first iteration, `lo` on the last.
    pub fn at(&self, iteration: usize, n_iterations: usize) -> f64 {
        match *self {
            InertiaWeight::Constant(w) => w,
            InertiaWeight::Schedule([hi, lo]) => {
                if n_iterations <= 1 {
                    hi
                } else {
                    let alpha = iteration.min(n_iterations - 1) as f64 / (n_iterations - 1) as f64;
                    hi + alpha * (lo - hi)
                }
            }
        }
    }

    fn values(&self) -> Vec<f64> {
        match *self {
            InertiaWeight::Constant(w) => vec![w],
            InertiaWeight::Schedule(pair) => pair.to_vec(),
        }
    }
}

/// Everything a PSO campaign needs. Unknown keys are ignored and missing
/// keys take the defaults below.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OptimizationConfig {
    pub controller_type: ControllerKind,
    pub n_particles: usize,
    pub n_iterations: usize,
    pub inertia_weight: InertiaWeight,
    pub cognitive_weight: f64,
    pub social_weight: f64,
    pub warm_start_fraction: f64,
    /// Standard deviation of the warm-start noise, as a fraction of each
    /// dimension's range.
    pub warm_start_noise: f64,
    pub velocity_clamp_fraction: f64,
    /// Known-good gains for the warm start. Registry defaults when absent.
    pub baseline_gains: Option<Vec<f64>>,
    /// Search space. Registry bounds of `controller_type` when absent.
    pub bounds: Option<GainBounds>,
    pub seed: u64,
    pub scenario_mix: ScenarioMix,
    pub n_scenarios: usize,
    /// `β` in `mean + β·max`.
    pub tail_weight: f64,
    pub penalty_weights: PenaltyWeights,
    pub penalty_targets: PenaltyTargets,
    pub instability_penalty: f64,
    pub chattering: ChatteringConfig,
    pub plateau_iterations: usize,
    pub plateau_tolerance: f64,
    pub stall_iterations: usize,
    pub simulation: SimulationConfig,
    pub controller: ControllerConfig,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            controller_type: ControllerKind::ClassicalSmc,
            n_particles: 30,
            n_iterations: 50,
            inertia_weight: InertiaWeight::default(),
            cognitive_weight: 2.0,
            social_weight: 2.0,
            warm_start_fraction: 0.3,
            warm_start_noise: 0.05,
            velocity_clamp_fraction: 0.2,
            baseline_gains: None,
            bounds: None,
            seed: 42,
            scenario_mix: ScenarioMix::default(),
            n_scenarios: 10,
            tail_weight: 0.3,
            penalty_weights: PenaltyWeights::default(),
            penalty_targets: PenaltyTargets::default(),
            instability_penalty: CostFunction::default().instability_penalty,
            chattering: ChatteringConfig::default(),
            plateau_iterations: 10,
            plateau_tolerance: 1e-6,
            stall_iterations: 5,
            simulation: SimulationConfig::default(),
            controller: ControllerConfig::default(),
        }
    }
}

impl OptimizationConfig {
    pub fn cost_function(&self) -> CostFunction {
        CostFunction {
            weights: self.penalty_weights,
            targets: self.penalty_targets,
            instability_penalty: self.instability_penalty,
        }
    }

    pub fn search_bounds(&self) -> GainBounds {
        self.bounds
            .clone()
            .unwrap_or_else(|| GainBounds::for_kind(self.controller_type))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_particles == 0 {
            return Err(ConfigError::invalid("n_particles", "must be at least one"));
        }
        if self.n_scenarios == 0 {
            return Err(ConfigError::invalid("n_scenarios", "must be at least one"));
        }
        if self
            .inertia_weight
            .values()
            .iter()
            .any(|w| !(w.is_finite() && *w >= 0.0))
        {
            return Err(ConfigError::invalid(
                "inertia_weight",
                "must be finite and non-negative",
            ));
        }
        for (field, value) in [
            ("cognitive_weight", self.cognitive_weight),
            ("social_weight", self.social_weight),
            ("warm_start_noise", self.warm_start_noise),
            ("tail_weight", self.tail_weight),
            ("plateau_tolerance", self.plateau_tolerance),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.warm_start_fraction) {
            return Err(ConfigError::invalid(
                "warm_start_fraction",
                format!("must be in [0, 1], got {}", self.warm_start_fraction),
            ));
        }
        if !(self.velocity_clamp_fraction > 0.0 && self.velocity_clamp_fraction <= 1.0) {
            return Err(ConfigError::invalid(
                "velocity_clamp_fraction",
                format!("must be in (0, 1], got {}", self.velocity_clamp_fraction),
            ));
        }
        if self.plateau_iterations == 0 || self.stall_iterations == 0 {
            return Err(ConfigError::invalid(
                "plateau_iterations",
                "plateau and stall windows must be at least one iteration",
            ));
        }
        let bounds = self.search_bounds();
        bounds.validate()?;
        if let Some(baseline) = &self.baseline_gains {
            if baseline.len() != bounds.dimension() {
                return Err(ConfigError::invalid(
                    "baseline_gains",
                    format!(
                        "has {} entries but the search space has {}",
                        baseline.len(),
                        bounds.dimension()
                    ),
                ));
            }
        }
        self.scenario_mix.validate()?;
        self.cost_function().validate()?;
        self.chattering.validate()?;
        self.simulation.validate()?;
        self.controller.validate()?;
        Ok(())
    }
}
