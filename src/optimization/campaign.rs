//! Wires factory, scenarios, robust evaluator and PSO into one campaign.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::controllers::ControllerFactory;
use crate::core::stopwatch::Stopwatch;
use crate::error::OptimizationError;
use crate::optimization::artifact::GainResultArtifact;
use crate::optimization::config::OptimizationConfig;
use crate::optimization::pso::{CancellationToken, OptimizationResult, PsoOptimizer};
use crate::simulation::{RobustEvaluation, RobustEvaluator, ScenarioEvaluator, ScenarioSet};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CampaignOutput {
    pub result: OptimizationResult,
    /// Robust evaluation of the best candidate.
    pub robust: RobustEvaluation,
    pub artifact: GainResultArtifact,
}

#[derive(Debug)]
pub struct Campaign {
    config: OptimizationConfig,
    scenarios: ScenarioSet,
    robust: RobustEvaluator,
    optimizer: PsoOptimizer,
}

impl Campaign {
    /// Fails on invalid configuration; nothing is simulated yet.
    pub fn new(config: OptimizationConfig) -> Result<Self, OptimizationError> {
        config.validate()?;
        let kind = config.controller_type;
        let bounds = config.search_bounds();
        if bounds.dimension() != kind.arity() {
            return Err(OptimizationError::DimensionMismatch {
                bounds: bounds.dimension(),
                arity: kind.arity(),
            });
        }

        let factory = Arc::new(
            ControllerFactory::new(config.simulation.plant()).with_config(config.controller.clone()),
        );
        let baseline = match &config.baseline_gains {
            Some(gains) => gains.clone(),
            None => factory.entry(kind)?.default_gains,
        };
        let scenarios = ScenarioSet::generate(&config.scenario_mix, config.n_scenarios, config.seed);
        let evaluator = ScenarioEvaluator::new(
            Arc::clone(&factory),
            kind,
            config.simulation.clone(),
            config.controller.clone(),
            config.chattering,
        );
        let robust = RobustEvaluator::new(evaluator, config.cost_function(), config.tail_weight)
            .with_bounds(bounds.clone());
        let optimizer = PsoOptimizer::new(&config, bounds)?.with_baseline(baseline)?;

        Ok(Self {
            config,
            scenarios,
            robust,
            optimizer,
        })
    }

    pub fn scenarios(&self) -> &ScenarioSet {
        &self.scenarios
    }

    pub fn robust_evaluator(&self) -> &RobustEvaluator {
        &self.robust
    }

    pub fn run(&self, cancel: &CancellationToken) -> Result<CampaignOutput, OptimizationError> {
        let kind = self.config.controller_type;
        let _span = tracing::info_span!("campaign", %kind, seed = self.config.seed).entered();
        tracing::info!(
            particles = self.config.n_particles,
            iterations = self.config.n_iterations,
            scenarios = self.scenarios.len(),
            "starting optimization"
        );
        let mut stopwatch = Stopwatch::new(format!("optimize {}", kind));

        let penalty = self.robust.cost_function().unstable();
        let fitness = |gains: &[f64]| match self.robust.evaluate_robust(gains, &self.scenarios) {
            Ok(evaluation) => evaluation.fitness(),
            Err(err) => {
                tracing::warn!(%err, ?gains, "candidate evaluation failed");
                penalty
            }
        };
        let result = self.optimizer.optimize(fitness, cancel)?;
        stopwatch.record_split("swarm search".to_owned());

        let robust = self
            .robust
            .evaluate_robust(&result.best_position, &self.scenarios)?;
        stopwatch.record_split("best candidate re-evaluation".to_owned());
        stopwatch.log_summary();

        let artifact = GainResultArtifact::new(kind, &result, &robust, self.config.seed);
        Ok(CampaignOutput {
            result,
            robust,
            artifact,
        })
    }
}

/// Run a complete campaign for `config.controller_type`.
pub fn optimize_controller(
    config: &OptimizationConfig,
    cancel: &CancellationToken,
) -> Result<CampaignOutput, OptimizationError> {
    Campaign::new(config.clone())?.run(cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{ControllerKind, GainBounds};
    use crate::optimization::OptimizationStatus;
    use crate::simulation::SimulationConfig;
    use more_asserts::assert_le;

    fn small_config() -> OptimizationConfig {
        OptimizationConfig {
            n_particles: 4,
            n_iterations: 2,
            n_scenarios: 2,
            simulation: SimulationConfig {
                duration: 1.0,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn small_campaign_never_loses_the_baseline() {
        let output = optimize_controller(&small_config(), &CancellationToken::new()).unwrap();
        assert_eq!(output.result.cost_history.len(), 3);
        assert_eq!(output.artifact.gains.len(), 6);
        assert_eq!(output.robust.cost, output.result.best_cost);
        // The exact baseline is part of the initial swarm.
        let campaign = Campaign::new(small_config()).unwrap();
        let baseline = campaign
            .robust_evaluator()
            .evaluate_robust(&[20.0, 15.0, 12.0, 8.0, 35.0, 5.0], campaign.scenarios())
            .unwrap();
        assert_le!(output.result.best_cost, baseline.cost);
    }

    #[test]
    fn cancelled_before_start_still_reports_a_candidate() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let output = optimize_controller(&small_config(), &cancel).unwrap();
        assert_eq!(output.result.status, OptimizationStatus::Cancelled);
        assert_eq!(output.result.iterations, 0);
        assert_eq!(output.artifact.gain_values().len(), 6);
    }

    #[test]
    fn bounds_of_the_wrong_arity_are_rejected() {
        let config = OptimizationConfig {
            controller_type: ControllerKind::HybridAdaptiveStaSmc,
            bounds: Some(GainBounds::for_kind(ControllerKind::ClassicalSmc)),
            ..small_config()
        };
        assert!(matches!(
            Campaign::new(config),
            Err(OptimizationError::DimensionMismatch { bounds: 6, arity: 4 })
        ));
    }
}
