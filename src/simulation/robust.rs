//! Multi-scenario robust evaluation: `cost = mean + β·max` over scenarios.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::controllers::gains::check_structure;
use crate::controllers::GainBounds;
use crate::error::{FactoryError, OptimizationError};
use crate::simulation::evaluator::{ScenarioEvaluator, ScenarioOutcome};
use crate::simulation::fitness::{CostFunction, FitnessRecord};
use crate::simulation::scenarios::ScenarioSet;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RobustEvaluation {
    pub cost: f64,
    /// Weighted mean of the per-scenario costs.
    pub mean: f64,
    pub worst: f64,
    /// Per-scenario costs, in scenario order.
    pub costs: Vec<f64>,
    pub records: Vec<FitnessRecord>,
    /// Empty when the candidate was rejected without simulating.
    pub outcomes: Vec<ScenarioOutcome>,
    pub unstable_scenarios: usize,
    /// Why the candidate was rejected without simulating, if it was.
    pub violation: Option<String>,
}

impl RobustEvaluation {
    /// Combine `(cost, weight)` pairs into `(robust cost, mean, worst)`.
    ///
    /// The pairs are sorted first, so the floating-point result does not
    /// depend on the order of the input.
    pub fn combine(mut pairs: Vec<(f64, f64)>, tail_weight: f64) -> (f64, f64, f64) {
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
        let total_weight: f64 = pairs.iter().map(|(_, w)| w).sum();
        let mean = if total_weight > 0.0 {
            pairs.iter().map(|(c, w)| c * w).sum::<f64>() / total_weight
        } else {
            0.0
        };
        let worst = pairs.last().map(|(c, _)| *c).unwrap_or(0.0);
        (mean + tail_weight * worst, mean, worst)
    }

    /// Summary used as the optimizer's fitness: the robust cost, with the
    /// metrics of the worst scenario.
    pub fn fitness(&self) -> FitnessRecord {
        let worst = self
            .records
            .iter()
            .max_by(|a, b| a.cost.total_cmp(&b.cost))
            .copied()
            .unwrap_or_else(|| FitnessRecord::from_cost(self.cost));
        FitnessRecord {
            cost: self.cost,
            stable: self.unstable_scenarios == 0,
            ..worst
        }
    }

    pub fn is_stable(&self) -> bool {
        self.unstable_scenarios == 0
    }
}

#[derive(Debug, Clone)]
pub struct RobustEvaluator {
    evaluator: ScenarioEvaluator,
    cost: CostFunction,
    tail_weight: f64,
    bounds: Option<GainBounds>,
}

impl RobustEvaluator {
    pub fn new(evaluator: ScenarioEvaluator, cost: CostFunction, tail_weight: f64) -> Self {
        Self {
            evaluator,
            cost,
            tail_weight,
            bounds: None,
        }
    }

    /// Also reject candidates outside `bounds` without simulating them.
    pub fn with_bounds(mut self, bounds: GainBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn evaluator(&self) -> &ScenarioEvaluator {
        &self.evaluator
    }

    pub fn cost_function(&self) -> &CostFunction {
        &self.cost
    }

    /// Infeasible candidates (non-positive gains, violated constraints, out of
    /// bounds) are charged the instability penalty on every scenario. Only a
    /// malformed gain vector or an empty scenario set is an error.
    pub fn evaluate_robust(
        &self,
        gains: &[f64],
        scenarios: &ScenarioSet,
    ) -> Result<RobustEvaluation, OptimizationError> {
        if scenarios.is_empty() {
            return Err(OptimizationError::EmptyScenarioSet);
        }
        let kind = self.evaluator.kind();
        check_structure(kind, gains).map_err(|violation| FactoryError::invalid(kind, violation))?;

        let infeasible = match self.evaluator.factory().validate(kind, gains) {
            Err(FactoryError::InvalidGainVector { violation, .. }) => Some(violation),
            Err(other) => return Err(other.into()),
            Ok(()) => self
                .bounds
                .as_ref()
                .and_then(|bounds| bounds.check(kind, gains).err()),
        };
        if let Some(violation) = infeasible {
            tracing::debug!(%kind, ?gains, %violation, "infeasible candidate");
            let records = vec![self.cost.unstable(); scenarios.len()];
            return Ok(self.assemble(scenarios, records, Vec::new(), Some(violation.to_string())));
        }

        let outcomes = scenarios
            .scenarios
            .par_iter()
            .map(|scenario| self.evaluator.evaluate(gains, scenario))
            .collect::<Result<Vec<_>, _>>()?;
        let records = outcomes.iter().map(|o| self.cost.score(o)).collect();
        Ok(self.assemble(scenarios, records, outcomes, None))
    }

    fn assemble(
        &self,
        scenarios: &ScenarioSet,
        records: Vec<FitnessRecord>,
        outcomes: Vec<ScenarioOutcome>,
        violation: Option<String>,
    ) -> RobustEvaluation {
        let costs: Vec<f64> = records.iter().map(|r| r.cost).collect();
        let pairs = costs
            .iter()
            .zip(scenarios.iter())
            .map(|(&cost, scenario)| (cost, scenario.weight))
            .collect();
        let (cost, mean, worst) = RobustEvaluation::combine(pairs, self.tail_weight);
        RobustEvaluation {
            cost,
            mean,
            worst,
            costs,
            unstable_scenarios: records.iter().filter(|r| !r.stable).count(),
            records,
            outcomes,
            violation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::{ControllerConfig, ControllerFactory, ControllerKind};
    use crate::simulation::config::SimulationConfig;
    use crate::simulation::metrics::ChatteringConfig;
    use crate::simulation::scenarios::{Scenario, ScenarioClass, ScenarioMix};
    use approx::assert_relative_eq;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn robust(kind: ControllerKind, duration: f64) -> RobustEvaluator {
        let simulation = SimulationConfig {
            duration,
            ..Default::default()
        };
        let evaluator = ScenarioEvaluator::new(
            Arc::new(ControllerFactory::default()),
            kind,
            simulation,
            ControllerConfig::default(),
            ChatteringConfig::default(),
        );
        RobustEvaluator::new(evaluator, CostFunction::default(), 0.3)
    }

    #[test]
    fn combine_is_mean_plus_tail_weighted_max() {
        let (cost, mean, worst) =
            RobustEvaluation::combine(vec![(1.0, 1.0), (2.0, 1.0), (6.0, 1.0)], 0.3);
        assert_relative_eq!(mean, 3.0);
        assert_eq!(worst, 6.0);
        assert_relative_eq!(cost, 3.0 + 0.3 * 6.0);
    }

    #[test]
    fn scenario_weights_shape_the_mean() {
        let evaluator = robust(ControllerKind::ClassicalSmc, 1.0);
        let scenarios = ScenarioSet::new(vec![
            Scenario::nominal(),
            Scenario::new(ScenarioClass::Large, [0.0, 0.3, 0.3, 0.0, 0.0, 0.0]).with_weight(3.0),
        ]);
        let result = evaluator
            .evaluate_robust(&[20.0, 15.0, 12.0, 8.0, 35.0, 5.0], &scenarios)
            .unwrap();
        let (nominal, large) = (result.costs[0], result.costs[1]);
        assert_relative_eq!(result.mean, (nominal + 3.0 * large) / 4.0, epsilon = 1e-12);
        assert_eq!(result.worst, nominal.max(large));
    }

    #[test]
    fn zero_gains_cost_the_penalty_on_every_scenario() {
        let evaluator = robust(ControllerKind::ClassicalSmc, 5.0);
        let scenarios = ScenarioSet::generate(&ScenarioMix::default(), 5, 1);
        let result = evaluator.evaluate_robust(&[0.0; 6], &scenarios).unwrap();
        assert_eq!(result.unstable_scenarios, 5);
        assert_eq!(result.costs, vec![1000.0; 5]);
        assert_relative_eq!(result.cost, 1000.0 * 1.3);
        assert!(result.violation.as_ref().unwrap().contains("k1"));
        assert!(!result.fitness().stable);
    }

    #[test]
    fn out_of_bounds_candidate_is_rejected_when_bounds_are_set() {
        let evaluator = robust(ControllerKind::ClassicalSmc, 1.0)
            .with_bounds(GainBounds::for_kind(ControllerKind::ClassicalSmc));
        let scenarios = ScenarioSet::new(vec![Scenario::nominal()]);
        let result = evaluator
            .evaluate_robust(&[20.0, 15.0, 12.0, 8.0, 500.0, 5.0], &scenarios)
            .unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.unstable_scenarios, 1);
    }

    #[test]
    fn malformed_and_empty_inputs_are_errors() {
        let evaluator = robust(ControllerKind::ClassicalSmc, 1.0);
        let scenarios = ScenarioSet::new(vec![Scenario::nominal()]);
        assert!(matches!(
            evaluator.evaluate_robust(&[1.0; 5], &scenarios),
            Err(OptimizationError::Factory(_))
        ));
        assert!(matches!(
            evaluator.evaluate_robust(&[1.0; 6], &ScenarioSet::new(Vec::new())),
            Err(OptimizationError::EmptyScenarioSet)
        ));
    }

    #[test]
    fn scenario_order_does_not_change_the_cost() {
        let evaluator = robust(ControllerKind::ClassicalSmc, 2.0);
        let gains = [20.0, 15.0, 12.0, 8.0, 35.0, 5.0];
        let mut scenarios = vec![
            Scenario::nominal(),
            Scenario::new(ScenarioClass::Moderate, [0.0, -0.2, 0.15, 0.0, 0.3, 0.0]),
            Scenario::new(ScenarioClass::Large, [0.0, 0.3, 0.3, 0.0, 0.0, 0.0]),
            Scenario::new(ScenarioClass::Large, [0.5, -0.25, -0.1, 0.0, 0.0, 0.0]),
        ];
        let forward = evaluator
            .evaluate_robust(&gains, &ScenarioSet::new(scenarios.clone()))
            .unwrap();
        scenarios.reverse();
        scenarios.rotate_left(1);
        let shuffled = evaluator
            .evaluate_robust(&gains, &ScenarioSet::new(scenarios))
            .unwrap();
        assert!(forward.is_stable());
        assert_eq!(forward.cost.to_bits(), shuffled.cost.to_bits());
        assert_eq!(forward.mean.to_bits(), shuffled.mean.to_bits());
        assert_eq!(forward.worst, shuffled.worst);
    }

    proptest! {
        #[test]
        fn prop_combination_ignores_order(
            (pairs, shuffled) in prop::collection::vec((0.0f64..2_000.0, 0.1f64..2.0), 1..24)
                .prop_flat_map(|pairs| (Just(pairs.clone()), Just(pairs).prop_shuffle())),
            tail_weight in 0.0f64..1.0,
        ) {
            let a = RobustEvaluation::combine(pairs, tail_weight);
            let b = RobustEvaluation::combine(shuffled, tail_weight);
            prop_assert_eq!(a.0.to_bits(), b.0.to_bits());
            prop_assert_eq!(a.1.to_bits(), b.1.to_bits());
            prop_assert_eq!(a.2.to_bits(), b.2.to_bits());
        }
    }
}
