//! Single-scenario closed-loop evaluation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::controllers::{ControllerConfig, ControllerFactory, ControllerKind, SlidingModeController};
use crate::error::FactoryError;
use crate::plant::{PlantDynamics, PlantModel, State};
use crate::simulation::config::SimulationConfig;
use crate::simulation::metrics::{ChatteringConfig, ScenarioMetrics, Trajectory};
use crate::simulation::scenarios::Scenario;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceCause {
    NonFiniteState,
    SafetyEnvelope,
    NumericalDivergence,
    NonFiniteControl,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Divergence {
    /// Simulated time at which the run was aborted.
    pub time: f64,
    pub cause: DivergenceCause,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Completed(ScenarioMetrics),
    Diverged(Divergence),
}

impl ScenarioOutcome {
    pub fn is_stable(&self) -> bool {
        matches!(self, ScenarioOutcome::Completed(_))
    }

    pub fn metrics(&self) -> Option<&ScenarioMetrics> {
        match self {
            ScenarioOutcome::Completed(metrics) => Some(metrics),
            ScenarioOutcome::Diverged(_) => None,
        }
    }
}

/**
 * Run one closed-loop simulation from `initial_state`. The controller history
 * is reset first, so no state leaks in from an earlier run.
 *
 * Returns the trajectory up to the last valid tick, and the divergence that
 * stopped the run early, if any. Divergence is a value here, never an error.
 */
pub fn simulate<C, P>(
    controller: &C,
    plant: &P,
    initial_state: &State,
    config: &SimulationConfig,
) -> (Trajectory, Option<Divergence>)
where
    C: SlidingModeController,
    P: PlantDynamics,
{
    let ticks = config.ticks();
    let dt = config.dt;
    let reference = config.reference_state();
    let mut trajectory = Trajectory::with_capacity(ticks);
    let mut state = *initial_state;
    let mut history = controller.reset();

    trajectory.times.push(0.0);
    trajectory.states.push(state);
    if !state.iter().all(|v| v.is_finite()) {
        return (
            trajectory,
            Some(Divergence {
                time: 0.0,
                cause: DivergenceCause::NonFiniteState,
            }),
        );
    }

    for tick in 0..ticks {
        let time = tick as f64 * dt;
        let (output, next_history) = controller.compute_control(&state, &reference, &history);
        if !output.finite {
            return (
                trajectory,
                Some(Divergence {
                    time,
                    cause: DivergenceCause::NonFiniteControl,
                }),
            );
        }
        history = next_history;
        trajectory.forces.push(output.force);
        trajectory.surfaces.push(output.surface);
        trajectory.saturated.push(output.saturated);

        let next_time = (tick + 1) as f64 * dt;
        state = match plant.step(&state, output.force, dt, config.integrator) {
            Ok(next) => next,
            Err(err) => {
                tracing::debug!(time = next_time, %err, "plant step failed");
                return (
                    trajectory,
                    Some(Divergence {
                        time: next_time,
                        cause: DivergenceCause::NumericalDivergence,
                    }),
                );
            }
        };
        let cause = if !state.iter().all(|v| v.is_finite()) {
            Some(DivergenceCause::NonFiniteState)
        } else if !config.safety.contains(&state) {
            Some(DivergenceCause::SafetyEnvelope)
        } else {
            None
        };
        if let Some(cause) = cause {
            return (
                trajectory,
                Some(Divergence {
                    time: next_time,
                    cause,
                }),
            );
        }
        trajectory.times.push(next_time);
        trajectory.states.push(state);
    }
    (trajectory, None)
}

/// Evaluates gain vectors of one controller type against single scenarios.
/// Cheap to clone; the factory is shared.
#[derive(Debug, Clone)]
pub struct ScenarioEvaluator {
    factory: Arc<ControllerFactory>,
    kind: ControllerKind,
    simulation: SimulationConfig,
    controller: ControllerConfig,
    chattering: ChatteringConfig,
    plant: PlantModel,
}

impl ScenarioEvaluator {
    pub fn new(
        factory: Arc<ControllerFactory>,
        kind: ControllerKind,
        simulation: SimulationConfig,
        controller: ControllerConfig,
        chattering: ChatteringConfig,
    ) -> Self {
        let plant = simulation.plant();
        Self {
            factory,
            kind,
            simulation,
            controller,
            chattering,
            plant,
        }
    }

    pub fn kind(&self) -> ControllerKind {
        self.kind
    }

    pub fn factory(&self) -> &ControllerFactory {
        &self.factory
    }

    pub fn simulation(&self) -> &SimulationConfig {
        &self.simulation
    }

    /// Simulate and keep the trajectory.
    pub fn run(
        &self,
        gains: &[f64],
        scenario: &Scenario,
    ) -> Result<(Trajectory, ScenarioOutcome), FactoryError> {
        let controller = self
            .factory
            .create_candidate(self.kind, gains, Some(&self.controller))?;
        let (trajectory, divergence) =
            simulate(&controller, &self.plant, &scenario.state(), &self.simulation);
        let outcome = match divergence {
            Some(divergence) => {
                tracing::debug!(
                    kind = %self.kind,
                    ?gains,
                    time = divergence.time,
                    cause = ?divergence.cause,
                    "scenario diverged"
                );
                ScenarioOutcome::Diverged(divergence)
            }
            None => ScenarioOutcome::Completed(ScenarioMetrics::from_trajectory(
                &trajectory,
                &self.simulation.reference_state(),
                self.simulation.dt,
                &self.chattering,
            )),
        };
        Ok((trajectory, outcome))
    }

    /// Fails only on a malformed gain vector; an unstable closed loop is
    /// reported through the outcome.
    pub fn evaluate(
        &self,
        gains: &[f64],
        scenario: &Scenario,
    ) -> Result<ScenarioOutcome, FactoryError> {
        self.run(gains, scenario).map(|(_, outcome)| outcome)
    }
}
