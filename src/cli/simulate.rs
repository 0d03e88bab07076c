use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::controllers::{ControllerConfig, ControllerFactory, ControllerKind, SlidingModeController};
use crate::core::file_io::FilePrefix;
use crate::error::DipError;
use crate::simulation::{
    ChatteringConfig, CostFunction, FitnessRecord, Scenario, ScenarioClass, ScenarioEvaluator,
    ScenarioOutcome, SimulationConfig, Trajectory,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulateParams {
    pub controller_type: ControllerKind,
    /// Falls back to `controller.gains`, then to the registry defaults.
    pub gains: Option<Vec<f64>>,
    pub initial_state: [f64; 6],
    pub simulation: SimulationConfig,
    pub controller: ControllerConfig,
    pub cost: CostFunction,
    pub chattering: ChatteringConfig,
}

impl Default for SimulateParams {
    fn default() -> Self {
        Self {
            controller_type: ControllerKind::ClassicalSmc,
            gains: None,
            initial_state: Scenario::nominal().initial_state,
            simulation: SimulationConfig::default(),
            controller: ControllerConfig::default(),
            cost: CostFunction::default(),
            chattering: ChatteringConfig::default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SimulationReport {
    pub controller_type: ControllerKind,
    pub gains: Vec<f64>,
    pub outcome: ScenarioOutcome,
    pub fitness: FitnessRecord,
}

/// Build the controller with full gain validation and simulate one run.
pub fn simulate_params(params: &SimulateParams) -> Result<(Trajectory, SimulationReport), DipError> {
    params.simulation.validate()?;
    params.controller.validate()?;
    params.cost.validate()?;
    params.chattering.validate()?;

    let kind = params.controller_type;
    let factory = Arc::new(
        ControllerFactory::new(params.simulation.plant()).with_config(params.controller.clone()),
    );
    let gains = factory
        .create_kind(kind, params.gains.as_deref(), Some(&params.controller))?
        .gains()
        .to_vec();
    let evaluator = ScenarioEvaluator::new(
        factory,
        kind,
        params.simulation.clone(),
        params.controller.clone(),
        params.chattering,
    );
    let scenario = Scenario::new(ScenarioClass::Nominal, params.initial_state);
    let (trajectory, outcome) = evaluator.run(&gains, &scenario)?;
    let fitness = params.cost.score(&outcome);
    Ok((
        trajectory,
        SimulationReport {
            controller_type: kind,
            gains,
            outcome,
            fitness,
        },
    ))
}

/// Simulate and write `<prefix>_trajectory.json` and `<prefix>_metrics.json`.
pub fn run_simulation(
    params: &SimulateParams,
    file_prefix: &FilePrefix,
) -> Result<SimulationReport, DipError> {
    let (trajectory, report) = simulate_params(params)?;
    file_prefix.write_json("_trajectory.json", &trajectory)?;
    let path = file_prefix.write_json("_metrics.json", &report)?;
    tracing::info!(
        path = %path.display(),
        stable = report.outcome.is_stable(),
        cost = report.fitness.cost,
        "wrote simulation report"
    );
    Ok(report)
}
