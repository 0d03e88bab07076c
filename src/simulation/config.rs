use serde::{Deserialize, Serialize};

use crate::core::ode_solvers::Integrator;
use crate::core::regularization::RegularizationConfig;
use crate::error::ConfigError;
use crate::plant::{ModelVariant, PhysicalParams, PlantModel, State};

/// Region of state space outside of which a run counts as diverged.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SafetyEnvelope {
    pub max_cart_position: f64,
    /// Applies to both absolute link angles.
    pub max_angle: f64,
}

impl Default for SafetyEnvelope {
    fn default() -> Self {
        Self {
            max_cart_position: 10.0,
            max_angle: std::f64::consts::FRAC_PI_2,
        }
    }
}

impl SafetyEnvelope {
    pub fn contains(&self, state: &State) -> bool {
        state[0].abs() <= self.max_cart_position
            && state[1].abs() <= self.max_angle
            && state[2].abs() <= self.max_angle
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SimulationConfig {
    pub duration: f64,
    pub dt: f64,
    pub integrator: Integrator,
    pub model: ModelVariant,
    pub physics: PhysicalParams,
    pub regularization: RegularizationConfig,
    /// Target state `[x, θ1, θ2, ẋ, θ̇1, θ̇2]`.
    pub reference: [f64; 6],
    pub safety: SafetyEnvelope,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            duration: 5.0,
            dt: 0.01,
            integrator: Integrator::Rk4,
            model: ModelVariant::Full,
            physics: PhysicalParams::default(),
            regularization: RegularizationConfig::default(),
            reference: [0.0; 6],
            safety: SafetyEnvelope::default(),
        }
    }
}

impl SimulationConfig {
    pub fn plant(&self) -> PlantModel {
        PlantModel::new(self.model, self.physics.clone(), self.regularization.clone())
    }

    pub fn reference_state(&self) -> State {
        State::from_column_slice(&self.reference)
    }

    /// Number of control periods in one run.
    pub fn ticks(&self) -> usize {
        (self.duration / self.dt).round() as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(ConfigError::invalid(
                "simulation.dt",
                format!("must be positive, got {}", self.dt),
            ));
        }
        if !(self.duration.is_finite() && self.duration >= self.dt) {
            return Err(ConfigError::invalid(
                "simulation.duration",
                format!("must be at least one step ({}), got {}", self.dt, self.duration),
            ));
        }
        if self.reference.iter().any(|v| !v.is_finite()) {
            return Err(ConfigError::invalid("simulation.reference", "must be finite"));
        }
        if !(self.safety.max_cart_position > 0.0 && self.safety.max_angle > 0.0) {
            return Err(ConfigError::invalid(
                "simulation.safety",
                "limits must be positive",
            ));
        }
        self.physics.validate()?;
        self.regularization.validate()?;
        Ok(())
    }
}
