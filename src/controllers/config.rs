use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::controllers::adaptive::AdaptiveSettings;
use crate::controllers::hybrid::HybridSettings;
use crate::controllers::super_twisting::SuperTwistingSettings;
use crate::controllers::{ControllerKind, SwitchingFunction};
use crate::error::ConfigError;

/// Fixed (non-tuned) controller parameters, plus optional per-controller gains
/// that take priority over the registry defaults.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    pub max_force: f64,
    pub boundary_layer: f64,
    pub switching: SwitchingFunction,
    /// Control period, used to integrate the adaptive and twisting states.
    pub dt: f64,
    /// Below this magnitude of `∂ṡ/∂u` the equivalent control is skipped.
    pub min_control_gain: f64,
    pub gains: BTreeMap<ControllerKind, Vec<f64>>,
    pub super_twisting: SuperTwistingSettings,
    pub adaptive: AdaptiveSettings,
    pub hybrid: HybridSettings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_force: 150.0,
            boundary_layer: 0.05,
            switching: SwitchingFunction::Linear,
            dt: 0.01,
            min_control_gain: 1e-3,
            gains: BTreeMap::new(),
            super_twisting: SuperTwistingSettings::default(),
            adaptive: AdaptiveSettings::default(),
            hybrid: HybridSettings::default(),
        }
    }
}

/// The subset of [`ControllerConfig`] that every control law needs.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct OutputLimits {
    pub max_force: f64,
    pub boundary_layer: f64,
    pub switching: SwitchingFunction,
    pub dt: f64,
    pub min_control_gain: f64,
}

impl Default for OutputLimits {
    fn default() -> Self {
        ControllerConfig::default().limits()
    }
}

impl OutputLimits {
    pub fn switch(&self, s: f64) -> f64 {
        self.switching.evaluate(s, self.boundary_layer)
    }
}

impl ControllerConfig {
    pub fn limits(&self) -> OutputLimits {
        OutputLimits {
            max_force: self.max_force,
            boundary_layer: self.boundary_layer,
            switching: self.switching,
            dt: self.dt,
            min_control_gain: self.min_control_gain,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("controller.max_force", self.max_force),
            ("controller.boundary_layer", self.boundary_layer),
            ("controller.dt", self.dt),
            ("controller.min_control_gain", self.min_control_gain),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field, format!("must be positive, got {}", value)));
            }
        }
        self.super_twisting.validate()?;
        self.adaptive.validate()?;
        self.hybrid.validate()?;
        Ok(())
    }
}
