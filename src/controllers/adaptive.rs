//! Adaptive sliding-mode control: the switching gain `K̂` is estimated online.
//!
//! Outside the dead zone `K̂̇ = γ·|s| − leak·K̂`; inside it only the leakage
//! acts. The estimate is kept in `[min_gain, max_gain]`.

use serde::{Deserialize, Serialize};

use crate::controllers::config::OutputLimits;
use crate::controllers::surface::SlidingSurface;
use crate::controllers::{ControlOutput, ControllerKind, SlidingModeController};
use crate::error::ConfigError;
use crate::plant::{PlantModel, State};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct AdaptiveSettings {
    pub initial_gain: f64,
    pub min_gain: f64,
    pub max_gain: f64,
    pub leak_rate: f64,
    pub dead_zone: f64,
    pub damping: f64,
}

impl Default for AdaptiveSettings {
    fn default() -> Self {
        Self {
            initial_gain: 10.0,
            min_gain: 0.1,
            max_gain: 100.0,
            leak_rate: 0.01,
            dead_zone: 0.01,
            damping: 2.0,
        }
    }
}

impl AdaptiveSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("controller.adaptive.leak_rate", self.leak_rate),
            ("controller.adaptive.dead_zone", self.dead_zone),
            ("controller.adaptive.damping", self.damping),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if !(self.min_gain > 0.0 && self.min_gain < self.max_gain && self.max_gain.is_finite()) {
            return Err(ConfigError::invalid(
                "controller.adaptive.max_gain",
                format!(
                    "need 0 < min_gain < max_gain, got [{}, {}]",
                    self.min_gain, self.max_gain
                ),
            ));
        }
        if !(self.min_gain..=self.max_gain).contains(&self.initial_gain) {
            return Err(ConfigError::invalid(
                "controller.adaptive.initial_gain",
                format!(
                    "{} is outside [{}, {}]",
                    self.initial_gain, self.min_gain, self.max_gain
                ),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AdaptiveHistory {
    pub gain_estimate: f64,
    pub last_surface: f64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveSmc {
    gains: [f64; 5],
    surface: SlidingSurface,
    adaptation_rate: f64,
    limits: OutputLimits,
    settings: AdaptiveSettings,
    model: PlantModel,
}

impl AdaptiveSmc {
    /// `gains = [k1, k2, λ1, λ2, γ]`
    pub fn new(
        gains: [f64; 5],
        limits: OutputLimits,
        settings: AdaptiveSettings,
        model: PlantModel,
    ) -> Self {
        let [k1, k2, lambda1, lambda2, adaptation_rate] = gains;
        Self {
            gains,
            surface: SlidingSurface::new(k1, k2, lambda1, lambda2),
            adaptation_rate,
            limits,
            settings,
            model,
        }
    }

    fn adapt(&self, gain_estimate: f64, s: f64) -> f64 {
        let leak = self.settings.leak_rate * gain_estimate;
        let rate = if s.abs() > self.settings.dead_zone {
            self.adaptation_rate * s.abs() - leak
        } else {
            -leak
        };
        (gain_estimate + rate * self.limits.dt).clamp(self.settings.min_gain, self.settings.max_gain)
    }
}

impl SlidingModeController for AdaptiveSmc {
    type History = AdaptiveHistory;

    fn kind(&self) -> ControllerKind {
        ControllerKind::AdaptiveSmc
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.limits.max_force
    }

    fn reset(&self) -> AdaptiveHistory {
        AdaptiveHistory {
            gain_estimate: self.settings.initial_gain,
            last_surface: 0.0,
        }
    }

    fn compute_control(
        &self,
        state: &State,
        reference: &State,
        history: &AdaptiveHistory,
    ) -> (ControlOutput, AdaptiveHistory) {
        let dynamics = self.surface.dynamics(&self.model, state, reference);
        let s = dynamics.surface;
        let reaching_rate =
            -history.gain_estimate * self.limits.switch(s) - self.settings.damping * s;
        let raw_force = dynamics.force_for_rate(reaching_rate, self.limits.min_control_gain);
        (
            ControlOutput::saturate(raw_force, s, self.limits.max_force),
            AdaptiveHistory {
                gain_estimate: self.adapt(history.gain_estimate, s),
                last_surface: s,
            },
        )
    }
}
