//! Super-twisting (second-order) sliding-mode control.
//!
//! Reaching law: `v = −α1·√|s|·sat(s/φ) + z − d·s`, with the integral state
//! `ż = −α2·sat(s/φ)` advanced once per control period and clamped to
//! `±integral_limit`.

use serde::{Deserialize, Serialize};

use crate::controllers::config::OutputLimits;
use crate::controllers::surface::SlidingSurface;
use crate::controllers::{ControlOutput, ControllerKind, SlidingModeController};
use crate::error::ConfigError;
use crate::plant::{PlantModel, State};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SuperTwistingSettings {
    pub integral_limit: f64,
    /// Optional linear damping `d` on the surface. Zero gives the textbook law.
    pub damping: f64,
}

impl Default for SuperTwistingSettings {
    fn default() -> Self {
        Self {
            integral_limit: 150.0,
            damping: 0.0,
        }
    }
}

impl SuperTwistingSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.integral_limit.is_finite() && self.integral_limit > 0.0) {
            return Err(ConfigError::invalid(
                "controller.super_twisting.integral_limit",
                format!("must be positive, got {}", self.integral_limit),
            ));
        }
        if !(self.damping.is_finite() && self.damping >= 0.0) {
            return Err(ConfigError::invalid(
                "controller.super_twisting.damping",
                format!("must be non-negative, got {}", self.damping),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SuperTwistingHistory {
    /// Integral term `z`.
    pub z: f64,
    pub last_surface: f64,
}

#[derive(Debug, Clone)]
pub struct SuperTwistingSmc {
    gains: [f64; 6],
    surface: SlidingSurface,
    alpha1: f64,
    alpha2: f64,
    limits: OutputLimits,
    settings: SuperTwistingSettings,
    model: PlantModel,
}

impl SuperTwistingSmc {
    /// `gains = [α1, α2, k1, k2, λ1, λ2]`
    pub fn new(
        gains: [f64; 6],
        limits: OutputLimits,
        settings: SuperTwistingSettings,
        model: PlantModel,
    ) -> Self {
        let [alpha1, alpha2, k1, k2, lambda1, lambda2] = gains;
        Self {
            gains,
            surface: SlidingSurface::new(k1, k2, lambda1, lambda2),
            alpha1,
            alpha2,
            limits,
            settings,
            model,
        }
    }

    pub fn surface(&self) -> &SlidingSurface {
        &self.surface
    }
}

impl SlidingModeController for SuperTwistingSmc {
    type History = SuperTwistingHistory;

    fn kind(&self) -> ControllerKind {
        ControllerKind::SuperTwistingSmc
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.limits.max_force
    }

    fn reset(&self) -> SuperTwistingHistory {
        SuperTwistingHistory::default()
    }

    fn compute_control(
        &self,
        state: &State,
        reference: &State,
        history: &SuperTwistingHistory,
    ) -> (ControlOutput, SuperTwistingHistory) {
        let dynamics = self.surface.dynamics(&self.model, state, reference);
        let s = dynamics.surface;
        let sat = self.limits.switch(s);
        let reaching_rate =
            -self.alpha1 * s.abs().sqrt() * sat + history.z - self.settings.damping * s;
        let raw_force = dynamics.force_for_rate(reaching_rate, self.limits.min_control_gain);

        let limit = self.settings.integral_limit;
        let z = (history.z - self.alpha2 * sat * self.limits.dt).clamp(-limit, limit);
        (
            ControlOutput::saturate(raw_force, s, self.limits.max_force),
            SuperTwistingHistory { z, last_surface: s },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ode_solvers::Integrator;
    use crate::plant::PlantDynamics;
    use approx::assert_relative_eq;
    use more_asserts::assert_lt;

    fn controller() -> SuperTwistingSmc {
        SuperTwistingSmc::new(
            [25.0, 10.0, 20.0, 15.0, 12.0, 8.0],
            OutputLimits::default(),
            SuperTwistingSettings::default(),
            PlantModel::default(),
        )
    }

    #[test]
    fn integral_state_opposes_the_surface_sign() {
        let controller = controller();
        let state = State::new(0.0, 0.1, 0.1, 0.0, 0.0, 0.0);
        let (output, history) =
            controller.compute_control(&state, &State::zeros(), &controller.reset());
        assert!(output.surface > 0.0);
        // s is outside the boundary layer, so sat = 1 and z = −α2·dt.
        assert_relative_eq!(history.z, -10.0 * 0.01);
        assert_eq!(history.last_surface, output.surface);
    }

    #[test]
    fn integral_state_is_clamped() {
        let controller = SuperTwistingSmc::new(
            [25.0, 10.0, 20.0, 15.0, 12.0, 8.0],
            OutputLimits::default(),
            SuperTwistingSettings {
                integral_limit: 0.05,
                damping: 0.0,
            },
            PlantModel::default(),
        );
        let state = State::new(0.0, 0.1, 0.1, 0.0, 0.0, 0.0);
        let mut history = controller.reset();
        for _ in 0..20 {
            history = controller.compute_control(&state, &State::zeros(), &history).1;
        }
        assert_eq!(history.z, -0.05);
    }

    #[test]
    fn stabilises_the_nominal_case() {
        let controller = controller();
        let plant = PlantModel::default();
        let dt = 0.01;
        let mut state = State::new(0.0, 0.1, -0.05, 0.0, 0.0, 0.0);
        let mut history = controller.reset();
        for _ in 0..500 {
            let (output, next) = controller.compute_control(&state, &State::zeros(), &history);
            history = next;
            state = plant.step(&state, output.force, dt, Integrator::Rk4).unwrap();
        }
        assert_lt!(state[1].abs(), 0.01);
        assert_lt!(state[2].abs(), 0.01);
    }

    #[test]
    fn settings_reject_negative_damping() {
        let settings = SuperTwistingSettings {
            damping: -1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }
}
