//! Hybrid adaptive super-twisting control.
//!
//! Only the surface gains `[k1, k2, λ1, λ2]` are tuned externally. The twisting
//! gains `α̂` and `β̂` adapt online:
//!
//! - `v = −α̂·√|s|·sat(s/φ) + z − d·s`
//! - `ż = −β̂·sat(s/φ)`, clamped to `±integral_limit`
//! - `α̂̇ = γα·|s|` and `β̂̇ = γβ·|s|` outside the dead zone, each capped
//!
//! With validated settings `β̂ < α̂` holds after every update: `β̂` starts
//! below `α̂`, grows no faster, and is capped lower.

use serde::{Deserialize, Serialize};

use crate::controllers::config::OutputLimits;
use crate::controllers::surface::SlidingSurface;
use crate::controllers::{ControlOutput, ControllerKind, SlidingModeController};
use crate::error::ConfigError;
use crate::plant::{PlantModel, State};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct HybridSettings {
    pub gamma_alpha: f64,
    pub gamma_beta: f64,
    pub initial_alpha: f64,
    pub initial_beta: f64,
    pub max_alpha: f64,
    pub max_beta: f64,
    pub damping: f64,
    pub dead_zone: f64,
    pub integral_limit: f64,
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            gamma_alpha: 2.0,
            gamma_beta: 0.5,
            initial_alpha: 5.0,
            initial_beta: 2.0,
            max_alpha: 50.0,
            max_beta: 40.0,
            damping: 2.0,
            dead_zone: 0.01,
            integral_limit: 150.0,
        }
    }
}

impl HybridSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("controller.hybrid.gamma_alpha", self.gamma_alpha),
            ("controller.hybrid.gamma_beta", self.gamma_beta),
            ("controller.hybrid.initial_alpha", self.initial_alpha),
            ("controller.hybrid.initial_beta", self.initial_beta),
            ("controller.hybrid.max_alpha", self.max_alpha),
            ("controller.hybrid.max_beta", self.max_beta),
            ("controller.hybrid.integral_limit", self.integral_limit),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field, format!("must be positive, got {}", value)));
            }
        }
        for (field, value) in [
            ("controller.hybrid.damping", self.damping),
            ("controller.hybrid.dead_zone", self.dead_zone),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        let ordering = [
            ("controller.hybrid.initial_beta", self.initial_beta, self.initial_alpha),
            ("controller.hybrid.max_beta", self.max_beta, self.max_alpha),
        ];
        for (field, beta, alpha) in ordering {
            if beta >= alpha {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be below its alpha counterpart ({} >= {})", beta, alpha),
                ));
            }
        }
        if self.gamma_beta > self.gamma_alpha {
            return Err(ConfigError::invalid(
                "controller.hybrid.gamma_beta",
                format!(
                    "must not exceed gamma_alpha ({} > {})",
                    self.gamma_beta, self.gamma_alpha
                ),
            ));
        }
        if self.initial_alpha > self.max_alpha || self.initial_beta > self.max_beta {
            return Err(ConfigError::invalid(
                "controller.hybrid.initial_alpha",
                "initial twisting gains must not exceed their caps",
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct HybridHistory {
    pub alpha: f64,
    pub beta: f64,
    pub z: f64,
    pub last_surface: f64,
}

#[derive(Debug, Clone)]
pub struct HybridAdaptiveStaSmc {
    gains: [f64; 4],
    surface: SlidingSurface,
    limits: OutputLimits,
    settings: HybridSettings,
    model: PlantModel,
}

impl HybridAdaptiveStaSmc {
    /// `gains = [k1, k2, λ1, λ2]`
    pub fn new(
        gains: [f64; 4],
        limits: OutputLimits,
        settings: HybridSettings,
        model: PlantModel,
    ) -> Self {
        let [k1, k2, lambda1, lambda2] = gains;
        Self {
            gains,
            surface: SlidingSurface::new(k1, k2, lambda1, lambda2),
            limits,
            settings,
            model,
        }
    }

    fn adapt(&self, history: &HybridHistory, s: f64, sat: f64) -> HybridHistory {
        let settings = &self.settings;
        let dt = self.limits.dt;
        let (mut alpha, mut beta) = (history.alpha, history.beta);
        if s.abs() > settings.dead_zone {
            alpha = (alpha + settings.gamma_alpha * s.abs() * dt).min(settings.max_alpha);
            beta = (beta + settings.gamma_beta * s.abs() * dt).min(settings.max_beta);
        }
        let z = (history.z - beta * sat * dt).clamp(-settings.integral_limit, settings.integral_limit);
        HybridHistory {
            alpha,
            beta,
            z,
            last_surface: s,
        }
    }
}

impl SlidingModeController for HybridAdaptiveStaSmc {
    type History = HybridHistory;

    fn kind(&self) -> ControllerKind {
        ControllerKind::HybridAdaptiveStaSmc
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.limits.max_force
    }

    fn reset(&self) -> HybridHistory {
        HybridHistory {
            alpha: self.settings.initial_alpha,
            beta: self.settings.initial_beta,
            z: 0.0,
            last_surface: 0.0,
        }
    }

    fn compute_control(
        &self,
        state: &State,
        reference: &State,
        history: &HybridHistory,
    ) -> (ControlOutput, HybridHistory) {
        let dynamics = self.surface.dynamics(&self.model, state, reference);
        let s = dynamics.surface;
        let sat = self.limits.switch(s);
        let reaching_rate =
            -history.alpha * s.abs().sqrt() * sat + history.z - self.settings.damping * s;
        let raw_force = dynamics.force_for_rate(reaching_rate, self.limits.min_control_gain);
        (
            ControlOutput::saturate(raw_force, s, self.limits.max_force),
            self.adapt(history, s, sat),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ode_solvers::Integrator;
    use crate::plant::PlantDynamics;
    use more_asserts::{assert_ge, assert_gt, assert_le, assert_lt};

    fn controller() -> HybridAdaptiveStaSmc {
        HybridAdaptiveStaSmc::new(
            [20.0, 15.0, 12.0, 8.0],
            OutputLimits::default(),
            HybridSettings::default(),
            PlantModel::default(),
        )
    }

    #[test]
    fn twisting_gains_adapt_outside_dead_zone_only() {
        let controller = controller();
        let fresh = controller.reset();
        let grown = controller.adapt(&fresh, 1.0, 1.0);
        assert_gt!(grown.alpha, fresh.alpha);
        assert_gt!(grown.beta, fresh.beta);

        let idle = controller.adapt(&fresh, 0.001, 0.02);
        assert_eq!(idle.alpha, fresh.alpha);
        assert_eq!(idle.beta, fresh.beta);
    }

    #[test]
    fn beta_stays_strictly_below_alpha() {
        let settings = HybridSettings {
            gamma_alpha: 10.0,
            gamma_beta: 10.0,
            initial_alpha: 2.0,
            initial_beta: 1.9,
            max_alpha: 8.0,
            max_beta: 7.5,
            ..Default::default()
        };
        assert!(settings.validate().is_ok());
        let controller = HybridAdaptiveStaSmc::new(
            [20.0, 15.0, 12.0, 8.0],
            OutputLimits::default(),
            settings,
            PlantModel::default(),
        );
        let state = State::new(0.0, 0.5, -0.5, 0.0, 1.0, -1.0);
        let mut history = controller.reset();
        for _ in 0..2_000 {
            history = controller.compute_control(&state, &State::zeros(), &history).1;
            assert_lt!(history.beta, history.alpha);
            assert_le!(history.alpha, 8.0);
            assert_le!(history.z.abs(), 150.0);
        }
        assert_eq!(history.alpha, 8.0);
        assert_eq!(history.beta, 7.5);
    }

    #[test]
    fn stabilises_a_large_initial_tilt() {
        let controller = controller();
        let plant = PlantModel::default();
        let dt = 0.01;
        let mut state = State::new(0.0, 0.3, 0.3, 0.0, 0.0, 0.0);
        let mut history = controller.reset();
        for _ in 0..500 {
            let (output, next) = controller.compute_control(&state, &State::zeros(), &history);
            assert!(output.finite);
            history = next;
            state = plant.step(&state, output.force, dt, Integrator::Rk4).unwrap();
        }
        assert_lt!(state[1].abs(), 0.01);
        assert_lt!(state[2].abs(), 0.01);
        assert_ge!(history.alpha, controller.settings.initial_alpha);
    }

    #[test]
    fn settings_reject_beta_at_or_above_alpha() {
        assert!(HybridSettings::default().validate().is_ok());
        let rejected = [
            HybridSettings {
                initial_beta: 5.0,
                ..Default::default()
            },
            HybridSettings {
                max_beta: 50.0,
                ..Default::default()
            },
            HybridSettings {
                gamma_beta: 3.0,
                ..Default::default()
            },
        ];
        for settings in rejected {
            assert!(settings.validate().is_err(), "{:?}", settings);
        }
    }
}
