//! Classical sliding-mode control: equivalent control plus a boundary-layer
//! switching term and linear damping on the surface.

use serde::{Deserialize, Serialize};

use crate::controllers::config::OutputLimits;
use crate::controllers::surface::SlidingSurface;
use crate::controllers::{ControlOutput, ControllerKind, SlidingModeController};
use crate::plant::{PlantModel, State};

/// Stateless apart from the last surface value, kept for diagnostics.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ClassicalHistory {
    pub last_surface: f64,
}

#[derive(Debug, Clone)]
pub struct ClassicalSmc {
    gains: [f64; 6],
    surface: SlidingSurface,
    switching_gain: f64,
    damping: f64,
    limits: OutputLimits,
    model: PlantModel,
}

impl ClassicalSmc {
    /// `gains = [k1, k2, λ1, λ2, K, kd]`. Gains are not validated here; the
    /// factory does that.
    pub fn new(gains: [f64; 6], limits: OutputLimits, model: PlantModel) -> Self {
        let [k1, k2, lambda1, lambda2, switching_gain, damping] = gains;
        Self {
            gains,
            surface: SlidingSurface::new(k1, k2, lambda1, lambda2),
            switching_gain,
            damping,
            limits,
            model,
        }
    }

    pub fn surface(&self) -> &SlidingSurface {
        &self.surface
    }
}

impl SlidingModeController for ClassicalSmc {
    type History = ClassicalHistory;

    fn kind(&self) -> ControllerKind {
        ControllerKind::ClassicalSmc
    }

    fn gains(&self) -> &[f64] {
        &self.gains
    }

    fn max_force(&self) -> f64 {
        self.limits.max_force
    }

    fn reset(&self) -> ClassicalHistory {
        ClassicalHistory::default()
    }

    fn compute_control(
        &self,
        state: &State,
        reference: &State,
        _history: &ClassicalHistory,
    ) -> (ControlOutput, ClassicalHistory) {
        let dynamics = self.surface.dynamics(&self.model, state, reference);
        let s = dynamics.surface;
        let reaching_rate = -self.switching_gain * self.limits.switch(s) - self.damping * s;
        let raw_force = dynamics.force_for_rate(reaching_rate, self.limits.min_control_gain);
        (
            ControlOutput::saturate(raw_force, s, self.limits.max_force),
            ClassicalHistory { last_surface: s },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controllers::surface::JointErrors;
    use crate::core::ode_solvers::Integrator;
    use crate::plant::PlantDynamics;
    use more_asserts::{assert_le, assert_lt};

    fn controller() -> ClassicalSmc {
        ClassicalSmc::new(
            [20.0, 15.0, 12.0, 8.0, 35.0, 5.0],
            OutputLimits::default(),
            PlantModel::default(),
        )
    }

    #[test]
    fn zero_state_needs_zero_force() {
        let controller = controller();
        let (output, _) =
            controller.compute_control(&State::zeros(), &State::zeros(), &controller.reset());
        assert_eq!(output.surface, 0.0);
        assert!(output.force.abs() < 1e-12);
    }

    #[test]
    fn large_error_saturates() {
        let limits = OutputLimits {
            max_force: 5.0,
            ..Default::default()
        };
        let controller =
            ClassicalSmc::new([20.0, 15.0, 12.0, 8.0, 35.0, 5.0], limits, PlantModel::default());
        let state = State::new(0.0, 0.5, -0.5, 0.0, 3.0, -3.0);
        let (output, history) = controller.compute_control(&state, &State::zeros(), &controller.reset());
        assert!(output.saturated);
        assert_eq!(output.force.abs(), controller.max_force());
        assert_eq!(history.last_surface, output.surface);
    }

    /// Outside the boundary layer the surface magnitude shrinks at least as
    /// fast as `e^{−kd·t}`.
    #[test]
    fn reaching_phase_shrinks_the_surface() {
        let controller = controller();
        let plant = PlantModel::default();
        let dt = 0.001;
        let mut state = State::new(0.0, 0.1, -0.05, 0.0, 0.0, 0.0);
        let mut history = controller.reset();
        let (first, _) = controller.compute_control(&state, &State::zeros(), &history);
        let s0 = first.surface.abs();
        for i in 0..400 {
            let (output, next) = controller.compute_control(&state, &State::zeros(), &history);
            history = next;
            let t = (i as f64) * dt;
            assert_le!(output.surface.abs(), s0 * (-5.0 * t).exp() + 0.05);
            state = plant.step(&state, output.force, dt, Integrator::Rk4).unwrap();
        }
        assert_lt!(history.last_surface.abs(), 0.05);
    }

    /// With `λ1 = λ2 = λ`, `σ(t) − σ(t_r)·e^{−λ(t−t_r)}` is the surface filtered
    /// by `1/(p + λ)`, so it stays within `max|s|/λ` once `s` is held small.
    #[test]
    fn weighted_error_decays_at_lambda_once_sliding() {
        let lambda = 10.0;
        let controller = ClassicalSmc::new(
            [20.0, 15.0, lambda, lambda, 35.0, 5.0],
            OutputLimits::default(),
            PlantModel::default(),
        );
        let surface = *controller.surface();
        let plant = PlantModel::default();
        let reference = State::zeros();
        let weighted = |state: &State| surface.weighted_error(&JointErrors::new(state, &reference));

        let dt = 0.001;
        let mut state = State::new(0.0, 0.1, -0.05, 0.0, 0.0, 0.0);
        let mut history = controller.reset();
        let mut sliding: Option<(f64, f64)> = None;
        let mut max_surface = 0.0_f64;
        for i in 0..1000 {
            let t = (i as f64) * dt;
            let (output, next) = controller.compute_control(&state, &reference, &history);
            history = next;
            match sliding {
                None if output.surface.abs() < 1e-3 => {
                    sliding = Some((t, weighted(&state)));
                    max_surface = output.surface.abs();
                }
                None => {}
                Some((t_r, sigma_r)) => {
                    max_surface = max_surface.max(output.surface.abs());
                    let expected = sigma_r * (-lambda * (t - t_r)).exp();
                    assert_le!(
                        (weighted(&state) - expected).abs(),
                        max_surface / lambda + 1e-4
                    );
                }
            }
            state = plant.step(&state, output.force, dt, Integrator::Rk4).unwrap();
        }

        let (t_r, sigma_r) = sliding.unwrap();
        assert_lt!(t_r, 0.5);
        assert_lt!(max_surface, OutputLimits::default().boundary_layer);
        assert_lt!(weighted(&state).abs(), 0.1 * sigma_r.abs() + max_surface / lambda + 1e-4);
    }
}
