//! Sliding surface and equivalent control shared by every SMC variant.
//!
//! Joint errors are taken relative to the reference state:
//!
//! - `e1 = (θ2 − θ1) − (θ2ʳ − θ1ʳ)`: upper joint
//! - `e2 = θ1 − θ1ʳ`: lower joint
//!
//! The surface is `s = k1·(ė1 + λ1·e1) + k2·(ė2 + λ2·e2)`. The plant has one
//! input for two joints, so holding `s = 0` does not zero each bracket on its
//! own. With `λ1 = λ2 = λ` the surface reduces to `s = σ̇ + λ·σ` for the
//! weighted error `σ = k1·e1 + k2·e2`, and on `s = 0` it is `σ` that decays as
//! `e^{−λ·t}`. The individual joint errors may keep oscillating.
//!
//! The equivalent control inverts `ṡ = b·u − f` using the nominal plant model,
//! so a reaching law `v` can be imposed directly as `ṡ = v` via `u = (f + v)/b`.

use nalgebra::Vector3;

use crate::plant::{PlantDynamics, PlantModel, State};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointErrors {
    pub upper: f64,
    pub lower: f64,
    pub upper_rate: f64,
    pub lower_rate: f64,
}

impl JointErrors {
    pub fn new(state: &State, reference: &State) -> Self {
        let e = state - reference;
        Self {
            upper: e[2] - e[1],
            lower: e[1],
            upper_rate: e[5] - e[4],
            lower_rate: e[4],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlidingSurface {
    pub k1: f64,
    pub k2: f64,
    pub lambda1: f64,
    pub lambda2: f64,
}

/// Terms of `ṡ = b·u − f` at one state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDynamics {
    pub surface: f64,
    /// `b = L·M⁻¹·B`
    pub control_gain: f64,
    /// `f = L·M⁻¹·bias − Λ`
    pub drift: f64,
}

impl SurfaceDynamics {
    /// Force that makes `ṡ = reaching_rate`. Falls back to the reaching rate
    /// itself when the surface is (nearly) uncontrollable.
    pub fn force_for_rate(&self, reaching_rate: f64, min_control_gain: f64) -> f64 {
        if self.control_gain.abs() < min_control_gain {
            reaching_rate
        } else {
            (self.drift + reaching_rate) / self.control_gain
        }
    }
}

impl SlidingSurface {
    pub fn new(k1: f64, k2: f64, lambda1: f64, lambda2: f64) -> Self {
        Self {
            k1,
            k2,
            lambda1,
            lambda2,
        }
    }

    pub fn evaluate(&self, errors: &JointErrors) -> f64 {
        self.k1 * (errors.upper_rate + self.lambda1 * errors.upper)
            + self.k2 * (errors.lower_rate + self.lambda2 * errors.lower)
    }

    /// Coefficients `L` of `s` with respect to `q̇ = [ẋ, θ̇1, θ̇2]`.
    pub fn velocity_coefficients(&self) -> Vector3<f64> {
        Vector3::new(0.0, self.k2 - self.k1, self.k1)
    }

    /// `Λ`, the part of `ṡ` that does not depend on accelerations.
    pub fn rate_term(&self, errors: &JointErrors) -> f64 {
        self.k1 * self.lambda1 * errors.upper_rate + self.k2 * self.lambda2 * errors.lower_rate
    }

    /// `σ = k1·e1 + k2·e2`
    pub fn weighted_error(&self, errors: &JointErrors) -> f64 {
        self.k1 * errors.upper + self.k2 * errors.lower
    }

    pub fn dynamics(&self, model: &PlantModel, state: &State, reference: &State) -> SurfaceDynamics {
        let errors = JointErrors::new(state, reference);
        let terms = model.terms(state);
        let coefficients = self.velocity_coefficients();
        SurfaceDynamics {
            surface: self.evaluate(&errors),
            control_gain: coefficients.dot(&terms.input_gain()),
            drift: coefficients.dot(&terms.bias_acceleration()) - self.rate_term(&errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use more_asserts::assert_gt;

    fn surface() -> SlidingSurface {
        SlidingSurface::new(20.0, 15.0, 12.0, 8.0)
    }

    #[test]
    fn errors_use_relative_upper_joint() {
        let state = State::new(0.3, 0.1, -0.05, 0.0, 0.2, 0.5);
        let errors = JointErrors::new(&state, &State::zeros());
        assert_relative_eq!(errors.upper, -0.15);
        assert_relative_eq!(errors.lower, 0.1);
        assert_relative_eq!(errors.upper_rate, 0.3);
        assert_relative_eq!(errors.lower_rate, 0.2);
    }

    #[test]
    fn surface_is_zero_at_reference() {
        let reference = State::new(1.0, 0.02, 0.01, 0.0, 0.0, 0.0);
        let errors = JointErrors::new(&reference, &reference);
        assert_eq!(surface().evaluate(&errors), 0.0);
    }

    #[test]
    fn equal_lambdas_reduce_to_weighted_error() {
        let surface = SlidingSurface::new(20.0, 15.0, 10.0, 10.0);
        let errors = JointErrors::new(&State::new(0.0, 0.1, -0.05, 0.0, 0.3, -0.2), &State::zeros());
        let weighted_rate = surface.k1 * errors.upper_rate + surface.k2 * errors.lower_rate;
        assert_relative_eq!(
            surface.evaluate(&errors),
            weighted_rate + 10.0 * surface.weighted_error(&errors),
            epsilon = 1e-12
        );
    }

    #[test]
    fn equivalent_control_imposes_the_reaching_rate() {
        let model = PlantModel::default();
        let surface = surface();
        let state = State::new(0.0, 0.1, -0.05, 0.2, -0.3, 0.4);
        let reference = State::zeros();
        let dynamics = surface.dynamics(&model, &state, &reference);
        assert_gt!(dynamics.control_gain.abs(), 1e-3);

        let reaching_rate = -3.0;
        let force = dynamics.force_for_rate(reaching_rate, 1e-3);

        // ṡ = L·q̈ + Λ evaluated directly from the plant accelerations.
        let qdd = model.terms(&state).accelerations(force);
        let errors = JointErrors::new(&state, &reference);
        let s_dot = surface.velocity_coefficients().dot(&qdd) + surface.rate_term(&errors);
        assert_relative_eq!(s_dot, reaching_rate, epsilon = 1e-9);
    }

    #[test]
    fn zero_gains_make_the_surface_uncontrollable() {
        let surface = SlidingSurface::new(0.0, 0.0, 0.0, 0.0);
        let dynamics = surface.dynamics(
            &PlantModel::default(),
            &State::new(0.0, 0.1, 0.0, 0.0, 0.0, 0.0),
            &State::zeros(),
        );
        assert_eq!(dynamics.surface, 0.0);
        assert_eq!(dynamics.force_for_rate(0.0, 1e-3), 0.0);
    }
}
