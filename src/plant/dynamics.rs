//! Equations of motion of the double inverted pendulum on a cart.
//!
//! Generalized coordinates are `q = [x, θ1, θ2]` and the model has the form
//! `M(q)·q̈ = B·u − bias(q, q̇)` with `B = [1, 0, 0]ᵀ`.

use nalgebra::{Matrix3, Vector3, Vector6};
use serde::{Deserialize, Serialize};

use crate::core::ode_solvers::Integrator;
use crate::core::regularization::{MatrixRegularizer, RegularizationConfig, RegularizedMatrix};
use crate::error::DynamicsError;
use crate::plant::params::PhysicalParams;

/// `[x, θ1, θ2, ẋ, θ̇1, θ̇2]`
pub type State = Vector6<f64>;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Drops the velocity-product (Coriolis and centrifugal) terms.
    Simplified,
    #[default]
    Full,
}

/// Mass matrix (already regularized) and bias forces at one state.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicsTerms {
    pub mass: RegularizedMatrix,
    pub bias: Vector3<f64>,
}

impl DynamicsTerms {
    /// `q̈ = M⁻¹·(B·u − bias)`
    pub fn accelerations(&self, force: f64) -> Vector3<f64> {
        self.mass.solve(&(Vector3::new(force, 0.0, 0.0) - self.bias))
    }

    /// `M⁻¹·B`, the acceleration produced by a unit cart force.
    pub fn input_gain(&self) -> Vector3<f64> {
        self.mass.inverse.column(0).into_owned()
    }

    /// `M⁻¹·bias`
    pub fn bias_acceleration(&self) -> Vector3<f64> {
        self.mass.solve(&self.bias)
    }
}

/// Common interface of the plant variants. Controllers and evaluators only
/// see this trait, so they do not care which variant is active.
pub trait PlantDynamics {
    fn params(&self) -> &PhysicalParams;

    fn terms(&self, state: &State) -> DynamicsTerms;

    fn derivative(&self, state: &State, force: f64) -> Result<State, DynamicsError> {
        let qdd = self.terms(state).accelerations(force);
        let derivative = State::new(state[3], state[4], state[5], qdd[0], qdd[1], qdd[2]);
        if derivative.iter().all(|v| v.is_finite()) {
            Ok(derivative)
        } else {
            Err(DynamicsError::NumericalDivergence(format!(
                "non-finite derivative at state {:?} with force {}",
                state.as_slice(),
                force
            )))
        }
    }

    /// Zero-order hold on `force` over one step of length `dt`.
    fn step(
        &self,
        state: &State,
        force: f64,
        dt: f64,
        integrator: Integrator,
    ) -> Result<State, DynamicsError> {
        integrator.step(dt, 0.0, *state, &|_, x: &State| self.derivative(x, force))
    }
}

pub fn mass_matrix(p: &PhysicalParams, state: &State) -> Matrix3<f64> {
    let (theta1, theta2) = (state[1], state[2]);
    let a = p.link1_mass * p.link1_com + p.link2_mass * p.link1_length;
    let m12 = a * theta1.cos();
    let m13 = p.link2_mass * p.link2_com * theta2.cos();
    let m22 = p.link1_mass * p.link1_com.powi(2)
        + p.link2_mass * p.link1_length.powi(2)
        + p.link1_inertia;
    let m23 = p.link2_mass * p.link1_length * p.link2_com * (theta1 - theta2).cos();
    let m33 = p.link2_mass * p.link2_com.powi(2) + p.link2_inertia;
    Matrix3::new(
        p.total_mass(), m12, m13, //
        m12, m22, m23, //
        m13, m23, m33,
    )
}

/// Gravity plus viscous friction. Joint friction acts on the relative joint rates.
pub fn gravity_and_friction(p: &PhysicalParams, state: &State) -> Vector3<f64> {
    let (theta1, theta2) = (state[1], state[2]);
    let (x_dot, theta1_dot, theta2_dot) = (state[3], state[4], state[5]);
    let a = p.link1_mass * p.link1_com + p.link2_mass * p.link1_length;
    let relative_rate = theta2_dot - theta1_dot;
    let gravity = Vector3::new(
        0.0,
        -a * p.gravity * theta1.sin(),
        -p.link2_mass * p.link2_com * p.gravity * theta2.sin(),
    );
    let friction = Vector3::new(
        p.cart_friction * x_dot,
        p.joint1_friction * theta1_dot - p.joint2_friction * relative_rate,
        p.joint2_friction * relative_rate,
    );
    gravity + friction
}

pub fn velocity_product_terms(p: &PhysicalParams, state: &State) -> Vector3<f64> {
    let (theta1, theta2) = (state[1], state[2]);
    let (theta1_dot, theta2_dot) = (state[4], state[5]);
    let a = p.link1_mass * p.link1_com + p.link2_mass * p.link1_length;
    let c = p.link2_mass * p.link1_length * p.link2_com * (theta1 - theta2).sin();
    Vector3::new(
        -a * theta1.sin() * theta1_dot.powi(2)
            - p.link2_mass * p.link2_com * theta2.sin() * theta2_dot.powi(2),
        c * theta2_dot.powi(2),
        -c * theta1_dot.powi(2),
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct FullDynamics {
    params: PhysicalParams,
    regularizer: MatrixRegularizer,
}

impl FullDynamics {
    pub fn new(params: PhysicalParams, regularizer: MatrixRegularizer) -> Self {
        Self {
            params,
            regularizer,
        }
    }
}

impl PlantDynamics for FullDynamics {
    fn params(&self) -> &PhysicalParams {
        &self.params
    }

    fn terms(&self, state: &State) -> DynamicsTerms {
        DynamicsTerms {
            mass: self.regularizer.regularize(&mass_matrix(&self.params, state)),
            bias: velocity_product_terms(&self.params, state)
                + gravity_and_friction(&self.params, state),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimplifiedDynamics {
    params: PhysicalParams,
    regularizer: MatrixRegularizer,
}

impl SimplifiedDynamics {
    pub fn new(params: PhysicalParams, regularizer: MatrixRegularizer) -> Self {
        Self {
            params,
            regularizer,
        }
    }
}

impl PlantDynamics for SimplifiedDynamics {
    fn params(&self) -> &PhysicalParams {
        &self.params
    }

    fn terms(&self, state: &State) -> DynamicsTerms {
        DynamicsTerms {
            mass: self.regularizer.regularize(&mass_matrix(&self.params, state)),
            bias: gravity_and_friction(&self.params, state),
        }
    }
}

/// Either plant variant, selected from configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum PlantModel {
    Simplified(SimplifiedDynamics),
    Full(FullDynamics),
}

impl Default for PlantModel {
    fn default() -> Self {
        PlantModel::new(
            ModelVariant::default(),
            PhysicalParams::default(),
            RegularizationConfig::default(),
        )
    }
}

impl PlantModel {
    pub fn new(
        variant: ModelVariant,
        params: PhysicalParams,
        regularization: RegularizationConfig,
    ) -> Self {
        let regularizer = MatrixRegularizer::new(regularization);
        match variant {
            ModelVariant::Simplified => {
                PlantModel::Simplified(SimplifiedDynamics::new(params, regularizer))
            }
            ModelVariant::Full => PlantModel::Full(FullDynamics::new(params, regularizer)),
        }
    }

    pub fn variant(&self) -> ModelVariant {
        match self {
            PlantModel::Simplified(_) => ModelVariant::Simplified,
            PlantModel::Full(_) => ModelVariant::Full,
        }
    }
}

impl PlantDynamics for PlantModel {
    fn params(&self) -> &PhysicalParams {
        match self {
            PlantModel::Simplified(inner) => inner.params(),
            PlantModel::Full(inner) => inner.params(),
        }
    }

    fn terms(&self, state: &State) -> DynamicsTerms {
        match self {
            PlantModel::Simplified(inner) => inner.terms(state),
            PlantModel::Full(inner) => inner.terms(state),
        }
    }
}
