//! Explicit ODE solvers

use nalgebra::SVector;
use serde::{Deserialize, Serialize};

/// Fixed-step explicit integration scheme used by the closed-loop simulation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Integrator {
    Euler,
    #[default]
    Rk4,
}

impl Integrator {
    pub fn step<const N: usize, F, E>(
        &self,
        dt: f64,
        t: f64,
        x: SVector<f64, N>,
        dynamics: &F,
    ) -> Result<SVector<f64, N>, E>
    where
        F: Fn(f64, &SVector<f64, N>) -> Result<SVector<f64, N>, E>,
    {
        match self {
            Integrator::Euler => euler_method_step(dt, t, x, dynamics),
            Integrator::Rk4 => rk4_method_step(dt, t, x, dynamics),
        }
    }
}

pub fn euler_method_step<const N: usize, F, E>(
    dt: f64,
    t: f64,
    x: SVector<f64, N>,
    dynamics: &F,
) -> Result<SVector<f64, N>, E>
where
    F: Fn(f64, &SVector<f64, N>) -> Result<SVector<f64, N>, E>,
{
    Ok(x + dt * dynamics(t, &x)?)
}

pub fn rk4_method_step<const N: usize, F, E>(
    dt: f64,
    t: f64,
    x: SVector<f64, N>,
    dynamics: &F,
) -> Result<SVector<f64, N>, E>
where
    F: Fn(f64, &SVector<f64, N>) -> Result<SVector<f64, N>, E>,
{
    let t_mid = t + 0.5 * dt;
    let t_next = t + dt;
    let k1 = dt * dynamics(t, &x)?;
    let k2 = dt * dynamics(t_mid, &(x + 0.5 * k1))?;
    let k3 = dt * dynamics(t_mid, &(x + 0.5 * k2))?;
    let k4 = dt * dynamics(t_next, &(x + k3))?;
    const ONE_BY_SIX: f64 = 1.0 / 6.0;
    let x_delta = ONE_BY_SIX * (k1 + 2.0 * k2 + 2.0 * k3 + k4);
    Ok(x + x_delta)
}

pub fn rk4_simulate<const N: usize, F, E>(
    t_begin: f64,
    t_final: f64,
    n_steps: u32,
    x0: SVector<f64, N>,
    dynamics: &F,
) -> Result<SVector<f64, N>, E>
where
    F: Fn(f64, &SVector<f64, N>) -> Result<SVector<f64, N>, E>,
{
    let dt = (t_final - t_begin) / (n_steps as f64);
    let mut x = x0;
    for i_step in 0..n_steps {
        let alpha = (i_step as f64) / (n_steps as f64);
        let t = t_begin + alpha * (t_final - t_begin);
        x = rk4_method_step(dt, t, x, dynamics)?;
    }
    Ok(x)
}
