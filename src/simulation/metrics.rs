//! Trajectory record and the scalar metrics computed from it.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plant::State;

/// Time series of one closed-loop run. `states` has one more sample than the
/// per-tick series: it starts with the initial condition.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<State>,
    pub forces: Vec<f64>,
    pub surfaces: Vec<f64>,
    pub saturated: Vec<bool>,
}

impl Trajectory {
    pub fn with_capacity(ticks: usize) -> Self {
        Self {
            times: Vec::with_capacity(ticks + 1),
            states: Vec::with_capacity(ticks + 1),
            forces: Vec::with_capacity(ticks),
            surfaces: Vec::with_capacity(ticks),
            saturated: Vec::with_capacity(ticks),
        }
    }

    pub fn ticks(&self) -> usize {
        self.forces.len()
    }
}

/// Weighting of the two chattering components.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ChatteringConfig {
    pub time_weight: f64,
    pub frequency_weight: f64,
    pub cutoff_hz: f64,
}

impl Default for ChatteringConfig {
    fn default() -> Self {
        Self {
            time_weight: 0.7,
            frequency_weight: 0.3,
            cutoff_hz: 10.0,
        }
    }
}

impl ChatteringConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.time_weight >= 0.0 && self.frequency_weight >= 0.0) {
            return Err(ConfigError::invalid(
                "chattering",
                "weights must be non-negative",
            ));
        }
        if !(self.cutoff_hz.is_finite() && self.cutoff_hz > 0.0) {
            return Err(ConfigError::invalid(
                "chattering.cutoff_hz",
                format!("must be positive, got {}", self.cutoff_hz),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ScenarioMetrics {
    /// Per-angle RMS tracking error of the two links, rad.
    pub tracking_rms: f64,
    pub effort_rms: f64,
    pub control_rate_rms: f64,
    pub high_frequency_fraction: f64,
    pub chattering_index: f64,
    /// `∫s² dt`
    pub surface_energy: f64,
    pub peak_force: f64,
    pub saturation_fraction: f64,
    pub ticks: usize,
}

impl ScenarioMetrics {
    pub fn from_trajectory(
        trajectory: &Trajectory,
        reference: &State,
        dt: f64,
        chattering: &ChatteringConfig,
    ) -> Self {
        let ticks = trajectory.ticks();
        let duration = ticks as f64 * dt;
        let squared_error: f64 = trajectory
            .states
            .iter()
            .skip(1)
            .map(|state| {
                let e1 = state[1] - reference[1];
                let e2 = state[2] - reference[2];
                e1 * e1 + e2 * e2
            })
            .sum();
        let tracking_rms = (squared_error * dt / (2.0 * duration)).sqrt();

        let effort_rms = root_mean_square(trajectory.forces.iter().copied());
        let control_rate_rms = root_mean_square(
            trajectory
                .forces
                .windows(2)
                .map(|pair| (pair[1] - pair[0]) / dt),
        );
        let high_frequency_fraction =
            high_frequency_fraction(&trajectory.forces, dt, chattering.cutoff_hz);

        Self {
            tracking_rms,
            effort_rms,
            control_rate_rms,
            high_frequency_fraction,
            chattering_index: chattering.time_weight * control_rate_rms
                + chattering.frequency_weight * high_frequency_fraction,
            surface_energy: trajectory.surfaces.iter().map(|s| s * s * dt).sum(),
            peak_force: trajectory.forces.iter().fold(0.0, |peak, u| u.abs().max(peak)),
            saturation_fraction: if ticks == 0 {
                0.0
            } else {
                trajectory.saturated.iter().filter(|&&s| s).count() as f64 / ticks as f64
            },
            ticks,
        }
    }
}

fn root_mean_square(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v * v, count + 1));
    if count == 0 {
        0.0
    } else {
        (sum / count as f64).sqrt()
    }
}

/// Share of the one-sided power spectrum of the mean-removed `signal` that
/// lies strictly above `cutoff_hz`. Zero for a signal with no power.
pub fn high_frequency_fraction(signal: &[f64], dt: f64, cutoff_hz: f64) -> f64 {
    let n = signal.len();
    if n < 2 {
        return 0.0;
    }
    let mean = signal.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&u| Complex::new(u - mean, 0.0))
        .collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buffer);

    let resolution = 1.0 / (n as f64 * dt);
    let (mut total, mut high) = (0.0, 0.0);
    for (k, bin) in buffer.iter().take(n / 2 + 1).enumerate() {
        let power = bin.norm_sqr();
        total += power;
        if k as f64 * resolution > cutoff_hz {
            high += power;
        }
    }
    if total <= f64::EPSILON * n as f64 {
        0.0
    } else {
        high / total
    }
}
