//! Particle-swarm optimizer with inertia scheduling, constriction, velocity
//! clamping and warm start.
//!
//! All random draws come from one `ChaCha8Rng` and are taken sequentially in
//! particle order; only the fitness evaluations run in parallel. A fixed seed
//! and configuration therefore reproduce a run bit for bit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::controllers::GainBounds;
use crate::error::{ConfigError, OptimizationError};
use crate::optimization::config::OptimizationConfig;
use crate::simulation::FitnessRecord;

/// Cooperative stop signal, checked by the optimizer between iterations.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationStatus {
    Converged,
    MaxIterationsReached,
    Cancelled,
    AllCandidatesUnstable,
}

/// Advisory raised once the global best has not improved for
/// `stall_iterations` consecutive iterations. Not an error.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptimizerStalled {
    pub iterations_without_improvement: usize,
    /// Iteration (1-based) at which the longest plateau was last observed.
    pub at_iteration: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub best_position: Vec<f64>,
    pub best_cost: f64,
    pub best_fitness: FitnessRecord,
    /// Global best after each iteration; entry 0 is the initial swarm.
    pub cost_history: Vec<f64>,
    pub status: OptimizationStatus,
    pub stalled: Option<OptimizerStalled>,
    /// Completed iterations, not counting the initial swarm.
    pub iterations: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: DVector<f64>,
    pub velocity: DVector<f64>,
    pub best_position: DVector<f64>,
    pub best_cost: f64,
}

/// `χ = 2 / |2 − φ − √(φ² − 4φ)|` for `φ = c1 + c2 > 4`, else 1.
pub fn constriction_factor(cognitive: f64, social: f64) -> f64 {
    let phi = cognitive + social;
    if phi > 4.0 {
        2.0 / (2.0 - phi - (phi * phi - 4.0 * phi).sqrt()).abs()
    } else {
        1.0
    }
}

/// NaN costs rank last.
fn rank_cost(cost: f64) -> f64 {
    if cost.is_nan() {
        f64::INFINITY
    } else {
        cost
    }
}

#[derive(Debug, Clone)]
pub struct PsoOptimizer {
    config: OptimizationConfig,
    bounds: GainBounds,
    baseline: Option<Vec<f64>>,
}

impl PsoOptimizer {
    /// Only the swarm settings of `config` are used here; the search space is
    /// `bounds`.
    pub fn new(config: &OptimizationConfig, bounds: GainBounds) -> Result<Self, OptimizationError> {
        bounds.validate()?;
        if config.n_particles == 0 {
            return Err(ConfigError::invalid("n_particles", "must be at least one").into());
        }
        let optimizer = Self {
            config: config.clone(),
            baseline: None,
            bounds,
        };
        match &config.baseline_gains {
            Some(baseline) => optimizer.with_baseline(baseline.clone()),
            None => Ok(optimizer),
        }
    }

    /// Gains to warm-start from, clipped into the search space.
    pub fn with_baseline(mut self, baseline: Vec<f64>) -> Result<Self, OptimizationError> {
        if baseline.len() != self.bounds.dimension() {
            return Err(OptimizationError::DimensionMismatch {
                bounds: self.bounds.dimension(),
                arity: baseline.len(),
            });
        }
        self.baseline = Some(baseline);
        Ok(self)
    }

    pub fn bounds(&self) -> &GainBounds {
        &self.bounds
    }

    fn lower(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.bounds.lower)
    }

    fn upper(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.bounds.upper)
    }

    fn clip(&self, position: &mut DVector<f64>) {
        self.bounds.clip(position.as_mut_slice());
    }

    fn warm_start_count(&self) -> usize {
        match self.baseline {
            Some(_) => {
                ((self.config.warm_start_fraction * self.config.n_particles as f64).round() as usize)
                    .min(self.config.n_particles)
            }
            None => 0,
        }
    }

    /// The first warm-started particle sits exactly on the baseline; the
    /// others add Gaussian noise. The rest of the swarm is uniform in bounds.
    fn initial_particles(&self, rng: &mut ChaCha8Rng) -> Result<Vec<Particle>, OptimizationError> {
        let dims = self.bounds.dimension();
        let (lower, upper) = (self.lower(), self.upper());
        let range = &upper - &lower;
        let max_velocity = range.clone() * self.config.velocity_clamp_fraction;
        let n_warm = self.warm_start_count();

        let noise: Vec<Normal<f64>> = range
            .iter()
            .map(|r| Normal::new(0.0, self.config.warm_start_noise * r))
            .collect::<Result<_, _>>()
            .map_err(|err| ConfigError::invalid("warm_start_noise", err.to_string()))?;

        let mut particles = Vec::with_capacity(self.config.n_particles);
        for index in 0..self.config.n_particles {
            let mut position = match &self.baseline {
                Some(baseline) if index < n_warm => {
                    let mut position = DVector::from_column_slice(baseline);
                    if index > 0 {
                        for (value, dist) in position.iter_mut().zip(&noise) {
                            *value += dist.sample(rng);
                        }
                    }
                    position
                }
                _ => DVector::from_fn(dims, |d, _| rng.gen_range(lower[d]..=upper[d])),
            };
            self.clip(&mut position);
            let velocity =
                DVector::from_fn(dims, |d, _| rng.gen_range(-max_velocity[d]..=max_velocity[d]));
            particles.push(Particle {
                best_position: position.clone(),
                position,
                velocity,
                best_cost: f64::INFINITY,
            });
        }
        Ok(particles)
    }

    /// Minimize `fitness` over the search space.
    ///
    /// The returned result always carries the best candidate found, also
    /// when the run was cancelled or no candidate was stable.
    pub fn optimize<F>(
        &self,
        fitness: F,
        cancel: &CancellationToken,
    ) -> Result<OptimizationResult, OptimizationError>
    where
        F: Fn(&[f64]) -> FitnessRecord + Sync,
    {
        let config = &self.config;
        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut particles = self.initial_particles(&mut rng)?;
        let dims = self.bounds.dimension();
        let max_velocity = (self.upper() - self.lower()) * config.velocity_clamp_fraction;
        let chi = constriction_factor(config.cognitive_weight, config.social_weight);

        let evaluate = |particles: &[Particle]| -> Vec<FitnessRecord> {
            particles
                .par_iter()
                .map(|p| fitness(p.position.as_slice()))
                .collect()
        };

        let records = evaluate(&particles);
        let mut evaluations = records.len();
        let mut any_stable = records.iter().any(|r| r.stable);
        let mut best_index = 0;
        for (index, (particle, record)) in particles.iter_mut().zip(&records).enumerate() {
            particle.best_cost = rank_cost(record.cost);
            if particle.best_cost < rank_cost(records[best_index].cost) {
                best_index = index;
            }
        }
        let mut best_position = particles[best_index].position.clone();
        let mut best_cost = particles[best_index].best_cost;
        let mut best_fitness = records[best_index];
        let mut cost_history = vec![best_cost];
        tracing::info!(best_cost, particles = particles.len(), "initial swarm evaluated");

        let mut status = OptimizationStatus::MaxIterationsReached;
        let mut stalled: Option<OptimizerStalled> = None;
        let mut without_improvement = 0;
        let mut iterations = 0;

        for iteration in 0..config.n_iterations {
            if cancel.is_cancelled() {
                tracing::info!(iteration, best_cost, "optimization cancelled");
                status = OptimizationStatus::Cancelled;
                break;
            }
            let w = config.inertia_weight.at(iteration, config.n_iterations);
            for particle in particles.iter_mut() {
                for d in 0..dims {
                    let r1: f64 = rng.gen();
                    let r2: f64 = rng.gen();
                    let x = particle.position[d];
                    let v = chi
                        * (w * particle.velocity[d]
                            + config.cognitive_weight * r1 * (particle.best_position[d] - x)
                            + config.social_weight * r2 * (best_position[d] - x));
                    particle.velocity[d] = v.clamp(-max_velocity[d], max_velocity[d]);
                }
                particle.position += &particle.velocity;
                self.clip(&mut particle.position);
            }

            let records = evaluate(&particles);
            evaluations += records.len();
            any_stable |= records.iter().any(|r| r.stable);
            let previous_best = best_cost;
            for (particle, record) in particles.iter_mut().zip(&records) {
                let cost = rank_cost(record.cost);
                if cost < particle.best_cost {
                    particle.best_cost = cost;
                    particle.best_position = particle.position.clone();
                }
                if cost < best_cost {
                    best_cost = cost;
                    best_position = particle.position.clone();
                    best_fitness = *record;
                }
            }
            cost_history.push(best_cost);
            iterations = iteration + 1;

            if previous_best - best_cost > config.plateau_tolerance {
                without_improvement = 0;
            } else {
                without_improvement += 1;
            }
            tracing::info!(
                iteration = iterations,
                best_cost,
                inertia = w,
                without_improvement,
                "pso iteration"
            );

            if without_improvement >= config.stall_iterations {
                let longest = stalled.map_or(0, |s| s.iterations_without_improvement);
                if without_improvement == config.stall_iterations {
                    tracing::warn!(
                        iteration = iterations,
                        without_improvement,
                        best_cost,
                        "optimizer stalled"
                    );
                }
                if without_improvement >= longest {
                    stalled = Some(OptimizerStalled {
                        iterations_without_improvement: without_improvement,
                        at_iteration: iterations,
                    });
                }
            }
            if without_improvement >= config.plateau_iterations {
                status = OptimizationStatus::Converged;
                break;
            }
        }

        if status != OptimizationStatus::Cancelled && !any_stable {
            status = OptimizationStatus::AllCandidatesUnstable;
        }
        tracing::info!(?status, best_cost, iterations, evaluations, "optimization finished");

        Ok(OptimizationResult {
            best_position: best_position.as_slice().to_vec(),
            best_cost,
            best_fitness,
            cost_history,
            status,
            stalled,
            iterations,
            evaluations,
        })
    }
}
