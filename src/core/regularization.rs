//! Condition-number guarded inversion of small dense matrices.
//!
//! The plant mass matrix is always symmetric positive definite in exact
//! arithmetic, but extreme parameter choices (e.g. a massless link) or a
//! non-finite state can make it numerically singular. The regularizer
//! guarantees a usable inverse in every case and reports which path was taken.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RegularizationConfig {
    /// Condition number ceiling that every returned matrix satisfies.
    pub max_condition_number: f64,
    /// First Tikhonov weight, relative to the largest singular value.
    pub initial_regularization: f64,
    /// Largest Tikhonov weight tried before the SVD fallback, relative.
    pub max_regularization: f64,
    /// Multiplier applied to the Tikhonov weight between attempts.
    pub growth_factor: f64,
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            max_condition_number: 1e12,
            initial_regularization: 1e-10,
            max_regularization: 1e-4,
            growth_factor: 10.0,
        }
    }
}

impl RegularizationConfig {
    pub fn validate(&self) -> Result<(), crate::error::ConfigError> {
        use crate::error::ConfigError;
        if !(self.max_condition_number > 1.0) {
            return Err(ConfigError::invalid(
                "regularization.max_condition_number",
                "must be greater than one",
            ));
        }
        if !(self.initial_regularization > 0.0)
            || !(self.max_regularization >= self.initial_regularization)
        {
            return Err(ConfigError::invalid(
                "regularization.initial_regularization",
                "must be positive and no larger than max_regularization",
            ));
        }
        if !(self.growth_factor > 1.0) {
            return Err(ConfigError::invalid(
                "regularization.growth_factor",
                "must be greater than one",
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum RegularizationOutcome {
    WellConditioned,
    Tikhonov { lambda: f64 },
    PseudoInverse,
    Degenerate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegularizedMatrix {
    pub matrix: Matrix3<f64>,
    pub inverse: Matrix3<f64>,
    pub condition_number: f64,
    pub outcome: RegularizationOutcome,
}

impl RegularizedMatrix {
    pub fn solve(&self, rhs: &nalgebra::Vector3<f64>) -> nalgebra::Vector3<f64> {
        self.inverse * rhs
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatrixRegularizer {
    config: RegularizationConfig,
}

impl MatrixRegularizer {
    pub fn new(config: RegularizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegularizationConfig {
        &self.config
    }

    /// Returns a matrix close to `matrix` whose condition number is within the
    /// configured ceiling, together with its inverse. Never fails.
    pub fn regularize(&self, matrix: &Matrix3<f64>) -> RegularizedMatrix {
        if !matrix.iter().all(|v| v.is_finite()) {
            warn!("non-finite matrix passed to regularizer, substituting identity");
            return RegularizedMatrix {
                matrix: Matrix3::identity(),
                inverse: Matrix3::identity(),
                condition_number: 1.0,
                outcome: RegularizationOutcome::Degenerate,
            };
        }

        let ceiling = self.config.max_condition_number;
        if let Some((inverse, condition_number)) = conditioned_inverse(matrix) {
            if condition_number <= ceiling {
                return RegularizedMatrix {
                    matrix: *matrix,
                    inverse,
                    condition_number,
                    outcome: RegularizationOutcome::WellConditioned,
                };
            }
        }

        let scale = largest_singular_value(matrix).max(f64::MIN_POSITIVE);
        let mut lambda = self.config.initial_regularization * scale;
        let lambda_max = self.config.max_regularization * scale;
        while lambda <= lambda_max {
            let candidate = matrix + Matrix3::identity() * lambda;
            if let Some((inverse, condition_number)) = conditioned_inverse(&candidate) {
                if condition_number <= ceiling {
                    debug!(
                        lambda,
                        condition_number, "regularized ill-conditioned matrix (Tikhonov)"
                    );
                    return RegularizedMatrix {
                        matrix: candidate,
                        inverse,
                        condition_number,
                        outcome: RegularizationOutcome::Tikhonov { lambda },
                    };
                }
            }
            lambda *= self.config.growth_factor;
        }

        self.pseudo_inverse(matrix)
    }

    /// SVD path: floor the singular values at `sigma_max / ceiling`, so the
    /// reconstruction is invertible within the ceiling by construction.
    fn pseudo_inverse(&self, matrix: &Matrix3<f64>) -> RegularizedMatrix {
        let ceiling = self.config.max_condition_number;
        let svd = match matrix.try_svd(true, true, f64::EPSILON, 200) {
            Some(svd) => svd,
            None => {
                warn!("SVD failed to converge, substituting identity");
                return RegularizedMatrix {
                    matrix: Matrix3::identity(),
                    inverse: Matrix3::identity(),
                    condition_number: 1.0,
                    outcome: RegularizationOutcome::Degenerate,
                };
            }
        };
        let (u, v_t) = match (svd.u, svd.v_t) {
            (Some(u), Some(v_t)) => (u, v_t),
            _ => {
                return RegularizedMatrix {
                    matrix: Matrix3::identity(),
                    inverse: Matrix3::identity(),
                    condition_number: 1.0,
                    outcome: RegularizationOutcome::Degenerate,
                }
            }
        };

        let sigma_max = svd.singular_values.max().max(f64::MIN_POSITIVE);
        let floor = sigma_max / ceiling;
        let sigma = svd.singular_values.map(|s| s.max(floor));
        let sigma_inv = sigma.map(|s| 1.0 / s);

        let reconstructed = u * Matrix3::from_diagonal(&sigma) * v_t;
        let inverse = v_t.transpose() * Matrix3::from_diagonal(&sigma_inv) * u.transpose();
        let condition_number = sigma.max() / sigma.min();
        warn!(
            condition_number,
            "matrix too ill-conditioned for Tikhonov, using SVD pseudo-inverse"
        );
        RegularizedMatrix {
            matrix: reconstructed,
            inverse,
            condition_number,
            outcome: RegularizationOutcome::PseudoInverse,
        }
    }
}

/// Inverse plus a Frobenius-norm condition estimate (an upper bound on the
/// 2-norm condition number).
fn conditioned_inverse(matrix: &Matrix3<f64>) -> Option<(Matrix3<f64>, f64)> {
    let inverse = matrix.try_inverse()?;
    let condition_number = matrix.norm() * inverse.norm();
    if condition_number.is_finite() && inverse.iter().all(|v| v.is_finite()) {
        Some((inverse, condition_number))
    } else {
        None
    }
}

fn largest_singular_value(matrix: &Matrix3<f64>) -> f64 {
    matrix
        .try_svd(false, false, f64::EPSILON, 200)
        .map(|svd| svd.singular_values.max())
        .unwrap_or_else(|| matrix.norm())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use more_asserts::assert_le;

    #[test]
    fn well_conditioned_matrix_is_untouched() {
        let m = Matrix3::new(2.0, 0.1, 0.0, 0.1, 1.0, 0.2, 0.0, 0.2, 0.5);
        let result = MatrixRegularizer::default().regularize(&m);
        assert_eq!(result.outcome, RegularizationOutcome::WellConditioned);
        assert_eq!(result.matrix, m);
        let product = m * result.inverse;
        assert_relative_eq!(product, Matrix3::identity(), epsilon = 1e-12);
    }

    #[test]
    fn nearly_singular_matrix_gets_tikhonov() {
        let m = Matrix3::from_diagonal(&nalgebra::Vector3::new(1.0, 1.0, 1e-14));
        let result = MatrixRegularizer::default().regularize(&m);
        match result.outcome {
            RegularizationOutcome::Tikhonov { lambda } => assert!(lambda > 0.0),
            other => panic!("expected Tikhonov, got {:?}", other),
        }
        assert_le!(result.condition_number, 1e12);
        let product = result.matrix * result.inverse;
        assert_relative_eq!(product, Matrix3::identity(), epsilon = 1e-6);
    }

    #[test]
    fn tight_ceiling_falls_back_to_pseudo_inverse() {
        let config = RegularizationConfig {
            max_condition_number: 10.0,
            initial_regularization: 1e-12,
            max_regularization: 1e-10,
            growth_factor: 10.0,
        };
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 1.0, 0.0, 1.0);
        let result = MatrixRegularizer::new(config).regularize(&m);
        assert_eq!(result.outcome, RegularizationOutcome::PseudoInverse);
        assert_le!(result.condition_number, 10.0 + 1e-9);
        assert!(result.inverse.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn non_finite_matrix_is_degenerate_not_a_panic() {
        let mut m = Matrix3::identity();
        m[(1, 1)] = f64::NAN;
        let result = MatrixRegularizer::default().regularize(&m);
        assert_eq!(result.outcome, RegularizationOutcome::Degenerate);
        assert_eq!(result.inverse, Matrix3::identity());
    }

    #[test]
    fn default_config_validates() {
        assert!(RegularizationConfig::default().validate().is_ok());
        let bad = RegularizationConfig {
            growth_factor: 1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
