//! Controller-specific gain defaults, search bounds and feasibility constraints.

use serde::{Deserialize, Serialize};

use crate::controllers::ControllerKind;
use crate::error::{ConfigError, GainViolation};

/// Box constraints on a gain vector, also used as the PSO search space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GainBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl GainBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, ConfigError> {
        let bounds = Self { lower, upper };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn for_kind(kind: ControllerKind) -> Self {
        let (lower, upper): (&[f64], &[f64]) = match kind {
            ControllerKind::ClassicalSmc => (
                &[1.0, 1.0, 1.0, 1.0, 1.0, 0.1],
                &[50.0, 50.0, 30.0, 30.0, 100.0, 20.0],
            ),
            ControllerKind::SuperTwistingSmc => (
                &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
                &[60.0, 60.0, 50.0, 50.0, 30.0, 30.0],
            ),
            ControllerKind::AdaptiveSmc => (
                &[1.0, 1.0, 1.0, 1.0, 0.1],
                &[50.0, 50.0, 30.0, 30.0, 20.0],
            ),
            ControllerKind::HybridAdaptiveStaSmc => {
                (&[1.0, 1.0, 1.0, 1.0], &[50.0, 50.0, 30.0, 30.0])
            }
        };
        Self {
            lower: lower.to_vec(),
            upper: upper.to_vec(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    pub fn range(&self, index: usize) -> f64 {
        self.upper[index] - self.lower[index]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lower.len() != self.upper.len() {
            return Err(ConfigError::invalid(
                "bounds",
                format!(
                    "lower has {} entries but upper has {}",
                    self.lower.len(),
                    self.upper.len()
                ),
            ));
        }
        if self.lower.is_empty() {
            return Err(ConfigError::invalid("bounds", "must not be empty"));
        }
        for (index, (lo, hi)) in self.lower.iter().zip(self.upper.iter()).enumerate() {
            if !(lo.is_finite() && hi.is_finite() && lo < hi) {
                return Err(ConfigError::invalid(
                    "bounds",
                    format!("entry {} needs finite lower < upper, got [{}, {}]", index, lo, hi),
                ));
            }
        }
        Ok(())
    }

    pub fn clip(&self, gains: &mut [f64]) {
        for ((g, lo), hi) in gains.iter_mut().zip(&self.lower).zip(&self.upper) {
            *g = g.clamp(*lo, *hi);
        }
    }

    pub fn check(&self, kind: ControllerKind, gains: &[f64]) -> Result<(), GainViolation> {
        let names = kind.gain_names();
        for (index, ((&value, &lower), &upper)) in gains
            .iter()
            .zip(&self.lower)
            .zip(&self.upper)
            .enumerate()
        {
            if value < lower || value > upper {
                return Err(GainViolation::OutOfBounds {
                    index,
                    name: names.get(index).copied().unwrap_or("?"),
                    value,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }
}

/// Inter-gain inequalities required by a controller's stability argument.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum GainConstraint {
    /// `gains[alpha1]² > lipschitz_factor · gains[alpha2]`, the super-twisting
    /// finite-time convergence condition.
    FiniteTimeConvergence {
        alpha1: usize,
        alpha2: usize,
        lipschitz_factor: f64,
    },
    /// `gains[larger] > gains[smaller]`
    StrictOrdering { larger: usize, smaller: usize },
}

impl GainConstraint {
    pub fn check(&self, kind: ControllerKind, gains: &[f64]) -> Result<(), GainViolation> {
        let names = kind.gain_names();
        match *self {
            GainConstraint::FiniteTimeConvergence {
                alpha1,
                alpha2,
                lipschitz_factor,
            } => {
                let (a1, a2) = (gains[alpha1], gains[alpha2]);
                if a1 * a1 > lipschitz_factor * a2 {
                    Ok(())
                } else {
                    Err(GainViolation::Constraint(format!(
                        "{}² = {} must exceed {} · {} = {}",
                        names[alpha1],
                        a1 * a1,
                        lipschitz_factor,
                        names[alpha2],
                        lipschitz_factor * a2
                    )))
                }
            }
            GainConstraint::StrictOrdering { larger, smaller } => {
                if gains[larger] > gains[smaller] {
                    Ok(())
                } else {
                    Err(GainViolation::Constraint(format!(
                        "{} = {} must be greater than {} = {}",
                        names[larger], gains[larger], names[smaller], gains[smaller]
                    )))
                }
            }
        }
    }
}

pub fn default_gains(kind: ControllerKind) -> Vec<f64> {
    match kind {
        ControllerKind::ClassicalSmc => vec![20.0, 15.0, 12.0, 8.0, 35.0, 5.0],
        ControllerKind::SuperTwistingSmc => vec![25.0, 10.0, 20.0, 15.0, 12.0, 8.0],
        ControllerKind::AdaptiveSmc => vec![20.0, 15.0, 12.0, 8.0, 4.0],
        ControllerKind::HybridAdaptiveStaSmc => vec![20.0, 15.0, 12.0, 8.0],
    }
}

pub fn default_constraints(kind: ControllerKind) -> Vec<GainConstraint> {
    match kind {
        ControllerKind::SuperTwistingSmc => vec![
            GainConstraint::FiniteTimeConvergence {
                alpha1: 0,
                alpha2: 1,
                lipschitz_factor: 2.0,
            },
            GainConstraint::StrictOrdering {
                larger: 0,
                smaller: 1,
            },
        ],
        _ => Vec::new(),
    }
}

/// Arity and finiteness. Enough to build and simulate a controller.
pub fn check_structure(kind: ControllerKind, gains: &[f64]) -> Result<(), GainViolation> {
    if gains.len() != kind.arity() {
        return Err(GainViolation::WrongLength {
            expected: kind.arity(),
            got: gains.len(),
        });
    }
    let names = kind.gain_names();
    if let Some(index) = gains.iter().position(|g| !g.is_finite()) {
        return Err(GainViolation::NonFinite {
            index,
            name: names[index],
        });
    }
    Ok(())
}

pub fn check_positive(kind: ControllerKind, gains: &[f64]) -> Result<(), GainViolation> {
    let names = kind.gain_names();
    match gains.iter().position(|&g| g <= 0.0) {
        Some(index) => Err(GainViolation::NonPositive {
            index,
            name: names[index],
            value: gains[index],
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fit_their_bounds_and_constraints() {
        for kind in ControllerKind::ALL {
            let gains = default_gains(kind);
            let bounds = GainBounds::for_kind(kind);
            assert!(bounds.validate().is_ok());
            assert_eq!(bounds.dimension(), kind.arity());
            assert!(check_structure(kind, &gains).is_ok());
            assert!(check_positive(kind, &gains).is_ok());
            assert!(bounds.check(kind, &gains).is_ok());
            for constraint in default_constraints(kind) {
                assert!(constraint.check(kind, &gains).is_ok());
            }
        }
    }

    #[test]
    fn wrong_length_is_reported() {
        let violation =
            check_structure(ControllerKind::ClassicalSmc, &[20.0, 15.0, 12.0, 8.0, 35.0]).unwrap_err();
        assert_eq!(
            violation,
            GainViolation::WrongLength {
                expected: 6,
                got: 5
            }
        );
    }

    #[test]
    fn non_finite_gain_is_named() {
        let violation =
            check_structure(ControllerKind::HybridAdaptiveStaSmc, &[1.0, f64::NAN, 1.0, 1.0])
                .unwrap_err();
        assert_eq!(
            violation,
            GainViolation::NonFinite {
                index: 1,
                name: "k2"
            }
        );
    }

    #[test]
    fn finite_time_condition_rejects_weak_alpha1() {
        let constraint = default_constraints(ControllerKind::SuperTwistingSmc)[0];
        let gains = [2.0, 3.0, 20.0, 15.0, 12.0, 8.0]; // 4 < 2 * 3
        let violation = constraint
            .check(ControllerKind::SuperTwistingSmc, &gains)
            .unwrap_err();
        assert!(violation.to_string().contains("alpha1"));
    }

    #[test]
    fn twisting_gains_must_be_strictly_ordered() {
        let kind = ControllerKind::SuperTwistingSmc;
        let [finite_time, ordering] = [default_constraints(kind)[0], default_constraints(kind)[1]];
        // 4² > 2·4, so only the ordering rejects equal twisting gains.
        let equal = [4.0, 4.0, 20.0, 15.0, 12.0, 8.0];
        assert!(finite_time.check(kind, &equal).is_ok());
        let violation = ordering.check(kind, &equal).unwrap_err();
        assert!(violation.to_string().contains("alpha1 = 4 must be greater than alpha2 = 4"));
        assert!(ordering.check(kind, &[25.0, 10.0, 20.0, 15.0, 12.0, 8.0]).is_ok());
    }

    #[test]
    fn clip_projects_into_the_box() {
        let bounds = GainBounds::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let mut gains = [-3.0, 5.0];
        bounds.clip(&mut gains);
        assert_eq!(gains, [0.0, 2.0]);
    }

    #[test]
    fn mismatched_bounds_are_rejected() {
        assert!(GainBounds::new(vec![0.0], vec![1.0, 2.0]).is_err());
        assert!(GainBounds::new(vec![2.0], vec![1.0]).is_err());
    }
}
