use thiserror::Error;

use crate::controllers::ControllerKind;

/// Top-level error type, used by the binary to report any failure.
#[derive(Debug, Error)]
pub enum DipError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Factory error: {0}")]
    Factory(#[from] FactoryError),

    #[error("Optimization error: {0}")]
    Optimization(#[from] OptimizationError),

    #[error("Dynamics error: {0}")]
    Dynamics(#[from] DynamicsError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::core::logging::InitError),
}

/// Raised by the plant model when the state derivative is not finite,
/// even after the mass matrix has been regularized.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DynamicsError {
    #[error("Numerical divergence: {0}")]
    NumericalDivergence(String),
}

/// The specific reason a gain vector was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GainViolation {
    #[error("expected {expected} gains, got {got}")]
    WrongLength { expected: usize, got: usize },

    #[error("gain `{name}` (index {index}) is not finite")]
    NonFinite { index: usize, name: &'static str },

    #[error("gain `{name}` (index {index}) must be positive, got {value}")]
    NonPositive {
        index: usize,
        name: &'static str,
        value: f64,
    },

    #[error("gain `{name}` (index {index}) = {value} is outside [{lower}, {upper}]")]
    OutOfBounds {
        index: usize,
        name: &'static str,
        value: f64,
        lower: f64,
        upper: f64,
    },

    #[error("constraint violated: {0}")]
    Constraint(String),
}

/// Controller construction errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactoryError {
    #[error("Unknown controller type: `{0}`")]
    UnknownControllerType(String),

    #[error("Invalid gain vector for {kind}: {violation}")]
    InvalidGainVector {
        kind: ControllerKind,
        violation: GainViolation,
    },

    #[error("Invalid controller configuration: {0}")]
    InvalidConfig(String),

    #[error("Timed out after {waited_ms} ms waiting for the controller registry lock")]
    LockTimeout { waited_ms: u128 },
}

impl FactoryError {
    pub fn invalid(kind: ControllerKind, violation: GainViolation) -> Self {
        FactoryError::InvalidGainVector { kind, violation }
    }
}

/// Configuration loading and range-checking errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_owned(),
            message: message.into(),
        }
    }
}

/// Errors that stop an optimization campaign before it starts.
#[derive(Debug, Error)]
pub enum OptimizationError {
    #[error("Factory error: {0}")]
    Factory(#[from] FactoryError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scenario set is empty")]
    EmptyScenarioSet,

    #[error("Search space has {bounds} dimensions but the controller takes {arity} gains")]
    DimensionMismatch { bounds: usize, arity: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_gain_vector_names_the_violation() {
        let err = FactoryError::invalid(
            ControllerKind::ClassicalSmc,
            GainViolation::WrongLength {
                expected: 6,
                got: 5,
            },
        );
        let message = err.to_string();
        assert!(message.contains("classical_smc"));
        assert!(message.contains("expected 6 gains, got 5"));
    }

    #[test]
    fn non_positive_gain_reports_name_and_value() {
        let violation = GainViolation::NonPositive {
            index: 4,
            name: "K",
            value: -2.0,
        };
        assert_eq!(
            violation.to_string(),
            "gain `K` (index 4) must be positive, got -2"
        );
    }

    #[test]
    fn dip_error_from_factory_error() {
        let err: DipError = FactoryError::UnknownControllerType("pid".to_owned()).into();
        assert!(matches!(err, DipError::Factory(_)));
        assert!(err.to_string().contains("pid"));
    }

    #[test]
    fn config_error_helper_formats_field() {
        let err = ConfigError::invalid("dt", "must be positive");
        assert_eq!(err.to_string(), "Invalid value for dt: must be positive");
    }
}
