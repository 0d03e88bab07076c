use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Physical parameters of the cart and the two pendulum links.
///
/// Link angles are absolute, measured from the upright vertical.
/// `*_com` is the distance from the link's lower joint to its centre of mass
/// and `*_inertia` the moment of inertia about that centre.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct PhysicalParams {
    pub cart_mass: f64,
    pub link1_mass: f64,
    pub link2_mass: f64,
    pub link1_length: f64,
    pub link2_length: f64,
    pub link1_com: f64,
    pub link2_com: f64,
    pub link1_inertia: f64,
    pub link2_inertia: f64,
    pub gravity: f64,
    pub cart_friction: f64,
    pub joint1_friction: f64,
    pub joint2_friction: f64,
}

/// Uniform rods, with a heavier upper link.
impl Default for PhysicalParams {
    fn default() -> Self {
        Self {
            cart_mass: 1.0,
            link1_mass: 0.4,
            link2_mass: 0.6,
            link1_length: 0.4,
            link2_length: 0.4,
            link1_com: 0.2,
            link2_com: 0.2,
            link1_inertia: 0.0053,
            link2_inertia: 0.008,
            gravity: 9.81,
            cart_friction: 0.2,
            joint1_friction: 0.005,
            joint2_friction: 0.004,
        }
    }
}

impl PhysicalParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("physics.cart_mass", self.cart_mass),
            ("physics.link1_mass", self.link1_mass),
            ("physics.link2_mass", self.link2_mass),
            ("physics.link1_length", self.link1_length),
            ("physics.link2_length", self.link2_length),
            ("physics.link1_com", self.link1_com),
            ("physics.link2_com", self.link2_com),
            ("physics.link1_inertia", self.link1_inertia),
            ("physics.link2_inertia", self.link2_inertia),
            ("physics.gravity", self.gravity),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::invalid(field, format!("must be positive, got {}", value)));
            }
        }
        let non_negative = [
            ("physics.cart_friction", self.cart_friction),
            ("physics.joint1_friction", self.joint1_friction),
            ("physics.joint2_friction", self.joint2_friction),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::invalid(
                    field,
                    format!("must be non-negative, got {}", value),
                ));
            }
        }
        if self.link1_com > self.link1_length {
            return Err(ConfigError::invalid(
                "physics.link1_com",
                "centre of mass lies beyond the link",
            ));
        }
        if self.link2_com > self.link2_length {
            return Err(ConfigError::invalid(
                "physics.link2_com",
                "centre of mass lies beyond the link",
            ));
        }
        Ok(())
    }

    pub fn total_mass(&self) -> f64 {
        self.cart_mass + self.link1_mass + self.link2_mass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(PhysicalParams::default().validate().is_ok());
    }

    #[test]
    fn rejects_centre_of_mass_beyond_link() {
        let params = PhysicalParams {
            link2_com: 0.5,
            ..Default::default()
        };
        let err = params.validate().unwrap_err();
        assert!(err.to_string().contains("link2_com"));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let params: PhysicalParams =
            serde_json::from_str(r#"{"cart_mass": 2.5, "not_a_parameter": 1}"#).unwrap();
        assert_eq!(params.cart_mass, 2.5);
        assert_eq!(params.link1_mass, PhysicalParams::default().link1_mass);
    }
}
