//! Seeded generation of initial-condition scenarios.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::plant::State;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioClass {
    Nominal,
    Moderate,
    Large,
}

impl ScenarioClass {
    /// Half-widths of the uniform perturbation, ordered like the state:
    /// `[x, θ1, θ2, ẋ, θ̇1, θ̇2]`.
    pub fn perturbation(&self) -> [f64; 6] {
        match self {
            ScenarioClass::Nominal => [0.0, 0.05, 0.05, 0.0, 0.0, 0.0],
            ScenarioClass::Moderate => [0.1, 0.15, 0.15, 0.05, 0.1, 0.1],
            ScenarioClass::Large => [0.3, 0.3, 0.3, 0.1, 0.3, 0.3],
        }
    }

    fn sample(&self, rng: &mut ChaCha8Rng) -> [f64; 6] {
        let mut initial_state = [0.0; 6];
        for (value, half_width) in initial_state.iter_mut().zip(self.perturbation()) {
            if half_width > 0.0 {
                *value = rng.gen_range(-half_width..=half_width);
            }
        }
        initial_state
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Scenario {
    pub class: ScenarioClass,
    pub initial_state: [f64; 6],
    pub weight: f64,
}

impl Scenario {
    /// The fixed reference case: both links slightly tilted, at rest.
    pub fn nominal() -> Self {
        Self::new(ScenarioClass::Nominal, [0.0, 0.1, -0.05, 0.0, 0.0, 0.0])
    }

    /// Unit weight; see [`Scenario::with_weight`].
    pub fn new(class: ScenarioClass, initial_state: [f64; 6]) -> Self {
        Self {
            class,
            initial_state,
            weight: 1.0,
        }
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn state(&self) -> State {
        State::from_column_slice(&self.initial_state)
    }
}

/// Weight of each class in the robust mean.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ClassWeights {
    pub nominal: f64,
    pub moderate: f64,
    pub large: f64,
}

impl Default for ClassWeights {
    fn default() -> Self {
        Self {
            nominal: 1.0,
            moderate: 1.0,
            large: 1.0,
        }
    }
}

impl ClassWeights {
    pub fn of(&self, class: ScenarioClass) -> f64 {
        match class {
            ScenarioClass::Nominal => self.nominal,
            ScenarioClass::Moderate => self.moderate,
            ScenarioClass::Large => self.large,
        }
    }
}

/// Relative shares of the three perturbation classes, and the weight each
/// class carries once generated.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct ScenarioMix {
    pub nominal: f64,
    pub moderate: f64,
    pub large: f64,
    pub weights: ClassWeights,
}

impl Default for ScenarioMix {
    fn default() -> Self {
        Self {
            nominal: 0.4,
            moderate: 0.4,
            large: 0.2,
            weights: ClassWeights::default(),
        }
    }
}

impl ScenarioMix {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let shares = [self.nominal, self.moderate, self.large];
        if shares.iter().any(|s| !(s.is_finite() && *s >= 0.0)) {
            return Err(ConfigError::invalid(
                "scenario_mix",
                "shares must be finite and non-negative",
            ));
        }
        if shares.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::invalid("scenario_mix", "shares must not all be zero"));
        }
        let weights = [self.weights.nominal, self.weights.moderate, self.weights.large];
        if weights.iter().any(|w| !(w.is_finite() && *w > 0.0)) {
            return Err(ConfigError::invalid(
                "scenario_mix.weights",
                "class weights must be finite and positive",
            ));
        }
        Ok(())
    }

    /// Scenario counts `(nominal, moderate, large)` for a set of `count`.
    /// Shares are rounded; nominal takes whatever is left over.
    pub fn counts(&self, count: usize) -> (usize, usize, usize) {
        let total = self.nominal + self.moderate + self.large;
        let share = |weight: f64| ((weight / total) * count as f64).round() as usize;
        let large = share(self.large).min(count);
        let moderate = share(self.moderate).min(count - large);
        (count - large - moderate, moderate, large)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ScenarioSet {
    pub scenarios: Vec<Scenario>,
}

impl ScenarioSet {
    pub fn new(scenarios: Vec<Scenario>) -> Self {
        Self { scenarios }
    }

    /// Nominal scenarios first, then moderate, then large. Identical for
    /// identical arguments.
    pub fn generate(mix: &ScenarioMix, count: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let (nominal, moderate, large) = mix.counts(count);
        let classes = std::iter::repeat(ScenarioClass::Nominal)
            .take(nominal)
            .chain(std::iter::repeat(ScenarioClass::Moderate).take(moderate))
            .chain(std::iter::repeat(ScenarioClass::Large).take(large));
        let scenarios = classes
            .map(|class| {
                Scenario::new(class, class.sample(&mut rng)).with_weight(mix.weights.of(class))
            })
            .collect();
        Self { scenarios }
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Scenario> {
        self.scenarios.iter()
    }

    pub fn count_of(&self, class: ScenarioClass) -> usize {
        self.scenarios.iter().filter(|s| s.class == class).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_le;

    #[test]
    fn counts_follow_the_mix() {
        let mix = ScenarioMix::default();
        assert_eq!(mix.counts(10), (4, 4, 2));
        assert_eq!(mix.counts(5), (2, 2, 1));
        assert_eq!(mix.counts(1), (1, 0, 0));
        assert_eq!(mix.counts(0), (0, 0, 0));
        let (n, m, l) = mix.counts(7);
        assert_eq!(n + m + l, 7);
    }

    #[test]
    fn generation_is_deterministic_per_seed() {
        let mix = ScenarioMix::default();
        let a = ScenarioSet::generate(&mix, 10, 7);
        let b = ScenarioSet::generate(&mix, 10, 7);
        let c = ScenarioSet::generate(&mix, 10, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn generated_states_respect_class_magnitudes() {
        let set = ScenarioSet::generate(&ScenarioMix::default(), 50, 42);
        assert_eq!(set.len(), 50);
        assert_eq!(set.count_of(ScenarioClass::Nominal), 20);
        assert_eq!(set.count_of(ScenarioClass::Moderate), 20);
        assert_eq!(set.count_of(ScenarioClass::Large), 10);
        for scenario in set.iter() {
            for (value, half_width) in scenario
                .initial_state
                .iter()
                .zip(scenario.class.perturbation())
            {
                assert_le!(value.abs(), half_width);
            }
        }
    }

    #[test]
    fn fixed_nominal_case() {
        let scenario = Scenario::nominal();
        assert_eq!(scenario.state(), State::new(0.0, 0.1, -0.05, 0.0, 0.0, 0.0));
    }

    #[test]
    fn mix_must_have_some_weight() {
        let mix = ScenarioMix {
            nominal: 0.0,
            moderate: 0.0,
            large: 0.0,
            ..Default::default()
        };
        assert!(mix.validate().is_err());

        let mix = ScenarioMix {
            weights: ClassWeights {
                large: 0.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(mix.validate().is_err());
    }

    #[test]
    fn generated_scenarios_carry_their_class_weight() {
        let mix: ScenarioMix =
            serde_json::from_str(r#"{"weights": {"large": 3.0, "nominal": 0.5}}"#).unwrap();
        assert_eq!(mix.nominal, 0.4);
        assert!(mix.validate().is_ok());
        let set = ScenarioSet::generate(&mix, 10, 3);
        for scenario in set.iter() {
            let expected = match scenario.class {
                ScenarioClass::Nominal => 0.5,
                ScenarioClass::Moderate => 1.0,
                ScenarioClass::Large => 3.0,
            };
            assert_eq!(scenario.weight, expected);
        }
    }
}
