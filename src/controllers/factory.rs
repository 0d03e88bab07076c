//! Registry-driven controller construction.
//!
//! The factory is built once per run and shared by reference (usually in an
//! `Arc`) between evaluators. Its only mutable state is the registry table,
//! guarded by a `parking_lot::RwLock` that is always acquired with a bounded
//! wait.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::controllers::config::ControllerConfig;
use crate::controllers::gains::{
    check_positive, check_structure, default_constraints, default_gains, GainBounds,
    GainConstraint,
};
use crate::controllers::{
    AdaptiveSmc, ClassicalSmc, Controller, ControllerKind, HybridAdaptiveStaSmc,
    SuperTwistingSmc,
};
use crate::error::{FactoryError, GainViolation};
use crate::plant::PlantModel;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the factory knows about one controller type.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryEntry {
    pub kind: ControllerKind,
    pub gain_names: &'static [&'static str],
    pub default_gains: Vec<f64>,
    pub bounds: GainBounds,
    pub constraints: Vec<GainConstraint>,
}

impl RegistryEntry {
    pub fn for_kind(kind: ControllerKind) -> Self {
        Self {
            kind,
            gain_names: kind.gain_names(),
            default_gains: default_gains(kind),
            bounds: GainBounds::for_kind(kind),
            constraints: default_constraints(kind),
        }
    }

    pub fn arity(&self) -> usize {
        self.gain_names.len()
    }

    /// Arity, finiteness, positivity, then every feasibility constraint.
    /// The first violation found is reported.
    pub fn check(&self, gains: &[f64]) -> Result<(), GainViolation> {
        check_structure(self.kind, gains)?;
        check_positive(self.kind, gains)?;
        for constraint in &self.constraints {
            constraint.check(self.kind, gains)?;
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct ControllerFactory {
    registry: RwLock<HashMap<ControllerKind, RegistryEntry>>,
    lock_timeout: Duration,
    model: PlantModel,
    config: ControllerConfig,
}

impl ControllerFactory {
    /// `model` is the nominal plant used by every controller's equivalent control.
    pub fn new(model: PlantModel) -> Self {
        let registry = ControllerKind::ALL
            .iter()
            .map(|&kind| (kind, RegistryEntry::for_kind(kind)))
            .collect();
        Self {
            registry: RwLock::new(registry),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            model,
            config: ControllerConfig::default(),
        }
    }

    /// Configuration used when a call does not pass its own.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn model(&self) -> &PlantModel {
        &self.model
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<ControllerKind, RegistryEntry>>, FactoryError> {
        self.registry
            .try_read_for(self.lock_timeout)
            .ok_or(FactoryError::LockTimeout {
                waited_ms: self.lock_timeout.as_millis(),
            })
    }

    fn write(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<ControllerKind, RegistryEntry>>, FactoryError> {
        self.registry
            .try_write_for(self.lock_timeout)
            .ok_or(FactoryError::LockTimeout {
                waited_ms: self.lock_timeout.as_millis(),
            })
    }

    /// A snapshot of the registry entry; the lock is released on return.
    pub fn entry(&self, kind: ControllerKind) -> Result<RegistryEntry, FactoryError> {
        let registry = self.read()?;
        Ok(registry
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| RegistryEntry::for_kind(kind)))
    }

    /// Replace the default gains of `kind`, after checking them.
    pub fn register_defaults(
        &self,
        kind: ControllerKind,
        gains: Vec<f64>,
    ) -> Result<(), FactoryError> {
        let mut registry = self.write()?;
        let entry = registry
            .entry(kind)
            .or_insert_with(|| RegistryEntry::for_kind(kind));
        entry
            .check(&gains)
            .map_err(|violation| FactoryError::invalid(kind, violation))?;
        tracing::debug!(%kind, ?gains, "registered default gains");
        entry.default_gains = gains;
        Ok(())
    }

    /// Explicit gains, else the gains embedded in `config`, else the
    /// registry default.
    pub fn resolve_gains(
        &self,
        kind: ControllerKind,
        explicit: Option<&[f64]>,
        config: Option<&ControllerConfig>,
    ) -> Result<Vec<f64>, FactoryError> {
        if let Some(gains) = explicit {
            return Ok(gains.to_vec());
        }
        let config = config.unwrap_or(&self.config);
        if let Some(gains) = config.gains.get(&kind) {
            return Ok(gains.clone());
        }
        Ok(self.entry(kind)?.default_gains)
    }

    pub fn validate(&self, kind: ControllerKind, gains: &[f64]) -> Result<(), FactoryError> {
        self.entry(kind)?
            .check(gains)
            .map_err(|violation| FactoryError::invalid(kind, violation))
    }

    /// Resolve, fully validate and build a controller from a type tag.
    pub fn create(
        &self,
        type_tag: &str,
        gains: Option<&[f64]>,
        config: Option<&ControllerConfig>,
    ) -> Result<Controller, FactoryError> {
        let kind: ControllerKind = type_tag.parse()?;
        self.create_kind(kind, gains, config)
    }

    pub fn create_kind(
        &self,
        kind: ControllerKind,
        gains: Option<&[f64]>,
        config: Option<&ControllerConfig>,
    ) -> Result<Controller, FactoryError> {
        let resolved = self.resolve_gains(kind, gains, config)?;
        self.validate(kind, &resolved)?;
        tracing::debug!(%kind, gains = ?resolved, "creating controller");
        self.build(kind, &resolved, config.unwrap_or(&self.config))
    }

    /// Build a controller for a search candidate. Only the shape of the gain
    /// vector is checked, so well-formed but unstable candidates can still be
    /// simulated and penalised.
    pub fn create_candidate(
        &self,
        kind: ControllerKind,
        gains: &[f64],
        config: Option<&ControllerConfig>,
    ) -> Result<Controller, FactoryError> {
        check_structure(kind, gains).map_err(|violation| FactoryError::invalid(kind, violation))?;
        self.build(kind, gains, config.unwrap_or(&self.config))
    }

    fn build(
        &self,
        kind: ControllerKind,
        gains: &[f64],
        config: &ControllerConfig,
    ) -> Result<Controller, FactoryError> {
        config
            .validate()
            .map_err(|err| FactoryError::InvalidConfig(err.to_string()))?;
        let wrong_length = || {
            FactoryError::invalid(
                kind,
                GainViolation::WrongLength {
                    expected: kind.arity(),
                    got: gains.len(),
                },
            )
        };
        let limits = config.limits();
        let model = self.model.clone();
        let controller = match kind {
            ControllerKind::ClassicalSmc => Controller::Classical(ClassicalSmc::new(
                gains.try_into().map_err(|_| wrong_length())?,
                limits,
                model,
            )),
            ControllerKind::SuperTwistingSmc => Controller::SuperTwisting(SuperTwistingSmc::new(
                gains.try_into().map_err(|_| wrong_length())?,
                limits,
                config.super_twisting,
                model,
            )),
            ControllerKind::AdaptiveSmc => Controller::Adaptive(AdaptiveSmc::new(
                gains.try_into().map_err(|_| wrong_length())?,
                limits,
                config.adaptive,
                model,
            )),
            ControllerKind::HybridAdaptiveStaSmc => Controller::Hybrid(HybridAdaptiveStaSmc::new(
                gains.try_into().map_err(|_| wrong_length())?,
                limits,
                config.hybrid,
                model,
            )),
        };
        Ok(controller)
    }
}

impl Default for ControllerFactory {
    fn default() -> Self {
        Self::new(PlantModel::default())
    }
}
