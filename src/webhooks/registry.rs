//! Validator registry: resource kind to ordered predicates.
//!
//! The registry is mutable only while the service is initializing. The
//! service manager seals it before serving and then shares it behind an
//! `Arc`, so request handlers read it without locks.

use std::collections::HashMap;
use std::sync::Arc;

use kube::core::admission::Operation;
use tracing::debug;

use crate::error::{Error, Result};
use crate::scheme::{ResourceKind, Scheme};
use crate::webhooks::policies::manifest_limit::ManifestLimit;
use crate::webhooks::policies::workload::WorkloadManifests;
use crate::webhooks::policies::{Predicate, ValidationContext, ValidationResult};

/// Process-wide limits consulted by predicates
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Maximum serialized object size in bytes; 0 disables the limit
    pub manifest_limit: usize,
}

/// Registered predicates, keyed by resource kind
pub struct ValidatorRegistry {
    scheme: Arc<Scheme>,
    config: ValidatorConfig,
    predicates: HashMap<ResourceKind, Vec<Arc<dyn Predicate>>>,
    sealed: bool,
}

impl ValidatorRegistry {
    /// Create an empty, unsealed registry backed by `scheme`
    pub fn new(scheme: Arc<Scheme>) -> Self {
        Self {
            scheme,
            config: ValidatorConfig::default(),
            predicates: HashMap::new(),
            sealed: false,
        }
    }

    /// Registry with the ManifestWork policies installed
    pub fn for_manifest_work(scheme: Arc<Scheme>, manifest_limit: usize) -> Result<Self> {
        let mut registry = Self::new(scheme);
        registry.set_limit(manifest_limit)?;
        registry.register(ResourceKind::manifest_work(), ManifestLimit)?;
        registry.register(ResourceKind::manifest_work(), WorkloadManifests)?;
        Ok(registry)
    }

    /// Append a predicate to `kind`'s sequence
    pub fn register<P>(&mut self, kind: ResourceKind, predicate: P) -> Result<()>
    where
        P: Predicate + 'static,
    {
        if self.sealed {
            return Err(Error::LateRegistration {
                kind: kind.to_string(),
            });
        }
        if !self.scheme.recognizes(&kind) {
            return Err(Error::UnknownKind(kind));
        }

        debug!(kind = %kind, predicate = predicate.name(), "Registering predicate");
        self.predicates
            .entry(kind)
            .or_default()
            .push(Arc::new(predicate));
        Ok(())
    }

    /// Set the manifest size ceiling in bytes (0 means no limit)
    pub fn set_limit(&mut self, limit: usize) -> Result<()> {
        if self.sealed {
            return Err(Error::LateConfiguration {
                setting: "manifest_limit".to_string(),
            });
        }
        self.config.manifest_limit = limit;
        Ok(())
    }

    /// Freeze the registry; later `register`/`set_limit` calls fail
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn scheme(&self) -> &Scheme {
        &self.scheme
    }

    /// Whether any predicate is registered for `kind`
    pub fn is_registered(&self, kind: &ResourceKind) -> bool {
        self.predicates.contains_key(kind)
    }

    /// Number of predicates registered for `kind`
    pub fn predicate_count(&self, kind: &ResourceKind) -> usize {
        self.predicates.get(kind).map_or(0, Vec::len)
    }

    /// Run `kind`'s predicates in registration order, stopping at the first
    /// rejection. Returns `None` when nothing is registered for `kind`.
    pub fn evaluate(
        &self,
        kind: &ResourceKind,
        payload: &[u8],
        operation: &Operation,
    ) -> Option<ValidationResult> {
        let predicates = self.predicates.get(kind)?;
        let ctx = ValidationContext {
            payload,
            operation,
            config: &self.config,
        };

        for predicate in predicates {
            let result = predicate.validate(&ctx);
            if !result.allowed {
                debug!(kind = %kind, predicate = predicate.name(), "Predicate rejected object");
                return Some(result);
            }
        }

        Some(ValidationResult::allowed())
    }
}
