//! Validation predicates for admission requests.
//!
//! A predicate is a pure, synchronous check over the serialized object and the
//! process-wide [`ValidatorConfig`]. Predicates must not block: they run on the
//! request task and are expected to cost time proportional to the payload.
//!
//! Shipped predicates:
//! - [`manifest_limit::ManifestLimit`]: whole-object byte-size ceiling
//! - [`workload::WorkloadManifests`]: ManifestWork workload structure

pub mod manifest_limit;
pub mod workload;

use kube::core::admission::Operation;

use crate::webhooks::registry::ValidatorConfig;

/// Result of a validation check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the validation passed
    pub allowed: bool,
    /// Machine-readable reason for denial (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            reason: None,
            message: None,
        }
    }

    /// Create a denied result
    pub fn denied(reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
        }
    }
}

/// Context for validation
#[derive(Debug, Clone, Copy)]
pub struct ValidationContext<'a> {
    /// Serialized object under admission
    pub payload: &'a [u8],
    /// The admission operation
    pub operation: &'a Operation,
    /// Limits configured at startup
    pub config: &'a ValidatorConfig,
}

impl<'a> ValidationContext<'a> {
    /// Check if this is an UPDATE operation
    pub fn is_update(&self) -> bool {
        matches!(self.operation, Operation::Update)
    }
}

/// A single admission check.
///
/// Implemented for plain closures so ad-hoc policies can be registered
/// without a dedicated type.
pub trait Predicate: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str {
        "anonymous"
    }

    /// Accept or reject the object
    fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult;
}

impl<F> Predicate for F
where
    F: Fn(&ValidationContext<'_>) -> ValidationResult + Send + Sync,
{
    fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        self(ctx)
    }
}
