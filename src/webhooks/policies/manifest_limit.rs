//! Manifest size limit policy.
//!
//! Rejects objects whose serialized size exceeds the configured ceiling.
//! A ceiling of 0 disables the check.

use super::{Predicate, ValidationContext, ValidationResult};

/// Whole-object byte-size ceiling, read from [`ValidatorConfig::manifest_limit`].
///
/// [`ValidatorConfig::manifest_limit`]: crate::webhooks::registry::ValidatorConfig
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestLimit;

impl Predicate for ManifestLimit {
    fn name(&self) -> &str {
        "manifest-limit"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        let limit = ctx.config.manifest_limit;
        if limit == 0 {
            return ValidationResult::allowed();
        }

        let size = ctx.payload.len();
        if size > limit {
            return ValidationResult::denied(
                "ManifestTooLarge",
                &format!(
                    "the size of manifests is {} bytes which exceeds the {} limit",
                    size, limit
                ),
            );
        }

        ValidationResult::allowed()
    }
}
