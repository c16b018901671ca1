//! ManifestWork workload structure policy.
//!
//! Validates:
//! - `spec.workload.manifests` is present and non-empty
//! - every manifest declares `apiVersion`, `kind` and `metadata.name`

use serde::Deserialize;
use serde_json::Value;

use super::{Predicate, ValidationContext, ValidationResult};

#[derive(Deserialize)]
struct ManifestWork {
    #[serde(default)]
    spec: ManifestWorkSpec,
}

#[derive(Deserialize, Default)]
struct ManifestWorkSpec {
    #[serde(default)]
    workload: Workload,
}

#[derive(Deserialize, Default)]
struct Workload {
    #[serde(default)]
    manifests: Vec<Value>,
}

/// Structural checks on the manifests carried by a ManifestWork
#[derive(Debug, Default, Clone, Copy)]
pub struct WorkloadManifests;

impl Predicate for WorkloadManifests {
    fn name(&self) -> &str {
        "workload-manifests"
    }

    fn validate(&self, ctx: &ValidationContext<'_>) -> ValidationResult {
        let work: ManifestWork = match serde_json::from_slice(ctx.payload) {
            Ok(work) => work,
            Err(e) => {
                return ValidationResult::denied(
                    "InvalidManifestWork",
                    &format!("object is not a valid ManifestWork: {}", e),
                );
            }
        };

        let manifests = &work.spec.workload.manifests;
        if manifests.is_empty() {
            return ValidationResult::denied(
                "EmptyWorkload",
                "workload manifests should not be empty",
            );
        }

        for (index, manifest) in manifests.iter().enumerate() {
            if let Some(missing) = missing_field(manifest) {
                return ValidationResult::denied(
                    "InvalidManifest",
                    &format!("manifests[{}]: {} must be set", index, missing),
                );
            }
        }

        ValidationResult::allowed()
    }
}

/// First required field absent from a manifest, if any
fn missing_field(manifest: &Value) -> Option<&'static str> {
    let non_empty = |v: Option<&Value>| v.and_then(Value::as_str).is_some_and(|s| !s.is_empty());

    if !non_empty(manifest.get("apiVersion")) {
        return Some("apiVersion");
    }
    if !non_empty(manifest.get("kind")) {
        return Some("kind");
    }
    if !non_empty(manifest.pointer("/metadata/name")) {
        return Some("metadata.name");
    }
    None
}
