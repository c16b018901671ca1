//! Explicit type registry.
//!
//! The scheme records which resource types this service understands. It is
//! built once during startup and handed to the validator registry, which
//! refuses predicates for kinds the scheme has never heard of.

use std::collections::BTreeSet;
use std::fmt;

use kube::core::GroupVersionKind;

/// API group served by the ManifestWork webhook
pub const WORK_GROUP: &str = "work.open-cluster-management.io";
/// ManifestWork API version
pub const WORK_VERSION: &str = "v1";
/// ManifestWork kind
pub const MANIFEST_WORK_KIND: &str = "ManifestWork";

/// Version-agnostic identity of a resource type: (API group, kind).
///
/// The core group is represented by an empty `group`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKind {
    pub group: String,
    pub kind: String,
}

impl ResourceKind {
    pub fn new(group: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            kind: kind.into(),
        }
    }

    /// The ManifestWork kind
    pub fn manifest_work() -> Self {
        Self::new(WORK_GROUP, MANIFEST_WORK_KIND)
    }

    /// Derive the kind from the GVK carried in an admission request
    pub fn from_gvk(gvk: &GroupVersionKind) -> Self {
        Self::new(gvk.group.as_str(), gvk.kind.as_str())
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}.{}", self.kind, self.group)
        }
    }
}

/// Registry of known resource types
#[derive(Debug, Default, Clone)]
pub struct Scheme {
    known: BTreeSet<ResourceKind>,
    versions: BTreeSet<(ResourceKind, String)>,
}

impl Scheme {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheme with the work API types installed
    pub fn with_work_types() -> Self {
        let mut scheme = Self::new();
        scheme.add_known_type(WORK_GROUP, WORK_VERSION, MANIFEST_WORK_KIND);
        scheme
    }

    /// Record a served group/version/kind
    pub fn add_known_type(&mut self, group: &str, version: &str, kind: &str) {
        let resource_kind = ResourceKind::new(group, kind);
        self.versions
            .insert((resource_kind.clone(), version.to_string()));
        self.known.insert(resource_kind);
    }

    /// Whether any version of `kind` is registered
    pub fn recognizes(&self, kind: &ResourceKind) -> bool {
        self.known.contains(kind)
    }

    /// Whether this exact group/version/kind is registered
    pub fn recognizes_gvk(&self, gvk: &GroupVersionKind) -> bool {
        self.versions
            .contains(&(ResourceKind::from_gvk(gvk), gvk.version.clone()))
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}
