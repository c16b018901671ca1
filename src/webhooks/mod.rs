//! Validating admission webhook for ManifestWork resources.
//!
//! - [`registry`]: predicates per resource kind and startup-time limits
//! - [`policies`]: the predicates themselves
//! - [`server`]: AdmissionReview decoding, dispatch and the axum route
//! - [`tls`]: certificate loading and the TLS listener

pub mod policies;
pub mod registry;
mod server;
pub mod tls;

pub use policies::{Predicate, ValidationContext, ValidationResult};
pub use registry::{ValidatorConfig, ValidatorRegistry};
pub use server::{
    AdmissionDispatcher, Decision, MALFORMED_REQUEST, WEBHOOK_PATH, WEBHOOK_PORT, WebhookState,
    create_webhook_router,
};
pub use tls::{TlsListener, TlsMinVersion};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
