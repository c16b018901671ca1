//! work-webhook library crate
//!
//! This module exports the validating admission webhook for ManifestWork:
//! the validator registry, the AdmissionReview dispatcher, the TLS listener
//! and the service manager that ties them to health probes and draining.

pub mod config;
pub mod error;
pub mod health;
pub mod manager;
pub mod scheme;
pub mod webhooks;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use health::HealthState;
pub use manager::drain::InFlight;
pub use manager::signal::{cancel_on_signal, shutdown_signal};
pub use manager::state::{ServiceEvent, ServiceLifecycle, ServiceState};
pub use manager::{ServiceManager, ShutdownOutcome};
pub use scheme::{ResourceKind, Scheme};
pub use webhooks::{
    AdmissionDispatcher, MALFORMED_REQUEST, Predicate, ValidationContext, ValidationResult,
    ValidatorRegistry, WEBHOOK_PATH, WEBHOOK_PORT,
};
