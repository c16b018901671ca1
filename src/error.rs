//! Error types for the webhook service.
//!
//! Every variant here is a startup or lifecycle failure. Per-request problems
//! (undecodable bodies, policy denials) never surface as errors; they become
//! denied admission responses instead.

use thiserror::Error;

use crate::manager::state::{ServiceEvent, ServiceState};
use crate::scheme::ResourceKind;

/// Error type for webhook service operations
#[derive(Error, Debug)]
pub enum Error {
    /// The TLS listener could not bind its port or load certificate material
    #[error("Listener failed to start: {0}")]
    ListenerStart(String),

    /// The health probe server could not bind its port
    #[error("Health server error: {0}")]
    HealthServer(String),

    /// A predicate was registered after the registry was sealed
    #[error("Late registration for {kind}: validator registry is sealed for serving")]
    LateRegistration { kind: String },

    /// A validator setting was changed after the registry was sealed
    #[error("Late configuration of {setting}: validator registry is sealed for serving")]
    LateConfiguration { setting: String },

    /// A predicate was registered for a kind the type registry does not know
    #[error("Unknown resource kind: {0}")]
    UnknownKind(ResourceKind),

    /// The lifecycle state machine rejected an event
    #[error("Invalid state transition: {event} is not valid in state {state}")]
    InvalidTransition {
        state: ServiceState,
        event: ServiceEvent,
    },
}

/// Result type alias for webhook operations
pub type Result<T> = std::result::Result<T, Error>;
