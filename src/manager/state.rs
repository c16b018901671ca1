//! Service lifecycle state machine.
//!
//! Lifecycle: `Initializing -> Serving -> Draining -> Stopped`, with a direct
//! `Initializing -> Stopped` edge for startup failures. Shutdown is one-way:
//! nothing leads back to `Serving`.
//!
//! The current state lives in an [`AtomicU8`] so health probes, the listener
//! and the manager can all read it from different tasks.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::error::{Error, Result};

/// Lifecycle state of the webhook service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ServiceState {
    Initializing = 0,
    Serving = 1,
    Draining = 2,
    Stopped = 3,
}

impl ServiceState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ServiceState::Initializing,
            1 => ServiceState::Serving,
            2 => ServiceState::Draining,
            _ => ServiceState::Stopped,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Initializing => write!(f, "Initializing"),
            ServiceState::Serving => write!(f, "Serving"),
            ServiceState::Draining => write!(f, "Draining"),
            ServiceState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Events that trigger lifecycle transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceEvent {
    /// The TLS listener is accepting connections
    ListenerReady,
    /// A termination signal arrived
    TerminationRequested,
    /// In-flight requests finished or the drain timeout elapsed
    DrainCompleted,
    /// Initialization failed before serving began
    StartupFailed,
}

impl fmt::Display for ServiceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceEvent::ListenerReady => write!(f, "ListenerReady"),
            ServiceEvent::TerminationRequested => write!(f, "TerminationRequested"),
            ServiceEvent::DrainCompleted => write!(f, "DrainCompleted"),
            ServiceEvent::StartupFailed => write!(f, "StartupFailed"),
        }
    }
}

/// A state transition definition
#[derive(Debug)]
struct Transition {
    from: ServiceState,
    to: ServiceState,
    event: ServiceEvent,
    description: &'static str,
}

const TRANSITIONS: &[Transition] = &[
    Transition {
        from: ServiceState::Initializing,
        to: ServiceState::Serving,
        event: ServiceEvent::ListenerReady,
        description: "Listener accepting connections, readiness healthy",
    },
    Transition {
        from: ServiceState::Initializing,
        to: ServiceState::Stopped,
        event: ServiceEvent::StartupFailed,
        description: "Initialization failed, no partial service",
    },
    Transition {
        from: ServiceState::Serving,
        to: ServiceState::Draining,
        event: ServiceEvent::TerminationRequested,
        description: "Termination signal received, draining in-flight requests",
    },
    Transition {
        from: ServiceState::Draining,
        to: ServiceState::Stopped,
        event: ServiceEvent::DrainCompleted,
        description: "Drain finished",
    },
];

/// Shared, atomically updated lifecycle state
#[derive(Debug)]
pub struct ServiceLifecycle {
    state: AtomicU8,
}

impl Default for ServiceLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceLifecycle {
    /// Create a lifecycle in `Initializing`
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ServiceState::Initializing as u8),
        }
    }

    /// Current state
    pub fn current(&self) -> ServiceState {
        ServiceState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether `event` is valid from `state`
    pub fn can_transition(state: ServiceState, event: ServiceEvent) -> bool {
        TRANSITIONS
            .iter()
            .any(|t| t.from == state && t.event == event)
    }

    /// Apply `event`, returning the new state.
    ///
    /// Uses compare-and-swap so two tasks racing on the same event cannot both
    /// succeed.
    pub fn transition(&self, event: ServiceEvent) -> Result<ServiceState> {
        let current = self.current();
        let transition = TRANSITIONS
            .iter()
            .find(|t| t.from == current && t.event == event)
            .ok_or(Error::InvalidTransition {
                state: current,
                event,
            })?;

        self.state
            .compare_exchange(
                transition.from as u8,
                transition.to as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|actual| Error::InvalidTransition {
                state: ServiceState::from_u8(actual),
                event,
            })?;

        tracing::info!(
            from = %transition.from,
            to = %transition.to,
            event = %event,
            "{}",
            transition.description
        );
        Ok(transition.to)
    }
}
