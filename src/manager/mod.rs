//! Service manager: owns the webhook lifecycle.
//!
//! Startup order: health server, validator registry sealing, dispatcher
//! route, TLS listener. The manager then serves until its cancellation token
//! fires, flips readiness off, stops accepting connections and waits for
//! in-flight admission requests up to the drain timeout.

pub mod drain;
pub mod signal;
pub mod state;

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum_server::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::health::{self, HealthState};
use crate::scheme::Scheme;
use crate::webhooks::{
    AdmissionDispatcher, TlsListener, ValidatorRegistry, WebhookState, create_webhook_router,
};
use drain::InFlight;
use state::{ServiceEvent, ServiceLifecycle, ServiceState};

/// Minimum time given to idle connections to close once drained
const CONNECTION_CLOSE_GRACE: Duration = Duration::from_millis(100);

/// How the service stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every in-flight request finished before the drain timeout
    Clean,
    /// The drain timeout elapsed with requests still running
    TimedOut { abandoned: usize },
}

impl ShutdownOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, ShutdownOutcome::Clean)
    }
}

/// Owns the lifecycle and the components of the webhook service
pub struct ServiceManager {
    config: WebhookConfig,
    registry: ValidatorRegistry,
    lifecycle: Arc<ServiceLifecycle>,
    health: Arc<HealthState>,
    in_flight: Arc<InFlight>,
    handle: Handle,
}

impl ServiceManager {
    /// Build a manager with the ManifestWork policies registered
    pub fn new(config: WebhookConfig, scheme: Arc<Scheme>) -> Result<Self> {
        let registry = ValidatorRegistry::for_manifest_work(scheme, config.manifest_limit)?;
        Ok(Self::with_registry(config, registry))
    }

    /// Build a manager around an already populated registry
    pub fn with_registry(config: WebhookConfig, registry: ValidatorRegistry) -> Self {
        let lifecycle = Arc::new(ServiceLifecycle::new());
        Self {
            config,
            registry,
            health: Arc::new(HealthState::new(lifecycle.clone())),
            lifecycle,
            in_flight: Arc::new(InFlight::new()),
            handle: Handle::new(),
        }
    }

    /// Registry access for additional registrations while initializing
    pub fn registry_mut(&mut self) -> &mut ValidatorRegistry {
        &mut self.registry
    }

    /// Health state shared with the probe server
    pub fn health(&self) -> Arc<HealthState> {
        self.health.clone()
    }

    /// In-flight request tracker shared with the dispatcher route
    pub fn in_flight(&self) -> Arc<InFlight> {
        self.in_flight.clone()
    }

    pub fn state(&self) -> ServiceState {
        self.lifecycle.current()
    }

    /// Server handle; `handle().listening()` resolves with the bound webhook
    /// address once the listener accepts connections
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Run until SIGTERM or SIGINT, then drain
    pub async fn run_until_signal(self) -> Result<ShutdownOutcome> {
        let shutdown = CancellationToken::new();
        let signal_task = signal::cancel_on_signal(shutdown.clone());

        let result = self.run(shutdown.clone()).await;

        // Stops the signal task when the service exits on its own
        shutdown.cancel();
        let _ = signal_task.await;
        result
    }

    /// Run until `shutdown` is cancelled, then drain.
    ///
    /// Errors are startup failures; the lifecycle ends in `Stopped` either way.
    pub async fn run(self, shutdown: CancellationToken) -> Result<ShutdownOutcome> {
        let lifecycle = self.lifecycle.clone();
        match self.run_inner(shutdown).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(error = %e, "Webhook service failed");
                if lifecycle.current() == ServiceState::Initializing {
                    let _ = lifecycle.transition(ServiceEvent::StartupFailed);
                }
                Err(e)
            }
        }
    }

    async fn run_inner(self, shutdown: CancellationToken) -> Result<ShutdownOutcome> {
        let Self {
            config,
            mut registry,
            lifecycle,
            health,
            in_flight,
            handle,
        } = self;

        info!(
            port = config.port,
            cert_dir = %config.cert_dir.display(),
            manifest_limit = config.manifest_limit,
            tls_min_version = %config.tls_min_version,
            "Initializing webhook service"
        );

        // Health probes must answer while draining, so they get their own token
        let health_shutdown = CancellationToken::new();
        let health_listener = health::bind_health_listener(config.health_probe_port).await?;
        let health_task = tokio::spawn(health::run_health_server(
            health_listener,
            health.clone(),
            health_shutdown.clone(),
        ));

        registry.seal();
        let dispatcher = AdmissionDispatcher::new(Arc::new(registry));
        let app = create_webhook_router(Arc::new(WebhookState::new(
            dispatcher,
            in_flight.clone(),
            health.clone(),
        )));
        health.mark_initialized();

        let listener =
            match TlsListener::bind(config.webhook_addr(), &config.cert_dir, config.tls_min_version) {
                Ok(listener) => listener,
                Err(e) => {
                    health_shutdown.cancel();
                    return Err(e);
                }
            };

        let mut server_task = tokio::spawn(listener.serve(app, handle.clone()));

        // Wait until the listener accepts, or fails to
        let listening = tokio::select! {
            addr = handle.listening() => addr,
            result = &mut server_task => {
                health_shutdown.cancel();
                return Err(server_exit_error(result));
            }
        };
        let Some(addr) = listening else {
            health_shutdown.cancel();
            return Err(Error::ListenerStart("listener closed before accepting".to_string()));
        };

        lifecycle.transition(ServiceEvent::ListenerReady)?;
        info!(addr = %addr, "Webhook service ready");

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Received shutdown signal, initiating graceful shutdown...");
            }
            result = &mut server_task => {
                // The listener died while serving: nothing left to drain
                let err = server_exit_error(result);
                let _ = lifecycle.transition(ServiceEvent::TerminationRequested);
                let _ = lifecycle.transition(ServiceEvent::DrainCompleted);
                health_shutdown.cancel();
                return Err(err);
            }
        }

        let drainer = Drainer {
            lifecycle: &lifecycle,
            health: &health,
            in_flight: &in_flight,
            handle: &handle,
            timeout: config.drain_timeout(),
        };
        let outcome = drainer.drain(server_task).await?;

        health_shutdown.cancel();
        match health_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Health server exited with error"),
            Err(e) => error!("Health server task panicked: {}", e),
        }

        info!(outcome = ?outcome, "Webhook service stopped");
        Ok(outcome)
    }
}

/// Draining phase: readiness off, stop accepting, wait for in-flight work
struct Drainer<'a> {
    lifecycle: &'a ServiceLifecycle,
    health: &'a HealthState,
    in_flight: &'a InFlight,
    handle: &'a Handle,
    timeout: Duration,
}

impl Drainer<'_> {
    async fn drain(&self, server_task: JoinHandle<Result<()>>) -> Result<ShutdownOutcome> {
        self.lifecycle.transition(ServiceEvent::TerminationRequested)?;
        info!(
            in_flight = self.in_flight.count(),
            connections = self.handle.connection_count(),
            timeout_secs = self.timeout.as_secs(),
            "Marked webhook as not ready, draining in-flight requests"
        );

        let deadline = Instant::now() + self.timeout;
        self.handle.graceful_shutdown(None);

        let mut abandoned = self.in_flight.drain(self.timeout).await;
        if abandoned > 0 {
            self.handle.shutdown();
        }

        // Connections still open at the deadline are cut, along with any
        // request on them
        let remaining = deadline
            .saturating_duration_since(Instant::now())
            .max(CONNECTION_CLOSE_GRACE);
        match tokio::time::timeout(remaining, server_task).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => warn!(error = %e, "Webhook listener reported an error during drain"),
            Ok(Err(e)) => error!("Webhook listener task panicked: {}", e),
            Err(_) => {
                let connections = self.handle.connection_count();
                self.handle.shutdown();
                abandoned = abandoned.max(connections).max(1);
            }
        }

        let outcome = if abandoned == 0 {
            ShutdownOutcome::Clean
        } else {
            warn!(
                abandoned,
                "Drain timeout elapsed, closed connections with requests still in flight"
            );
            self.health.metrics.record_abandoned(abandoned);
            ShutdownOutcome::TimedOut { abandoned }
        };

        self.lifecycle.transition(ServiceEvent::DrainCompleted)?;
        Ok(outcome)
    }
}

fn server_exit_error(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Error {
    match result {
        Ok(Ok(())) => Error::ListenerStart("listener exited unexpectedly".to_string()),
        Ok(Err(e)) => e,
        Err(e) => Error::ListenerStart(format!("listener task panicked: {}", e)),
    }
}
