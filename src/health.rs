//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (200 once initialized, until stopped)
//! - `/readyz` - Readiness probe (200 only while serving)
//! - `/metrics` - Prometheus metrics endpoint

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{Error, Result};
use crate::manager::state::{ServiceLifecycle, ServiceState};

/// Default health probe port
pub const HEALTH_PROBE_PORT: u16 = 8000;

/// Labels for admission outcome metrics (kind + verdict)
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct AdmissionLabels {
    pub kind: String,
    pub verdict: Verdict,
}

/// Outcome recorded for one admission request
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied,
    Malformed,
}

impl Verdict {
    fn as_str(&self) -> &'static str {
        match self {
            Verdict::Allowed => "allowed",
            Verdict::Denied => "denied",
            Verdict::Malformed => "malformed",
        }
    }
}

impl EncodeLabelSet for AdmissionLabels {
    fn encode(
        &self,
        mut encoder: LabelSetEncoder<'_>,
    ) -> std::result::Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        ("verdict", self.verdict.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Labels for per-kind metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct KindLabels {
    pub kind: String,
}

impl EncodeLabelSet for KindLabels {
    fn encode(
        &self,
        mut encoder: LabelSetEncoder<'_>,
    ) -> std::result::Result<(), std::fmt::Error> {
        ("kind", self.kind.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission requests by kind and verdict
    pub admission_requests_total: Family<AdmissionLabels, Counter>,
    /// Time spent evaluating predicates
    pub admission_duration_seconds: Family<KindLabels, Histogram>,
    /// Requests currently being handled
    pub requests_in_flight: Gauge,
    /// Requests cut off by the drain timeout
    pub abandoned_requests_total: Counter,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admission_requests_total = Family::<AdmissionLabels, Counter>::default();
        registry.register(
            "work_webhook_admission_requests",
            "Total number of admission requests",
            admission_requests_total.clone(),
        );

        let admission_duration_seconds =
            Family::<KindLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 15))
            });
        registry.register(
            "work_webhook_admission_duration_seconds",
            "Duration of admission evaluation in seconds",
            admission_duration_seconds.clone(),
        );

        let requests_in_flight = Gauge::default();
        registry.register(
            "work_webhook_requests_in_flight",
            "Number of admission requests currently being handled",
            requests_in_flight.clone(),
        );

        let abandoned_requests_total = Counter::default();
        registry.register(
            "work_webhook_abandoned_requests",
            "Admission requests still running when the drain timeout elapsed",
            abandoned_requests_total.clone(),
        );

        Self {
            admission_requests_total,
            admission_duration_seconds,
            requests_in_flight,
            abandoned_requests_total,
            registry,
        }
    }

    /// Record one admission outcome
    pub fn record_admission(&self, kind: &str, verdict: Verdict, duration_secs: f64) {
        let labels = AdmissionLabels {
            kind: kind.to_string(),
            verdict,
        };
        self.admission_requests_total.get_or_create(&labels).inc();
        self.admission_duration_seconds
            .get_or_create(&KindLabels {
                kind: kind.to_string(),
            })
            .observe(duration_secs);
    }

    /// Record requests abandoned at drain timeout
    pub fn record_abandoned(&self, count: usize) {
        self.abandoned_requests_total.inc_by(count as u64);
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Lifecycle owned by the service manager
    lifecycle: Arc<ServiceLifecycle>,
    /// Set once the type registry is loaded and routes are registered
    initialized: AtomicBool,
    /// Metrics registry
    pub metrics: Metrics,
}

impl HealthState {
    /// Create health state observing `lifecycle` (starts uninitialized)
    pub fn new(lifecycle: Arc<ServiceLifecycle>) -> Self {
        Self {
            lifecycle,
            initialized: AtomicBool::new(false),
            metrics: Metrics::new(),
        }
    }

    /// Mark initialization complete
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Liveness: initialized and not yet stopped
    pub fn is_live(&self) -> bool {
        self.initialized.load(Ordering::Acquire) && self.lifecycle.current() != ServiceState::Stopped
    }

    /// Readiness: serving new traffic
    pub fn is_ready(&self) -> bool {
        self.lifecycle.current() == ServiceState::Serving
    }

    pub fn lifecycle(&self) -> &ServiceLifecycle {
        &self.lifecycle
    }
}

/// Liveness probe handler
///
/// Returns 200 OK once initialization finished, 503 otherwise.
async fn healthz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_live() {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not live").into_response()
    }
}

/// Readiness probe handler
///
/// Returns 200 OK while serving.
/// Returns 503 Service Unavailable before serving and while draining.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready() {
        (StatusCode::OK, "ready").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not ready").into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Bind the health probe port.
///
/// Split from [`run_health_server`] so a bind failure is reported during
/// startup rather than from a background task.
pub async fn bind_health_listener(port: u16) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|e| Error::HealthServer(format!("failed to bind {}: {}", addr, e)))
}

/// Run the health server until `shutdown` is cancelled
pub async fn run_health_server(
    listener: TcpListener,
    state: Arc<HealthState>,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(port = addr.port(), "Starting health server");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| Error::HealthServer(e.to_string()))?;

    Ok(())
}
