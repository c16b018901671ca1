//! Admission dispatcher and webhook router.
//!
//! Decodes `admission.k8s.io/v1` AdmissionReview bodies, routes the object to
//! the predicates registered for its kind, and encodes the verdict back into
//! an AdmissionReview. Every outcome, including undecodable input, is a
//! well-formed review with HTTP 200; the API server reads the verdict from
//! the body.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Request, State, rejection::BytesRejection},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::{DynamicObject, TypeMeta};
use prometheus_client::metrics::gauge::Gauge;
use tracing::{debug, error, info};

use crate::health::{HealthState, Verdict};
use crate::manager::drain::{InFlight, InFlightGuard};
use crate::scheme::ResourceKind;
use crate::webhooks::policies::ValidationResult;
use crate::webhooks::registry::ValidatorRegistry;

/// Route the API server posts ManifestWork admission reviews to
pub const WEBHOOK_PATH: &str = "/validate-work-open-cluster-management-io-v1-manifestwork";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Reason prefix for undecodable admission reviews
pub const MALFORMED_REQUEST: &str = "malformed request";

/// `status.code` for policy denials
const DENIED_CODE: u16 = 403;
/// `status.code` for requests the webhook cannot interpret
const BAD_REQUEST_CODE: u16 = 400;

/// Last-resort body if a review cannot be serialized
const ENCODE_FAILURE_BODY: &[u8] = br#"{"apiVersion":"admission.k8s.io/v1","kind":"AdmissionReview","response":{"uid":"","allowed":false,"status":{"code":500,"message":"failed to encode admission response"}}}"#;

/// Outcome of dispatching one admission review
#[derive(Debug)]
pub struct Decision {
    /// Review to send back to the API server
    pub review: AdmissionReview<DynamicObject>,
    /// Kind of the object, if the request could be decoded
    pub kind: Option<ResourceKind>,
    /// Metrics classification
    pub verdict: Verdict,
}

/// Routes admission requests to registered predicates.
///
/// Holds only read-only state, so one instance serves all connections.
#[derive(Clone)]
pub struct AdmissionDispatcher {
    registry: Arc<ValidatorRegistry>,
}

impl AdmissionDispatcher {
    pub fn new(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Decode `body`, evaluate it, and return the encoded AdmissionReview
    pub fn handle(&self, body: &[u8]) -> Vec<u8> {
        encode_review(&self.dispatch(body).review)
    }

    /// Decode `body` and evaluate it
    pub fn dispatch(&self, body: &[u8]) -> Decision {
        let request = match decode_request(body) {
            Ok(request) => request,
            Err(detail) => {
                error!(error = %detail, "Failed to decode admission review");
                return Decision {
                    review: malformed_review(body, &detail),
                    kind: None,
                    verdict: Verdict::Malformed,
                };
            }
        };

        let kind = ResourceKind::from_gvk(&request.kind);
        let (review, verdict) = self.review_request(&request, &kind);
        Decision {
            review,
            kind: Some(kind),
            verdict,
        }
    }

    fn review_request(
        &self,
        request: &AdmissionRequest<DynamicObject>,
        kind: &ResourceKind,
    ) -> (AdmissionReview<DynamicObject>, Verdict) {
        let uid = &request.uid;
        debug!(
            uid = %uid,
            kind = %kind,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = %request.name,
            "Processing admission request"
        );

        if !self.registry.is_registered(kind) {
            debug!(uid = %uid, kind = %kind, "No predicates for kind, admitting");
            return (allow(request), Verdict::Allowed);
        }

        // DELETE and CONNECT carry no new object to validate
        if matches!(request.operation, Operation::Delete | Operation::Connect) {
            debug!(uid = %uid, operation = ?request.operation, "Admitting without evaluation");
            return (allow(request), Verdict::Allowed);
        }

        if !self.registry.scheme().recognizes_gvk(&request.kind) {
            debug!(uid = %uid, version = %request.kind.version, "Evaluating unrecognized version of known kind");
        }

        let payload = match request.object.as_ref().map(serde_json::to_vec) {
            Some(Ok(payload)) => payload,
            Some(Err(e)) => {
                error!(uid = %uid, error = %e, "Failed to serialize object");
                return (
                    deny_with_reason(request, &e.to_string(), "InvalidRequest", BAD_REQUEST_CODE),
                    Verdict::Denied,
                );
            }
            None => {
                error!(uid = %uid, "Missing object in request");
                return (
                    deny_with_reason(
                        request,
                        "Missing object in request",
                        "InvalidRequest",
                        BAD_REQUEST_CODE,
                    ),
                    Verdict::Denied,
                );
            }
        };

        let result = self
            .registry
            .evaluate(kind, &payload, &request.operation)
            .unwrap_or_else(ValidationResult::allowed);

        if !result.allowed {
            let reason = result
                .reason
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| "ValidationFailed".to_string());
            let message = result
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Validation failed".to_string());
            info!(uid = %uid, kind = %kind, reason = %reason, message = %message, "Admission request denied");
            return (
                deny_with_reason(request, &message, &reason, DENIED_CODE),
                Verdict::Denied,
            );
        }

        info!(uid = %uid, kind = %kind, size = payload.len(), "Admission request allowed");
        (allow(request), Verdict::Allowed)
    }
}

fn decode_request(body: &[u8]) -> Result<AdmissionRequest<DynamicObject>, String> {
    let review: AdmissionReview<DynamicObject> =
        serde_json::from_slice(body).map_err(|e| e.to_string())?;
    let request: Result<AdmissionRequest<DynamicObject>, _> = review.try_into();
    request.map_err(|e| e.to_string())
}

fn allow(request: &AdmissionRequest<DynamicObject>) -> AdmissionReview<DynamicObject> {
    AdmissionResponse::from(request).into_review()
}

/// Create a denial response with reason embedded in message.
/// kube-rs deny() only sets status.message, so we format as "[reason] message"
fn deny_with_reason(
    request: &AdmissionRequest<DynamicObject>,
    message: &str,
    reason: &str,
    code: u16,
) -> AdmissionReview<DynamicObject> {
    let mut response = AdmissionResponse::from(request).deny(format!("[{}] {}", reason, message));
    response.result.code = code;
    response.into_review()
}

/// Denial for a body that is not a usable AdmissionReview.
///
/// The UID is echoed when the envelope is at least valid JSON with a
/// `request.uid`, so the API server can still correlate the answer.
fn malformed_review(body: &[u8], detail: &str) -> AdmissionReview<DynamicObject> {
    let mut response = AdmissionResponse::invalid(format!("{}: {}", MALFORMED_REQUEST, detail));
    response.types = TypeMeta {
        api_version: "admission.k8s.io/v1".to_string(),
        kind: "AdmissionReview".to_string(),
    };
    if let Some(uid) = serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .as_ref()
        .and_then(|v| v.pointer("/request/uid"))
        .and_then(serde_json::Value::as_str)
    {
        response.uid = uid.to_string();
    }
    response.result.code = BAD_REQUEST_CODE;
    response.into_review()
}

fn encode_review(review: &AdmissionReview<DynamicObject>) -> Vec<u8> {
    serde_json::to_vec(review).unwrap_or_else(|e| {
        error!(error = %e, "Failed to encode admission review");
        ENCODE_FAILURE_BODY.to_vec()
    })
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub dispatcher: AdmissionDispatcher,
    pub in_flight: Arc<InFlight>,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(
        dispatcher: AdmissionDispatcher,
        in_flight: Arc<InFlight>,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            dispatcher,
            in_flight,
            health,
        }
    }
}

/// Create the webhook router.
///
/// Requests are counted as in flight from the moment their headers arrive,
/// so a body still being read holds up the drain like any other request.
/// The body size is not capped here: an oversized object is judged by the
/// manifest limit and answered with an AdmissionReview.
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(validate))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_in_flight))
        .layer(DefaultBodyLimit::disable())
        .with_state(state)
}

/// Holds the drain counter and the in-flight gauge for one request
struct InFlightRequest {
    _guard: InFlightGuard,
    gauge: Gauge,
}

impl InFlightRequest {
    fn start(state: &WebhookState) -> Self {
        let gauge = state.health.metrics.requests_in_flight.clone();
        gauge.inc();
        Self {
            _guard: state.in_flight.enter(),
            gauge,
        }
    }
}

impl Drop for InFlightRequest {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

/// Count the request as in flight until its response is produced
async fn track_in_flight(
    State(state): State<Arc<WebhookState>>,
    request: Request,
    next: Next,
) -> Response {
    let _in_flight = InFlightRequest::start(&state);
    next.run(request).await
}

/// Admission webhook handler
async fn validate(
    State(state): State<Arc<WebhookState>>,
    body: std::result::Result<Bytes, BytesRejection>,
) -> impl IntoResponse {
    let metrics = &state.health.metrics;
    let started = Instant::now();

    let review = match body {
        Ok(body) => {
            let decision = state.dispatcher.dispatch(&body);
            let kind = decision
                .kind
                .as_ref()
                .map_or_else(|| "unknown".to_string(), ToString::to_string);
            metrics.record_admission(&kind, decision.verdict, started.elapsed().as_secs_f64());
            decision.review
        }
        Err(rejection) => {
            error!(error = %rejection, "Failed to read admission review body");
            metrics.record_admission(
                "unknown",
                Verdict::Malformed,
                started.elapsed().as_secs_f64(),
            );
            malformed_review(&[], &rejection.body_text())
        }
    };

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        encode_review(&review),
    )
}
