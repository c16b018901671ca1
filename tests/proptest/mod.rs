// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for work-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;

use proptest::prelude::*;

use work_webhook::{
    AdmissionDispatcher, Scheme, ServiceEvent, ServiceLifecycle, ServiceState, ValidatorRegistry,
};

use common::fixtures::{ManifestWorkBuilder, ReviewBuilder, response, serialized_size};

fn dispatcher(limit: usize) -> AdmissionDispatcher {
    let mut registry =
        ValidatorRegistry::for_manifest_work(Arc::new(Scheme::with_work_types()), limit).unwrap();
    registry.seal();
    AdmissionDispatcher::new(Arc::new(registry))
}

/// Strategy for API server style request UIDs.
fn any_uid() -> impl Strategy<Value = String> {
    prop_oneof![
        "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        "[a-zA-Z0-9._:-]{1,64}",
    ]
}

/// Strategy for admission operations.
fn any_operation() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("CREATE"),
        Just("UPDATE"),
        Just("DELETE"),
        Just("CONNECT"),
    ]
}

/// Strategy for lifecycle events.
fn any_event() -> impl Strategy<Value = ServiceEvent> {
    prop_oneof![
        Just(ServiceEvent::ListenerReady),
        Just(ServiceEvent::TerminationRequested),
        Just(ServiceEvent::DrainCompleted),
        Just(ServiceEvent::StartupFailed),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every decodable review is answered with its own UID.
    #[test]
    fn test_uid_echoed(uid in any_uid(), operation in any_operation(), limit in 0usize..4096) {
        let body = ReviewBuilder::manifest_work(uid.clone())
            .operation(operation)
            .to_bytes();
        let resp = response(&dispatcher(limit).handle(&body));
        prop_assert_eq!(resp["uid"].as_str(), Some(uid.as_str()));
    }

    /// Admission under the size policy depends only on size against limit.
    #[test]
    fn test_size_limit_decides(padding in 0usize..8192, limit in 1usize..10_000) {
        let work = ManifestWorkBuilder::new("sized").padded(padding).build();
        let size = serialized_size(&work);
        let body = ReviewBuilder::manifest_work("sized").object(work).to_bytes();

        let resp = response(&dispatcher(limit).handle(&body));
        prop_assert_eq!(resp["allowed"].as_bool(), Some(size <= limit));
    }

    /// No event sequence leads from Draining or Stopped back to Serving.
    #[test]
    fn test_shutdown_is_one_way(events in proptest::collection::vec(any_event(), 0..16)) {
        let lifecycle = ServiceLifecycle::new();
        let mut left_serving = false;
        for event in events {
            let _ = lifecycle.transition(event);
            let state = lifecycle.current();
            if matches!(state, ServiceState::Draining | ServiceState::Stopped) {
                left_serving = true;
            }
            if left_serving {
                prop_assert_ne!(state, ServiceState::Serving);
                prop_assert_ne!(state, ServiceState::Initializing);
            }
        }
    }

    /// Rejected transitions leave the state untouched.
    #[test]
    fn test_rejected_transition_keeps_state(events in proptest::collection::vec(any_event(), 1..16)) {
        let lifecycle = ServiceLifecycle::new();
        for event in events {
            let before = lifecycle.current();
            let allowed = ServiceLifecycle::can_transition(before, event);
            let result = lifecycle.transition(event);
            prop_assert_eq!(result.is_ok(), allowed);
            if !allowed {
                prop_assert_eq!(lifecycle.current(), before);
            }
        }
    }
}
