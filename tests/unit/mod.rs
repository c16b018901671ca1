// Test code is allowed to panic on failure
#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Unit tests for work-webhook.
//!
//! These tests run without sockets or certificates and test individual
//! components in isolation.

mod scheme_tests {
    use work_webhook::scheme::{MANIFEST_WORK_KIND, WORK_GROUP};
    use work_webhook::{ResourceKind, Scheme};

    #[test]
    fn test_work_types_known() {
        let scheme = Scheme::with_work_types();
        assert!(scheme.recognizes(&ResourceKind::manifest_work()));
        assert!(!scheme.recognizes(&ResourceKind::new("", "Pod")));
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(
            ResourceKind::manifest_work().to_string(),
            format!("{}.{}", MANIFEST_WORK_KIND, WORK_GROUP)
        );
        assert_eq!(ResourceKind::new("", "Pod").to_string(), "Pod");
    }
}

mod registry_tests {
    use std::sync::Arc;

    use work_webhook::webhooks::Operation;
    use work_webhook::{
        Error, ResourceKind, Scheme, ValidationContext, ValidationResult, ValidatorRegistry,
    };

    fn registry() -> ValidatorRegistry {
        ValidatorRegistry::new(Arc::new(Scheme::with_work_types()))
    }

    fn deny_all(_ctx: &ValidationContext<'_>) -> ValidationResult {
        ValidationResult::denied("Nope", "denied")
    }

    #[test]
    fn test_register_after_seal_fails() {
        let mut registry = registry();
        registry.seal();
        assert!(registry.is_sealed());

        let err = registry
            .register(ResourceKind::manifest_work(), deny_all)
            .unwrap_err();
        assert!(matches!(err, Error::LateRegistration { .. }));
        assert!(!registry.is_registered(&ResourceKind::manifest_work()));
    }

    #[test]
    fn test_limit_frozen_after_seal() {
        let mut registry = registry();
        registry.set_limit(10).unwrap();
        registry.seal();
        let err = registry.set_limit(20).unwrap_err();
        assert!(matches!(err, Error::LateConfiguration { .. }));
        assert_eq!(registry.config().manifest_limit, 10);
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let mut registry = registry();
        let err = registry
            .register(ResourceKind::new("apps", "Deployment"), deny_all)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownKind(_)));
    }

    #[test]
    fn test_evaluate_unregistered_is_none() {
        let registry = registry();
        assert!(
            registry
                .evaluate(&ResourceKind::manifest_work(), b"{}", &Operation::Create)
                .is_none()
        );
    }

    #[test]
    fn test_manifest_work_registry_has_policies() {
        let registry =
            ValidatorRegistry::for_manifest_work(Arc::new(Scheme::with_work_types()), 1024)
                .unwrap();
        assert_eq!(registry.predicate_count(&ResourceKind::manifest_work()), 2);
        assert_eq!(registry.config().manifest_limit, 1024);
    }
}

mod state_tests {
    use work_webhook::{ServiceEvent, ServiceLifecycle, ServiceState};

    #[test]
    fn test_happy_path() {
        let lifecycle = ServiceLifecycle::new();
        assert_eq!(lifecycle.current(), ServiceState::Initializing);
        for (event, expected) in [
            (ServiceEvent::ListenerReady, ServiceState::Serving),
            (ServiceEvent::TerminationRequested, ServiceState::Draining),
            (ServiceEvent::DrainCompleted, ServiceState::Stopped),
        ] {
            assert_eq!(lifecycle.transition(event).ok(), Some(expected));
        }
    }

    #[test]
    fn test_startup_failure_stops() {
        let lifecycle = ServiceLifecycle::new();
        assert_eq!(
            lifecycle.transition(ServiceEvent::StartupFailed).ok(),
            Some(ServiceState::Stopped)
        );
        assert!(lifecycle.transition(ServiceEvent::ListenerReady).is_err());
    }

    #[test]
    fn test_draining_cannot_resume_serving() {
        assert!(!ServiceLifecycle::can_transition(
            ServiceState::Draining,
            ServiceEvent::ListenerReady
        ));
        assert!(!ServiceLifecycle::can_transition(
            ServiceState::Stopped,
            ServiceEvent::ListenerReady
        ));
    }
}

mod config_tests {
    use clap::Parser;
    use work_webhook::WebhookConfig;

    #[test]
    fn test_config_defaults() {
        let config = WebhookConfig::try_parse_from(["work-webhook"]).unwrap();
        assert_eq!(config.port, 9443);
        assert_eq!(config.health_probe_port, 8000);
        assert_eq!(config.manifest_limit, 500 * 1024);
    }
}
