// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the admission webhook.
//!
//! These tests drive the dispatcher, the router and the full service manager
//! without a Kubernetes cluster. Lifecycle and TLS tests bind ephemeral ports
//! on localhost with freshly generated self-signed certificates.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_drain_timeout_abandons_requests
//! ```
//!
//! ## Test Categories
//!
//! - **Dispatcher tests**: verdicts, size limits, malformed input, concurrency
//! - **Lifecycle tests**: readiness, draining, startup failure
//! - **TLS tests**: minimum protocol version enforcement over real sockets

#[path = "../common/mod.rs"]
mod common;


use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use work_webhook::{
    HealthState, InFlight, Result, Scheme, ServiceManager, ShutdownOutcome, WebhookConfig,
};

/// Config binding ephemeral ports
pub fn test_config(cert_dir: &Path) -> WebhookConfig {
    WebhookConfig {
        port: 0,
        cert_dir: cert_dir.to_path_buf(),
        health_probe_port: 0,
        drain_timeout_secs: 5,
        ..WebhookConfig::default()
    }
}

/// A service manager running in the background
pub struct RunningService {
    pub addr: SocketAddr,
    pub health: Arc<HealthState>,
    pub in_flight: Arc<InFlight>,
    pub shutdown: CancellationToken,
    pub task: JoinHandle<Result<ShutdownOutcome>>,
}

impl RunningService {
    /// Spawn `manager` and wait until its listener accepts
    pub async fn start(manager: ServiceManager) -> Self {
        let handle = manager.handle();
        let health = manager.health();
        let in_flight = manager.in_flight();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(manager.run(shutdown.clone()));

        let addr = tokio::time::timeout(Duration::from_secs(10), handle.listening())
            .await
            .expect("listener did not start")
            .expect("listener closed");

        // Serving is entered right after the listener reports its address
        wait_for(|| health.is_ready()).await;

        Self {
            addr,
            health,
            in_flight,
            shutdown,
            task,
        }
    }

    /// Start a ManifestWork webhook with `config`
    pub async fn with_config(config: WebhookConfig) -> Self {
        let manager = ServiceManager::new(config, Arc::new(Scheme::with_work_types())).unwrap();
        Self::start(manager).await
    }

    /// Cancel and wait for the outcome
    pub async fn stop(self) -> ShutdownOutcome {
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap()
    }
}

/// Poll `condition` until it holds, failing after a few seconds
pub async fn wait_for(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
