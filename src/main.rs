//! work-webhook - validating admission webhook for ManifestWork resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Parses flags and environment configuration
//! - Registers the ManifestWork validators
//! - Serves admission reviews over TLS until SIGTERM/SIGINT, then drains

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use work_webhook::{Scheme, ServiceManager, ShutdownOutcome, WebhookConfig};

#[tokio::main]
async fn main() -> ExitCode {
    // Install the crypto provider before any rustls config is built
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    // Initialize tracing subscriber
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("work_webhook=info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    let config = WebhookConfig::parse();
    info!(version = env!("CARGO_PKG_VERSION"), "Starting work-webhook");

    let manager = match ServiceManager::new(config, Arc::new(Scheme::with_work_types())) {
        Ok(manager) => manager,
        Err(e) => {
            error!(error = %e, "Failed to register validators");
            return ExitCode::FAILURE;
        }
    };

    match manager.run_until_signal().await {
        Ok(ShutdownOutcome::Clean) => {
            info!("Webhook stopped cleanly");
            ExitCode::SUCCESS
        }
        Ok(ShutdownOutcome::TimedOut { abandoned }) => {
            warn!(abandoned, "Webhook stopped with abandoned requests");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Webhook failed to start");
            ExitCode::FAILURE
        }
    }
}
