//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::health::HEALTH_PROBE_PORT;
use crate::webhooks::{TlsMinVersion, WEBHOOK_PORT};

/// Default directory holding `tls.crt` and `tls.key`
pub const DEFAULT_CERT_DIR: &str = "/tmp/k8s-webhook-server/serving-certs";
/// Default manifest size ceiling (500 KiB)
pub const DEFAULT_MANIFEST_LIMIT: usize = 500 * 1024;
/// Default time allowed for in-flight requests during shutdown
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// work-webhook - validating admission webhook for ManifestWork
#[derive(Parser, Debug, Clone)]
#[command(name = "work-webhook", version, about, long_about = None)]
pub struct WebhookConfig {
    /// Port the HTTPS admission endpoint listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub port: u16,

    /// Directory containing tls.crt and tls.key
    #[arg(long, env = "WEBHOOK_CERT_DIR", default_value = DEFAULT_CERT_DIR)]
    pub cert_dir: PathBuf,

    /// Maximum serialized ManifestWork size in bytes (0 disables the limit)
    #[arg(long, env = "WEBHOOK_MANIFEST_LIMIT", default_value_t = DEFAULT_MANIFEST_LIMIT)]
    pub manifest_limit: usize,

    /// Port for /healthz, /readyz and /metrics
    #[arg(long, env = "HEALTH_PROBE_PORT", default_value_t = HEALTH_PROBE_PORT)]
    pub health_probe_port: u16,

    /// Seconds to wait for in-flight requests after a termination signal
    #[arg(long, env = "WEBHOOK_DRAIN_TIMEOUT_SECS", default_value_t = DEFAULT_DRAIN_TIMEOUT_SECS)]
    pub drain_timeout_secs: u64,

    /// Minimum TLS version: 1.2 or 1.3
    #[arg(long, env = "WEBHOOK_TLS_MIN_VERSION", default_value = "1.2")]
    pub tls_min_version: TlsMinVersion,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            port: WEBHOOK_PORT,
            cert_dir: PathBuf::from(DEFAULT_CERT_DIR),
            manifest_limit: DEFAULT_MANIFEST_LIMIT,
            health_probe_port: HEALTH_PROBE_PORT,
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
            tls_min_version: TlsMinVersion::default(),
        }
    }
}

impl WebhookConfig {
    /// Address the admission endpoint binds
    pub fn webhook_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}
