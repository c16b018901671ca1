//! TLS listener for the admission endpoint.
//!
//! Certificate material is read from a directory holding `tls.crt` and
//! `tls.key` (PEM), the layout cert-manager and controller-runtime use for
//! webhook serving certificates. Only TLS 1.2 and 1.3 are ever offered;
//! the configured minimum can raise the floor to 1.3. Clients that cannot
//! negotiate an allowed version fail during the handshake.

use std::fmt;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use axum::Router;
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use rustls::{ServerConfig, SupportedProtocolVersion};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::info;

use crate::error::{Error, Result};

/// Certificate file name inside the cert directory
pub const CERT_FILE: &str = "tls.crt";
/// Private key file name inside the cert directory
pub const KEY_FILE: &str = "tls.key";

/// Minimum TLS protocol version accepted by the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMinVersion {
    #[default]
    Tls12,
    Tls13,
}

/// Versions offered with a TLS 1.2 floor
static TLS12_AND_UP: &[&SupportedProtocolVersion] =
    &[&rustls::version::TLS13, &rustls::version::TLS12];
/// Versions offered with a TLS 1.3 floor
static TLS13_ONLY: &[&SupportedProtocolVersion] = &[&rustls::version::TLS13];

impl TlsMinVersion {
    fn protocol_versions(self) -> &'static [&'static SupportedProtocolVersion] {
        match self {
            TlsMinVersion::Tls12 => TLS12_AND_UP,
            TlsMinVersion::Tls13 => TLS13_ONLY,
        }
    }
}

impl fmt::Display for TlsMinVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsMinVersion::Tls12 => write!(f, "1.2"),
            TlsMinVersion::Tls13 => write!(f, "1.3"),
        }
    }
}

impl FromStr for TlsMinVersion {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().trim_start_matches("tls").trim_start_matches('v') {
            "1.2" | "12" => Ok(TlsMinVersion::Tls12),
            "1.3" | "13" => Ok(TlsMinVersion::Tls13),
            other => Err(format!(
                "unsupported minimum TLS version '{}': expected 1.2 or 1.3",
                other
            )),
        }
    }
}

/// Load the certificate chain and key from `cert_dir` and build a rustls
/// server config restricted to the allowed protocol versions.
pub fn load_server_config(cert_dir: &Path, min_version: TlsMinVersion) -> Result<ServerConfig> {
    let certs = read_certs(&cert_dir.join(CERT_FILE))?;
    let key = read_key(&cert_dir.join(KEY_FILE))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_protocol_versions(min_version.protocol_versions())
        .map_err(|e| Error::ListenerStart(format!("invalid TLS protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::ListenerStart(format!("invalid certificate material: {}", e)))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::ListenerStart(format!("cannot read {}: {}", path.display(), e)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::ListenerStart(format!("cannot parse {}: {}", path.display(), e)))?;

    if certs.is_empty() {
        return Err(Error::ListenerStart(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::ListenerStart(format!("cannot read {}: {}", path.display(), e)))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| Error::ListenerStart(format!("cannot parse {}: {}", path.display(), e)))?
        .ok_or_else(|| Error::ListenerStart(format!("no private key found in {}", path.display())))
}

/// A bound, TLS-configured listener that has not started serving yet
pub struct TlsListener {
    listener: TcpListener,
    config: RustlsConfig,
    cert_dir: PathBuf,
}

impl TlsListener {
    /// Bind `addr` and load certificate material.
    ///
    /// Both steps happen eagerly so configuration problems surface as
    /// [`Error::ListenerStart`] before the service reports ready.
    pub fn bind(addr: SocketAddr, cert_dir: &Path, min_version: TlsMinVersion) -> Result<Self> {
        let server_config = load_server_config(cert_dir, min_version)?;

        let listener = TcpListener::bind(addr)
            .map_err(|e| Error::ListenerStart(format!("failed to bind {}: {}", addr, e)))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| Error::ListenerStart(e.to_string()))?;

        Ok(Self {
            listener,
            config: RustlsConfig::from_config(Arc::new(server_config)),
            cert_dir: cert_dir.to_path_buf(),
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| Error::ListenerStart(e.to_string()))
    }

    /// Serve `app` until `handle` is shut down.
    ///
    /// Dropping the listener on return releases the port.
    pub async fn serve(self, app: Router, handle: Handle) -> Result<()> {
        info!(
            addr = ?self.listener.local_addr().ok(),
            cert_dir = %self.cert_dir.display(),
            "Webhook server listening with TLS"
        );

        axum_server::from_tcp_rustls(self.listener, self.config)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| Error::ListenerStart(e.to_string()))
    }
}
