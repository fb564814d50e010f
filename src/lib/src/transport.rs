//! HTTP transport construction.
//!
//! A fresh agent is built for every operation instead of being cached:
//! trust material rotates on certificate renewal and pooled connections
//! bound to an old key must never be reused. Callers pay the per-call setup
//! cost; correctness across rotations is what they get for it.

use std::sync::Arc;
use std::time::Duration;

use rustls::{ClientConfig, RootCertStore};
use rustls_pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

use crate::error::ConnectorError;
use crate::trust::TrustMaterial;

/// Timeouts applied to every outbound call.
///
/// These are the only timeouts in the system; the engine itself imposes
/// none. Transport-level timeout failures surface as
/// [`ConnectorError::TransportFailed`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Time allowed for establishing a connection.
    pub connect_timeout: Duration,
    /// Time allowed for reading a response.
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
        }
    }
}

impl TransportConfig {
    /// Set the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Builds the unauthenticated agent used for the bootstrap call and the
/// initial CSR submission, before any client certificate exists.
pub fn bootstrap_transport(config: &TransportConfig) -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(config.connect_timeout)
        .timeout_read(config.read_timeout)
        .build()
}

/// Builds a fresh agent presenting `material` as TLS client identity.
///
/// Server certificates are validated against the platform trust store; there
/// is no trust override and no skip-verification mode.
///
/// # Errors
///
/// [`ConnectorError::TransportConstructionFailed`] if the key cannot be
/// decrypted with `password`, the platform trust store cannot be read, or
/// the chain and key are rejected as TLS client material.
pub fn build_transport(
    material: &TrustMaterial,
    password: &str,
    config: &TransportConfig,
) -> Result<ureq::Agent, ConnectorError> {
    let key_document = material.unlock_key(password)?;
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_document.as_bytes().to_vec()));

    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs().map_err(|e| {
        ConnectorError::TransportConstructionFailed(format!("platform trust store unavailable: {e}"))
    })?;
    for cert in native {
        // Individual unparsable platform certificates are skipped, same as
        // every other TLS client on the host.
        let _ = roots.add(cert);
    }

    let tls = ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| ConnectorError::TransportConstructionFailed(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(material.chain().to_vec(), key)
        .map_err(|e| {
            ConnectorError::TransportConstructionFailed(format!("client identity rejected: {e}"))
        })?;

    log::debug!("built mTLS transport for certificate {}", material.fingerprint());
    Ok(ureq::AgentBuilder::new()
        .tls_config(Arc::new(tls))
        .timeout_connect(config.connect_timeout)
        .timeout_read(config.read_timeout)
        .build())
}
