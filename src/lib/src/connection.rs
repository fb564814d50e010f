//! The connection record, the caller's sole handle on pairing state.

use time::OffsetDateTime;
use url::Url;

use crate::error::ConnectorError;
use crate::transport::{self, TransportConfig};
use crate::trust::TrustMaterial;

/// Everything needed to talk to the platform on behalf of one paired
/// application.
///
/// A `Connection` is produced by the pairing engine and only read by the
/// metadata and event services. Engine transitions never mutate a
/// `Connection` in place; each returns a new value, so trust material held
/// by one instance can never race with a renewal. Trust material and its
/// password travel together: they are private fields replaced only through
/// [`Connection::with_trust_material`], and no constructor accepts one
/// without the other.
#[derive(Debug, Clone)]
pub struct Connection {
    pub(crate) application_name: String,
    pub(crate) info_url: Url,
    pub(crate) metadata_url: Url,
    pub(crate) renew_cert_url: Url,
    pub(crate) revocation_cert_url: Option<Url>,
    pub(crate) events_info_url: Option<Url>,
    pub(crate) events_urls: Vec<Url>,
    pub(crate) certificate_subject: String,
    pub(crate) certificate_algorithm: String,
    pub(crate) trust: TrustMaterial,
    pub(crate) password: String,
}

impl Connection {
    /// Name the platform knows this application by.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Endpoint answering the authenticated info call.
    pub fn info_url(&self) -> &Url {
        &self.info_url
    }

    /// Application registry endpoint.
    pub fn metadata_url(&self) -> &Url {
        &self.metadata_url
    }

    /// Certificate renewal endpoint.
    pub fn renew_cert_url(&self) -> &Url {
        &self.renew_cert_url
    }

    /// Certificate revocation endpoint, when the platform exposes one.
    pub fn revocation_cert_url(&self) -> Option<&Url> {
        self.revocation_cert_url.as_ref()
    }

    /// Event subscription info endpoint, when the platform exposes one.
    pub fn events_info_url(&self) -> Option<&Url> {
        self.events_info_url.as_ref()
    }

    /// Event publish endpoints; may be empty.
    pub fn events_urls(&self) -> &[Url] {
        &self.events_urls
    }

    /// Subject the client certificate was requested for.
    pub fn certificate_subject(&self) -> &str {
        &self.certificate_subject
    }

    /// Key algorithm identifier of the certificate profile.
    pub fn certificate_algorithm(&self) -> &str {
        &self.certificate_algorithm
    }

    /// The current trust material.
    pub fn trust_material(&self) -> &TrustMaterial {
        &self.trust
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }

    /// NotAfter of the current client certificate.
    pub fn certificate_expires_at(&self) -> Result<OffsetDateTime, ConnectorError> {
        self.trust.expires_at()
    }

    /// SHA-1 fingerprint of the current client certificate, lowercase hex.
    pub fn certificate_fingerprint(&self) -> String {
        self.trust.fingerprint()
    }

    /// Builds a fresh mTLS agent carrying this connection's identity.
    pub fn transport(&self, config: &TransportConfig) -> Result<ureq::Agent, ConnectorError> {
        transport::build_transport(&self.trust, &self.password, config)
    }

    /// Returns this connection with trust material and password replaced
    /// together. Old material stays valid for calls already using it.
    pub(crate) fn with_trust_material(mut self, trust: TrustMaterial, password: String) -> Self {
        self.trust = trust;
        self.password = password;
        self
    }
}
