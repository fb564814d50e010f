//! The pairing engine: initial pairing, information refresh, certificate
//! renewal.
//!
//! Pairing moves through `Unpaired → Connected → Paired`; once paired, a
//! connection loops on `Paired` through either a refresh (endpoints update,
//! trust material unchanged) or a renewal (trust material replaced). No
//! state is persisted here; the [`Connection`] returned by each transition
//! is the caller's only handle on it.

use serde::Deserialize;
use url::Url;

use crate::connection::Connection;
use crate::csr;
use crate::error::{http_call_error, ConnectorError};
use crate::metadata::RegistryOptions;
use crate::transport::{self, TransportConfig};
use crate::trust::{self, TrustMaterial};

/// Stateless client for all platform operations.
///
/// Holds nothing but configuration; every operation is a pure transformation
/// of an input [`Connection`] (or none, for [`Connector::pair`]) into an
/// output [`Connection`]. Concurrent operations on distinct connections need
/// no coordination.
#[derive(Debug, Clone, Default)]
pub struct Connector {
    pub(crate) transport: TransportConfig,
    pub(crate) registry: RegistryOptions,
}

/// Response of the unauthenticated bootstrap call, consumed once during
/// initial pairing.
#[derive(Debug, Deserialize)]
struct ConnectInfo {
    #[serde(rename = "csrUrl")]
    csr_url: Url,
    api: ApiUrls,
    certificate: CertificateSpecification,
}

#[derive(Debug, Deserialize)]
struct ApiUrls {
    #[serde(rename = "infoUrl")]
    info_url: Url,
}

#[derive(Debug, Deserialize)]
struct CertificateSpecification {
    subject: String,
    /// Requested certificate extensions; carried on the wire but not applied
    /// to the CSR.
    #[serde(default)]
    #[allow(dead_code)]
    extensions: Option<String>,
    #[serde(rename = "key-algorithm")]
    key_algorithm: String,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "clientIdentity")]
    client_identity: ClientIdentity,
    urls: EndpointUrls,
}

#[derive(Debug, Deserialize)]
struct ClientIdentity {
    application: String,
}

#[derive(Debug, Deserialize)]
struct EndpointUrls {
    #[serde(rename = "eventsUrl")]
    events_url: Option<Url>,
    #[serde(rename = "metadataUrl")]
    metadata_url: Url,
    #[serde(rename = "renewCertUrl")]
    renew_cert_url: Url,
    #[serde(rename = "revocationCertUrl")]
    revocation_cert_url: Option<Url>,
    #[serde(rename = "eventsInfoUrl")]
    events_info_url: Option<Url>,
}

impl Connector {
    /// A connector with default transport and registry settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the transport configuration.
    pub fn with_transport_config(mut self, config: TransportConfig) -> Self {
        self.transport = config;
        self
    }

    /// Replace the registry options.
    pub fn with_registry_options(mut self, options: RegistryOptions) -> Self {
        self.registry = options;
        self
    }

    /// Establishes the initial pairing from a one-time connect URL.
    ///
    /// Fetches the bootstrap info over the unauthenticated transport,
    /// generates a CSR for the advertised certificate specification, submits
    /// it over that same unauthenticated transport (no client certificate
    /// exists yet), then makes the first authenticated info call with the
    /// freshly issued trust material.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::BootstrapFailed`] on a non-2xx bootstrap response;
    /// otherwise the errors of CSR generation, issuance and the info call.
    pub fn pair(&self, connect_url: &Url, password: &str) -> Result<Connection, ConnectorError> {
        let agent = transport::bootstrap_transport(&self.transport);
        let connect_info = fetch_connect_info(&agent, connect_url)?;
        log::info!(
            "bootstrap info received, CSR endpoint {}",
            connect_info.csr_url
        );

        let csr = csr::generate_csr(
            &connect_info.certificate.subject,
            &connect_info.certificate.key_algorithm,
        )?;
        let material = trust::submit_csr(&agent, &connect_info.csr_url, &csr, password)?;
        log::info!(
            "client certificate issued, fingerprint {}",
            material.fingerprint()
        );

        self.fetch_info(
            &connect_info.api.info_url,
            material,
            password,
            connect_info.certificate.subject,
            connect_info.certificate.key_algorithm,
        )
    }

    /// Refreshes endpoints and identity from the info endpoint.
    ///
    /// The returned connection carries the same trust material, password,
    /// subject and algorithm as the input; only what the platform reports
    /// changes.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::InfoFetchFailed`] on a non-2xx info response.
    pub fn get_info(&self, connection: &Connection) -> Result<Connection, ConnectorError> {
        self.fetch_info(
            &connection.info_url,
            connection.trust.clone(),
            connection.password(),
            connection.certificate_subject.clone(),
            connection.certificate_algorithm.clone(),
        )
    }

    /// Renews the client certificate.
    ///
    /// Refreshes first to pick up the current renewal endpoint, generates a
    /// new CSR from the connection's subject and algorithm, and submits it
    /// authenticated with the *pre-renewal* trust material. The result is
    /// the refreshed connection with trust material and password replaced by
    /// the newly issued ones, and nothing else changes.
    ///
    /// Renewal should be attempted with margin before expiry
    /// ([`Connection::certificate_expires_at`]); scheduling it is the
    /// caller's responsibility.
    pub fn renew(
        &self,
        connection: &Connection,
        new_password: &str,
    ) -> Result<Connection, ConnectorError> {
        let refreshed = self.get_info(connection)?;

        let csr = csr::generate_csr(
            &connection.certificate_subject,
            &connection.certificate_algorithm,
        )?;

        // The renewal call proves the current identity; the new material
        // only takes over once it is issued.
        let agent = transport::build_transport(
            &connection.trust,
            connection.password(),
            &self.transport,
        )?;
        let material = trust::submit_csr(&agent, &refreshed.renew_cert_url, &csr, new_password)?;
        log::info!(
            "certificate renewed, new fingerprint {}",
            material.fingerprint()
        );

        Ok(refreshed.with_trust_material(material, new_password.to_string()))
    }

    /// Authenticated GET of `info_url`, combining the response with the
    /// given trust material into a connection record.
    fn fetch_info(
        &self,
        info_url: &Url,
        material: TrustMaterial,
        password: &str,
        certificate_subject: String,
        certificate_algorithm: String,
    ) -> Result<Connection, ConnectorError> {
        let agent = transport::build_transport(&material, password, &self.transport)?;
        let response = agent.get(info_url.as_str()).call().map_err(|e| {
            http_call_error(e, |status, reason| ConnectorError::InfoFetchFailed {
                status,
                reason,
            })
        })?;
        let info: InfoResponse = response.into_json().map_err(|e| {
            ConnectorError::TransportFailed(format!("malformed info response: {e}"))
        })?;

        Ok(Connection {
            application_name: info.client_identity.application,
            info_url: info_url.clone(),
            metadata_url: info.urls.metadata_url,
            renew_cert_url: info.urls.renew_cert_url,
            revocation_cert_url: info.urls.revocation_cert_url,
            events_info_url: info.urls.events_info_url,
            events_urls: info.urls.events_url.into_iter().collect(),
            certificate_subject,
            certificate_algorithm,
            trust: material,
            password: password.to_string(),
        })
    }
}

fn fetch_connect_info(agent: &ureq::Agent, url: &Url) -> Result<ConnectInfo, ConnectorError> {
    let response = agent.get(url.as_str()).call().map_err(|e| {
        http_call_error(e, |status, reason| ConnectorError::BootstrapFailed {
            status,
            reason,
        })
    })?;
    response.into_json().map_err(|e| {
        ConnectorError::TransportFailed(format!("malformed bootstrap response: {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_info_deserialization() {
        let json = r#"{
            "csrUrl": "https://x/csr",
            "api": {
                "metadataUrl": "https://x/meta",
                "certificatesUrl": "https://x/certs",
                "infoUrl": "https://x/info"
            },
            "certificate": {
                "subject": "CN=app1",
                "extensions": "",
                "key-algorithm": "rsa2048"
            }
        }"#;

        let info: ConnectInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.csr_url.as_str(), "https://x/csr");
        assert_eq!(info.api.info_url.as_str(), "https://x/info");
        assert_eq!(info.certificate.subject, "CN=app1");
        assert_eq!(info.certificate.key_algorithm, "rsa2048");
    }

    #[test]
    fn test_info_response_deserialization() {
        let json = r#"{
            "clientIdentity": { "application": "app1" },
            "urls": {
                "eventsUrl": "https://x/events",
                "metadataUrl": "https://x/meta",
                "renewCertUrl": "https://x/renew",
                "revocationCertUrl": "https://x/revoke",
                "eventsInfoUrl": "https://x/events-info"
            }
        }"#;

        let info: InfoResponse = serde_json::from_str(json).unwrap();
        assert_eq!(info.client_identity.application, "app1");
        assert_eq!(info.urls.metadata_url.as_str(), "https://x/meta");
        assert_eq!(info.urls.events_url.unwrap().as_str(), "https://x/events");
    }

    #[test]
    fn test_info_response_optional_urls_absent() {
        let json = r#"{
            "clientIdentity": { "application": "app1" },
            "urls": {
                "metadataUrl": "https://x/meta",
                "renewCertUrl": "https://x/renew"
            }
        }"#;

        let info: InfoResponse = serde_json::from_str(json).unwrap();
        assert!(info.urls.events_url.is_none());
        assert!(info.urls.revocation_cert_url.is_none());
        assert!(info.urls.events_info_url.is_none());
    }
}
