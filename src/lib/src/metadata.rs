//! Metadata registration against the platform application registry.
//!
//! Registration is a reconciliation: the registry's current entries are
//! fetched and indexed by their `identifier`, then the local document is
//! either POSTed as a new entry or PUT over the entry it already matches.
//! Two callers reconciling the same identifier race without protection;
//! there is no concurrency token, the last writer wins.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use url::Url;

use crate::connection::Connection;
use crate::error::{http_call_error, ConnectorError};
use crate::pairing::Connector;

/// Registry behavior knobs.
#[derive(Debug, Clone, Default)]
pub struct RegistryOptions {
    /// Status required from a creating POST. `None` accepts any 2xx;
    /// deployed registry versions disagree between 200 and 201, so the
    /// default takes either and a caller talking to a known registry can
    /// pin the exact one.
    pub expected_create_status: Option<u16>,
}

impl RegistryOptions {
    /// Require an exact status for metadata creation.
    pub fn with_expected_create_status(mut self, status: u16) -> Self {
        self.expected_create_status = Some(status);
        self
    }
}

/// One currently-registered metadata entry, used only for reconciliation
/// lookups.
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataRecord {
    pub id: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Credentials injected into a metadata document for API call-back.
///
/// Each variant produces the JSON fragment the registry understands under
/// `api.credentials`.
#[derive(Debug, Clone)]
pub enum AuthenticationInfo {
    Basic {
        username: String,
        password: String,
    },
    OAuth2ClientCredentials {
        url: Url,
        client_id: String,
        client_secret: String,
    },
}

impl AuthenticationInfo {
    /// The `api.credentials` fragment for this variant.
    pub fn to_fragment(&self) -> Value {
        match self {
            Self::Basic { username, password } => json!({
                "basic": {
                    "username": username,
                    "password": password,
                }
            }),
            Self::OAuth2ClientCredentials {
                url,
                client_id,
                client_secret,
            } => json!({
                "oauth": {
                    "url": url.as_str(),
                    "clientId": client_id,
                    "clientSecret": client_secret,
                }
            }),
        }
    }
}

impl Connector {
    /// Creates or updates the application's metadata entry.
    ///
    /// If `authentication` is given and the document carries an `api`
    /// object, the credentials fragment is placed under `api.credentials`
    /// before upload; only the in-memory document is touched. A document
    /// without an `identifier`, or with one the registry does not know yet,
    /// is POSTed as a new entry; a known identifier becomes a PUT to the
    /// existing entry's URL.
    ///
    /// # Errors
    ///
    /// - [`ConnectorError::MetadataDocumentInvalid`] if `document` is not a
    ///   JSON object.
    /// - [`ConnectorError::RegistryCallFailed`] on any non-success registry
    ///   response.
    pub fn register_metadata(
        &self,
        connection: &Connection,
        document: Value,
        authentication: Option<&AuthenticationInfo>,
    ) -> Result<(), ConnectorError> {
        let mut document = into_object(document)?;

        let agent = connection.transport(&self.transport)?;
        let current = fetch_registered(&agent, connection.metadata_url())?;

        if let Some(auth) = authentication {
            inject_credentials(&mut document, auth);
        }

        let identifier = document
            .get("identifier")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let existing = identifier.as_deref().and_then(|ident| current.get(ident));
        let document = Value::Object(document);

        match existing {
            Some(entry) => {
                let update_url = entry_url(connection.metadata_url(), &entry.id)?;
                log::info!("updating metadata entry {} at {update_url}", entry.id);
                agent
                    .put(update_url.as_str())
                    .send_json(&document)
                    .map_err(registry_error)?;
            }
            None => {
                log::info!("creating metadata entry at {}", connection.metadata_url());
                let response = agent
                    .post(connection.metadata_url().as_str())
                    .send_json(&document)
                    .map_err(registry_error)?;
                if let Some(expected) = self.registry.expected_create_status {
                    if response.status() != expected {
                        return Err(ConnectorError::RegistryCallFailed {
                            status: response.status(),
                            reason: response.status_text().to_string(),
                        });
                    }
                }
            }
        }

        Ok(())
    }
}

fn registry_error(err: ureq::Error) -> ConnectorError {
    http_call_error(err, |status, reason| ConnectorError::RegistryCallFailed {
        status,
        reason,
    })
}

fn into_object(document: Value) -> Result<Map<String, Value>, ConnectorError> {
    match document {
        Value::Object(map) => Ok(map),
        other => Err(ConnectorError::MetadataDocumentInvalid(format!(
            "metadata document must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Places the credentials fragment under `api.credentials`. A document
/// without an `api` object has nothing to call back, so it stays untouched.
fn inject_credentials(document: &mut Map<String, Value>, authentication: &AuthenticationInfo) {
    if let Some(Value::Object(api)) = document.get_mut("api") {
        api.insert("credentials".to_string(), authentication.to_fragment());
    }
}

fn fetch_registered(
    agent: &ureq::Agent,
    metadata_url: &Url,
) -> Result<HashMap<String, MetadataRecord>, ConnectorError> {
    let response = agent
        .get(metadata_url.as_str())
        .call()
        .map_err(registry_error)?;
    let entries: Vec<MetadataRecord> = response.into_json().map_err(|e| {
        ConnectorError::TransportFailed(format!("malformed metadata listing: {e}"))
    })?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| entry.identifier.clone().map(|identifier| (identifier, entry)))
        .collect())
}

/// The existing entry's URL: the metadata URL extended by one path segment.
fn entry_url(metadata_url: &Url, id: &str) -> Result<Url, ConnectorError> {
    let mut url = metadata_url.clone();
    url.path_segments_mut()
        .map_err(|()| ConnectorError::UsageError("metadata URL cannot carry path segments"))?
        .pop_if_empty()
        .push(id);
    Ok(url)
}
