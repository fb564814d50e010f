//! Event publishing and subscription lookup.
//!
//! Publishing is a fire-and-forget POST to every registered events URL.
//! There is deliberately no queue, retry or persistence in front of it;
//! callers needing delivery guarantees put their own reliability layer
//! around [`Connector::publish_event`].

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::connection::Connection;
use crate::error::{http_call_error, ConnectorError};
use crate::pairing::Connector;

/// An event to forward to the platform.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    #[serde(rename = "event-type")]
    pub event_type: String,
    #[serde(rename = "event-type-version")]
    pub event_type_version: String,
    #[serde(rename = "event-time")]
    pub event_time: String,
    pub data: Value,
}

impl Event {
    pub fn new(
        event_type: impl Into<String>,
        event_type_version: impl Into<String>,
        event_time: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            event_type_version: event_type_version.into(),
            event_time: event_time.into(),
            data,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EventSubscriptionResponse {
    #[serde(rename = "eventsInfo", default)]
    events_info: Vec<EventSubscriptionEntry>,
}

#[derive(Debug, Deserialize)]
struct EventSubscriptionEntry {
    name: String,
    version: String,
}

/// The set of event subscriptions active on the platform.
#[derive(Debug, Clone, Default)]
pub struct EventSubscriptions {
    events: HashSet<(String, String)>,
}

impl EventSubscriptions {
    /// Whether the platform subscribes to `name` in `version`.
    pub fn is_active(&self, name: &str, version: &str) -> bool {
        self.events
            .contains(&(name.to_string(), version.to_string()))
    }

    /// Number of active subscriptions.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Connector {
    /// Publishes `event` to every events URL registered on the connection.
    ///
    /// The fan-out stops at the first failing URL; earlier deliveries are
    /// not undone and later URLs are not attempted.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::EventGatewayFailed`] on a non-success response,
    /// [`ConnectorError::TransportFailed`] below HTTP.
    pub fn publish_event(
        &self,
        connection: &Connection,
        event: &Event,
    ) -> Result<(), ConnectorError> {
        let agent = connection.transport(&self.transport)?;
        for url in connection.events_urls() {
            log::debug!("publishing {} to {url}", event.event_type);
            agent
                .post(url.as_str())
                .send_json(event)
                .map_err(gateway_error)?;
        }
        Ok(())
    }

    /// Fetches the event subscriptions currently active on the platform.
    ///
    /// # Errors
    ///
    /// [`ConnectorError::UsageError`] if the connection carries no events
    /// info URL, [`ConnectorError::EventGatewayFailed`] on a non-success
    /// response.
    pub fn event_subscriptions(
        &self,
        connection: &Connection,
    ) -> Result<EventSubscriptions, ConnectorError> {
        let url = connection
            .events_info_url()
            .ok_or(ConnectorError::UsageError(
                "connection has no events info URL",
            ))?;

        let agent = connection.transport(&self.transport)?;
        let response = agent.get(url.as_str()).call().map_err(gateway_error)?;
        let body: EventSubscriptionResponse = response.into_json().map_err(|e| {
            ConnectorError::TransportFailed(format!("malformed subscription response: {e}"))
        })?;

        Ok(EventSubscriptions {
            events: body
                .events_info
                .into_iter()
                .map(|entry| (entry.name, entry.version))
                .collect(),
        })
    }
}

fn gateway_error(err: ureq::Error) -> ConnectorError {
    http_call_error(err, |status, reason| ConnectorError::EventGatewayFailed {
        status,
        reason,
    })
}
