//! Client library for pairing an application with a remote platform over
//! mutual TLS and keeping its registered facts in sync.
//!
//! The core is the pairing and certificate-lifecycle engine: trust is
//! bootstrapped from a one-time connect URL, an X.509 client certificate is
//! issued (and later rotated) through a CSR exchange, and a fresh mTLS
//! transport is built whenever trust material changes. On top of that trust
//! sit two thin services: an idempotent metadata registration against the
//! platform registry and a fire-and-forget event gateway.
//!
//! All operations are synchronous blocking calls. The engine keeps no state
//! of its own; everything lives in the [`Connection`] value returned by
//! each transition, and every transition returns a *new* value rather than
//! mutating the old one.
//!
//! ```ignore
//! use appconnect::Connector;
//! use url::Url;
//!
//! let connector = Connector::new();
//! let connect_url = Url::parse("https://platform/v1/applications/signingRequests/info?token=...")?;
//!
//! let connection = connector.pair(&connect_url, "keystore-password")?;
//! println!("paired as {}", connection.application_name());
//!
//! // Periodically, with margin before certificate expiry:
//! let connection = connector.renew(&connection, "next-password")?;
//! ```

#![forbid(unsafe_code)]

mod connection;
mod csr;
mod error;
mod event;
mod metadata;
mod pairing;
mod transport;
mod trust;

pub use connection::Connection;
pub use csr::{generate_csr, CsrResult, SUPPORTED_ALGORITHM};
pub use error::ConnectorError;
pub use event::{Event, EventSubscriptions};
pub use metadata::{AuthenticationInfo, MetadataRecord, RegistryOptions};
pub use pairing::Connector;
pub use transport::{bootstrap_transport, build_transport, TransportConfig};
pub use trust::{submit_csr, TrustMaterial};
