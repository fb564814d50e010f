/// The application-connector error type.
///
/// Every operation of the engine fails with exactly one of these variants and
/// never recovers, retries or backs off internally. Variants produced by a
/// remote call carry the numeric HTTP status together with the reason phrase.
#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error("Key algorithm {0} not supported")]
    UnsupportedAlgorithm(String),

    #[error("CSR signing failed: {0}")]
    CsrSigningFailed(String),

    #[error("Certificate issuance rejected, code: {status} ({reason})")]
    IssuanceRejected { status: u16, reason: String },

    #[error("Trust material assembly failed: {0}")]
    TrustMaterialAssemblyFailed(String),

    #[error("Transport construction failed: {0}")]
    TransportConstructionFailed(String),

    #[error("Bootstrap call failed, code: {status} ({reason})")]
    BootstrapFailed { status: u16, reason: String },

    #[error("Info call failed, code: {status} ({reason})")]
    InfoFetchFailed { status: u16, reason: String },

    #[error("Registry call failed, code: {status} ({reason})")]
    RegistryCallFailed { status: u16, reason: String },

    #[error("Event gateway call failed, code: {status} ({reason})")]
    EventGatewayFailed { status: u16, reason: String },

    #[error("Metadata document invalid: {0}")]
    MetadataDocumentInvalid(String),

    #[error("Transport error: {0}")]
    TransportFailed(String),

    #[error("Usage error: {0}")]
    UsageError(&'static str),
}

/// Maps a failed `ureq` call to the operation-specific error.
///
/// A response with a non-success status becomes the variant produced by
/// `on_status`; everything below HTTP (connect, TLS, timeout, I/O) becomes
/// [`ConnectorError::TransportFailed`].
pub(crate) fn http_call_error(
    err: ureq::Error,
    on_status: impl FnOnce(u16, String) -> ConnectorError,
) -> ConnectorError {
    match err {
        ureq::Error::Status(status, response) => {
            on_status(status, response.status_text().to_string())
        }
        ureq::Error::Transport(transport) => ConnectorError::TransportFailed(transport.to_string()),
    }
}
