//! Trust material: the client certificate chain and its protected key.
//!
//! The issuance endpoint returns two independently Base64-encoded DER
//! certificates (client leaf first, issuing CA second). Both are parsed
//! before acceptance and assembled into a two-entry chain bound to the
//! private key from the matching CSR; the key itself is stored as
//! scrypt-encrypted PKCS#8 under the caller-chosen password, so trust
//! material at rest is never usable without it.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use pkcs8::{EncodePrivateKey, EncryptedPrivateKeyInfo, SecretDocument};
use rsa::RsaPrivateKey;
use rustls_pki_types::CertificateDer;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use time::OffsetDateTime;
use url::Url;
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

use crate::csr::CsrResult;
use crate::error::{http_call_error, ConnectorError};

const CSR_PEM_HEADER: &str = "-----BEGIN CERTIFICATE REQUEST-----";
const CSR_PEM_FOOTER: &str = "-----END CERTIFICATE REQUEST-----";

/// A private key plus its certificate chain, proving the application's
/// identity over TLS.
///
/// The chain always has exactly two entries, client leaf first. The private
/// key is held in password-encrypted PKCS#8 form; unlocking it is the
/// transport factory's job. Replacing trust material means replacing the
/// whole value, key and chain together.
#[derive(Debug, Clone)]
pub struct TrustMaterial {
    /// Certificate chain, client leaf first, issuing CA second.
    chain: Vec<CertificateDer<'static>>,
    /// PKCS#8 `EncryptedPrivateKeyInfo`, DER-encoded.
    encrypted_key_der: Vec<u8>,
}

#[derive(Debug, Serialize)]
struct CsrRequest {
    csr: String,
}

#[derive(Debug, Deserialize)]
struct CsrResponse {
    #[serde(rename = "clientCrt")]
    client_crt: String,
    #[serde(rename = "caCrt")]
    ca_crt: String,
}

/// Encodes raw CSR bytes into the wire form the issuance endpoint expects.
///
/// The DER bytes are Base64-encoded, wrapped in the literal PEM header and
/// footer, and the wrapped text is Base64-encoded a second time. The
/// receiving side depends on this exact framing.
pub(crate) fn wrap_csr(csr_der: &[u8]) -> String {
    let encoded = format!(
        "{CSR_PEM_HEADER}\n{}\n{CSR_PEM_FOOTER}",
        BASE64.encode(csr_der)
    );
    BASE64.encode(encoded.as_bytes())
}

/// Submits a CSR and assembles the issued certificates into trust material.
///
/// The call is made over `agent`, which carries the caller's current
/// identity: the unauthenticated bootstrap agent during initial pairing, the
/// pre-renewal mTLS agent during certificate renewal.
///
/// # Errors
///
/// - [`ConnectorError::IssuanceRejected`] for any response status other
///   than 201.
/// - [`ConnectorError::TrustMaterialAssemblyFailed`] if the response body or
///   the returned certificates cannot be decoded.
/// - [`ConnectorError::TransportFailed`] below HTTP.
pub fn submit_csr(
    agent: &ureq::Agent,
    csr_url: &Url,
    csr: &CsrResult,
    password: &str,
) -> Result<TrustMaterial, ConnectorError> {
    let request = CsrRequest {
        csr: wrap_csr(csr.csr_der()),
    };

    log::debug!("submitting CSR to {csr_url}");
    let response = agent
        .post(csr_url.as_str())
        .send_json(&request)
        .map_err(|e| {
            http_call_error(e, |status, reason| ConnectorError::IssuanceRejected {
                status,
                reason,
            })
        })?;

    if response.status() != 201 {
        return Err(ConnectorError::IssuanceRejected {
            status: response.status(),
            reason: response.status_text().to_string(),
        });
    }

    let body: CsrResponse = response.into_json().map_err(|e| {
        ConnectorError::TrustMaterialAssemblyFailed(format!("malformed issuance response: {e}"))
    })?;

    let client_crt = decode_certificate(&body.client_crt)?;
    let ca_crt = decode_certificate(&body.ca_crt)?;
    TrustMaterial::assemble(csr.key(), client_crt, ca_crt, password)
}

fn decode_certificate(encoded: &str) -> Result<Vec<u8>, ConnectorError> {
    BASE64.decode(encoded).map_err(|e| {
        ConnectorError::TrustMaterialAssemblyFailed(format!("certificate decoding failed: {e}"))
    })
}

impl TrustMaterial {
    /// Binds the issued chain to the private key under `password`.
    ///
    /// Both certificates must parse as X.509; the key is encrypted to
    /// PKCS#8 with scrypt/AES-256-CBC.
    pub(crate) fn assemble(
        key: &RsaPrivateKey,
        client_crt: Vec<u8>,
        ca_crt: Vec<u8>,
        password: &str,
    ) -> Result<Self, ConnectorError> {
        for der in [&client_crt, &ca_crt] {
            X509Certificate::from_der(der).map_err(|e| {
                ConnectorError::TrustMaterialAssemblyFailed(format!(
                    "certificate parsing failed: {e:?}"
                ))
            })?;
        }

        let mut rng = rand::thread_rng();
        let encrypted = key
            .to_pkcs8_encrypted_der(&mut rng, password.as_bytes())
            .map_err(|e| {
                ConnectorError::TrustMaterialAssemblyFailed(format!(
                    "private key protection failed: {e}"
                ))
            })?;

        Ok(Self {
            chain: vec![
                CertificateDer::from(client_crt),
                CertificateDer::from(ca_crt),
            ],
            encrypted_key_der: encrypted.as_bytes().to_vec(),
        })
    }

    /// The certificate chain, client leaf first.
    pub fn chain(&self) -> &[CertificateDer<'static>] {
        &self.chain
    }

    /// Decrypts the PKCS#8 private key with `password`.
    pub(crate) fn unlock_key(&self, password: &str) -> Result<SecretDocument, ConnectorError> {
        let info = EncryptedPrivateKeyInfo::try_from(self.encrypted_key_der.as_slice())
            .map_err(|e| {
                ConnectorError::TransportConstructionFailed(format!("corrupt key material: {e}"))
            })?;
        info.decrypt(password.as_bytes()).map_err(|e| {
            ConnectorError::TransportConstructionFailed(format!(
                "trust material cannot be unlocked: {e}"
            ))
        })
    }

    /// NotAfter of the client certificate.
    pub fn expires_at(&self) -> Result<OffsetDateTime, ConnectorError> {
        let (_, leaf) = X509Certificate::from_der(self.chain[0].as_ref()).map_err(|e| {
            ConnectorError::TrustMaterialAssemblyFailed(format!("certificate parsing failed: {e:?}"))
        })?;
        Ok(leaf.validity().not_after.to_datetime())
    }

    /// SHA-1 fingerprint of the client certificate, lowercase hex.
    pub fn fingerprint(&self) -> String {
        let digest = Sha1::digest(self.chain[0].as_ref());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_csr_fixed_vector() {
        // Base64("test") = "dGVzdA==", wrapped in the PEM literals and
        // Base64-encoded a second time.
        assert_eq!(
            wrap_csr(b"test"),
            "LS0tLS1CRUdJTiBDRVJUSUZJQ0FURSBSRVFVRVNULS0tLS0KZEdWemRBPT0KLS0tLS1FTkQgQ0VSVElGSUNBVEUgUkVRVUVTVC0tLS0t"
        );
    }

    #[test]
    fn test_wrap_csr_round_trips() {
        let input: Vec<u8> = (0u8..=255).collect();
        let outer = BASE64.decode(wrap_csr(&input)).expect("outer base64");
        let text = String::from_utf8(outer).expect("wrapped text is UTF-8");
        assert!(text.starts_with(CSR_PEM_HEADER));
        assert!(text.ends_with(CSR_PEM_FOOTER));
        let inner = text
            .trim_start_matches(CSR_PEM_HEADER)
            .trim_end_matches(CSR_PEM_FOOTER)
            .trim();
        assert_eq!(BASE64.decode(inner).expect("inner base64"), input);
    }

    #[test]
    fn test_csr_request_serialization() {
        let request = CsrRequest {
            csr: "payload".to_string(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({ "csr": "payload" }));
    }

    #[test]
    fn test_csr_response_deserialization() {
        let json = r#"{
            "crt": "full-chain",
            "clientCrt": "client-cert",
            "caCrt": "ca-cert"
        }"#;
        let response: CsrResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.client_crt, "client-cert");
        assert_eq!(response.ca_crt, "ca-cert");
    }

    #[test]
    fn test_assemble_rejects_garbage_certificates() {
        let key = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let result = TrustMaterial::assemble(&key, vec![0xde, 0xad], vec![0xbe, 0xef], "pw");
        assert!(matches!(
            result,
            Err(ConnectorError::TrustMaterialAssemblyFailed(_))
        ));
    }
}
