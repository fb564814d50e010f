//! Certificate signing request generation.
//!
//! Produces an ephemeral RSA key pair and a signed PKCS#10 request for a
//! given subject. The platform accepts a single certificate profile
//! (2048-bit RSA, SHA-1-with-RSA signature), so anything else is rejected
//! before a key is ever generated.

use std::str::FromStr;

use der::asn1::{AnyRef, BitString, ObjectIdentifier};
use der::{Decode, Encode};
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha1::Sha1;
use spki::{AlgorithmIdentifierOwned, EncodePublicKey, SubjectPublicKeyInfoOwned};
use x509_cert::attr::Attributes;
use x509_cert::name::Name;
use x509_cert::request::{CertReq, CertReqInfo, Version};

use crate::error::ConnectorError;

/// The single key algorithm the platform issues certificates for.
pub const SUPPORTED_ALGORITHM: &str = "rsa2048";

const RSA_KEY_BITS: usize = 2048;

// sha1WithRSAEncryption (RFC 8017)
const SHA1_WITH_RSA_ENCRYPTION: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");

/// An ephemeral key pair together with the DER-encoded signing request over
/// its public key.
///
/// Lives only for the duration of one pairing or renewal call and is never
/// persisted; the private key moves into the issued trust material.
pub struct CsrResult {
    key: RsaPrivateKey,
    csr_der: Vec<u8>,
}

impl CsrResult {
    /// DER encoding of the signed PKCS#10 request.
    pub fn csr_der(&self) -> &[u8] {
        &self.csr_der
    }

    /// The private key matching the request's public key.
    pub fn key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

/// Generates a fresh key pair and a signed certificate request for `subject`.
///
/// # Errors
///
/// - [`ConnectorError::UnsupportedAlgorithm`] if `algorithm` is anything but
///   [`SUPPORTED_ALGORITHM`]; checked before any key generation happens.
/// - [`ConnectorError::CsrSigningFailed`] on key generation, subject parsing,
///   signing or encoding failure. Callers treat this as fatal.
pub fn generate_csr(subject: &str, algorithm: &str) -> Result<CsrResult, ConnectorError> {
    if algorithm != SUPPORTED_ALGORITHM {
        return Err(ConnectorError::UnsupportedAlgorithm(algorithm.to_string()));
    }

    log::debug!("generating {RSA_KEY_BITS}-bit RSA key pair for {subject}");
    let mut rng = rand::thread_rng();
    let key = RsaPrivateKey::new(&mut rng, RSA_KEY_BITS)
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("key generation failed: {e}")))?;

    let csr_der = sign_request(subject, &key)?;
    Ok(CsrResult { key, csr_der })
}

/// Builds the request info, signs its DER encoding with the private key and
/// assembles the complete PKCS#10 structure.
fn sign_request(subject: &str, key: &RsaPrivateKey) -> Result<Vec<u8>, ConnectorError> {
    let subject = Name::from_str(subject)
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("invalid subject: {e}")))?;

    let public_key_der = key
        .to_public_key()
        .to_public_key_der()
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("public key encoding failed: {e}")))?;
    let public_key = SubjectPublicKeyInfoOwned::from_der(public_key_der.as_bytes())
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("public key encoding failed: {e}")))?;

    let info = CertReqInfo {
        version: Version::V1,
        subject,
        public_key,
        attributes: Attributes::default(),
    };
    let info_der = info
        .to_der()
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("request encoding failed: {e}")))?;

    let signer = SigningKey::<Sha1>::new(key.clone());
    let signature = signer
        .try_sign(&info_der)
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("signing failed: {e}")))?;

    let request = CertReq {
        info,
        algorithm: AlgorithmIdentifierOwned {
            oid: SHA1_WITH_RSA_ENCRYPTION,
            parameters: Some(AnyRef::NULL.into()),
        },
        signature: BitString::from_bytes(&signature.to_vec())
            .map_err(|e| ConnectorError::CsrSigningFailed(format!("signature encoding failed: {e}")))?,
    };

    request
        .to_der()
        .map_err(|e| ConnectorError::CsrSigningFailed(format!("request encoding failed: {e}")))
}
