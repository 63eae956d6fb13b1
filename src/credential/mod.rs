//! Verifiable credentials: offline issuance and verification of signed
//! voter attestations.
//!
//! A credential is a compact EdDSA JWS over a canonical JSON payload. It is
//! issued once per voter by the administrator's offline tool, is immutable
//! after issuance, and is portable: verification needs only the token
//! itself, since the issuer DID embedded in it resolves to the issuer's
//! public key.

mod issuer;
mod vc;

pub use issuer::{IssuerKey, DEFAULT_KEY_PATH};
pub use vc::{
    sign, verify, CredentialBody, CredentialClaims, CredentialSubject, CREDENTIAL_CONTEXT,
    CREDENTIAL_TYPES,
};

use thiserror::Error;

use crate::identity::IdentityError;

/// Failures of credential issuance and verification.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// No issuer key material exists; the administrator must generate it
    /// first.
    #[error("no issuer key found at '{0}'; generate one first")]
    KeyMaterialMissing(String),
    /// The OS could not supply secure randomness for key generation.
    #[error("secure random source unavailable")]
    EntropyUnavailable,
    /// The token is not a structurally valid compact JWS.
    #[error("credential token is malformed")]
    Malformed,
    /// The token's header declares an algorithm we do not issue.
    #[error("credential uses unsupported algorithm '{0}'")]
    UnsupportedAlgorithm(String),
    /// The signature does not verify under the issuer's resolved key.
    #[error("credential signature is invalid")]
    BadSignature,
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("credential payload could not be (de)serialised: {0}")]
    Json(#[from] rocket::serde::json::serde_json::Error),
}
