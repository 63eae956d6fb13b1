//! Identity issuance: ephemeral login sessions, nonce binding, address
//! derivation, and decentralized identifiers.

mod address;
mod did;
mod epoch;
mod session;

pub use address::{derive_address, IdentityClaims, Salt, SALT_LENGTH};
pub use did::Did;
pub use epoch::{EpochError, EpochSource};
pub use session::{
    EphemeralSession, SessionCookieError, SessionError, RANDOMNESS_LENGTH, SESSION_COOKIE,
};

use jsonwebtoken::errors::Error as JwtError;
use thiserror::Error;

/// Failures of the identity derivation operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The stored key seed is absent or not exactly 32 bytes.
    #[error("key seed is missing or has the wrong length")]
    SeedMissing,
    /// A freshly derived DID failed to authenticate against its resolved key.
    #[error("DID failed to authenticate against its resolved key")]
    AuthenticationFailed,
    /// The string is not a structurally valid DID.
    #[error("malformed DID '{0}'")]
    MalformedDid(String),
    /// The device salt could not be decoded.
    #[error("malformed device salt")]
    MalformedSalt,
    /// The identity token could not be decoded at all.
    #[error("identity token could not be decoded: {0}")]
    Token(#[from] JwtError),
}
