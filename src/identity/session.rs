use chrono::{serde::ts_seconds, DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rand::{rngs::OsRng, RngCore};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{self, FromRequest},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::Config;

pub const SESSION_COOKIE: &str = "login_session";

/// Length of the blinding value mixed into the nonce.
pub const RANDOMNESS_LENGTH: usize = 16;

/// The nonce is the first 20 bytes of the binding digest, base64url encoded.
const NONCE_LENGTH: usize = 20;

/// The private half of one login attempt: an ephemeral keypair seed, a
/// blinding value, and the last epoch the key is valid at.
///
/// The session exists for exactly one OAuth round trip. It travels in an
/// encrypted private cookie so it survives the provider redirect, is never
/// persisted server-side, and dies when the cookie expires or is consumed.
/// Beginning a second login before the first completes simply overwrites the
/// cookie; the earlier key is an accepted loss.
#[derive(Debug, Serialize, Deserialize)]
pub struct EphemeralSession {
    #[serde(rename = "key", with = "bytes_base64")]
    seed: [u8; SECRET_KEY_LENGTH],
    #[serde(rename = "rnd", with = "bytes_base64")]
    randomness: [u8; RANDOMNESS_LENGTH],
    #[serde(rename = "epo")]
    max_epoch: u64,
}

/// Failures when minting a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The OS could not supply secure randomness.
    #[error("secure random source unavailable")]
    EntropyUnavailable,
}

impl EphemeralSession {
    /// Mint a fresh session for a single login attempt, valid until the
    /// given epoch.
    pub fn generate(max_epoch: u64) -> Result<Self, SessionError> {
        let mut seed = [0; SECRET_KEY_LENGTH];
        let mut randomness = [0; RANDOMNESS_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| SessionError::EntropyUnavailable)?;
        OsRng
            .try_fill_bytes(&mut randomness)
            .map_err(|_| SessionError::EntropyUnavailable)?;
        Ok(Self {
            seed,
            randomness,
            max_epoch,
        })
    }

    pub fn max_epoch(&self) -> u64 {
        self.max_epoch
    }

    pub fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.seed)
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key().verifying_key()
    }

    /// The seed behind this session's keypair.
    pub fn seed(&self) -> &[u8; SECRET_KEY_LENGTH] {
        &self.seed
    }

    /// Base64 of the public key, as handed to the client.
    pub fn public_key_base64(&self) -> String {
        BASE64URL_NOPAD.encode(self.public_key().as_bytes())
    }

    /// The nonce binding (public key, validity horizon, blinding value) to
    /// this login attempt.
    ///
    /// One-way and deterministic: the completion step recomputes this from
    /// the stored session and matches it against the token's nonce claim.
    /// Each input is length-prefixed so distinct triples cannot collide by
    /// boundary shifting.
    pub fn nonce(&self) -> String {
        let public_key = self.public_key();
        let mut hasher = Sha256::new();
        for part in [&public_key.as_bytes()[..], &self.randomness[..]] {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part);
        }
        hasher.update(self.max_epoch.to_be_bytes());
        let digest = hasher.finalize();
        BASE64URL_NOPAD.encode(&digest[..NONCE_LENGTH])
    }

    // Session serialization never fails.
    #[allow(clippy::missing_panics_doc)]
    /// Convert into a cookie bounding the OAuth round trip.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            session: self,
            expire_at: Utc::now() + config.session_ttl(),
        };
        Cookie::build(
            SESSION_COOKIE,
            jsonwebtoken::encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret()),
            )
            .unwrap(),
        )
        .max_age(Duration::seconds(config.session_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Lax) // The OAuth provider redirect must carry it.
        .finish()
    }

    /// Deserialize a session from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.session)
    }
}

/// Cookie claims: the session itself plus an expiry datetime.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    session: EphemeralSession,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for EphemeralSession {
    type Error = SessionCookieError;

    /// Get the pending session from the cookie.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // Valid as `Config` is always managed

        let cookie = try_outcome!(req
            .cookies()
            .get_private(SESSION_COOKIE)
            .into_outcome((Status::Unauthorized, SessionCookieError::Missing)));

        let session = try_outcome!(EphemeralSession::from_cookie(&cookie, config)
            .map_err(SessionCookieError::Jwt)
            .into_outcome(Status::Unauthorized));

        request::Outcome::Success(session)
    }
}

#[derive(Debug, Error)]
pub enum SessionCookieError {
    #[error("No login session is pending")]
    Missing,
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

/// (De)serialisation of fixed-length byte arrays as base64url strings, to
/// keep the session cookie compact.
mod bytes_base64 {
    use data_encoding::BASE64URL_NOPAD;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&BASE64URL_NOPAD.encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        let bytes = BASE64URL_NOPAD
            .decode(string.as_bytes())
            .map_err(D::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| D::Error::custom(format!("expected {N} bytes")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_deterministic() {
        let session = EphemeralSession::generate(42).unwrap();
        assert_eq!(session.nonce(), session.nonce());
    }

    #[test]
    fn nonce_binds_every_input() {
        let session = EphemeralSession::generate(42).unwrap();

        // Different blinding value, same everything else.
        let mut reblinded = EphemeralSession {
            seed: session.seed,
            randomness: session.randomness,
            max_epoch: session.max_epoch,
        };
        reblinded.randomness[0] ^= 1;
        assert_ne!(session.nonce(), reblinded.nonce());

        // Different horizon.
        let later = EphemeralSession {
            seed: session.seed,
            randomness: session.randomness,
            max_epoch: session.max_epoch + 1,
        };
        assert_ne!(session.nonce(), later.nonce());

        // Different key.
        let rekeyed = EphemeralSession::generate(42).unwrap();
        assert_ne!(session.nonce(), rekeyed.nonce());
    }

    #[test]
    fn fresh_sessions_are_distinct() {
        let a = EphemeralSession::generate(7).unwrap();
        let b = EphemeralSession::generate(7).unwrap();
        assert_ne!(a.seed, b.seed);
        assert_ne!(a.nonce(), b.nonce());
    }

    #[test]
    fn survives_the_cookie_roundtrip() {
        let config = Config::example();
        let session = EphemeralSession::generate(42).unwrap();
        let nonce = session.nonce();
        let public_key = session.public_key_base64();

        let cookie = session.into_cookie(&config);
        let restored = EphemeralSession::from_cookie(&cookie, &config).unwrap();

        assert_eq!(restored.max_epoch(), 42);
        assert_eq!(restored.nonce(), nonce);
        assert_eq!(restored.public_key_base64(), public_key);
    }
}
