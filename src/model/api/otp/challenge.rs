use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{
    errors::Error as JwtError, DecodingKey, EncodingKey, Header, TokenData, Validation,
};
use rocket::{
    http::{Cookie, SameSite, Status},
    outcome::{try_outcome, IntoOutcome},
    request::{self, FromRequest},
    time::Duration,
    Request, State,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{model::api::sms::Sms, Config};

use super::code::Code;

pub const CHALLENGE_COOKIE: &str = "challenge";

/// A challenge tied to a specific SMS number and OTP code.
///
/// The challenge never touches the database: it travels in an encrypted
/// private cookie with a TTL, and submitting the matching code is the proof
/// of phone possession.
#[derive(Debug, Serialize, Deserialize)]
pub struct Challenge {
    pub sms: Sms,
    #[serde(rename = "cod")]
    pub code: Code,
}

impl Challenge {
    /// Create a new challenge with a random code.
    pub fn new(sms: Sms) -> Self {
        let code = Code::random();
        debug!("Issued OTP code {code}");
        Self { sms, code }
    }

    // Challenge serialization never fails.
    #[allow(clippy::missing_panics_doc)]
    /// Convert into a cookie.
    pub fn into_cookie(self, config: &Config) -> Cookie<'static> {
        let claims = Claims {
            challenge: self,
            expire_at: Utc::now() + config.otp_ttl(),
        };
        Cookie::build(
            CHALLENGE_COOKIE,
            jsonwebtoken::encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret()),
            )
            .unwrap(),
        )
        .max_age(Duration::seconds(config.otp_ttl().num_seconds()))
        .http_only(true)
        .same_site(SameSite::Strict)
        .finish()
    }

    /// Deserialize a challenge from a cookie.
    pub fn from_cookie(cookie: &Cookie<'static>, config: &Config) -> Result<Self, JwtError> {
        jsonwebtoken::decode(
            cookie.value(),
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )
        .map(|claims: TokenData<Claims>| claims.claims.challenge)
    }
}

/// Cookie claims: the challenge itself plus an expiry datetime.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    challenge: Challenge,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Challenge {
    type Error = ChallengeError;

    /// Get the challenge from the cookie.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let config = req.guard::<&State<Config>>().await.unwrap(); // Valid as `Config` is always managed

        let cookie = try_outcome!(req
            .cookies()
            .get_private(CHALLENGE_COOKIE)
            .into_outcome((Status::Unauthorized, ChallengeError::Missing)));

        let challenge = try_outcome!(Challenge::from_cookie(&cookie, config)
            .map_err(ChallengeError::Jwt)
            .into_outcome(Status::BadRequest));

        request::Outcome::Success(challenge)
    }
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("Missing `challenge` cookie")]
    Missing,
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survives_the_cookie_roundtrip() {
        let config = Config::example();
        let challenge = Challenge::new(Sms::example());
        let code = challenge.code;

        let cookie = challenge.into_cookie(&config);
        let restored = Challenge::from_cookie(&cookie, &config).unwrap();

        assert_eq!(restored.code, code);
        assert_eq!(restored.sms, Sms::example());
    }

    #[test]
    fn rejects_cookies_signed_with_another_key() {
        let config = Config::example();
        let other_config = Config::example_other_jwt_secret();
        let cookie = Challenge::new(Sms::example()).into_cookie(&config);

        assert!(Challenge::from_cookie(&cookie, &other_config).is_err());
    }
}
