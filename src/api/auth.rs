use aws_sdk_sns::Client as SnsClient;
use data_encoding::BASE64URL_NOPAD;
use ed25519_dalek::SECRET_KEY_LENGTH;
use mongodb::bson::doc;
use rand::{rngs::OsRng, RngCore};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::{
    error::{Error, Result},
    identity::{Did, SessionError},
    model::{
        api::{
            admin::AdminCredentials,
            auth::{AuthToken, VoterChallengeRequest, VoterVerifyRequest, AUTH_TOKEN_COOKIE},
            otp::{Challenge, CHALLENGE_COOKIE},
            voter::RegistrationReceipt,
        },
        db::{admin::Admin, campaign::Campaign, voter::NewVoter, voter::Voter},
        mongodb::{is_duplicate_key_error, Coll, Id},
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![authenticate, challenge, verify, logout]
}

#[post("/auth/admin", data = "<credentials>", format = "json")]
pub async fn authenticate(
    cookies: &CookieJar<'_>,
    credentials: Json<AdminCredentials>,
    admins: Coll<Admin>,
    config: &State<Config>,
) -> Result<()> {
    let with_username = doc! {
        "username": &credentials.username
    };

    let admin = admins
        .find_one(with_username, None)
        .await?
        .filter(|admin| admin.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::unauthorized(
                "No admin found with the provided username and password combination.",
            )
        })?;

    let token = AuthToken::new(&admin);
    cookies.add(token.into_cookie(config));

    Ok(())
}

#[cfg_attr(test, allow(unused_variables))]
#[post("/auth/voter/challenge", data = "<request>", format = "json")]
pub async fn challenge(
    request: Json<VoterChallengeRequest>,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    sender: &State<SnsClient>,
) -> Result<()> {
    // The CAPTCHA guards the SMS send, not the registration itself.
    let sms = request
        .0
        .verify(config)
        .await
        .map_err(|err| Error::Status(Status::Unauthorized, err.to_string()))?;

    let challenge = Challenge::new(sms);

    #[cfg(not(test))]
    sender
        .publish()
        .phone_number(challenge.sms.to_string())
        .message(format!("Voter registration code: {}", challenge.code))
        .send()
        .await
        .map_err(|_| {
            Error::Status(
                Status::InternalServerError,
                "Failed to send message".to_string(),
            )
        })?;

    cookies.add_private(challenge.into_cookie(config));

    Ok(())
}

#[post("/auth/voter/verify", data = "<request>", format = "json")]
pub async fn verify(
    request: Json<VoterVerifyRequest>,
    challenge: Challenge,
    cookies: &CookieJar<'_>,
    voters: Coll<Voter>,
    new_voters: Coll<NewVoter>,
    campaigns: Coll<Campaign>,
    config: &State<Config>,
) -> Result<Json<RegistrationReceipt>> {
    let VoterVerifyRequest { code, registration } = request.0;

    if challenge.code != code {
        // Submitted code is invalid and so the verification fails.
        return Err(Error::unauthorized(format!("Incorrect OTP code {code}")));
    }

    // Reject malformed attributes before touching the database.
    registration
        .details
        .validate()
        .map_err(|err| Error::bad_request(err.to_string()))?;

    // The chosen campaign must exist.
    let campaign_id: Id = *registration.campaign_id;
    campaigns
        .find_one(campaign_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Campaign with ID '{campaign_id}'")))?;

    // Provision the voter's identity: a fresh key seed, returned to the
    // device exactly once, and the DID derived (and authenticated) from it.
    let mut seed = [0; SECRET_KEY_LENGTH];
    OsRng
        .try_fill_bytes(&mut seed)
        .map_err(|_| SessionError::EntropyUnavailable)?;
    let did = Did::from_seed(&seed)?;

    let voter = NewVoter::new(
        did.clone(),
        challenge.sms,
        registration.details,
        campaign_id,
        registration.address,
        config,
    );

    let new_id: Id = new_voters
        .insert_one(&voter, None)
        .await
        .map_err(|err| {
            if is_duplicate_key_error(&err) {
                Error::bad_request("A registration already exists for this phone number")
            } else {
                err.into()
            }
        })?
        .inserted_id
        .as_object_id()
        .unwrap() // Safe because the ID comes directly from the database.
        .into();

    // Log the new voter in.
    let db_voter = voters.find_one(new_id.as_doc(), None).await?.unwrap();
    let token = AuthToken::new(&db_voter);
    cookies.add(token.into_cookie(config));

    // We no longer need the OTP challenge.
    cookies.remove(Cookie::named(CHALLENGE_COOKIE));

    Ok(Json(RegistrationReceipt {
        did,
        secret_key: BASE64URL_NOPAD.encode(&seed),
    }))
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}
