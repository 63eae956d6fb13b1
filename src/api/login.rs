use mongodb::bson::doc;
use rocket::{
    http::{Cookie, CookieJar, SameSite},
    serde::json::Json,
    time::Duration,
    Route, State,
};

use crate::{
    error::{Error, Result},
    identity::{
        derive_address, EphemeralSession, EpochSource, IdentityClaims, Salt, SESSION_COOKIE,
    },
    model::{
        api::{
            auth::AuthToken,
            login::{IdentityResponse, LoginChallenge, LoginCompleteRequest},
        },
        db::voter::Voter,
        mongodb::Coll,
    },
    Config,
};

pub fn routes() -> Vec<Route> {
    routes![begin, complete]
}

/// The per-device blinding salt lives in its own long-lived private cookie.
pub const SALT_COOKIE: &str = "device_salt";

/// Effectively the life of the device. Losing the cookie loses the derived
/// address permanently; there is no recovery path.
const SALT_MAX_AGE_DAYS: i64 = 10 * 365;

/// Begin a login attempt: mint an ephemeral session and hand the client the
/// nonce to carry to the OAuth provider.
#[post("/auth/login/begin")]
pub async fn begin(
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    epochs: &State<EpochSource>,
) -> Result<Json<LoginChallenge>> {
    let horizon = epochs.validity_horizon().await?;
    let session = EphemeralSession::generate(horizon)?;

    let challenge = LoginChallenge {
        public_key: session.public_key_base64(),
        nonce: session.nonce(),
        max_epoch: session.max_epoch(),
    };

    // Last-write-wins: beginning a new attempt replaces any pending session,
    // and the replaced ephemeral key is an accepted loss.
    cookies.add_private(session.into_cookie(config));

    Ok(Json(challenge))
}

/// Complete a login attempt: match the returned identity token against the
/// pending session, then derive the platform address under the device salt.
#[post("/auth/login/complete", data = "<request>", format = "json")]
pub async fn complete(
    request: Json<LoginCompleteRequest>,
    session: EphemeralSession,
    cookies: &CookieJar<'_>,
    config: &State<Config>,
    voters: Coll<Voter>,
) -> Result<Json<IdentityResponse>> {
    let claims = IdentityClaims::decode(&request.id_token)?;

    // The token must carry the nonce bound to this session's ephemeral key;
    // anything else is a replay or belongs to a different attempt.
    if claims.nonce.as_deref() != Some(session.nonce().as_str()) {
        return Err(Error::unauthorized(
            "Identity token does not match the pending login session",
        ));
    }

    // The session is single-use: consume it as soon as the nonce matches.
    cookies.remove_private(Cookie::named(SESSION_COOKIE));

    // The first completed login on a device mints its salt; it never changes
    // afterwards.
    let salt = match cookies.get_private(SALT_COOKIE) {
        Some(cookie) => Salt::decode(cookie.value())?,
        None => {
            let salt = Salt::generate()?;
            cookies.add_private(
                Cookie::build(SALT_COOKIE, salt.encode())
                    .max_age(Duration::days(SALT_MAX_AGE_DAYS))
                    .http_only(true)
                    .same_site(SameSite::Strict)
                    .finish(),
            );
            salt
        }
    };

    let address = derive_address(&claims, &salt);

    // Log the voter in if a registered record carries this address.
    let voter = voters.find_one(doc! { "address": &address }, None).await?;
    let registered = voter.is_some();
    if let Some(voter) = voter {
        cookies.add(AuthToken::new(&voter).into_cookie(config));
    }

    Ok(Json(IdentityResponse {
        address,
        registered,
    }))
}
