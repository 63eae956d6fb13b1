use chrono::Utc;
use rocket::{serde::json::Json, Route};

use crate::{
    ballot::{self, MongoRegistry},
    error::Result,
    model::api::voting::{
        BallotReceipt, CastVoteRequest, EligibilityResponse, VerifyIdentityRequest,
    },
};

pub fn routes() -> Vec<Route> {
    routes![verify_identity, cast_vote]
}

/// Check a claimed DID against the registry and return the campaign snapshot
/// and candidate list if the voter is eligible. Read-only and repeatable.
#[post("/voting/verify", data = "<request>", format = "json")]
async fn verify_identity(
    request: Json<VerifyIdentityRequest>,
    registry: MongoRegistry,
) -> Result<Json<EligibilityResponse>> {
    let eligibility = ballot::verify_identity(&registry, &request.did, Utc::now()).await?;
    Ok(Json(EligibilityResponse {
        campaign: eligibility.campaign.into(),
    }))
}

/// Cast a ballot. The engine re-resolves the record and commits through the
/// store's guarded conditional write, so double submission (two tabs, a
/// double click) yields exactly one committed ballot.
#[post("/voting/cast", data = "<request>", format = "json")]
async fn cast_vote(
    request: Json<CastVoteRequest>,
    registry: MongoRegistry,
) -> Result<Json<BallotReceipt>> {
    let committed = ballot::cast_vote(&registry, &request.did, &request.candidate, Utc::now()).await?;
    Ok(Json(BallotReceipt {
        candidate: committed.candidate,
        voted_at: committed.voted_at,
    }))
}
