use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::campaign::CampaignDescription, db::campaign::CandidateId};

/// A claimed identity, exactly as the voter typed it. Validation happens in
/// the vote flow, not at the serde boundary, so a malformed DID gets a typed
/// rejection rather than a generic 422.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyIdentityRequest {
    pub did: String,
}

/// What an eligible voter sees before casting: the campaign window and the
/// full candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityResponse {
    pub campaign: CampaignDescription,
}

/// A vote submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CastVoteRequest {
    pub did: String,
    pub candidate: CandidateId,
}

/// Confirmation of a committed ballot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BallotReceipt {
    pub candidate: CandidateId,
    pub voted_at: DateTime<Utc>,
}
