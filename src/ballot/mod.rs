//! The ballot integrity engine: the voter-verification and vote-casting
//! state machine.
//!
//! A voter record moves `Registered` -> `Verified` -> `Voted`, with
//! eligibility to vote derived at lookup time from the verified flag and the
//! campaign window. The only write this module performs is the vote commit,
//! and that write is guarded: it only applies if the record has still not
//! voted at write time, so concurrent casts for one identity cannot both
//! land.

mod engine;
mod store;

pub use engine::{cast_vote, verify_identity, CommittedVote, Eligibility};
pub use store::{MongoRegistry, Registry, StoreError};

#[cfg(test)]
pub use store::MemoryRegistry;

use thiserror::Error;

use crate::identity::Did;
use crate::model::db::campaign::CandidateId;
use crate::model::mongodb::Id;

/// Everything the vote flow can fail with. Each failure is fatal to the
/// current attempt and reported to the caller; nothing here is retried
/// automatically beyond the single guarded-commit re-check.
#[derive(Debug, Error)]
pub enum VoteError {
    /// The claimed identity is not structurally a DID. Rejected before any
    /// lookup.
    #[error("'{0}' is not a valid DID")]
    InvalidDid(String),
    /// No voter record carries the claimed DID.
    #[error("no voter is registered for {0}")]
    NotFound(Did),
    /// The record exists but an administrator has not verified it.
    #[error("this registration has not been verified by an administrator")]
    NotVerified,
    /// The record has no campaign.
    #[error("no campaign is assigned to this registration")]
    NoCampaignAssigned,
    /// The record references a campaign that no longer exists.
    #[error("campaign {0} no longer exists")]
    CampaignNotFound(Id),
    /// The campaign window does not contain the current instant.
    #[error("voting is not currently active for this campaign")]
    VotingNotActive,
    /// The chosen candidate is not on the campaign's candidate list.
    #[error("candidate '{0}' is not standing in this campaign")]
    UnknownCandidate(CandidateId),
    /// A ballot has already been committed for this DID.
    #[error("a ballot has already been cast for this identity")]
    AlreadyVoted,
    #[error(transparent)]
    Store(#[from] StoreError),
}
