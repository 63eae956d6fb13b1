use chrono::{DateTime, Utc};

use crate::identity::Did;
use crate::model::db::campaign::{Campaign, CandidateId};
use crate::model::db::voter::Voter;

use super::{Registry, VoteError};

/// The snapshot returned to an eligible voter: the campaign (window,
/// description) and its full candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    pub campaign: Campaign,
}

/// A committed ballot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedVote {
    pub candidate: CandidateId,
    pub voted_at: DateTime<Utc>,
}

/// Look up a claimed DID and check every precondition for voting.
///
/// Read-only and idempotent: a voter may re-verify any number of times
/// before casting, and always sees the current campaign snapshot.
pub async fn verify_identity<R: Registry>(
    registry: &R,
    claimed_did: &str,
    now: DateTime<Utc>,
) -> Result<Eligibility, VoteError> {
    let did = parse_claimed_did(claimed_did)?;
    let voter = registry
        .voter_by_did(&did)
        .await?
        .ok_or(VoteError::NotFound(did))?;
    eligibility(registry, &voter, now).await
}

/// Cast a ballot for a claimed DID.
///
/// The voter record is re-resolved from scratch: time may have passed since
/// `verify_identity`, and another request may have voted in between, so no
/// cached result can be trusted. The actual state transition happens in the
/// store's guarded conditional write; losing that race is re-checked exactly
/// once and then reported as [`VoteError::AlreadyVoted`].
pub async fn cast_vote<R: Registry>(
    registry: &R,
    claimed_did: &str,
    candidate_id: &str,
    now: DateTime<Utc>,
) -> Result<CommittedVote, VoteError> {
    let did = parse_claimed_did(claimed_did)?;
    let voter = registry
        .voter_by_did(&did)
        .await?
        .ok_or_else(|| VoteError::NotFound(did.clone()))?;
    if voter.voted {
        return Err(VoteError::AlreadyVoted);
    }

    let eligibility = eligibility(registry, &voter, now).await?;
    if eligibility.campaign.candidate(candidate_id).is_none() {
        return Err(VoteError::UnknownCandidate(candidate_id.to_string()));
    }

    let candidate = candidate_id.to_string();
    if registry.commit_vote(&did, &candidate, now).await? {
        return Ok(CommittedVote {
            candidate,
            voted_at: now,
        });
    }

    // Lost the commit race. Re-observe the record and retry the guarded
    // write exactly once; a still-lost race means someone else's ballot
    // landed.
    let voter = registry
        .voter_by_did(&did)
        .await?
        .ok_or_else(|| VoteError::NotFound(did.clone()))?;
    if voter.voted {
        return Err(VoteError::AlreadyVoted);
    }
    if registry.commit_vote(&did, &candidate, now).await? {
        Ok(CommittedVote {
            candidate,
            voted_at: now,
        })
    } else {
        Err(VoteError::AlreadyVoted)
    }
}

/// Structural validation of the claimed identity, before any store access.
fn parse_claimed_did(claimed_did: &str) -> Result<Did, VoteError> {
    claimed_did
        .parse()
        .map_err(|_| VoteError::InvalidDid(claimed_did.to_string()))
}

/// The derived eligible-to-vote state: verified, assigned to an existing
/// campaign, and inside the campaign window (inclusive at both ends).
async fn eligibility<R: Registry>(
    registry: &R,
    voter: &Voter,
    now: DateTime<Utc>,
) -> Result<Eligibility, VoteError> {
    if !voter.verified {
        return Err(VoteError::NotVerified);
    }
    let campaign_id = voter.campaign_id.ok_or(VoteError::NoCampaignAssigned)?;
    let campaign = registry
        .campaign_by_id(campaign_id)
        .await?
        .ok_or(VoteError::CampaignNotFound(campaign_id))?;
    if !campaign.is_open_at(now) {
        return Err(VoteError::VotingNotActive);
    }
    Ok(Eligibility { campaign })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use rocket::tokio;

    use crate::ballot::MemoryRegistry;
    use crate::model::db::campaign::{Campaign, CampaignCore, Candidate};
    use crate::model::db::voter::{Voter, VoterCore};
    use crate::model::mongodb::Id;
    use crate::Config;

    use super::*;

    /// A verified voter assigned to the given campaign.
    fn verified_voter(campaign_id: Id) -> Voter {
        let config = Config::example();
        let mut core = VoterCore::example(&config);
        core.campaign_id = Some(campaign_id);
        core.verified = true;
        Voter {
            id: Id::new(),
            voter: core,
        }
    }

    fn registry_with(voter: Voter, campaign: Campaign) -> MemoryRegistry {
        MemoryRegistry::new([voter], [campaign])
    }

    #[rocket::async_test]
    async fn eligible_voter_sees_the_campaign_snapshot() {
        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let registry = registry_with(voter, campaign.clone());

        let eligibility = verify_identity(&registry, did.as_str(), Utc::now())
            .await
            .unwrap();
        assert_eq!(eligibility.campaign, campaign);
        assert_eq!(eligibility.campaign.candidates.len(), 2);
    }

    #[rocket::async_test]
    async fn verify_identity_is_idempotent_and_read_only() {
        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let before = voter.voter.clone();
        let registry = registry_with(voter, campaign);

        let now = Utc::now();
        let first = verify_identity(&registry, did.as_str(), now).await.unwrap();
        let second = verify_identity(&registry, did.as_str(), now).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(registry.voter(&did).unwrap().voter, before);
    }

    #[rocket::async_test]
    async fn malformed_dids_are_rejected_before_lookup() {
        let registry = MemoryRegistry::new([], []);
        assert!(matches!(
            verify_identity(&registry, "not a did", Utc::now()).await,
            Err(VoteError::InvalidDid(_))
        ));
        assert!(matches!(
            cast_vote(&registry, "did:", "A", Utc::now()).await,
            Err(VoteError::InvalidDid(_))
        ));
    }

    #[rocket::async_test]
    async fn unknown_dids_are_not_found() {
        let registry = MemoryRegistry::new([], []);
        assert!(matches!(
            verify_identity(&registry, "did:x:abc", Utc::now()).await,
            Err(VoteError::NotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn unverified_voters_are_rejected() {
        let campaign = Campaign::example_open();
        let mut voter = verified_voter(campaign.id);
        voter.verified = false;
        let did = voter.did.clone();
        let registry = registry_with(voter, campaign);

        assert!(matches!(
            verify_identity(&registry, did.as_str(), Utc::now()).await,
            Err(VoteError::NotVerified)
        ));
        // The same guard protects the cast path.
        assert!(matches!(
            cast_vote(&registry, did.as_str(), "anything", Utc::now()).await,
            Err(VoteError::NotVerified)
        ));
    }

    #[rocket::async_test]
    async fn voters_without_a_campaign_are_rejected() {
        let campaign = Campaign::example_open();
        let mut voter = verified_voter(campaign.id);
        voter.campaign_id = None;
        let did = voter.did.clone();
        let registry = registry_with(voter, campaign);

        assert!(matches!(
            verify_identity(&registry, did.as_str(), Utc::now()).await,
            Err(VoteError::NoCampaignAssigned)
        ));
    }

    #[rocket::async_test]
    async fn dangling_campaign_references_are_rejected() {
        let campaign = Campaign::example_open();
        let voter = verified_voter(Id::new()); // Not the stored campaign.
        let did = voter.did.clone();
        let registry = registry_with(voter, campaign);

        assert!(matches!(
            verify_identity(&registry, did.as_str(), Utc::now()).await,
            Err(VoteError::CampaignNotFound(_))
        ));
    }

    #[rocket::async_test]
    async fn window_boundaries_are_inclusive() {
        let campaign = Campaign::example_open();
        let start = campaign.start_time;
        let end = campaign.end_time;
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let candidate = campaign.candidates[0].id.clone();
        let registry = registry_with(voter, campaign);

        // Outside the window, one unit either side.
        for instant in [start - Duration::seconds(1), end + Duration::seconds(1)] {
            assert!(matches!(
                verify_identity(&registry, did.as_str(), instant).await,
                Err(VoteError::VotingNotActive)
            ));
        }

        // Verification succeeds at both bounds, and a cast at the very end
        // of the window commits.
        verify_identity(&registry, did.as_str(), start).await.unwrap();
        verify_identity(&registry, did.as_str(), end).await.unwrap();
        let committed = cast_vote(&registry, did.as_str(), &candidate, end)
            .await
            .unwrap();
        assert_eq!(committed.voted_at, end);

        // A cast at the very start of the window commits too.
        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let start = campaign.start_time;
        let registry = registry_with(voter, campaign);
        let committed = cast_vote(&registry, did.as_str(), &candidate, start)
            .await
            .unwrap();
        assert_eq!(committed.voted_at, start);
    }

    #[rocket::async_test]
    async fn unknown_candidates_are_rejected() {
        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let registry = registry_with(voter, campaign);

        assert!(matches!(
            cast_vote(&registry, did.as_str(), "write-in", Utc::now()).await,
            Err(VoteError::UnknownCandidate(id)) if id == "write-in"
        ));
        // Nothing was committed.
        assert!(!registry.voter(&did).unwrap().voted);
    }

    #[rocket::async_test]
    async fn casting_commits_exactly_the_chosen_candidate() {
        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let first = Candidate::example1().id;
        let second = Candidate::example2().id;
        let registry = registry_with(voter, campaign);

        let now = Utc::now();
        let committed = cast_vote(&registry, did.as_str(), &first, now).await.unwrap();
        assert_eq!(committed.candidate, first);

        let record = registry.voter(&did).unwrap();
        assert!(record.voted);
        assert_eq!(record.candidate.as_deref(), Some(first.as_str()));
        assert_eq!(record.voted_at, Some(now));

        // A second cast, even for another candidate, observes the terminal
        // state.
        assert!(matches!(
            cast_vote(&registry, did.as_str(), &second, Utc::now()).await,
            Err(VoteError::AlreadyVoted)
        ));
        let record = registry.voter(&did).unwrap();
        assert_eq!(record.candidate.as_deref(), Some(first.as_str()));
    }

    #[rocket::async_test]
    async fn concurrent_casts_commit_at_most_once() {
        const ATTEMPTS: usize = 8;

        let campaign = Campaign::example_open();
        let voter = verified_voter(campaign.id);
        let did = voter.did.clone();
        let candidates: Vec<_> = campaign
            .candidates
            .iter()
            .map(|candidate| candidate.id.clone())
            .collect();
        let registry = Arc::new(registry_with(voter, campaign));

        let handles: Vec<_> = (0..ATTEMPTS)
            .map(|i| {
                let registry = Arc::clone(&registry);
                let did = did.clone();
                let candidate = candidates[i % candidates.len()].clone();
                tokio::spawn(async move {
                    cast_vote(&*registry, did.as_str(), &candidate, Utc::now()).await
                })
            })
            .collect();

        let mut successes = 0;
        let mut already_voted = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(VoteError::AlreadyVoted) => already_voted += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(already_voted, ATTEMPTS - 1);

        // Exactly one committed candidate remains on the record.
        let record = registry.voter(&did).unwrap();
        assert!(record.voted);
        assert!(candidates.contains(record.candidate.as_ref().unwrap()));
    }
}
