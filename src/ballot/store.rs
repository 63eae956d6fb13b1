use chrono::{DateTime, Utc};
use mongodb::bson::doc;
use mongodb::error::Error as DbError;
use rocket::request::{self, FromRequest, Request};
use thiserror::Error;

use crate::identity::Did;
use crate::model::{
    db::{campaign::Campaign, campaign::CandidateId, voter::Voter},
    mongodb::{Coll, Id},
};

/// A failure of the underlying record store.
#[derive(Debug, Error)]
#[error("record store failure: {0}")]
pub struct StoreError(Box<dyn std::error::Error + Send + Sync>);

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        Self(Box::new(err))
    }
}

/// Typed access to the records backing the vote flow.
///
/// Records are validated into [`Voter`]/[`Campaign`] at this boundary; the
/// engine never sees raw store documents. The store must execute
/// `commit_vote` as a single atomic conditional write, because that
/// conditionality is the only cross-request ordering guarantee the design
/// has.
#[rocket::async_trait]
pub trait Registry: Sync {
    /// Look up a voter by DID.
    async fn voter_by_did(&self, did: &Did) -> Result<Option<Voter>, StoreError>;

    /// Look up a campaign by ID.
    async fn campaign_by_id(&self, id: Id) -> Result<Option<Campaign>, StoreError>;

    /// Commit the vote if and only if the record's `voted` flag is still
    /// false at write time. Returns whether this call won the commit.
    async fn commit_vote(
        &self,
        did: &Did,
        candidate: &CandidateId,
        voted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// The production registry, backed by the MongoDB collections.
pub struct MongoRegistry {
    voters: Coll<Voter>,
    campaigns: Coll<Campaign>,
}

impl MongoRegistry {
    pub fn new(voters: Coll<Voter>, campaigns: Coll<Campaign>) -> Self {
        Self { voters, campaigns }
    }
}

#[rocket::async_trait]
impl Registry for MongoRegistry {
    async fn voter_by_did(&self, did: &Did) -> Result<Option<Voter>, StoreError> {
        Ok(self
            .voters
            .find_one(doc! { "did": did.as_str() }, None)
            .await?)
    }

    async fn campaign_by_id(&self, id: Id) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.find_one(id.as_doc(), None).await?)
    }

    async fn commit_vote(
        &self,
        did: &Did,
        candidate: &CandidateId,
        voted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // A single conditional update: the filter and the write are one
        // atomic document operation, so of two concurrent commits for the
        // same DID exactly one matches.
        let filter = doc! {
            "did": did.as_str(),
            "voted": false,
        };
        let update = doc! {
            "$set": {
                "voted": true,
                "candidate": candidate,
                "voted_at": mongodb::bson::DateTime::from_chrono(voted_at),
            }
        };
        let updated = self.voters.find_one_and_update(filter, update, None).await?;
        Ok(updated.is_some())
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for MongoRegistry {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let voters = req.guard::<Coll<Voter>>().await.unwrap();
        let campaigns = req.guard::<Coll<Campaign>>().await.unwrap();
        request::Outcome::Success(Self::new(voters, campaigns))
    }
}

/// An in-memory registry with the same atomic-commit contract, for tests.
#[cfg(test)]
pub struct MemoryRegistry {
    voters: std::sync::Mutex<std::collections::HashMap<String, Voter>>,
    campaigns: std::collections::HashMap<Id, Campaign>,
}

#[cfg(test)]
impl MemoryRegistry {
    pub fn new(
        voters: impl IntoIterator<Item = Voter>,
        campaigns: impl IntoIterator<Item = Campaign>,
    ) -> Self {
        Self {
            voters: std::sync::Mutex::new(
                voters
                    .into_iter()
                    .map(|voter| (voter.did.to_string(), voter))
                    .collect(),
            ),
            campaigns: campaigns
                .into_iter()
                .map(|campaign| (campaign.id, campaign))
                .collect(),
        }
    }

    /// Direct read access for assertions.
    pub fn voter(&self, did: &Did) -> Option<Voter> {
        self.voters.lock().unwrap().get(did.as_str()).cloned()
    }
}

#[cfg(test)]
#[rocket::async_trait]
impl Registry for MemoryRegistry {
    async fn voter_by_did(&self, did: &Did) -> Result<Option<Voter>, StoreError> {
        Ok(self.voter(did))
    }

    async fn campaign_by_id(&self, id: Id) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.get(&id).cloned())
    }

    async fn commit_vote(
        &self,
        did: &Did,
        candidate: &CandidateId,
        voted_at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        // The lock makes the check and the write one atomic step, mirroring
        // the conditional-update semantics of the real store.
        let mut voters = self.voters.lock().unwrap();
        match voters.get_mut(did.as_str()) {
            Some(voter) if !voter.voted => {
                voter.voted = true;
                voter.candidate = Some(candidate.clone());
                voter.voted_at = Some(voted_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
