use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::campaign::{Campaign, Candidate, NewCampaign},
};

/// Specification for creating a campaign. Candidates are added separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSpec {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl From<CampaignSpec> for NewCampaign {
    fn from(spec: CampaignSpec) -> Self {
        Self {
            title: spec.title,
            description: spec.description,
            start_time: spec.start_time,
            end_time: spec.end_time,
            candidates: Vec::new(),
        }
    }
}

/// Specification for adding a candidate to a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub party: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_symbol_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

impl CandidateSpec {
    /// Assign a fresh ID and turn the spec into a stored candidate.
    pub fn into_candidate(self) -> Candidate {
        Candidate {
            id: ObjectId::new().to_hex(),
            name: self.name,
            party: self.party,
            party_symbol_url: self.party_symbol_url,
            photo_url: self.photo_url,
        }
    }
}

/// An API-friendly campaign description, including the candidate list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignDescription {
    /// Campaign unique ID.
    pub id: ApiId,
    /// Campaign title.
    pub title: String,
    /// Campaign description.
    pub description: String,
    /// Voting window start.
    pub start_time: DateTime<Utc>,
    /// Voting window end.
    pub end_time: DateTime<Utc>,
    /// Candidates standing in this campaign.
    pub candidates: Vec<Candidate>,
}

impl From<Campaign> for CampaignDescription {
    fn from(campaign: Campaign) -> Self {
        Self {
            id: campaign.id.into(),
            title: campaign.campaign.title,
            description: campaign.campaign.description,
            start_time: campaign.campaign.start_time,
            end_time: campaign.campaign.end_time,
            candidates: campaign.campaign.candidates,
        }
    }
}

/// A summary of a campaign, shorter than the full description; this is what
/// the public registration page lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignSummary {
    /// Campaign unique ID.
    pub id: ApiId,
    /// Campaign title.
    pub title: String,
    /// Campaign description.
    pub description: String,
    /// Voting window start.
    pub start_time: DateTime<Utc>,
    /// Voting window end.
    pub end_time: DateTime<Utc>,
}

impl From<Campaign> for CampaignSummary {
    fn from(campaign: Campaign) -> Self {
        Self {
            id: campaign.id.into(),
            title: campaign.campaign.title,
            description: campaign.campaign.description,
            start_time: campaign.campaign.start_time,
            end_time: campaign.campaign.end_time,
        }
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl CampaignSpec {
        pub fn example() -> Self {
            Self {
                title: "Student Union President".to_string(),
                description: "Annual election of the student union president".to_string(),
                start_time: Utc::now() - Duration::hours(1),
                end_time: Utc::now() + Duration::hours(1),
            }
        }
    }

    impl CandidateSpec {
        pub fn example() -> Self {
            Self {
                name: "Alice Atkins".to_string(),
                party: "Party A".to_string(),
                party_symbol_url: None,
                photo_url: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_campaigns_start_with_no_candidates() {
        let campaign: NewCampaign = CampaignSpec::example().into();
        assert!(campaign.candidates.is_empty());
    }

    #[test]
    fn added_candidates_get_unique_ids() {
        let first = CandidateSpec::example().into_candidate();
        let second = CandidateSpec::example().into_candidate();
        assert_ne!(first.id, second.id);
        assert_eq!(first.name, second.name);
    }
}
