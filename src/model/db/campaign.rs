use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Our candidate IDs are strings (hex record IDs assigned at creation).
pub type CandidateId = String;

/// A candidate standing in a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Candidate unique ID within the campaign.
    pub id: CandidateId,
    /// Display name.
    pub name: String,
    /// Party label.
    pub party: String,
    /// Object-storage reference for the party symbol, if uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub party_symbol_url: Option<String>,
    /// Object-storage reference for the candidate photo, if uploaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Core campaign data, as stored in the database.
///
/// The window is read-only from the vote flow's perspective; nothing here
/// enforces immutability once voting has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCore {
    /// Campaign title.
    pub title: String,
    /// Campaign description.
    pub description: String,
    /// Voting window start.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting window end.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Candidates standing in this campaign.
    pub candidates: Vec<Candidate>,
}

impl CampaignCore {
    /// Is the voting window open at the given instant?
    /// The window is inclusive at both ends.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Find a candidate by ID.
    pub fn candidate(&self, candidate_id: &str) -> Option<&Candidate> {
        self.candidates
            .iter()
            .find(|candidate| candidate.id == candidate_id)
    }
}

/// A campaign without an ID.
pub type NewCampaign = CampaignCore;

/// A campaign from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub campaign: CampaignCore,
}

impl Deref for Campaign {
    type Target = CampaignCore;

    fn deref(&self) -> &Self::Target {
        &self.campaign
    }
}

impl DerefMut for Campaign {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.campaign
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Candidate {
        pub fn example1() -> Self {
            Self {
                id: "63415f44ef1fafa7b0173ba0".to_string(),
                name: "Alice Atkins".to_string(),
                party: "Party A".to_string(),
                party_symbol_url: None,
                photo_url: None,
            }
        }

        pub fn example2() -> Self {
            Self {
                id: "63415f4b92925ab476cc18c7".to_string(),
                name: "Bob Burton".to_string(),
                party: "Party B".to_string(),
                party_symbol_url: None,
                photo_url: None,
            }
        }
    }

    impl CampaignCore {
        /// A campaign whose window is currently open.
        pub fn example_open() -> Self {
            Self {
                title: "Student Union President".to_string(),
                description: "Annual election of the student union president".to_string(),
                start_time: Utc::now() - Duration::hours(1),
                end_time: Utc::now() + Duration::hours(1),
                candidates: vec![Candidate::example1(), Candidate::example2()],
            }
        }

    }

    impl Campaign {
        pub fn example_open() -> Self {
            Self {
                id: Id::new(),
                campaign: CampaignCore::example_open(),
            }
        }
    }
}
