use std::ops::{Deref, DerefMut};

use chrono::{DateTime, NaiveDate, Utc};
use hmac::{digest::Output, Hmac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::identity::Did;
use crate::model::{
    api::sms::Sms,
    db::campaign::CandidateId,
    mongodb::{opt_chrono_datetime_as_bson_datetime, Id},
};
use crate::Config;

pub type HmacSha256 = Hmac<Sha256>;

/// Government-ID registration attributes, as submitted at registration and
/// attested by the voter's credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationDetails {
    /// Government-issued voter ID: three uppercase letters then seven digits.
    pub voter_id: String,
    /// Full name.
    pub full_name: String,
    /// Father's/mother's/husband's name.
    pub relation_name: String,
    /// Date of birth, `dd/mm/yyyy`.
    pub date_of_birth: String,
    /// Gender.
    pub gender: String,
    /// Residential address.
    pub address: String,
}

pub const VOTER_ID_LETTERS: usize = 3;
pub const VOTER_ID_DIGITS: usize = 7;
pub const MIN_ADDRESS_LENGTH: usize = 20;

impl RegistrationDetails {
    /// Reject malformed attributes before anything touches the database.
    pub fn validate(&self) -> Result<(), DetailsError> {
        let letters = self.voter_id.chars().take_while(|c| c.is_ascii_uppercase());
        let digits = self
            .voter_id
            .chars()
            .skip(VOTER_ID_LETTERS)
            .take_while(|c| c.is_ascii_digit());
        if self.voter_id.chars().count() != VOTER_ID_LETTERS + VOTER_ID_DIGITS
            || letters.count() < VOTER_ID_LETTERS
            || digits.count() != VOTER_ID_DIGITS
        {
            return Err(DetailsError::InvalidVoterId(self.voter_id.clone()));
        }
        if NaiveDate::parse_from_str(&self.date_of_birth, "%d/%m/%Y").is_err() {
            return Err(DetailsError::InvalidDateOfBirth(self.date_of_birth.clone()));
        }
        if self.address.trim().len() < MIN_ADDRESS_LENGTH {
            return Err(DetailsError::AddressTooShort);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum DetailsError {
    #[error("voter ID '{0}' must be {VOTER_ID_LETTERS} uppercase letters followed by {VOTER_ID_DIGITS} digits")]
    InvalidVoterId(String),
    #[error("date of birth '{0}' must be in dd/mm/yyyy format")]
    InvalidDateOfBirth(String),
    #[error("residential address must be at least {MIN_ADDRESS_LENGTH} characters")]
    AddressTooShort,
}

/// Core voter data, as stored in the database.
///
/// The vote fields (`voted`, `candidate`, `voted_at`) are only ever written
/// by the guarded commit in [`crate::ballot`]; `verified` is only ever raised
/// by an explicit admin action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterCore {
    /// The voter's decentralized identifier.
    pub did: Did,
    /// The voter's OAuth-derived address, once they have completed a login.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// HMAC of the voter's SMS number; the number itself is never stored.
    pub sms_hmac: Output<HmacSha256>,
    /// Registration attributes.
    pub details: RegistrationDetails,
    /// The campaign this voter registered for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<Id>,
    /// Has an administrator verified this registration against the uploaded
    /// ID documents?
    pub verified: bool,
    /// Has this voter cast their ballot?
    pub voted: bool,
    /// The committed candidate, set together with `voted`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<CandidateId>,
    /// When the ballot was committed, set together with `voted`.
    #[serde(
        default,
        with = "opt_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub voted_at: Option<DateTime<Utc>>,
}

impl VoterCore {
    /// Create a new voter in the `Registered` state.
    pub fn new(
        did: Did,
        sms: Sms,
        details: RegistrationDetails,
        campaign_id: Id,
        address: Option<String>,
        config: &Config,
    ) -> Self {
        Self {
            did,
            address,
            // Do not directly store potentially sensitive phone number data.
            sms_hmac: sms.into_hmac(config),
            details,
            campaign_id: Some(campaign_id),
            verified: false,
            voted: false,
            candidate: None,
            voted_at: None,
        }
    }
}

/// A voter without an ID.
pub type NewVoter = VoterCore;

/// A voter from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub voter: VoterCore,
}

impl Deref for Voter {
    type Target = VoterCore;

    fn deref(&self) -> &Self::Target {
        &self.voter
    }
}

impl DerefMut for Voter {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.voter
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl RegistrationDetails {
        pub fn example() -> Self {
            Self {
                voter_id: "ABC1234567".to_string(),
                full_name: "Carol Chan".to_string(),
                relation_name: "Dave Chan".to_string(),
                date_of_birth: "29/02/2000".to_string(),
                gender: "F".to_string(),
                address: "1 Long Enough Street, Sometown, SM1 2AB".to_string(),
            }
        }
    }

    impl VoterCore {
        pub fn example(config: &Config) -> Self {
            Self::new(
                Did::example(),
                Sms::example(),
                RegistrationDetails::example(),
                Id::new(),
                None,
                config,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_details() {
        assert!(RegistrationDetails::example().validate().is_ok());
    }

    #[test]
    fn rejects_bad_voter_ids() {
        for voter_id in ["abc1234567", "ABCD123456", "ABC123456", "ABC12345678", ""] {
            let details = RegistrationDetails {
                voter_id: voter_id.to_string(),
                ..RegistrationDetails::example()
            };
            assert!(
                matches!(details.validate(), Err(DetailsError::InvalidVoterId(_))),
                "accepted {voter_id:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_dates_of_birth() {
        for dob in ["2000-02-29", "31/02/2000", "1/1/99x", "tomorrow"] {
            let details = RegistrationDetails {
                date_of_birth: dob.to_string(),
                ..RegistrationDetails::example()
            };
            assert!(
                matches!(details.validate(), Err(DetailsError::InvalidDateOfBirth(_))),
                "accepted {dob:?}"
            );
        }
    }

    #[test]
    fn rejects_short_addresses() {
        let details = RegistrationDetails {
            address: "too short".to_string(),
            ..RegistrationDetails::example()
        };
        assert!(matches!(
            details.validate(),
            Err(DetailsError::AddressTooShort)
        ));
    }
}
