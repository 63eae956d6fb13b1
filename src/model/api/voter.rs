use serde::{Deserialize, Serialize};

use crate::identity::Did;
use crate::model::{api::id::ApiId, db::voter::RegistrationDetails};

/// Registration attributes plus the campaign the voter is registering for.
///
/// The address is present when the voter has already been through an OAuth
/// login on this device, linking the two identity namespaces on one record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterRegistrationSpec {
    pub details: RegistrationDetails,
    pub campaign_id: ApiId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// Returned exactly once, on successful registration. The secret key never
/// leaves the device again and is never stored server-side; losing it means
/// re-registering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationReceipt {
    /// The voter's new decentralized identifier.
    pub did: Did,
    /// Base64 encoding of the 32-byte key seed behind the DID.
    pub secret_key: String,
}

/// What an administrator sees when reviewing registrations; never includes
/// the phone HMAC or vote contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterDescription {
    pub did: Did,
    pub details: RegistrationDetails,
    pub verified: bool,
    pub voted: bool,
}

impl From<crate::model::db::voter::Voter> for VoterDescription {
    fn from(voter: crate::model::db::voter::Voter) -> Self {
        Self {
            did: voter.voter.did,
            details: voter.voter.details,
            verified: voter.voter.verified,
            voted: voter.voter.voted,
        }
    }
}
