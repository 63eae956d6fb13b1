use serde::{Deserialize, Serialize};

/// First phase of the login protocol: everything the client needs to carry
/// to the OAuth provider. The matching private material stays in the session
/// cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginChallenge {
    /// Base64 of the ephemeral Ed25519 public key.
    pub public_key: String,
    /// The nonce binding this login attempt to that key.
    pub nonce: String,
    /// The last epoch at which the ephemeral key is valid.
    pub max_epoch: u64,
}

/// Second phase of the login protocol: the identity token the provider
/// returned after the redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCompleteRequest {
    pub id_token: String,
}

/// The outcome of a completed login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityResponse {
    /// The derived platform address.
    pub address: String,
    /// Whether a registered voter record carries this address.
    pub registered: bool,
}
