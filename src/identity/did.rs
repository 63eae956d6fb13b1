use std::fmt::Display;
use std::str::FromStr;

use ed25519_dalek::{
    Signature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH, SECRET_KEY_LENGTH,
};
use serde::{Deserialize, Serialize};

use super::IdentityError;

/// Multicodec prefix for an Ed25519 public key.
const ED25519_MULTICODEC: [u8; 2] = [0xed, 0x01];
/// Multibase prefix for base58btc.
const BASE58_MULTIBASE: &str = "z";
/// The DID method we mint identifiers under.
const KEY_METHOD_PREFIX: &str = "did:key:";

/// The fixed message signed during DID authentication. Any message would do;
/// what matters is that the resolved key verifies a signature from the seed.
const AUTHENTICATION_PROBE: &[u8] = b"did resolution self-check";

/// A decentralized identifier.
///
/// Structural validity (`did:<method>:<id>`) is checked at every boundary
/// where a string becomes a `Did`; only `did:key` identifiers can be resolved
/// to a public key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Did(String);

impl Did {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive the `did:key` identifier for the given key seed, then
    /// authenticate it: resolve the identifier back to a public key and check
    /// that the resolved key verifies a signature made with the seed key.
    ///
    /// The seed must be exactly 32 bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, IdentityError> {
        let seed: &[u8; SECRET_KEY_LENGTH] =
            seed.try_into().map_err(|_| IdentityError::SeedMissing)?;
        let signing_key = SigningKey::from_bytes(seed);
        let did = Self::from_verifying_key(&signing_key.verifying_key());

        // Authenticate before handing the identifier out.
        let resolved = did.resolve()?;
        let signature: Signature = signing_key.sign(AUTHENTICATION_PROBE);
        resolved
            .verify(AUTHENTICATION_PROBE, &signature)
            .map_err(|_| IdentityError::AuthenticationFailed)?;

        Ok(did)
    }

    /// The `did:key` identifier for an Ed25519 public key:
    /// multibase-base58btc over the multicodec-prefixed key bytes.
    pub fn from_verifying_key(key: &VerifyingKey) -> Self {
        let mut prefixed = Vec::with_capacity(ED25519_MULTICODEC.len() + PUBLIC_KEY_LENGTH);
        prefixed.extend_from_slice(&ED25519_MULTICODEC);
        prefixed.extend_from_slice(key.as_bytes());
        Self(format!(
            "{KEY_METHOD_PREFIX}{BASE58_MULTIBASE}{}",
            bs58::encode(prefixed).into_string()
        ))
    }

    /// Resolve a `did:key` identifier back to its public key.
    pub fn resolve(&self) -> Result<VerifyingKey, IdentityError> {
        let malformed = || IdentityError::MalformedDid(self.0.clone());
        let encoded = self
            .0
            .strip_prefix(KEY_METHOD_PREFIX)
            .and_then(|rest| rest.strip_prefix(BASE58_MULTIBASE))
            .ok_or_else(malformed)?;
        let bytes = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| malformed())?;
        let key_bytes = bytes
            .strip_prefix(&ED25519_MULTICODEC[..])
            .ok_or_else(malformed)?;
        let key_bytes: &[u8; PUBLIC_KEY_LENGTH] =
            key_bytes.try_into().map_err(|_| malformed())?;
        VerifyingKey::from_bytes(key_bytes).map_err(|_| malformed())
    }
}

impl Display for Did {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Did {
    type Err = IdentityError;

    /// Check general DID syntax: `did:<method>:<method-specific-id>`, with a
    /// lowercase alphanumeric method and a non-empty identifier.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || IdentityError::MalformedDid(s.to_string());
        let rest = s.strip_prefix("did:").ok_or_else(malformed)?;
        let (method, id) = rest.split_once(':').ok_or_else(malformed)?;
        if method.is_empty()
            || !method
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        {
            return Err(malformed());
        }
        if id.is_empty()
            || !id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '%'))
        {
            return Err(malformed());
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for Did {
    type Error = IdentityError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Did> for String {
    fn from(did: Did) -> Self {
        did.0
    }
}

impl<'a> rocket::request::FromParam<'a> for Did {
    type Error = IdentityError;

    fn from_param(param: &'a str) -> Result<Self, Self::Error> {
        param.parse()
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl Did {
        pub fn example_seed() -> [u8; SECRET_KEY_LENGTH] {
            [7; SECRET_KEY_LENGTH]
        }

        pub fn example() -> Self {
            Self::from_seed(&Self::example_seed()).unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let did = Did::from_seed(&Did::example_seed()).unwrap();
        let again = Did::from_seed(&Did::example_seed()).unwrap();
        assert_eq!(did, again);
        assert!(did.as_str().starts_with("did:key:z"));
    }

    #[test]
    fn different_seeds_give_different_dids() {
        let did = Did::from_seed(&[1; SECRET_KEY_LENGTH]).unwrap();
        let other = Did::from_seed(&[2; SECRET_KEY_LENGTH]).unwrap();
        assert_ne!(did, other);
    }

    #[test]
    fn short_or_missing_seeds_are_rejected() {
        assert!(matches!(
            Did::from_seed(&[]),
            Err(IdentityError::SeedMissing)
        ));
        assert!(matches!(
            Did::from_seed(&[0; 31]),
            Err(IdentityError::SeedMissing)
        ));
        assert!(matches!(
            Did::from_seed(&[0; 33]),
            Err(IdentityError::SeedMissing)
        ));
    }

    #[test]
    fn resolves_to_the_seed_public_key() {
        let seed = Did::example_seed();
        let did = Did::from_seed(&seed).unwrap();
        let resolved = did.resolve().unwrap();
        assert_eq!(
            resolved,
            SigningKey::from_bytes(&seed).verifying_key()
        );
    }

    #[test]
    fn parse_accepts_foreign_methods() {
        assert!("did:web:example.com".parse::<Did>().is_ok());
        assert!("did:key:zAbc123".parse::<Did>().is_ok());
    }

    #[test]
    fn parse_rejects_malformed_strings() {
        for bad in ["", "did:", "did:key", "did::abc", "DID:key:zAbc", "did:KEY:zAbc", "key:zAbc"] {
            assert!(
                matches!(bad.parse::<Did>(), Err(IdentityError::MalformedDid(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn resolve_rejects_non_key_methods() {
        let did: Did = "did:web:example.com".parse().unwrap();
        assert!(matches!(
            did.resolve(),
            Err(IdentityError::MalformedDid(_))
        ));
    }
}
