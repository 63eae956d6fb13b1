use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::{rngs::OsRng, RngCore};
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use crate::identity::{Did, IdentityError};

use super::{sign, CredentialBody, CredentialClaims, CredentialError, CredentialSubject};

/// Where the issuer key lives, relative to the tool's working directory.
pub const DEFAULT_KEY_PATH: &str = "keys/issuer-key.json";

/// The issuer's key material, as stored on disk.
///
/// Generating this is a one-time, irreversible step: the issuer DID is
/// derived from the key, so replacing the key replaces the DID and orphans
/// every outstanding credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerKey {
    /// The issuer DID, derived from the public key.
    pub did: Did,
    /// Base58 of the 32-byte signing key seed.
    #[serde(rename = "privateKeyBase58")]
    pub private_key_base58: String,
    /// Multibase (base58btc) of the public key.
    #[serde(rename = "publicKeyMultibase")]
    pub public_key_multibase: String,
}

impl IssuerKey {
    /// Generate fresh issuer key material.
    pub fn generate() -> Result<Self, CredentialError> {
        let mut seed = [0; SECRET_KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|_| CredentialError::EntropyUnavailable)?;
        Ok(Self::from_seed(seed))
    }

    /// Build the key material for a known seed.
    fn from_seed(seed: [u8; SECRET_KEY_LENGTH]) -> Self {
        let signing_key = SigningKey::from_bytes(&seed);
        let verifying_key = signing_key.verifying_key();
        // Unwrap safe: the seed is exactly 32 bytes by construction.
        let did = Did::from_seed(&seed).unwrap();
        Self {
            did,
            private_key_base58: bs58::encode(seed).into_string(),
            public_key_multibase: format!("z{}", bs58::encode(verifying_key.as_bytes()).into_string()),
        }
    }

    /// Load the key material from `path`, failing with `KeyMaterialMissing`
    /// if it has not been generated yet.
    pub fn load(path: &Path) -> Result<Self, CredentialError> {
        let contents = fs::read_to_string(path)
            .map_err(|_| CredentialError::KeyMaterialMissing(path.display().to_string()))?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the key material to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Unwrap safe: the key material always serialises.
        fs::write(path, serde_json::to_string_pretty(self).unwrap())
    }

    /// The signing key behind this issuer.
    pub fn signing_key(&self) -> Result<SigningKey, CredentialError> {
        let seed = bs58::decode(&self.private_key_base58)
            .into_vec()
            .map_err(|_| IdentityError::SeedMissing)?;
        let seed: [u8; SECRET_KEY_LENGTH] =
            seed.try_into().map_err(|_| IdentityError::SeedMissing)?;
        Ok(SigningKey::from_bytes(&seed))
    }

    /// Issue a credential binding the subject attributes to the subject DID,
    /// valid from `not_before`.
    pub fn issue(
        &self,
        subject: CredentialSubject,
        not_before: DateTime<Utc>,
    ) -> Result<String, CredentialError> {
        let claims = CredentialClaims {
            sub: subject.id.clone(),
            nbf: not_before,
            iss: self.did.clone(),
            vc: CredentialBody::new(subject),
        };
        sign(&claims, &self.signing_key()?)
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl IssuerKey {
        pub fn example() -> Self {
            Self::from_seed([42; SECRET_KEY_LENGTH])
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::credential::verify;
    use crate::model::db::voter::RegistrationDetails;

    use super::*;

    #[test]
    fn issued_credentials_verify_against_the_issuer() {
        let issuer = IssuerKey::example();
        let subject = CredentialSubject::new(Did::example(), RegistrationDetails::example());
        let token = issuer.issue(subject.clone(), Utc::now()).unwrap();

        let claims = verify(&token).unwrap();
        assert_eq!(claims.iss, issuer.did);
        assert_eq!(claims.sub, subject.id);
        assert_eq!(claims.vc.credential_subject, subject);
    }

    #[test]
    fn generated_keys_are_self_consistent() {
        let issuer = IssuerKey::generate().unwrap();
        let resolved = issuer.did.resolve().unwrap();
        assert_eq!(resolved, issuer.signing_key().unwrap().verifying_key());
        assert_eq!(
            issuer.public_key_multibase,
            format!("z{}", bs58::encode(resolved.as_bytes()).into_string())
        );
    }

    #[test]
    fn save_and_load_roundtrip() {
        let issuer = IssuerKey::example();
        let dir = std::env::temp_dir().join(format!("issuer-key-test-{}", rand::random::<u32>()));
        let path = dir.join("issuer-key.json");

        issuer.save(&path).unwrap();
        let loaded = IssuerKey::load(&path).unwrap();
        assert_eq!(loaded, issuer);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_key_material_is_a_typed_error() {
        let missing = Path::new("/definitely/not/a/real/key/path.json");
        assert!(matches!(
            IssuerKey::load(missing),
            Err(CredentialError::KeyMaterialMissing(_))
        ));
    }
}
