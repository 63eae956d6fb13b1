use chrono::{serde::ts_seconds, DateTime, Utc};
use data_encoding::BASE64URL_NOPAD;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier};
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};

use crate::identity::Did;
use crate::model::db::voter::RegistrationDetails;

use super::CredentialError;

/// The W3C credentials context.
pub const CREDENTIAL_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";

/// The credential types we issue.
pub const CREDENTIAL_TYPES: [&str; 2] = ["VerifiableCredential", "VoterCredential"];

/// The fixed JWS protected header. Serialised once, by hand, so the signing
/// input bytes are stable across releases.
const JWS_HEADER: &str = r#"{"alg":"EdDSA","typ":"JWT"}"#;

/// The attribute set a credential attests, bound to the subject DID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSubject {
    pub id: Did,
    #[serde(rename = "voterId")]
    pub voter_id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    #[serde(rename = "relationName")]
    pub relation_name: String,
    #[serde(rename = "dateOfBirth")]
    pub date_of_birth: String,
    pub gender: String,
    pub address: String,
}

impl CredentialSubject {
    /// Bind registration attributes to a subject DID.
    pub fn new(id: Did, details: RegistrationDetails) -> Self {
        Self {
            id,
            voter_id: details.voter_id,
            full_name: details.full_name,
            relation_name: details.relation_name,
            date_of_birth: details.date_of_birth,
            gender: details.gender,
            address: details.address,
        }
    }
}

/// The `vc` claim body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialBody {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    #[serde(rename = "credentialSubject")]
    pub credential_subject: CredentialSubject,
}

impl CredentialBody {
    pub fn new(subject: CredentialSubject) -> Self {
        Self {
            context: vec![CREDENTIAL_CONTEXT.to_string()],
            types: CREDENTIAL_TYPES.iter().map(|s| s.to_string()).collect(),
            credential_subject: subject,
        }
    }
}

/// The signed claims of a credential token.
///
/// Canonical encoding: serde_json over this struct emits fields in
/// declaration order, so the same claims always produce the same payload
/// bytes. Only `nbf` varies between issuances of the same attribute set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialClaims {
    /// Subject DID.
    pub sub: Did,
    /// Not-before timestamp.
    #[serde(with = "ts_seconds")]
    pub nbf: DateTime<Utc>,
    /// Issuer DID.
    pub iss: Did,
    /// The credential itself.
    pub vc: CredentialBody,
}

/// The header fields we look at when verifying.
#[derive(Debug, Deserialize)]
struct HeaderFields {
    alg: String,
}

/// Sign the claims into a compact EdDSA JWS.
pub fn sign(claims: &CredentialClaims, key: &SigningKey) -> Result<String, CredentialError> {
    let header = BASE64URL_NOPAD.encode(JWS_HEADER.as_bytes());
    let payload = BASE64URL_NOPAD.encode(&serde_json::to_vec(claims)?);
    let signing_input = format!("{header}.{payload}");
    let signature: Signature = key.sign(signing_input.as_bytes());
    Ok(format!(
        "{signing_input}.{}",
        BASE64URL_NOPAD.encode(&signature.to_bytes())
    ))
}

/// Verify a credential token against the issuer DID it embeds.
///
/// Any altered byte of the payload (or header, or signature) fails; a
/// credential needs nothing but itself to verify, since the issuer DID
/// resolves to the issuer's public key.
pub fn verify(token: &str) -> Result<CredentialClaims, CredentialError> {
    let mut parts = token.split('.');
    let (header, payload, signature) = match (parts.next(), parts.next(), parts.next(), parts.next())
    {
        (Some(header), Some(payload), Some(signature), None) => (header, payload, signature),
        _ => return Err(CredentialError::Malformed),
    };

    // Check the declared algorithm.
    let header_bytes = BASE64URL_NOPAD
        .decode(header.as_bytes())
        .map_err(|_| CredentialError::Malformed)?;
    let fields: HeaderFields =
        serde_json::from_slice(&header_bytes).map_err(|_| CredentialError::Malformed)?;
    if fields.alg != "EdDSA" {
        return Err(CredentialError::UnsupportedAlgorithm(fields.alg));
    }

    // Decode the claims.
    let payload_bytes = BASE64URL_NOPAD
        .decode(payload.as_bytes())
        .map_err(|_| CredentialError::Malformed)?;
    let claims: CredentialClaims = serde_json::from_slice(&payload_bytes)?;

    // Resolve the issuer and check the signature over the signing input.
    let issuer_key = claims.iss.resolve()?;
    let signature_bytes = BASE64URL_NOPAD
        .decode(signature.as_bytes())
        .map_err(|_| CredentialError::Malformed)?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| CredentialError::Malformed)?;
    let signing_input = format!("{header}.{payload}");
    issuer_key
        .verify(signing_input.as_bytes(), &signature)
        .map_err(|_| CredentialError::BadSignature)?;

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use crate::credential::IssuerKey;
    use crate::model::db::voter::RegistrationDetails;

    use super::*;

    fn example_claims(issuer: &IssuerKey) -> CredentialClaims {
        let subject = CredentialSubject::new(Did::example(), RegistrationDetails::example());
        CredentialClaims {
            sub: subject.id.clone(),
            nbf: Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap(),
            iss: issuer.did.clone(),
            vc: CredentialBody::new(subject),
        }
    }

    #[test]
    fn roundtrips_through_sign_and_verify() {
        let issuer = IssuerKey::example();
        let claims = example_claims(&issuer);
        let token = sign(&claims, &issuer.signing_key().unwrap()).unwrap();

        let verified = verify(&token).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn signing_is_deterministic() {
        let issuer = IssuerKey::example();
        let claims = example_claims(&issuer);
        let key = issuer.signing_key().unwrap();
        assert_eq!(sign(&claims, &key).unwrap(), sign(&claims, &key).unwrap());
    }

    #[test]
    fn tampered_payloads_fail_verification() {
        let issuer = IssuerKey::example();
        let claims = example_claims(&issuer);
        let token = sign(&claims, &issuer.signing_key().unwrap()).unwrap();

        // Swap the attested name inside the payload segment.
        let mut parts = token.split('.');
        let (header, payload, signature) = (
            parts.next().unwrap(),
            parts.next().unwrap(),
            parts.next().unwrap(),
        );
        let decoded = BASE64URL_NOPAD.decode(payload.as_bytes()).unwrap();
        let tampered_json =
            String::from_utf8(decoded).unwrap().replace("Carol", "Mallory");
        let tampered = format!(
            "{header}.{}.{signature}",
            BASE64URL_NOPAD.encode(tampered_json.as_bytes())
        );

        assert!(matches!(
            verify(&tampered),
            Err(CredentialError::BadSignature)
        ));
    }

    #[test]
    fn wrong_issuer_fails_verification() {
        let issuer = IssuerKey::example();
        let mut claims = example_claims(&issuer);
        // Claim to be issued by somebody else entirely.
        claims.iss = Did::from_seed(&[9; 32]).unwrap();
        let token = sign(&claims, &issuer.signing_key().unwrap()).unwrap();

        assert!(matches!(
            verify(&token),
            Err(CredentialError::BadSignature)
        ));
    }

    #[test]
    fn rejects_structurally_bad_tokens() {
        assert!(matches!(
            verify("not-a-jwt"),
            Err(CredentialError::Malformed)
        ));
        assert!(matches!(
            verify("a.b.c.d"),
            Err(CredentialError::Malformed)
        ));
    }

    #[test]
    fn rejects_foreign_algorithms() {
        let issuer = IssuerKey::example();
        let claims = example_claims(&issuer);
        let token = sign(&claims, &issuer.signing_key().unwrap()).unwrap();
        let payload_and_sig = token.split_once('.').unwrap().1;

        let hs256_header = BASE64URL_NOPAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let forged = format!("{hs256_header}.{payload_and_sig}");
        assert!(matches!(
            verify(&forged),
            Err(CredentialError::UnsupportedAlgorithm(alg)) if alg == "HS256"
        ));
    }
}
