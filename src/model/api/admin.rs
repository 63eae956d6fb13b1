use argon2::Config;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::db::admin::NewAdmin;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Raw admin credentials, received from a user. These are never stored
/// directly, since the password is in plaintext.
#[derive(Clone, Deserialize, Serialize)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("username must not be empty")]
    EmptyUsername,
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
}

impl TryFrom<AdminCredentials> for NewAdmin {
    type Error = CredentialsError;

    /// Convert [`AdminCredentials`] to a new admin by hashing the password.
    /// This enforces that the username is non-empty and the password meets
    /// the minimum length.
    fn try_from(cred: AdminCredentials) -> Result<Self, Self::Error> {
        if cred.username.is_empty() {
            return Err(CredentialsError::EmptyUsername);
        }
        if cred.password.len() < MIN_PASSWORD_LENGTH {
            return Err(CredentialsError::PasswordTooShort);
        }

        // 16 bytes is the recommended salt length for password hashing.
        let mut salt = [0_u8; 16];
        rand::thread_rng().fill(&mut salt);
        let password_hash =
            argon2::hash_encoded(cred.password.as_bytes(), &salt, &Config::default()).unwrap(); // Safe because the default `Config` is valid.
        Ok(Self {
            username: cred.username,
            password_hash,
        })
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl AdminCredentials {
        pub fn example1() -> Self {
            Self {
                username: "returning-officer".into(),
                password: "counts-the-votes".into(),
            }
        }

        pub fn empty() -> Self {
            Self {
                username: "".into(),
                password: "".into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_verifies() {
        let credentials = AdminCredentials::example1();
        let admin: NewAdmin = credentials.clone().try_into().unwrap();
        assert!(admin.verify_password(&credentials.password));
        assert!(!admin.verify_password("wrong password"));
    }

    #[test]
    fn rejects_weak_credentials() {
        assert!(matches!(
            NewAdmin::try_from(AdminCredentials::empty()),
            Err(CredentialsError::EmptyUsername)
        ));
        assert!(matches!(
            NewAdmin::try_from(AdminCredentials {
                username: "officer".into(),
                password: "short".into(),
            }),
            Err(CredentialsError::PasswordTooShort)
        ));
    }
}
