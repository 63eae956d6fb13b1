use std::ops::{Deref, DerefMut};

use mongodb::error::Error as DbError;
use serde::{Deserialize, Serialize};

use crate::model::{api::admin::AdminCredentials, mongodb::Coll, mongodb::Id};

/// Core admin user data.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminCore {
    pub username: String,
    pub password_hash: String,
}

impl AdminCore {
    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        // Unwrap safe because the only way to create an AdminCore is via
        // TryFrom<AdminCredentials>, so the hash is always well-formed.
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap()
    }
}

/// An admin without an ID.
pub type NewAdmin = AdminCore;

/// An admin user from the database, with its unique ID.
#[derive(Serialize, Deserialize)]
pub struct Admin {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub admin: AdminCore,
}

impl Deref for Admin {
    type Target = AdminCore;

    fn deref(&self) -> &Self::Target {
        &self.admin
    }
}

impl DerefMut for Admin {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.admin
    }
}

/// The credentials every fresh deployment starts with; anyone deploying the
/// system is expected to log in and replace them immediately.
const BOOTSTRAP_USERNAME: &str = "admin";
const BOOTSTRAP_PASSWORD: &str = "bootstrap-me";

/// Ensure at least one admin account exists, creating the bootstrap admin on
/// a fresh database.
pub async fn ensure_admin_exists(
    admins: &Coll<Admin>,
    new_admins: &Coll<NewAdmin>,
) -> Result<(), DbError> {
    if admins.count_documents(None, None).await? == 0 {
        let bootstrap = AdminCredentials {
            username: BOOTSTRAP_USERNAME.to_string(),
            password: BOOTSTRAP_PASSWORD.to_string(),
        };
        // Unwrap safe because the bootstrap credentials meet the length requirements.
        let admin: NewAdmin = bootstrap.try_into().unwrap();
        new_admins.insert_one(admin, None).await?;
        warn!("No admin accounts found; created bootstrap admin '{BOOTSTRAP_USERNAME}'");
        warn!("Replace the bootstrap admin credentials before going live");
    }
    Ok(())
}
