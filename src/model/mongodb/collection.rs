use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    admin::{Admin, NewAdmin},
    campaign::{Campaign, NewCampaign},
    voter::{NewVoter, Voter},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Admin collections
const ADMINS: &str = "admins";
impl MongoCollection for Admin {
    const NAME: &'static str = ADMINS;
}
impl MongoCollection for NewAdmin {
    const NAME: &'static str = ADMINS;
}

// Voter collections
const VOTERS: &str = "voters";
impl MongoCollection for Voter {
    const NAME: &'static str = VOTERS;
}
impl MongoCollection for NewVoter {
    const NAME: &'static str = VOTERS;
}

// Campaign collections
const CAMPAIGNS: &str = "campaigns";
impl MongoCollection for Campaign {
    const NAME: &'static str = CAMPAIGNS;
}
impl MongoCollection for NewCampaign {
    const NAME: &'static str = CAMPAIGNS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();
    // The address is only present once the voter has completed an OAuth
    // login, so the unique index must be sparse.
    let unique_sparse = IndexOptions::builder().unique(true).sparse(true).build();

    // Voter collection: one record per DID, per phone number, per address.
    let did_index = IndexModel::builder()
        .keys(doc! {"did": 1})
        .options(unique.clone())
        .build();
    let sms_index = IndexModel::builder()
        .keys(doc! {"sms_hmac": 1})
        .options(unique.clone())
        .build();
    let address_index = IndexModel::builder()
        .keys(doc! {"address": 1})
        .options(unique_sparse)
        .build();
    Coll::<Voter>::from_db(db)
        .create_indexes([did_index, sms_index, address_index], None)
        .await?;

    // Admin collection: unique usernames.
    let username_index = IndexModel::builder()
        .keys(doc! {"username": 1})
        .options(unique)
        .build();
    Coll::<Admin>::from_db(db)
        .create_indexes([username_index], None)
        .await?;

    Ok(())
}
