use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{http::Status, response::Responder};
use thiserror::Error;

use crate::ballot::VoteError;
use crate::identity::{EpochError, IdentityError, SessionError};

pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type: everything a route can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Epoch(#[from] EpochError),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error(transparent)]
    Vote(#[from] VoteError),
    #[error("{1}")]
    Status(Status, String),
}

impl Error {
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::Status(Status::NotFound, format!("{} not found", what))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Status(Status::Unauthorized, msg.into())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        let status = match &self {
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Session(SessionError::EntropyUnavailable) => Status::InternalServerError,
            Self::Epoch(_) => Status::BadGateway,
            Self::Identity(err) => match err {
                IdentityError::SeedMissing
                | IdentityError::MalformedDid(_)
                | IdentityError::MalformedSalt
                | IdentityError::Token(_) => Status::BadRequest,
                IdentityError::AuthenticationFailed => Status::InternalServerError,
            },
            Self::Vote(err) => match err {
                VoteError::InvalidDid(_) | VoteError::UnknownCandidate(_) => Status::BadRequest,
                VoteError::NotFound(_) | VoteError::CampaignNotFound(_) => Status::NotFound,
                VoteError::NotVerified
                | VoteError::NoCampaignAssigned
                | VoteError::VotingNotActive => Status::Forbidden,
                VoteError::AlreadyVoted => Status::Conflict,
                VoteError::Store(_) => Status::InternalServerError,
            },
            Self::Status(status, _) => *status,
        };
        match status.class() {
            rocket::http::StatusClass::ServerError => error!("{self}"),
            _ => warn!("{self}"),
        }
        Err(status)
    }
}
