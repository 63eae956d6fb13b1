//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Datetimes are serialised as RFC 3339 timestamps.

pub mod admin;
pub mod auth;
pub mod campaign;
pub mod id;
pub mod login;
pub mod otp;
pub mod sms;
pub mod voter;
pub mod voting;
