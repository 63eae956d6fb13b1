#[macro_use]
extern crate rocket;

#[macro_use]
extern crate log;

pub mod api;
pub mod ballot;
pub mod config;
pub mod credential;
pub mod error;
pub mod identity;
pub mod logging;
pub mod model;

pub use config::Config;

use rocket::{Build, Rocket};

use crate::config::{AwsFairing, ConfigFairing, DatabaseFairing, EpochFairing};
use crate::logging::LoggerFairing;

/// Assemble the server: all routes plus the fairings that load the config
/// and construct the external service clients.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(AwsFairing)
        .attach(EpochFairing)
        .attach(LoggerFairing)
}
