#[macro_use]
extern crate rocket;
#[macro_use]
extern crate diesel;
#[macro_use]
extern crate diesel_migrations;

pub mod catchers;
pub mod configuration;
pub mod cors;
pub mod domain;
pub mod feed;
pub mod guards;
pub mod models;
pub mod port_saver;
pub mod preferences;
pub mod push;
pub mod retention;
pub mod routes;
pub mod schema;
pub mod startup;
pub mod store;
pub mod sweeper;
pub mod telemetry;
