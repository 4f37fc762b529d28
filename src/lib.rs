//! Record received APRS packets into PostgreSQL/PostGIS

pub mod config;
pub mod database;
pub mod errors;
pub mod freqmap;
pub mod models;
pub mod mqtt;
pub mod sanitize;
