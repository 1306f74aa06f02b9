//! Local air quality for a menu-bar style monitor.
//!
//! A [`coordinator::LocationCoordinator`] finds where the user is, names the
//! place, fetches current pollutant levels from Open-Meteo and publishes the
//! result as a [`models::SessionState`] for whatever front end is attached.

pub mod api;
pub mod aqi;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod geocode;
pub mod location;
pub mod logging;
pub mod models;
