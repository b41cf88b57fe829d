//! Todo list and blog served over a PocketBase backend.
//!
//! The backend owns storage, authentication and access rules. This crate
//! declares the collections, talks to the record API, keeps the session in
//! sync with the `pb_auth` cookie, and loads page data per request.

pub mod auth;
pub mod collections;
pub mod config;
pub mod error;
pub mod handler;
pub mod loader;
pub mod middleware;
pub mod migrations;
pub mod model;
pub mod pocketbase;
pub mod route;
pub mod schema;
pub mod seed;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

use config::Config;

// Struct representing the application state
pub struct AppState {
    pub config: Config,
}
