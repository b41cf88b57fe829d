//! Environment configuration.
//!
//! The backend is reachable under two names: the public URL the browser and
//! the seeding scripts use, and an internal URL for server-side rendering
//! (e.g. the docker network alias).

use std::net::SocketAddr;

use crate::error::AppError;

pub const DEFAULT_SERVER_URL: &str = "http://pocketbase:8090";
pub const DEFAULT_PUBLIC_URL: &str = "http://localhost:8090";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_SEED_USERS_FILE: &str = "./pocketbase/pb_schema/seed_users.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend URL used by page loaders running on the server.
    pub server_url: String,
    /// Backend URL handed to browser-side clients and scripts.
    pub public_url: String,
    pub bind_addr: SocketAddr,
    pub cors_origin: String,
}

impl Config {
    /// Build config from environment variables, loading `.env` first if present.
    ///
    /// Optional:
    /// - `POCKETBASE_URL`: default `http://pocketbase:8090`
    /// - `PUBLIC_POCKETBASE_URL`: default `http://localhost:8090`
    /// - `BIND_ADDR`: default `127.0.0.1:3000`
    /// - `CORS_ORIGIN`: default `http://localhost:3000`
    pub fn from_env() -> Result<Self, AppError> {
        dotenv::dotenv().ok();

        let bind_raw = env_or("BIND_ADDR", DEFAULT_BIND_ADDR);
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| AppError::Config(format!("invalid BIND_ADDR: {bind_raw}")))?;

        Ok(Self {
            server_url: trim_url(&env_or("POCKETBASE_URL", DEFAULT_SERVER_URL)),
            public_url: trim_url(&env_or("PUBLIC_POCKETBASE_URL", DEFAULT_PUBLIC_URL)),
            bind_addr,
            cors_origin: env_or("CORS_ORIGIN", DEFAULT_CORS_ORIGIN),
        })
    }
}

/// Read `key`, treating unset and blank values alike.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn trim_url(raw: &str) -> String {
    raw.trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
