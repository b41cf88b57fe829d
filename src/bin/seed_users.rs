//! Create the users listed in a JSON file.
//!
//! The file holds an array of user bodies as accepted by the users
//! collection (`email`, `password`, `passwordConfirm`, ...). Its path comes
//! from `SEED_USERS_FILE`.

use std::path::PathBuf;

use tracing_subscriber::EnvFilter;

use todo_blog::{
    config::{self, Config, DEFAULT_SEED_USERS_FILE},
    pocketbase::PocketBase,
    seed,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let path = PathBuf::from(config::env_or("SEED_USERS_FILE", DEFAULT_SEED_USERS_FILE));
    let users = match seed::load_seed_users(&path) {
        Ok(users) => users,
        Err(err) => {
            tracing::error!(error = %err, "could not load seed users");
            std::process::exit(1);
        }
    };

    tracing::info!(count = users.len(), backend = %config.public_url, "seeding users");
    let pb = PocketBase::new(&config.public_url);
    let report = seed::seed_users(&pb, &users).await;
    tracing::info!(created = report.created, failed = report.failed, "user seeding finished");
}
