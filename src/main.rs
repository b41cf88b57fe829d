use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderValue, Method,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use todo_blog::{config::Config, route::create_router, AppState};

// Entry point of the application
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("todo_blog=info,tower_http=info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            std::process::exit(1);
        }
    };

    let origin = match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => origin,
        Err(err) => {
            tracing::error!(error = %err, origin = %config.cors_origin, "invalid CORS_ORIGIN");
            std::process::exit(1);
        }
    };

    // Configure CORS settings for the application
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_credentials(true)
        .allow_headers([ACCEPT, CONTENT_TYPE]);

    let addr = config.bind_addr;
    tracing::info!(backend = %config.server_url, public_backend = %config.public_url, "backend configured");
    let app_state = Arc::new(AppState { config });

    let app = create_router(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    tracing::info!(%addr, "todo-blog listening");

    if let Err(err) = axum::Server::bind(&addr).serve(app.into_make_service()).await {
        tracing::error!(error = %err, "server failed");
        std::process::exit(1);
    }
}
