use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

use crate::{
    handler::*,
    middleware::{mw_auth_cookie, mw_require_auth},
    AppState,
};

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/todos", post(create_todo))
        .route(
            "/todos/:id",
            get(get_todo).patch(update_todo).delete(delete_todo),
        )
        .route_layer(from_fn_with_state(app_state.clone(), mw_require_auth))
        .route("/", get(todos_page))
        .route("/blog", get(blog_page))
        .route("/blog/:id", get(blog_post_page))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/health", get(health_checker_handler))
        .layer(from_fn(mw_auth_cookie))
        .with_state(app_state)
}

#[cfg(test)]
#[path = "route_test.rs"]
mod tests;
