use std::sync::Arc;

use axum::{
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::{
    auth::COOKIE_NAME,
    loader::request_client,
    model::{AuthCookie, CurrentUser},
    AppState,
};

/// Lift the `pb_auth` cookie into request extensions for every route.
pub async fn mw_auth_cookie<B>(mut request: Request<B>, next: Next<B>) -> Response {
    let value = CookieJar::from_headers(request.headers())
        .get(COOKIE_NAME)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    request.extensions_mut().insert(AuthCookie(value));

    next.run(request).await
}

/// Reject requests whose cookie does not carry a live session.
pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, StatusCode> {
    let cookie = request
        .extensions()
        .get::<AuthCookie>()
        .and_then(|c| c.0.clone());
    let Some(cookie) = cookie else {
        return Err(StatusCode::UNAUTHORIZED);
    };

    let client = request_client(&data.config.server_url, Some(&cookie));
    let user = match client.auth_store().record() {
        Some(user) if client.auth_store().is_valid() => user,
        _ => {
            tracing::debug!("rejecting request with stale auth cookie");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    request.extensions_mut().insert(CurrentUser { user });

    Ok(next.run(request).await)
}
