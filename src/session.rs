//! Auth Session Manager: login, registration and logout on top of a client's
//! [`AuthStore`], plus the listener that mirrors the session into `pb_auth`.

use std::sync::{Arc, Mutex, PoisonError};

use axum_extra::extract::cookie::Cookie;
use serde_json::json;

use crate::{
    auth::{clearing_cookie, session_cookie, AuthState, AuthStore, ListenerId},
    collections::USERS,
    error::{AppError, ClientError},
    model::{NewUser, User},
    pocketbase::PocketBase,
};

/// Latest cookie written by the mirroring listener.
#[derive(Debug, Clone, Default)]
pub struct CookieSink {
    slot: Arc<Mutex<Option<Cookie<'static>>>>,
}

impl CookieSink {
    fn set(&self, cookie: Cookie<'static>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(cookie);
    }

    pub fn peek(&self) -> Option<Cookie<'static>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn take(&self) -> Option<Cookie<'static>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Register the cookie mirror on `store`: a session becomes a `pb_auth`
/// cookie, no session (or an expired one) becomes the clearing cookie.
pub fn mirror_to_cookie(store: &AuthStore, sink: &CookieSink) -> ListenerId {
    let sink = sink.clone();
    store.subscribe(move |state| {
        sink.set(state.map_or_else(clearing_cookie, session_cookie));
    })
}

pub struct AuthSession {
    client: PocketBase,
}

impl AuthSession {
    pub fn new(client: PocketBase) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &PocketBase {
        &self.client
    }

    pub fn store(&self) -> &AuthStore {
        self.client.auth_store()
    }

    pub fn user(&self) -> Option<User> {
        self.store().record()
    }

    pub fn is_authenticated(&self) -> bool {
        self.store().is_valid()
    }

    /// On failure the current session, if any, is left untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthState, AppError> {
        let auth = self
            .client
            .collection(USERS)
            .auth_with_password(email, password)
            .await
            .map_err(login_error)?;
        tracing::info!(user_id = %auth.record.id, "logged in");
        Ok(AuthState {
            token: auth.token,
            record: auth.record,
        })
    }

    /// Create the user, then log in with the same credentials.
    pub async fn register(&self, email: &str, password: &str, password_confirm: &str) -> Result<AuthState, AppError> {
        if password != password_confirm {
            return Err(AppError::Validation {
                message: "Passwords do not match.".to_string(),
                data: json!({"passwordConfirm": {"code": "validation_values_mismatch"}}),
            });
        }

        let body = NewUser {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: password_confirm.to_string(),
            email_visibility: false,
        };
        let created: User = self.client.collection(USERS).create(&body).await?;
        tracing::info!(user_id = %created.id, "registered");

        self.login(email, password).await
    }

    /// Local only; the token simply stops being sent.
    pub fn logout(&self) {
        self.store().clear();
        tracing::info!("logged out");
    }

    /// Swap the current token for a fresh one from the backend.
    pub async fn refresh(&self) -> Result<AuthState, AppError> {
        if self.store().token().is_none() {
            return Err(AppError::Authentication("No active session.".to_string()));
        }
        let auth = self.client.collection(USERS).auth_refresh().await?;
        Ok(AuthState {
            token: auth.token,
            record: auth.record,
        })
    }
}

fn login_error(err: ClientError) -> AppError {
    match err {
        ClientError::Response { status: 400 | 401 | 403, message, .. } => AppError::Authentication(message),
        other => other.into(),
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
