//! Session context: the current `(token, user)` pair, its change listeners,
//! optional persistence, and the `pb_auth` cookie form used to hand the
//! session to server-rendered requests.
//!
//! A browser-side client keeps one long-lived [`AuthStore`]; every server
//! request builds a fresh one from the cookie it received, so nothing here is
//! shared across requests.

use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axum_extra::extract::cookie::{Cookie, SameSite};
use jsonwebtoken::{decode, DecodingKey, Validation};
use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::model::User;

pub const COOKIE_NAME: &str = "pb_auth";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthState {
    pub token: String,
    #[serde(rename = "model", alias = "record")]
    pub record: User,
}

type Listener = Arc<dyn Fn(Option<&AuthState>) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(u64);

/// Where a client keeps its session between runs.
pub trait SessionPersistence: Send + Sync {
    fn load(&self) -> Option<String>;
    fn store(&self, value: &str);
    fn remove(&self);
}

#[derive(Debug, Clone, Default)]
pub struct MemoryPersistence {
    slot: Arc<Mutex<Option<String>>>,
}

impl MemoryPersistence {
    pub fn get(&self) -> Option<String> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl SessionPersistence for MemoryPersistence {
    fn load(&self) -> Option<String> {
        self.get()
    }

    fn store(&self, value: &str) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
    }

    fn remove(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Session kept as a JSON file between runs of a client.
#[derive(Debug, Clone)]
pub struct FilePersistence {
    path: PathBuf,
}

impl FilePersistence {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionPersistence for FilePersistence {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path).ok()
    }

    fn store(&self, value: &str) {
        if let Err(e) = std::fs::write(&self.path, value) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist session");
        }
    }

    fn remove(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove persisted session");
            }
        }
    }
}

struct Inner {
    state: RwLock<Option<AuthState>>,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener: AtomicU64,
    persistence: Option<Box<dyn SessionPersistence>>,
}

#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<Inner>,
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuthStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthStore")
            .field("authenticated", &self.snapshot().is_some())
            .finish_non_exhaustive()
    }
}

impl AuthStore {
    /// Ephemeral store, as built for a single server request.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Store backed by `persistence`, hydrated from whatever it holds.
    pub fn with_persistence(persistence: Box<dyn SessionPersistence>) -> Self {
        let hydrated = persistence
            .load()
            .and_then(|raw| serde_json::from_str::<AuthState>(&raw).ok());
        let store = Self::build(Some(persistence));
        *store.write() = hydrated;
        store
    }

    fn build(persistence: Option<Box<dyn SessionPersistence>>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(None),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                persistence,
            }),
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<AuthState>> {
        self.inner.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Option<AuthState> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn token(&self) -> Option<String> {
        self.snapshot().map(|s| s.token)
    }

    pub fn record(&self) -> Option<User> {
        self.snapshot().map(|s| s.record)
    }

    /// A token is held and it has not expired.
    pub fn is_valid(&self) -> bool {
        self.token().is_some_and(|token| !is_token_expired(&token))
    }

    pub fn save(&self, token: impl Into<String>, record: User) {
        let state = AuthState {
            token: token.into(),
            record,
        };
        *self.write() = Some(state.clone());
        if let Some(persistence) = &self.inner.persistence {
            match serde_json::to_string(&state) {
                Ok(raw) => persistence.store(&raw),
                Err(e) => tracing::warn!(error = %e, "failed to serialize session"),
            }
        }
        self.notify(Some(&state));
    }

    pub fn clear(&self) {
        *self.write() = None;
        if let Some(persistence) = &self.inner.persistence {
            persistence.remove();
        }
        self.notify(None);
    }

    /// Register `listener`; it runs synchronously after every `save`/`clear`.
    pub fn subscribe(&self, listener: impl Fn(Option<&AuthState>) + Send + Sync + 'static) -> ListenerId {
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        ListenerId(id)
    }

    pub fn unsubscribe(&self, id: ListenerId) {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(lid, _)| *lid != id.0);
    }

    fn notify(&self, state: Option<&AuthState>) {
        // Run outside the lock so listeners may read the store or subscribe.
        let listeners: Vec<Listener> = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(state);
        }
    }

    /// The `pb_auth` cookie for the current state, or the clearing cookie
    /// when there is no valid session.
    pub fn export_cookie(&self) -> Cookie<'static> {
        self.snapshot()
            .map_or_else(clearing_cookie, |state| session_cookie(&state))
    }

    /// Replace the state with the session carried by a `pb_auth` value.
    /// Malformed values leave the store unauthenticated.
    pub fn load_from_cookie(&self, value: &str) {
        match decode_cookie_value(value) {
            Some(state) => self.save(state.token, state.record),
            None => {
                if !value.is_empty() {
                    tracing::debug!("ignoring malformed auth cookie");
                }
                self.clear();
            }
        }
    }
}

/// Cookie carrying `state`; an expired or unreadable token yields the
/// clearing cookie instead.
pub fn session_cookie(state: &AuthState) -> Cookie<'static> {
    if is_token_expired(&state.token) {
        return clearing_cookie();
    }
    match encode_cookie_value(state) {
        Ok(value) => {
            let mut builder = Cookie::build(COOKIE_NAME, value)
                .path("/")
                .http_only(false)
                .secure(false)
                .same_site(SameSite::Lax);
            if let Some(expires) = token_expiry(&state.token)
                .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
            {
                builder = builder.expires(expires);
            }
            builder.finish()
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode auth cookie");
            clearing_cookie()
        }
    }
}

/// Cookie that removes `pb_auth` from the browser.
pub fn clearing_cookie() -> Cookie<'static> {
    Cookie::build(COOKIE_NAME, "")
        .path("/")
        .http_only(false)
        .secure(false)
        .same_site(SameSite::Lax)
        .expires(OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1))
        .finish()
}

/// JSON `{token, model}`. The cookie jar percent-encodes it on the wire,
/// which is the form the browser SDK writes and reads.
pub fn encode_cookie_value(state: &AuthState) -> Result<String, serde_json::Error> {
    serde_json::to_string(state)
}

/// Accepts the decoded JSON or the still percent-encoded wire form.
pub fn decode_cookie_value(value: &str) -> Option<AuthState> {
    let value = value.trim();
    let json: Cow<'_, str> = if value.starts_with('{') {
        Cow::Borrowed(value)
    } else {
        percent_decode_str(value).decode_utf8().ok()?
    };
    let state: AuthState = serde_json::from_str(&json).ok()?;
    (!state.token.is_empty()).then_some(state)
}

/// Claims of a token, read without checking its signature; the backend is
/// the only party that can and does verify it.
fn token_claims(token: &str) -> Option<Map<String, Value>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    decode::<Map<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

/// `exp` claim in unix seconds.
pub fn token_expiry(token: &str) -> Option<i64> {
    token_claims(token)?.get("exp")?.as_i64()
}

/// Undecodable or empty tokens count as expired; tokens without `exp` do not.
pub fn is_token_expired(token: &str) -> bool {
    match token_claims(token) {
        Some(claims) if !claims.is_empty() => match claims.get("exp").and_then(Value::as_i64) {
            Some(exp) => exp <= OffsetDateTime::now_utc().unix_timestamp(),
            None => false,
        },
        _ => true,
    }
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
