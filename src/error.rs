use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a single call against the backend API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-2xx status.
    #[error("{message}")]
    Response {
        status: u16,
        message: String,
        data: Value,
    },
    /// The request never produced a response (connect, timeout, decode).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl ClientError {
    /// HTTP status of the failure, `0` when no response was received.
    pub fn status(&self) -> u16 {
        match self {
            Self::Response { status, .. } => *status,
            Self::Transport(err) => err.status().map_or(0, |s| s.as_u16()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == 404
    }
}

/// Application error taxonomy surfaced to actions and handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid credentials or a missing/expired session.
    #[error("{0}")]
    Authentication(String),
    /// The record does not exist or the access rules hide it.
    #[error("{0}")]
    NotFound(String),
    /// Network or service failure.
    #[error("{0}")]
    TransientFetch(String),
    /// Field constraint violation, passed through as the backend reported it.
    #[error("{message}")]
    Validation { message: String, data: Value },
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Response { status, message, data } => match status {
                401 | 403 => Self::Authentication(message),
                404 => Self::NotFound(message),
                400 => Self::Validation { message, data },
                _ => Self::TransientFetch(message),
            },
            ClientError::Transport(err) => Self::TransientFetch(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match &self {
            Self::Authentication(message) => (
                StatusCode::UNAUTHORIZED,
                json!({"status": "fail", "message": message}),
            ),
            Self::NotFound(message) => (
                StatusCode::NOT_FOUND,
                json!({"status": "fail", "message": message}),
            ),
            Self::Validation { message, data } => (
                StatusCode::BAD_REQUEST,
                json!({"status": "fail", "message": message, "data": data}),
            ),
            Self::TransientFetch(message) => (
                StatusCode::BAD_GATEWAY,
                json!({"status": "error", "message": message}),
            ),
            Self::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"status": "error", "message": self.to_string()}),
            ),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
