use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("session expired ({status}): {body}")]
    AuthExpired { status: StatusCode, body: String },
    #[error("request rejected with {status} after token refresh: {body}")]
    RetryExhausted { status: StatusCode, body: String },
    #[error("refresh response malformed: {0}")]
    RefreshMalformed(String),
    #[error("login response malformed: {0}")]
    LoginMalformed(String),
    #[error("refresh timed out after {0:?}")]
    RefreshTimeout(Duration),
    #[error("token refresh failed: {0}")]
    RefreshFailed(Arc<Error>),
    #[error("session was cleared while a refresh was in flight")]
    SessionCleared,
    #[error("refresh task ended without settling")]
    RefreshAbandoned,
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("token store error: {0}")]
    Store(String),
}

impl Error {
    /// True for outcomes that end the session rather than a single call.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Error::AuthExpired { .. }
                | Error::RetryExhausted { .. }
                | Error::RefreshMalformed(_)
                | Error::RefreshTimeout(_)
                | Error::RefreshFailed(_)
                | Error::SessionCleared
        )
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Status { status, .. }
            | Error::AuthExpired { status, .. }
            | Error::RetryExhausted { status, .. } => Some(*status),
            Error::Transport(err) => err.status(),
            Error::RefreshFailed(inner) => inner.status(),
            _ => None,
        }
    }
}
