//! Authentication error types.

use thiserror::Error;

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Application-level error reported by the server (bad credentials,
    /// duplicate account, disabled feature, ...). Propagated to the
    /// caller unchanged.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Access token could not be decoded into claims
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] helios_storage::StorageError),
}

impl AuthError {
    /// Returns true if a refresh attempt failed because the refresh
    /// credential itself was rejected (revoked, reused, or expired), as
    /// opposed to a transient delivery failure.
    pub fn is_credential_rejected(&self) -> bool {
        matches!(self, AuthError::Api { status: 401, .. })
    }

    /// Returns true if this error is transient and the operation can be
    /// retried: connection failures, timeouts, and 5xx server errors.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Api { status, .. } => *status >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;
