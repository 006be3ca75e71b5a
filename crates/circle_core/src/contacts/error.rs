//! Error types for the contact directory adapter.

use thiserror::Error;

/// Result type alias using `DirectoryError`.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors raised by a contact directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Credentials were rejected; the user has to reconnect.
    #[error("directory credentials expired")]
    AuthExpired,

    /// The addressed remote object no longer exists.
    #[error("remote contact not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("directory request failed with status {status}: {message}")]
    Transport { status: u16, message: String },

    /// Connection, timeout or body read failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response JSON did not have the expected shape.
    #[error("invalid directory payload: {0}")]
    InvalidPayload(String),

    /// Client configuration is unusable.
    #[error("configuration error: {0}")]
    Config(String),
}

impl DirectoryError {
    /// Whether the caller must prompt the user to reconnect.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::AuthExpired)
    }

    /// Stable machine-readable code used in logs and reports.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AuthExpired => "auth_expired",
            Self::NotFound(_) => "remote_not_found",
            Self::Transport { .. } | Self::Http(_) => "remote_transport_error",
            Self::Json(_) | Self::InvalidPayload(_) => "remote_invalid_payload",
            Self::Config(_) => "directory_config_error",
        }
    }
}
