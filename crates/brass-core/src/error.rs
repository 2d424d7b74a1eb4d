//! Error types shared across the Brass crates.

use thiserror::Error;

/// A type-erased error returned by module handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by a [`Session`](crate::Session) implementation.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// The reply could not be delivered.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The platform refused or failed the permission lookup.
    #[error("permission check failed: {0}")]
    PermissionCheck(String),

    /// The transport is gone.
    #[error("session is closed")]
    Closed,

    /// Anything else the adapter wants to surface.
    #[error("{0}")]
    Other(String),
}

impl SessionError {
    /// Creates a send failure from any displayable reason.
    pub fn send_failed(reason: impl Into<String>) -> Self {
        Self::SendFailed(reason.into())
    }
}

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
