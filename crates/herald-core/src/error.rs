//! Error types for transport collaborators.
//!
//! Router-level errors (input errors, dispatch defects) live in
//! `herald-framework`.

use thiserror::Error;

/// Errors a collaborator reports back to the router.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport is not connected.
    #[error("transport is not connected")]
    NotConnected,

    /// The target channel does not exist or is not reachable.
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    /// The target message does not exist (anymore).
    #[error("message '{0}' not found")]
    MessageNotFound(String),

    /// The remote service refused the request.
    #[error("request rejected: {reason}")]
    Rejected {
        /// Reason given by the remote service.
        reason: String,
    },

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a rejection error.
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result type for collaborator calls.
pub type ApiResult<T> = Result<T, ApiError>;
