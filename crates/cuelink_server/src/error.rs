//! Error types for the server.

use std::net::SocketAddr;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the connection and protocol layers.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The connection ceiling has been reached.
    #[error("connection limit exceeded: {limit}")]
    ConnectionLimitExceeded {
        /// The configured ceiling.
        limit: usize,
    },

    /// Another tracked connection already uses this remote endpoint.
    #[error("duplicate endpoint: {0}")]
    DuplicateEndpoint(SocketAddr),

    /// The request bytes did not parse as HTTP.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// The request body did not decode as the expected JSON payload.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// The document layer did not confirm a mutation in time.
    #[error("mutation timed out")]
    MutationTimeout,

    /// The document layer dropped the completion channel.
    #[error("document unavailable")]
    DocumentUnavailable,

    /// Authentication or permission failure.
    #[error(transparent)]
    Auth(#[from] cuelink_auth::AuthError),

    /// Timer command failure.
    #[error(transparent)]
    Timer(#[from] cuelink_timer::TimerError),

    /// Response serialization failure.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a malformed-request error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedRequest(message.into())
    }

    /// Creates an invalid-body error.
    pub fn invalid_body(message: impl Into<String>) -> Self {
        Self::InvalidBody(message.into())
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidBody(_) | ServerError::Auth(_) | ServerError::Timer(_)
        )
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            ServerError::MalformedRequest(_)
                | ServerError::MutationTimeout
                | ServerError::DocumentUnavailable
                | ServerError::Encode(_)
                | ServerError::Io(_)
        )
    }

    /// Suggested HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            ServerError::InvalidBody(_) => 400,
            ServerError::Auth(err) => err.http_status(),
            ServerError::Timer(_) => 400,
            ServerError::MutationTimeout | ServerError::DocumentUnavailable => 503,
            ServerError::MalformedRequest(_)
            | ServerError::Encode(_)
            | ServerError::Io(_) => 500,
            ServerError::ConnectionLimitExceeded { .. } | ServerError::DuplicateEndpoint(_) => 503,
        }
    }
}
