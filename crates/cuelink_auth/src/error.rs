//! Error types for the auth engine.

use thiserror::Error;

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors that can occur in authentication and permission checks.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown user or wrong password. Deliberately indistinct.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The presented token is unknown.
    #[error("invalid token")]
    InvalidToken,

    /// The presented token has expired (and has been evicted).
    #[error("token expired")]
    TokenExpired,

    /// The token's owning user no longer exists.
    #[error("user not found")]
    UserNotFound,

    /// A user with this name already exists (case-insensitive).
    #[error("username already exists: {0}")]
    UsernameAlreadyExists(String),

    /// Username is too short.
    #[error("invalid username: must be at least {min} characters")]
    InvalidUsername {
        /// Minimum accepted length.
        min: usize,
    },

    /// Password is too short.
    #[error("weak password: must be at least {min} characters")]
    WeakPassword {
        /// Minimum accepted length.
        min: usize,
    },

    /// Deleting this user would leave the store without an administrator.
    #[error("cannot delete the last admin")]
    CannotDeleteLastAdmin,

    /// The user lacks permission for the requested edit.
    #[error("permission denied")]
    PermissionDenied,

    /// Underlying store failure.
    #[error("store error: {0}")]
    Store(#[from] cuelink_store::StoreError),
}

impl AuthError {
    /// Suggested HTTP status for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            AuthError::InvalidCredentials
            | AuthError::InvalidToken
            | AuthError::TokenExpired => 401,
            AuthError::PermissionDenied => 403,
            AuthError::UserNotFound => 404,
            AuthError::UsernameAlreadyExists(_) => 409,
            AuthError::InvalidUsername { .. }
            | AuthError::WeakPassword { .. }
            | AuthError::CannotDeleteLastAdmin => 400,
            AuthError::Store(_) => 500,
        }
    }
}
