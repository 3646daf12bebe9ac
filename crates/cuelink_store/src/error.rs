//! Error types for the credential store.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the credential store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the store lock.
    #[error("credential store locked: {path}")]
    Locked {
        /// Path to the locked store.
        path: PathBuf,
    },

    /// The snapshot could not be encoded.
    #[error("failed to encode credential snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

impl StoreError {
    /// Creates a locked-store error.
    pub fn locked(path: impl Into<PathBuf>) -> Self {
        Self::Locked { path: path.into() }
    }
}
