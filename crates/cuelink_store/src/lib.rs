//! # CueLink Credential Store
//!
//! Durable storage for users, permissions, and auth tokens in a single JSON
//! snapshot file:
//!
//! ```text
//! <store_path>            # JSON snapshot { users, permissions, tokens }
//! <store_path>.lock       # Advisory lock for single-process access
//! <store_path>.tmp        # Scratch file for atomic saves
//! <store_path>.backup     # Quarantined copy of a corrupt snapshot
//! ```
//!
//! A snapshot that fails to decode is quarantined to the `.backup` sibling
//! and the store restarts empty; corruption is recovered, never fatal.

mod error;
mod file;
mod records;

pub use error::{StoreError, StoreResult};
pub use file::CredentialStore;
pub use records::{
    unix_millis, ColumnGrant, CredentialFile, StoredPermission, StoredToken, StoredUser,
    TOKEN_LIFETIME_MILLIS,
};
