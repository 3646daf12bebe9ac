//! # CueLink Auth
//!
//! Authentication and permission engine:
//! - Login and bearer-token issuance with 24-hour expiry
//! - Token validation with lazy eviction of expired tokens
//! - User management with last-admin protection
//! - Column-name permission checks with a legacy index fallback
//! - One-shot migration of index-based grants to the name-based model
//! - Explicit default-admin bootstrap for first runs
//!
//! All mutations of credential state funnel through a single lock around
//! the [`cuelink_store::CredentialStore`]; the engine is safe to share
//! across request-handling tasks.

mod engine;
mod error;
mod password;
mod token;

pub use engine::AuthEngine;
pub use error::{AuthError, AuthResult};
pub use password::{hash_password, verify_password};
pub use token::generate_token;

/// Username of the account seeded on an empty store.
pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
/// Password of the account seeded on an empty store.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";
