//! Persisted credential records.
//!
//! These are the on-disk shapes. The JSON form of a permission keeps both
//! the `allowedColumns` and `allowedColumnIndices` lists so snapshots
//! written by pre-name-model builds keep loading; in memory the grant is a
//! tagged union with the name list canonical.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Token lifetime: 24 hours, in milliseconds.
pub const TOKEN_LIFETIME_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// Current wall-clock as Unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A stored user account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    /// Stable identifier.
    pub id: Uuid,
    /// Account name, unique case-insensitively.
    pub username: String,
    /// Hex-encoded salted SHA-256 of the password.
    pub password_hash: String,
    /// Hex-encoded random salt.
    pub salt: String,
    /// Whether the user is an administrator.
    pub is_admin: bool,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
    /// Last successful login, Unix milliseconds.
    #[serde(default)]
    pub last_login_at: Option<u64>,
}

/// Which columns of a stack a grant makes editable.
///
/// `ByName` is canonical. `LegacyIndices` appears only when loading a
/// snapshot from before the name-based model; migration rewrites it to
/// `ByName` (retaining the indices) once the live column list is known.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnGrant {
    /// Name-based grant, optionally retaining the legacy index list.
    ByName {
        /// Editable column names.
        names: Vec<String>,
        /// Retained legacy indices, if the grant was ever index-based.
        legacy_indices: Option<Vec<usize>>,
    },
    /// Pre-migration index-based grant.
    LegacyIndices(Vec<usize>),
}

impl ColumnGrant {
    /// Creates a name-based grant.
    pub fn by_name(names: Vec<String>) -> Self {
        Self::ByName {
            names,
            legacy_indices: None,
        }
    }

    /// Returns true if the grant allows editing the named column.
    pub fn allows_name(&self, name: &str) -> bool {
        match self {
            ColumnGrant::ByName { names, .. } => names.iter().any(|n| n == name),
            ColumnGrant::LegacyIndices(_) => false,
        }
    }

    /// Returns true if the grant allows editing the column at `index`
    /// through the legacy index list.
    pub fn allows_index(&self, index: usize) -> bool {
        match self {
            ColumnGrant::ByName { legacy_indices, .. } => legacy_indices
                .as_ref()
                .is_some_and(|indices| indices.contains(&index)),
            ColumnGrant::LegacyIndices(indices) => indices.contains(&index),
        }
    }

    /// Returns true if the grant still needs the legacy-index migration.
    pub fn needs_migration(&self) -> bool {
        matches!(self, ColumnGrant::LegacyIndices(_))
    }

    /// Resolves a legacy grant against the current column list.
    ///
    /// Pure function: returns the migrated grant for `LegacyIndices`
    /// (out-of-range indices are dropped from the name list but retained in
    /// the legacy overlay) and `None` when no migration is needed.
    pub fn migrated(&self, column_names: &[String]) -> Option<ColumnGrant> {
        match self {
            ColumnGrant::LegacyIndices(indices) => {
                let names = indices
                    .iter()
                    .filter_map(|&i| column_names.get(i).cloned())
                    .collect();
                Some(ColumnGrant::ByName {
                    names,
                    legacy_indices: Some(indices.clone()),
                })
            }
            ColumnGrant::ByName { .. } => None,
        }
    }

    /// The name list, empty for an unmigrated legacy grant.
    pub fn names(&self) -> &[String] {
        match self {
            ColumnGrant::ByName { names, .. } => names,
            ColumnGrant::LegacyIndices(_) => &[],
        }
    }

    /// The legacy index list, if any.
    pub fn legacy_indices(&self) -> Option<&[usize]> {
        match self {
            ColumnGrant::ByName { legacy_indices, .. } => legacy_indices.as_deref(),
            ColumnGrant::LegacyIndices(indices) => Some(indices),
        }
    }
}

/// On-disk representation of a [`ColumnGrant`]: two parallel lists.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantRepr {
    #[serde(default)]
    allowed_columns: Vec<String>,
    #[serde(default)]
    allowed_column_indices: Option<Vec<usize>>,
}

impl Serialize for ColumnGrant {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = GrantRepr {
            allowed_columns: self.names().to_vec(),
            allowed_column_indices: self.legacy_indices().map(|i| i.to_vec()),
        };
        repr.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ColumnGrant {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let repr = GrantRepr::deserialize(deserializer)?;
        let legacy = repr.allowed_column_indices;
        if repr.allowed_columns.is_empty() {
            if let Some(indices) = legacy.as_ref().filter(|i| !i.is_empty()) {
                return Ok(ColumnGrant::LegacyIndices(indices.clone()));
            }
        }
        Ok(ColumnGrant::ByName {
            names: repr.allowed_columns,
            legacy_indices: legacy,
        })
    }
}

/// A per-user, per-stack permission record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredPermission {
    /// Stable identifier.
    pub id: Uuid,
    /// Owning user.
    pub user_id: Uuid,
    /// Target stack.
    pub cue_stack_id: Uuid,
    /// Editable columns.
    #[serde(flatten)]
    pub grant: ColumnGrant,
}

impl StoredPermission {
    /// Creates a permission record.
    pub fn new(user_id: Uuid, cue_stack_id: Uuid, grant: ColumnGrant) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            cue_stack_id,
            grant,
        }
    }
}

/// A stored bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    /// Opaque token string presented by clients.
    pub token: String,
    /// Owning user.
    pub user_id: Uuid,
    /// Issue time, Unix milliseconds.
    pub issued_at: u64,
    /// Expiry time, Unix milliseconds.
    pub expires_at: u64,
}

impl StoredToken {
    /// Creates a token valid for [`TOKEN_LIFETIME_MILLIS`] from `now`.
    pub fn issue(token: impl Into<String>, user_id: Uuid, now: u64) -> Self {
        Self {
            token: token.into(),
            user_id,
            issued_at: now,
            expires_at: now + TOKEN_LIFETIME_MILLIS,
        }
    }

    /// Returns true if the token is expired at `now`.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// The single JSON document holding all credential state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CredentialFile {
    /// All user accounts.
    #[serde(default)]
    pub users: Vec<StoredUser>,
    /// All permission records.
    #[serde(default)]
    pub permissions: Vec<StoredPermission>,
    /// All live tokens.
    #[serde(default)]
    pub tokens: Vec<StoredToken>,
}
