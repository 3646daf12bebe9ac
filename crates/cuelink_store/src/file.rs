//! Credential snapshot file management.

use crate::error::{StoreError, StoreResult};
use crate::records::{CredentialFile, StoredPermission, StoredToken, StoredUser};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Suffix for the quarantined copy of a corrupt snapshot.
const BACKUP_SUFFIX: &str = "backup";
/// Suffix for the scratch file used by atomic saves.
const TEMP_SUFFIX: &str = "tmp";
/// Suffix for the advisory lock file.
const LOCK_SUFFIX: &str = "lock";

/// The credential store: one JSON snapshot, held in memory, written back
/// atomically on every persist.
///
/// # Corruption recovery
///
/// A snapshot that fails to decode is renamed to its `.backup` sibling and
/// the store starts empty. The operator keeps the quarantined file for
/// inspection; the server keeps running.
///
/// # Thread safety
///
/// The store itself is plain owned data. The auth engine wraps it in its
/// own lock; all mutations funnel through that single serialization point.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    state: CredentialFile,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl CredentialStore {
    /// Opens the store at `path`, creating parent directories as needed.
    ///
    /// Expired tokens are purged in one pass; if any were dropped (or a
    /// corrupt snapshot was quarantined) the cleaned snapshot is persisted
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired or the file cannot
    /// be read or written. A corrupt snapshot is not an error.
    pub fn open(path: &Path, now: u64) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_path = sibling(path, LOCK_SUFFIX);
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::locked(path));
        }

        let (state, recovered) = Self::load_or_recover(path);
        let mut store = Self {
            path: path.to_path_buf(),
            state,
            _lock_file: lock_file,
        };

        let purged = store.purge_expired_tokens(now);
        if purged > 0 {
            debug!(purged, "purged expired tokens at open");
        }
        if recovered || purged > 0 {
            store.save()?;
        }

        Ok(store)
    }

    /// Loads the snapshot, quarantining a corrupt file.
    ///
    /// Returns the state and whether a re-persist is required.
    fn load_or_recover(path: &Path) -> (CredentialFile, bool) {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(_) => {
                info!(path = %path.display(), "no credential snapshot, starting empty");
                return (CredentialFile::default(), false);
            }
        };

        match serde_json::from_slice::<CredentialFile>(&bytes) {
            Ok(state) => (state, false),
            Err(err) => {
                let backup = sibling(path, BACKUP_SUFFIX);
                warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    %err,
                    "corrupt credential snapshot, quarantining and starting empty"
                );
                if let Err(rename_err) = fs::rename(path, &backup) {
                    warn!(%rename_err, "failed to quarantine corrupt snapshot");
                }
                (CredentialFile::default(), true)
            }
        }
    }

    /// Persists the snapshot atomically (temp file + rename).
    pub fn save(&self) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(&self.state).map_err(StoreError::Encode)?;
        let temp = sibling(&self.path, TEMP_SUFFIX);
        fs::write(&temp, &bytes)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    /// Returns the path of the snapshot file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read access to the full snapshot.
    pub fn state(&self) -> &CredentialFile {
        &self.state
    }

    // -- users ------------------------------------------------------------

    /// Finds a user by name, case-insensitively.
    pub fn user_by_name(&self, username: &str) -> Option<&StoredUser> {
        self.state
            .users
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
    }

    /// Finds a user by id.
    pub fn user_by_id(&self, id: Uuid) -> Option<&StoredUser> {
        self.state.users.iter().find(|u| u.id == id)
    }

    /// Mutable lookup by id.
    pub fn user_by_id_mut(&mut self, id: Uuid) -> Option<&mut StoredUser> {
        self.state.users.iter_mut().find(|u| u.id == id)
    }

    /// Appends a user.
    pub fn add_user(&mut self, user: StoredUser) {
        self.state.users.push(user);
    }

    /// Number of administrator accounts.
    pub fn admin_count(&self) -> usize {
        self.state.users.iter().filter(|u| u.is_admin).count()
    }

    /// Removes a user and cascades deletion of their permissions and tokens.
    ///
    /// Returns true if the user existed.
    pub fn remove_user(&mut self, id: Uuid) -> bool {
        let before = self.state.users.len();
        self.state.users.retain(|u| u.id != id);
        if self.state.users.len() == before {
            return false;
        }
        self.state.permissions.retain(|p| p.user_id != id);
        self.state.tokens.retain(|t| t.user_id != id);
        true
    }

    // -- permissions ------------------------------------------------------

    /// All permission records for a user.
    pub fn permissions_for(&self, user_id: Uuid) -> Vec<&StoredPermission> {
        self.state
            .permissions
            .iter()
            .filter(|p| p.user_id == user_id)
            .collect()
    }

    /// Finds the permission record a user holds on a stack.
    pub fn permission_on(&self, user_id: Uuid, cue_stack_id: Uuid) -> Option<&StoredPermission> {
        self.state
            .permissions
            .iter()
            .find(|p| p.user_id == user_id && p.cue_stack_id == cue_stack_id)
    }

    /// Appends a permission record.
    pub fn add_permission(&mut self, permission: StoredPermission) {
        self.state.permissions.push(permission);
    }

    /// Mutable access to all permission records (migration pass).
    pub fn permissions_mut(&mut self) -> &mut Vec<StoredPermission> {
        &mut self.state.permissions
    }

    // -- tokens -----------------------------------------------------------

    /// Finds a token record.
    pub fn token(&self, token: &str) -> Option<&StoredToken> {
        self.state.tokens.iter().find(|t| t.token == token)
    }

    /// Appends a token.
    pub fn add_token(&mut self, token: StoredToken) {
        self.state.tokens.push(token);
    }

    /// Removes a token. Returns true if it existed.
    pub fn remove_token(&mut self, token: &str) -> bool {
        let before = self.state.tokens.len();
        self.state.tokens.retain(|t| t.token != token);
        self.state.tokens.len() != before
    }

    /// Drops every token expired at `now`. Returns how many were dropped.
    pub fn purge_expired_tokens(&mut self, now: u64) -> usize {
        let before = self.state.tokens.len();
        self.state.tokens.retain(|t| !t.is_expired(now));
        before - self.state.tokens.len()
    }
}

/// Builds `<path>.<suffix>` next to the snapshot file.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "credentials.json".to_string());
    name.push('.');
    name.push_str(suffix);
    path.with_file_name(name)
}
