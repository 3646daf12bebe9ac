//! The authentication and permission engine.

use crate::error::{AuthError, AuthResult};
use crate::password::{hash_password, verify_password};
use crate::token::generate_token;
use crate::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use cuelink_model::wire::{GrantRequest, PermissionView, UserView};
use cuelink_model::CueStack;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cuelink_store::{
    unix_millis, ColumnGrant, CredentialStore, StoredPermission, StoredToken, StoredUser,
};

/// Minimum accepted username length.
const MIN_USERNAME_LEN: usize = 3;
/// Minimum accepted password length.
const MIN_PASSWORD_LEN: usize = 6;

/// Clock source, swappable in tests.
type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// The authentication and permission engine.
///
/// Wraps the credential store behind one mutex; every read and mutation of
/// users, permissions, and tokens goes through it, so concurrent request
/// handlers never race on credential state.
pub struct AuthEngine {
    store: Mutex<CredentialStore>,
    clock: Clock,
}

impl AuthEngine {
    /// Creates an engine over an opened store, using the system clock.
    pub fn new(store: CredentialStore) -> Self {
        Self::with_clock(store, Arc::new(unix_millis))
    }

    /// Creates an engine with an explicit clock (tests).
    pub fn with_clock(store: CredentialStore, clock: Clock) -> Self {
        Self {
            store: Mutex::new(store),
            clock,
        }
    }

    fn now(&self) -> u64 {
        (self.clock)()
    }

    // -- bootstrap --------------------------------------------------------

    /// Seeds the default admin account when the store has no users.
    ///
    /// Explicit bootstrap step: callers opt in at startup, tests can skip
    /// it. Returns true if an account was created.
    pub fn seed_default_admin(&self) -> AuthResult<bool> {
        let mut store = self.store.lock();
        if !store.state().users.is_empty() {
            return Ok(false);
        }

        let (password_hash, salt) = hash_password(DEFAULT_ADMIN_PASSWORD);
        store.add_user(StoredUser {
            id: Uuid::new_v4(),
            username: DEFAULT_ADMIN_USERNAME.to_string(),
            password_hash,
            salt,
            is_admin: true,
            created_at: self.now(),
            last_login_at: None,
        });
        store.save()?;
        info!(username = DEFAULT_ADMIN_USERNAME, "seeded default admin account");
        Ok(true)
    }

    /// Rewrites index-based grants against the current stacks.
    ///
    /// Any grant with an empty name list and a non-empty legacy index list
    /// is resolved to column names (out-of-range indices dropped from the
    /// names, retained in the legacy overlay). Persists when anything
    /// changed. Returns the number of rewritten grants.
    pub fn migrate_legacy_grants(&self, stacks: &[CueStack]) -> AuthResult<usize> {
        let mut store = self.store.lock();
        let mut rewritten = 0;

        for permission in store.permissions_mut().iter_mut() {
            if !permission.grant.needs_migration() {
                continue;
            }
            let column_names = stacks
                .iter()
                .find(|s| s.id == permission.cue_stack_id)
                .map(|s| s.column_names())
                .unwrap_or_default();
            if let Some(migrated) = permission.grant.migrated(&column_names) {
                permission.grant = migrated;
                rewritten += 1;
            }
        }

        if rewritten > 0 {
            store.save()?;
            info!(rewritten, "migrated legacy index permissions to column names");
        }
        Ok(rewritten)
    }

    // -- accounts ---------------------------------------------------------

    /// Creates a user with the supplied grants and persists.
    pub fn create_user(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
        grants: &[GrantRequest],
    ) -> AuthResult<UserView> {
        // Trimmed once here; the length check, the duplicate check, and the
        // stored record must all see the same name.
        let username = username.trim();
        if username.len() < MIN_USERNAME_LEN {
            return Err(AuthError::InvalidUsername {
                min: MIN_USERNAME_LEN,
            });
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword {
                min: MIN_PASSWORD_LEN,
            });
        }

        let mut store = self.store.lock();
        if store.user_by_name(username).is_some() {
            return Err(AuthError::UsernameAlreadyExists(username.to_string()));
        }

        let (password_hash, salt) = hash_password(password);
        let user = StoredUser {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            salt,
            is_admin,
            created_at: self.now(),
            last_login_at: None,
        };
        let view = user_view(&user);
        let user_id = user.id;
        store.add_user(user);

        for grant in grants {
            store.add_permission(StoredPermission::new(
                user_id,
                grant.cue_stack_id,
                grant_from_request(grant),
            ));
        }

        store.save()?;
        debug!(username, is_admin, "created user");
        Ok(view)
    }

    /// Deletes a user, cascading their permissions and tokens.
    pub fn delete_user(&self, id: Uuid) -> AuthResult<()> {
        let mut store = self.store.lock();
        let Some(user) = store.user_by_id(id) else {
            return Err(AuthError::UserNotFound);
        };
        if user.is_admin && store.admin_count() <= 1 {
            return Err(AuthError::CannotDeleteLastAdmin);
        }

        store.remove_user(id);
        store.save()?;
        debug!(%id, "deleted user");
        Ok(())
    }

    // -- sessions ---------------------------------------------------------

    /// Verifies credentials and issues a fresh 24-hour token.
    pub fn login(&self, username: &str, password: &str) -> AuthResult<(String, UserView)> {
        let mut store = self.store.lock();
        let now = self.now();

        let Some(user) = store.user_by_name(username) else {
            return Err(AuthError::InvalidCredentials);
        };
        if !verify_password(password, &user.password_hash, &user.salt) {
            warn!(username, "rejected login attempt");
            return Err(AuthError::InvalidCredentials);
        }
        let user_id = user.id;

        let token = generate_token();
        store.add_token(StoredToken::issue(token.clone(), user_id, now));
        if let Some(user) = store.user_by_id_mut(user_id) {
            user.last_login_at = Some(now);
        }
        store.save()?;

        let view = store
            .user_by_id(user_id)
            .map(user_view)
            .ok_or(AuthError::UserNotFound)?;
        debug!(username, "login succeeded");
        Ok((token, view))
    }

    /// Resolves a token to its owning user.
    ///
    /// Expired tokens are evicted on first presentation.
    pub fn validate_token(&self, token: &str) -> AuthResult<UserView> {
        let mut store = self.store.lock();
        let now = self.now();

        let Some(record) = store.token(token) else {
            return Err(AuthError::InvalidToken);
        };
        if record.is_expired(now) {
            store.remove_token(token);
            store.save()?;
            return Err(AuthError::TokenExpired);
        }
        let user_id = record.user_id;

        store
            .user_by_id(user_id)
            .map(user_view)
            .ok_or(AuthError::UserNotFound)
    }

    /// Removes a token. Returns true if it existed.
    pub fn logout(&self, token: &str) -> AuthResult<bool> {
        let mut store = self.store.lock();
        let removed = store.remove_token(token);
        if removed {
            store.save()?;
        }
        Ok(removed)
    }

    // -- permissions ------------------------------------------------------

    /// Checks whether a user may edit a column of a stack.
    ///
    /// Admins always pass, including out-of-range indices on other stacks.
    /// Non-admins pass iff the column name is in their allow-list for the
    /// stack, or the numeric index is in the retained legacy index list.
    pub fn can_user_edit_column(
        &self,
        user_id: Uuid,
        cue_stack_id: Uuid,
        column_name: Option<&str>,
        column_index: usize,
    ) -> bool {
        let store = self.store.lock();
        let Some(user) = store.user_by_id(user_id) else {
            return false;
        };
        if user.is_admin {
            return true;
        }
        let Some(permission) = store.permission_on(user_id, cue_stack_id) else {
            return false;
        };
        column_name.is_some_and(|name| permission.grant.allows_name(name))
            || permission.grant.allows_index(column_index)
    }

    /// Checks whether a user holds any grant on a stack (or is admin).
    pub fn has_permission_on_stack(&self, user_id: Uuid, cue_stack_id: Uuid) -> bool {
        let store = self.store.lock();
        let Some(user) = store.user_by_id(user_id) else {
            return false;
        };
        if user.is_admin {
            return true;
        }
        store
            .permission_on(user_id, cue_stack_id)
            .is_some_and(|p| !p.grant.names().is_empty() || p.grant.legacy_indices().is_some())
    }

    /// Builds the permission views for a user against the current stacks.
    pub fn permission_views(&self, user_id: Uuid, stacks: &[CueStack]) -> Vec<PermissionView> {
        let store = self.store.lock();
        store
            .permissions_for(user_id)
            .into_iter()
            .filter_map(|permission| {
                let stack = stacks.iter().find(|s| s.id == permission.cue_stack_id)?;
                Some(PermissionView {
                    cue_stack_id: permission.cue_stack_id,
                    cue_stack_name: stack.name.clone(),
                    allowed_columns: permission.grant.names().to_vec(),
                    allowed_column_indices: permission.grant.legacy_indices().map(|i| i.to_vec()),
                    column_names: stack.column_names(),
                })
            })
            .collect()
    }

    /// Number of stored users.
    pub fn user_count(&self) -> usize {
        self.store.lock().state().users.len()
    }
}

/// Builds the public view of a stored user.
fn user_view(user: &StoredUser) -> UserView {
    UserView {
        id: user.id,
        username: user.username.clone(),
        is_admin: user.is_admin,
        created_at: user.created_at,
        last_login_at: user.last_login_at,
    }
}

/// Converts a wire grant request into the internal representation.
///
/// A request with names is canonical; a request with only indices (older
/// admin clients) enters as a legacy grant and is resolved by the next
/// migration pass.
fn grant_from_request(grant: &GrantRequest) -> ColumnGrant {
    if grant.allowed_columns.is_empty() {
        if let Some(indices) = grant
            .allowed_column_indices
            .as_ref()
            .filter(|i| !i.is_empty())
        {
            return ColumnGrant::LegacyIndices(indices.clone());
        }
    }
    ColumnGrant::ByName {
        names: grant.allowed_columns.clone(),
        legacy_indices: grant.allowed_column_indices.clone(),
    }
}
