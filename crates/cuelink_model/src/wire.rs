//! Wire payloads for the HTTP surface.
//!
//! Field names are part of the protocol contract with the mobile client
//! bundle and are serialized in `camelCase`. Optional fields are omitted
//! when absent so older clients keep parsing responses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generic `{ "success": ... }` acknowledgement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    /// Whether the operation succeeded.
    pub success: bool,
}

impl Ack {
    /// A successful acknowledgement.
    pub fn ok() -> Self {
        Self { success: true }
    }

    /// A failed acknowledgement.
    pub fn failed() -> Self {
        Self { success: false }
    }
}

/// Structured error body attached to non-2xx responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Always false.
    pub success: bool,
    /// Human-readable message.
    pub message: String,
}

impl ErrorBody {
    /// Creates an error body with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// `POST /auth/login` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    /// Account name.
    pub username: String,
    /// Clear-text password (the transport is venue-local).
    pub password: String,
}

/// Public view of a user, safe to return to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    /// Stable identifier.
    pub id: Uuid,
    /// Account name.
    pub username: String,
    /// Whether the user is an administrator.
    pub is_admin: bool,
    /// Creation time, Unix milliseconds.
    pub created_at: u64,
    /// Last successful login, Unix milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<u64>,
}

/// `POST /auth/login` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Whether the login succeeded.
    pub success: bool,
    /// Bearer token, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Public user view, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
    /// Failure message, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl LoginResponse {
    /// Successful login.
    pub fn ok(token: impl Into<String>, user: UserView) -> Self {
        Self {
            success: true,
            token: Some(token.into()),
            user: Some(user),
            message: None,
        }
    }

    /// Failed login.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            token: None,
            user: None,
            message: Some(message.into()),
        }
    }
}

/// One permission grant in a `POST /auth/register` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// Target stack.
    pub cue_stack_id: Uuid,
    /// Editable column names.
    pub allowed_columns: Vec<String>,
    /// Legacy editable column indices, accepted from older admin clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_column_indices: Option<Vec<usize>>,
}

/// `POST /auth/register` request (admin only).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Account name for the new user.
    pub username: String,
    /// Password for the new user.
    pub password: String,
    /// Whether the new user is an administrator.
    #[serde(default)]
    pub is_admin: bool,
    /// Per-stack column grants.
    #[serde(default)]
    pub permissions: Vec<GrantRequest>,
}

/// One entry of the `GET /auth/permissions` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionView {
    /// Target stack.
    pub cue_stack_id: Uuid,
    /// Stack display name.
    pub cue_stack_name: String,
    /// Editable column names.
    pub allowed_columns: Vec<String>,
    /// Legacy editable column indices, when still present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_column_indices: Option<Vec<usize>>,
    /// All column names of the stack, for client-side rendering.
    pub column_names: Vec<String>,
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

/// `POST /timer-command` request.
///
/// `action` selects the command; the remaining fields are read only by the
/// actions that need them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerCommandRequest {
    /// Command name, e.g. `startCountdown` or `setCountUpTarget`.
    pub action: String,
    /// Countdown value in seconds, for `setCountdownTime`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_time: Option<f64>,
    /// Count-to-time value in seconds (legacy clients send it; ignored).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_up_time: Option<f64>,
    /// Signed adjustment in seconds, for `adjustCountdown`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adjustment: Option<f64>,
    /// `HH:MM:SS` wall-clock target, for `setCountUpTarget`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_time_string: Option<String>,
}

/// `GET /timer-state` response.
///
/// The count-to-time sub-timer keeps its historical `countUp*` names on the
/// wire even though it counts down to a wall-clock target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerStateResponse {
    /// Server wall-clock, `HH:MM:SS`.
    pub current_time: String,
    /// Remaining countdown seconds.
    pub countdown_time: f64,
    /// Remaining count-to-time seconds.
    pub count_up_time: f64,
    /// Whether the countdown is running.
    pub countdown_running: bool,
    /// Whether the count-to-time timer is running.
    pub count_up_running: bool,
    /// Snapshot time, Unix milliseconds.
    pub timestamp: u64,
    /// Countdown target, Unix milliseconds, while armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub countdown_target: Option<u64>,
    /// Count-to-time target as `HH:MM:SS`, while armed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count_up_target: Option<String>,
}

// ---------------------------------------------------------------------------
// Cue stacks and cues
// ---------------------------------------------------------------------------

/// `POST /select-cue-stack` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectStackRequest {
    /// Index into the document's stack list.
    pub cue_stack_index: usize,
}

/// `POST /select-cue-stack` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectStackResponse {
    /// Whether the selection changed.
    pub success: bool,
    /// The now-selected index.
    pub selected_index: usize,
    /// Name of the selected stack.
    pub cue_stack_name: String,
}

/// `PUT /cues/{id}` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditCueRequest {
    /// Target cue; must match the path segment.
    pub cue_id: Uuid,
    /// Column index within the selected stack.
    pub column_index: usize,
    /// Replacement cell value.
    pub new_value: String,
}

/// `POST /cues` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCueRequest {
    /// Target stack.
    pub cue_stack_id: Uuid,
    /// One value per column.
    #[serde(default)]
    pub values: Vec<String>,
    /// Timer label for the new cue.
    #[serde(default)]
    pub timer_value: String,
}

/// `POST /cues` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCueResponse {
    /// Whether the cue was added.
    pub success: bool,
    /// Identifier of the new cue.
    pub cue_id: Uuid,
}
