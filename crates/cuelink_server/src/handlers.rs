//! Request handlers for the HTTP surface.
//!
//! Every handler follows the same shape: authenticate where the route
//! demands it, check permissions strictly before any mutation, then answer
//! with a structured JSON body. Mutations go through the document bridge
//! with a bounded wait so an unresponsive document layer surfaces as a 503,
//! never a hung worker.

use crate::config::ServerConfig;
use crate::document::CueDocument;
use crate::error::ServerError;
use crate::http::{Request, Response};
use crate::router::{route, Route};
use cuelink_auth::{AuthEngine, AuthError};
use cuelink_model::wire::{
    Ack, AddCueRequest, AddCueResponse, EditCueRequest, ErrorBody, LoginRequest, LoginResponse,
    RegisterRequest, SelectStackRequest, SelectStackResponse, TimerCommandRequest,
    TimerStateResponse, UserView,
};
use cuelink_model::{CueMutation, CueStack, MutationOutcome};
use cuelink_timer::{ShowTimer, TimerCommand};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

/// Placeholder client page served at `/`; the real bundle ships with the
/// desktop app and replaces this document.
const INDEX_HTML: &str = "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>CueLink</title></head>\n<body>\n<h1>CueLink</h1>\n<p>The server is running. Connect with the CueLink companion app.</p>\n</body>\n</html>\n";

/// Shared state handed to every request handler.
pub struct AppState {
    /// Server configuration.
    pub config: ServerConfig,
    /// Authentication and permission engine.
    pub auth: Arc<AuthEngine>,
    /// The authoritative timer.
    pub timer: Arc<ShowTimer>,
    /// Bridge to the cue document.
    pub document: Arc<dyn CueDocument>,
}

/// Dispatches one parsed request to its handler.
pub async fn handle(state: &AppState, request: &Request) -> Response {
    match route(&request.method, &request.path) {
        Route::Preflight => Response::preflight(),
        Route::Index => Response::html(INDEX_HTML),
        Route::CueSnapshot => cue_snapshot(state),
        Route::TimerState => timer_state(state),
        Route::TimerCommand => timer_command(state, request),
        Route::SelectStack => select_stack(state, request),
        Route::Login => login(state, request),
        Route::Logout => logout(state, request),
        Route::Me => me(state, request),
        Route::Permissions => permissions(state, request),
        Route::Register => register(state, request),
        Route::EditCue(id) => edit_cue(state, request, &id).await,
        Route::AddCue => add_cue(state, request).await,
        Route::DeleteCue(id) => delete_cue(state, request, &id).await,
        Route::NotFound => Response::not_found(),
    }
}

// -- open endpoints --------------------------------------------------------

fn cue_snapshot(state: &AppState) -> Response {
    match state.document.snapshot(&state.timer.current_time_string()) {
        Some(snapshot) => Response::ok_json(&snapshot),
        None => Response::json(404, &ErrorBody::new("no cue stack open")),
    }
}

fn timer_state(state: &AppState) -> Response {
    let snapshot = state.timer.snapshot();
    Response::ok_json(&TimerStateResponse {
        current_time: state.timer.current_time_string(),
        countdown_time: snapshot.countdown_value,
        count_up_time: snapshot.count_to_time_value,
        countdown_running: snapshot.countdown_running,
        count_up_running: snapshot.count_to_time_running,
        timestamp: snapshot.timestamp,
        countdown_target: snapshot.countdown_target,
        count_up_target: snapshot.count_to_time_target_string,
    })
}

fn timer_command(state: &AppState, request: &Request) -> Response {
    let body: TimerCommandRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };

    let command = match TimerCommand::parse(
        &body.action,
        body.countdown_time,
        body.adjustment,
        body.target_time_string.as_deref(),
    ) {
        Ok(command) => command,
        Err(err) => return Response::from_error(&ServerError::Timer(err)),
    };

    match state.timer.apply(command) {
        Ok(()) => Response::ok_json(&Ack::ok()),
        Err(err) => Response::from_error(&ServerError::Timer(err)),
    }
}

fn select_stack(state: &AppState, request: &Request) -> Response {
    let body: SelectStackRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };

    let Some(selected) = state.document.select_stack(body.cue_stack_index) else {
        return Response::json(
            400,
            &ErrorBody::new(format!("cue stack index {} out of range", body.cue_stack_index)),
        );
    };

    // Selecting a stack starts counting its current cue immediately.
    if let Some(seconds) = selected.countdown_seconds {
        state.timer.reset_countdown_to(seconds);
    }

    Response::ok_json(&SelectStackResponse {
        success: true,
        selected_index: selected.index,
        cue_stack_name: selected.name,
    })
}

// -- authentication --------------------------------------------------------

fn login(state: &AppState, request: &Request) -> Response {
    let body: LoginRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };

    match state.auth.login(&body.username, &body.password) {
        Ok((token, user)) => Response::ok_json(&LoginResponse::ok(token, user)),
        Err(AuthError::InvalidCredentials) => {
            Response::json(401, &LoginResponse::rejected("Invalid credentials"))
        }
        Err(err) => Response::from_error(&ServerError::Auth(err)),
    }
}

fn logout(state: &AppState, request: &Request) -> Response {
    if let Some(token) = request.bearer_token() {
        if let Err(err) = state.auth.logout(token) {
            warn!(%err, "logout failed to persist");
        }
    }
    Response::ok_json(&Ack::ok())
}

fn me(state: &AppState, request: &Request) -> Response {
    match authenticate(state, request) {
        Ok(user) => Response::ok_json(&user),
        Err(response) => response,
    }
}

fn permissions(state: &AppState, request: &Request) -> Response {
    let user = match authenticate(state, request) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let views = state.auth.permission_views(user.id, &state.document.stacks());
    Response::ok_json(&views)
}

fn register(state: &AppState, request: &Request) -> Response {
    let user = match authenticate(state, request) {
        Ok(user) => user,
        Err(response) => return response,
    };
    if !user.is_admin {
        return Response::json(403, &ErrorBody::new("admin required"));
    }

    let body: RegisterRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };

    match state
        .auth
        .create_user(&body.username, &body.password, body.is_admin, &body.permissions)
    {
        Ok(created) => Response::json(201, &created),
        Err(err) => Response::from_error(&ServerError::Auth(err)),
    }
}

// -- cue mutations ---------------------------------------------------------

async fn edit_cue(state: &AppState, request: &Request, id: &str) -> Response {
    let user = match authenticate(state, request) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Ok(cue_id) = id.parse::<Uuid>() else {
        return Response::json(404, &ErrorBody::new("unknown cue"));
    };
    let body: EditCueRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };
    if body.cue_id != cue_id {
        return Response::json(400, &ErrorBody::new("cue id mismatch between path and body"));
    }

    let stacks = state.document.stacks();
    let Some(stack) = stack_owning_cue(&stacks, cue_id) else {
        return Response::json(404, &ErrorBody::new("unknown cue"));
    };
    let column_name = stack.columns.get(body.column_index).map(|c| c.name.as_str());
    if !state
        .auth
        .can_user_edit_column(user.id, stack.id, column_name, body.column_index)
    {
        debug!(user = user.username, column = ?column_name, "edit denied");
        return Response::from_error(&ServerError::Auth(AuthError::PermissionDenied));
    }

    apply_mutation(
        state,
        CueMutation::SetValue {
            cue_id,
            column_index: body.column_index,
            value: body.new_value,
        },
    )
    .await
}

async fn add_cue(state: &AppState, request: &Request) -> Response {
    let user = match authenticate(state, request) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let body: AddCueRequest = match request.json() {
        Ok(body) => body,
        Err(err) => return Response::from_error(&err),
    };
    if !state.auth.has_permission_on_stack(user.id, body.cue_stack_id) {
        return Response::from_error(&ServerError::Auth(AuthError::PermissionDenied));
    }

    let outcome = match await_outcome(
        state,
        state.document.apply(CueMutation::AddCue {
            cue_stack_id: body.cue_stack_id,
            values: body.values,
            timer_value: body.timer_value,
        }),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => return Response::from_error(&err),
    };

    match outcome {
        MutationOutcome::Applied { cue_id } => Response::ok_json(&AddCueResponse {
            success: true,
            cue_id,
        }),
        other => outcome_response(other),
    }
}

async fn delete_cue(state: &AppState, request: &Request, id: &str) -> Response {
    let user = match authenticate(state, request) {
        Ok(user) => user,
        Err(response) => return response,
    };
    let Ok(cue_id) = id.parse::<Uuid>() else {
        return Response::json(404, &ErrorBody::new("unknown cue"));
    };

    let stacks = state.document.stacks();
    let Some(stack) = stack_owning_cue(&stacks, cue_id) else {
        return Response::json(404, &ErrorBody::new("unknown cue"));
    };
    if !state.auth.has_permission_on_stack(user.id, stack.id) {
        return Response::from_error(&ServerError::Auth(AuthError::PermissionDenied));
    }

    apply_mutation(state, CueMutation::DeleteCue { cue_id }).await
}

// -- helpers ---------------------------------------------------------------

fn authenticate(state: &AppState, request: &Request) -> Result<UserView, Response> {
    let Some(token) = request.bearer_token() else {
        return Err(Response::json(401, &ErrorBody::new("missing bearer token")));
    };
    state
        .auth
        .validate_token(token)
        .map_err(|err| Response::from_error(&ServerError::Auth(err)))
}

fn stack_owning_cue(stacks: &[CueStack], cue_id: Uuid) -> Option<&CueStack> {
    stacks.iter().find(|s| s.cue(cue_id).is_some())
}

async fn apply_mutation(state: &AppState, mutation: CueMutation) -> Response {
    match await_outcome(state, state.document.apply(mutation)).await {
        Ok(outcome) => outcome_response(outcome),
        Err(err) => Response::from_error(&err),
    }
}

/// Awaits a mutation completion with the configured bounded timeout.
async fn await_outcome(
    state: &AppState,
    rx: oneshot::Receiver<MutationOutcome>,
) -> Result<MutationOutcome, ServerError> {
    match tokio::time::timeout(state.config.mutation_timeout, rx).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(_)) => Err(ServerError::DocumentUnavailable),
        Err(_) => {
            warn!("cue mutation timed out waiting for the document layer");
            Err(ServerError::MutationTimeout)
        }
    }
}

fn outcome_response(outcome: MutationOutcome) -> Response {
    match outcome {
        MutationOutcome::Applied { .. } => Response::ok_json(&Ack::ok()),
        MutationOutcome::CueNotFound => Response::json(404, &ErrorBody::new("unknown cue")),
        MutationOutcome::StackNotFound => {
            Response::json(404, &ErrorBody::new("unknown cue stack"))
        }
        MutationOutcome::Rejected { reason } => Response::json(409, &ErrorBody::new(reason)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryCueDocument;
    use cuelink_model::wire::GrantRequest;
    use cuelink_model::{Column, Cue};
    use cuelink_store::CredentialStore;
    use cuelink_store::unix_millis;
    use tempfile::TempDir;

    struct Fixture {
        state: AppState,
        _dir: TempDir,
    }

    fn fixture() -> Fixture {
        let dir = TempDir::new().unwrap();
        let store =
            CredentialStore::open(&dir.path().join("credentials.json"), unix_millis()).unwrap();
        let auth = Arc::new(AuthEngine::new(store));
        auth.seed_default_admin().unwrap();

        let mut stack = CueStack::new(
            "Act One",
            vec![Column::new("Cue", 60.0), Column::new("Preset", 120.0)],
        );
        stack.cues.push(Cue::new(vec!["1".into(), "Warm wash".into()], "5:00"));
        let document = Arc::new(MemoryCueDocument::new(vec![stack]));

        Fixture {
            state: AppState {
                config: ServerConfig::default(),
                auth,
                timer: Arc::new(ShowTimer::new()),
                document,
            },
            _dir: dir,
        }
    }

    fn admin_token(state: &AppState) -> String {
        state.auth.login("admin", "admin").unwrap().0
    }

    fn body_json(response: &Response) -> serde_json::Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn login_round_trip() {
        let f = fixture();

        let bad = Request::new("POST", "/auth/login").with_json(&LoginRequest {
            username: "admin".into(),
            password: "wrong".into(),
        });
        let response = handle(&f.state, &bad).await;
        assert_eq!(response.status(), 401);
        assert_eq!(body_json(&response)["success"], false);

        let good = Request::new("POST", "/auth/login").with_json(&LoginRequest {
            username: "admin".into(),
            password: "admin".into(),
        });
        let response = handle(&f.state, &good).await;
        assert_eq!(response.status(), 200);
        let body = body_json(&response);
        assert_eq!(body["success"], true);
        assert!(!body["token"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn me_requires_a_valid_bearer() {
        let f = fixture();
        let response = handle(&f.state, &Request::new("GET", "/auth/me")).await;
        assert_eq!(response.status(), 401);

        let bogus = Request::new("GET", "/auth/me").with_header("Authorization", "Bearer nope");
        assert_eq!(handle(&f.state, &bogus).await.status(), 401);

        let token = admin_token(&f.state);
        let request = Request::new("GET", "/auth/me")
            .with_header("Authorization", &format!("Bearer {token}"));
        let response = handle(&f.state, &request).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["username"], "admin");
    }

    #[tokio::test]
    async fn register_is_admin_only() {
        let f = fixture();
        let admin = admin_token(&f.state);

        let request = Request::new("POST", "/auth/register")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&RegisterRequest {
                username: "crew".into(),
                password: "secret123".into(),
                is_admin: false,
                permissions: vec![],
            });
        assert_eq!(handle(&f.state, &request).await.status(), 201);

        let crew = f.state.auth.login("crew", "secret123").unwrap().0;
        let request = Request::new("POST", "/auth/register")
            .with_header("Authorization", &format!("Bearer {crew}"))
            .with_json(&RegisterRequest {
                username: "other".into(),
                password: "secret123".into(),
                is_admin: false,
                permissions: vec![],
            });
        assert_eq!(handle(&f.state, &request).await.status(), 403);
    }

    #[tokio::test]
    async fn edit_cue_checks_column_permission_before_mutating() {
        let f = fixture();
        let admin = admin_token(&f.state);
        let stack = f.state.document.stacks().remove(0);
        let cue_id = stack.cues[0].id;

        // Crew may edit "Preset" (column 1) only.
        let request = Request::new("POST", "/auth/register")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&RegisterRequest {
                username: "crew".into(),
                password: "secret123".into(),
                is_admin: false,
                permissions: vec![GrantRequest {
                    cue_stack_id: stack.id,
                    allowed_columns: vec!["Preset".into()],
                    allowed_column_indices: None,
                }],
            });
        handle(&f.state, &request).await;
        let crew = f.state.auth.login("crew", "secret123").unwrap().0;

        let edit = |column_index: usize, value: &str| {
            Request::new("PUT", format!("/cues/{cue_id}"))
                .with_header("Authorization", &format!("Bearer {crew}"))
                .with_json(&EditCueRequest {
                    cue_id,
                    column_index,
                    new_value: value.into(),
                })
        };

        let denied = handle(&f.state, &edit(0, "2")).await;
        assert_eq!(denied.status(), 403);
        // Denied edits never touch the document.
        assert_eq!(f.state.document.stacks()[0].cues[0].values[0], "1");

        let allowed = handle(&f.state, &edit(1, "Blackout")).await;
        assert_eq!(allowed.status(), 200);
        assert_eq!(f.state.document.stacks()[0].cues[0].values[1], "Blackout");
    }

    #[tokio::test]
    async fn edit_cue_rejects_mismatched_and_unknown_ids() {
        let f = fixture();
        let admin = admin_token(&f.state);
        let cue_id = f.state.document.stacks()[0].cues[0].id;

        let mismatch = Request::new("PUT", format!("/cues/{}", Uuid::new_v4()))
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&EditCueRequest {
                cue_id,
                column_index: 0,
                new_value: "x".into(),
            });
        assert_eq!(handle(&f.state, &mismatch).await.status(), 400);

        let unknown = Uuid::new_v4();
        let missing = Request::new("PUT", format!("/cues/{unknown}"))
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&EditCueRequest {
                cue_id: unknown,
                column_index: 0,
                new_value: "x".into(),
            });
        assert_eq!(handle(&f.state, &missing).await.status(), 404);

        let not_a_uuid = Request::new("PUT", "/cues/not-a-uuid")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&EditCueRequest {
                cue_id,
                column_index: 0,
                new_value: "x".into(),
            });
        assert_eq!(handle(&f.state, &not_a_uuid).await.status(), 404);
    }

    #[tokio::test]
    async fn add_and_delete_cue_require_a_grant_on_the_stack() {
        let f = fixture();
        let admin = admin_token(&f.state);
        let stack_id = f.state.document.stacks()[0].id;

        let add = Request::new("POST", "/cues")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&AddCueRequest {
                cue_stack_id: stack_id,
                values: vec!["2".into()],
                timer_value: "1:00".into(),
            });
        let response = handle(&f.state, &add).await;
        assert_eq!(response.status(), 200);
        let added_id: Uuid = body_json(&response)["cueId"]
            .as_str()
            .unwrap()
            .parse()
            .unwrap();

        // A user with no grant on the stack cannot delete.
        let register = Request::new("POST", "/auth/register")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&RegisterRequest {
                username: "crew".into(),
                password: "secret123".into(),
                is_admin: false,
                permissions: vec![],
            });
        handle(&f.state, &register).await;
        let crew = f.state.auth.login("crew", "secret123").unwrap().0;

        let delete = Request::new("DELETE", format!("/cues/{added_id}"))
            .with_header("Authorization", &format!("Bearer {crew}"));
        assert_eq!(handle(&f.state, &delete).await.status(), 403);

        let delete = Request::new("DELETE", format!("/cues/{added_id}"))
            .with_header("Authorization", &format!("Bearer {admin}"));
        assert_eq!(handle(&f.state, &delete).await.status(), 200);
        assert_eq!(f.state.document.stacks()[0].cues.len(), 1);
    }

    #[tokio::test]
    async fn select_stack_rearms_the_countdown() {
        let f = fixture();
        let request = Request::new("POST", "/select-cue-stack")
            .with_json(&SelectStackRequest { cue_stack_index: 0 });
        let response = handle(&f.state, &request).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(&response)["cueStackName"], "Act One");

        // First cue reads "5:00": the countdown is armed and running.
        let snapshot = f.state.timer.snapshot();
        assert!(snapshot.countdown_running);
        assert!((snapshot.countdown_value - 300.0).abs() < 0.5);

        let out_of_range = Request::new("POST", "/select-cue-stack")
            .with_json(&SelectStackRequest { cue_stack_index: 7 });
        assert_eq!(handle(&f.state, &out_of_range).await.status(), 400);
    }

    #[tokio::test]
    async fn timer_command_and_state() {
        let f = fixture();
        let command = Request::new("POST", "/timer-command").with_json(&TimerCommandRequest {
            action: "setCountdownTime".into(),
            countdown_time: Some(120.0),
            ..Default::default()
        });
        assert_eq!(handle(&f.state, &command).await.status(), 200);

        let state = handle(&f.state, &Request::new("GET", "/timer-state")).await;
        let body = body_json(&state);
        assert_eq!(body["countdownTime"], 120.0);
        assert_eq!(body["countdownRunning"], false);
        assert!(body.get("countdownTarget").is_none());

        let unknown = Request::new("POST", "/timer-command").with_json(&TimerCommandRequest {
            action: "warpDrive".into(),
            ..Default::default()
        });
        assert_eq!(handle(&f.state, &unknown).await.status(), 400);
    }

    #[tokio::test]
    async fn snapshot_and_page_and_misc_routes() {
        let f = fixture();

        let page = handle(&f.state, &Request::new("GET", "/")).await;
        assert_eq!(page.status(), 200);

        let snapshot = handle(&f.state, &Request::new("GET", "/cues")).await;
        assert_eq!(snapshot.status(), 200);
        assert_eq!(body_json(&snapshot)["cueStackName"], "Act One");

        let preflight = handle(&f.state, &Request::new("OPTIONS", "/anything")).await;
        assert_eq!(preflight.status(), 200);

        let missing = handle(&f.state, &Request::new("GET", "/no-such-route")).await;
        assert_eq!(missing.status(), 404);

        // Logout without a token still acknowledges.
        let logout = handle(&f.state, &Request::new("POST", "/auth/logout")).await;
        assert_eq!(body_json(&logout)["success"], true);
    }

    #[tokio::test]
    async fn logout_evicts_the_token() {
        let f = fixture();
        let token = admin_token(&f.state);

        let logout = Request::new("POST", "/auth/logout")
            .with_header("Authorization", &format!("Bearer {token}"));
        assert_eq!(handle(&f.state, &logout).await.status(), 200);

        let me = Request::new("GET", "/auth/me")
            .with_header("Authorization", &format!("Bearer {token}"));
        assert_eq!(handle(&f.state, &me).await.status(), 401);
    }

    #[tokio::test]
    async fn permissions_resolve_against_the_document() {
        let f = fixture();
        let admin = admin_token(&f.state);
        let stack = f.state.document.stacks().remove(0);

        let register = Request::new("POST", "/auth/register")
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&RegisterRequest {
                username: "crew".into(),
                password: "secret123".into(),
                is_admin: false,
                permissions: vec![GrantRequest {
                    cue_stack_id: stack.id,
                    allowed_columns: vec!["Preset".into()],
                    allowed_column_indices: None,
                }],
            });
        handle(&f.state, &register).await;
        let crew = f.state.auth.login("crew", "secret123").unwrap().0;

        let request = Request::new("GET", "/auth/permissions")
            .with_header("Authorization", &format!("Bearer {crew}"));
        let response = handle(&f.state, &request).await;
        assert_eq!(response.status(), 200);
        let body = body_json(&response);
        assert_eq!(body[0]["cueStackName"], "Act One");
        assert_eq!(body[0]["allowedColumns"][0], "Preset");
        assert_eq!(body[0]["columnNames"], serde_json::json!(["Cue", "Preset"]));
    }

    #[tokio::test]
    async fn stalled_document_mutation_times_out_as_503() {
        struct StalledDocument {
            stacks: Vec<CueStack>,
        }
        impl CueDocument for StalledDocument {
            fn stacks(&self) -> Vec<CueStack> {
                self.stacks.clone()
            }
            fn snapshot(&self, _current_time: &str) -> Option<cuelink_model::StackSnapshot> {
                None
            }
            fn select_stack(&self, _index: usize) -> Option<crate::document::SelectedStack> {
                None
            }
            fn apply(&self, _mutation: CueMutation) -> oneshot::Receiver<MutationOutcome> {
                // Never answers: the sender side is dropped only when the
                // document is, which outlives the request.
                let (tx, rx) = oneshot::channel();
                std::mem::forget(tx);
                rx
            }
        }

        let f = fixture();
        let mut stack = CueStack::new("Act One", vec![Column::new("Cue", 60.0)]);
        stack.cues.push(Cue::new(vec!["1".into()], ""));
        let cue_id = stack.cues[0].id;
        let state = AppState {
            config: ServerConfig::default()
                .with_mutation_timeout(std::time::Duration::from_millis(50)),
            auth: Arc::clone(&f.state.auth),
            timer: Arc::clone(&f.state.timer),
            document: Arc::new(StalledDocument { stacks: vec![stack] }),
        };
        let admin = admin_token(&state);

        let request = Request::new("PUT", format!("/cues/{cue_id}"))
            .with_header("Authorization", &format!("Bearer {admin}"))
            .with_json(&EditCueRequest {
                cue_id,
                column_index: 0,
                new_value: "x".into(),
            });
        assert_eq!(handle(&state, &request).await.status(), 503);
    }
}
