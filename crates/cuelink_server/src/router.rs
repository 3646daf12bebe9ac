//! Method + path routing.

/// The routing decision for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `GET /` — embedded client page.
    Index,
    /// `GET /cues` — current stack snapshot.
    CueSnapshot,
    /// `GET /timer-state`.
    TimerState,
    /// `POST /timer-command`.
    TimerCommand,
    /// `POST /select-cue-stack`.
    SelectStack,
    /// `POST /auth/login`.
    Login,
    /// `POST /auth/logout`.
    Logout,
    /// `GET /auth/me`.
    Me,
    /// `GET /auth/permissions`.
    Permissions,
    /// `POST /auth/register`.
    Register,
    /// `POST /cues`.
    AddCue,
    /// `PUT /cues/{id}` with the raw trailing segment.
    EditCue(String),
    /// `DELETE /cues/{id}` with the raw trailing segment.
    DeleteCue(String),
    /// `OPTIONS` on any path.
    Preflight,
    /// Everything else.
    NotFound,
}

/// Resolves a method and path to a [`Route`].
///
/// Exact matches except the two `/cues/{id}` prefix routes, whose trailing
/// segment is passed through as an opaque identifier.
pub fn route(method: &str, path: &str) -> Route {
    if method == "OPTIONS" {
        return Route::Preflight;
    }

    match (method, path) {
        ("GET", "/") => Route::Index,
        ("GET", "/cues") => Route::CueSnapshot,
        ("GET", "/timer-state") => Route::TimerState,
        ("POST", "/timer-command") => Route::TimerCommand,
        ("POST", "/select-cue-stack") => Route::SelectStack,
        ("POST", "/auth/login") => Route::Login,
        ("POST", "/auth/logout") => Route::Logout,
        ("GET", "/auth/me") => Route::Me,
        ("GET", "/auth/permissions") => Route::Permissions,
        ("POST", "/auth/register") => Route::Register,
        ("POST", "/cues") => Route::AddCue,
        ("PUT", _) | ("DELETE", _) => match path.strip_prefix("/cues/") {
            Some(id) if !id.is_empty() && !id.contains('/') => {
                if method == "PUT" {
                    Route::EditCue(id.to_string())
                } else {
                    Route::DeleteCue(id.to_string())
                }
            }
            _ => Route::NotFound,
        },
        _ => Route::NotFound,
    }
}
