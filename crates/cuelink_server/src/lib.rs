//! # CueLink Server
//!
//! The transport and protocol layer of CueLink: a TCP listener with
//! connection admission and lifecycle tracking, durable client-session
//! identities, a minimal HTTP/1.1 codec with permissive CORS, and the
//! request handlers that tie the auth engine, the authoritative timer, and
//! the cue document together.
//!
//! ## Architecture
//!
//! ```text
//! TcpListener ──▶ ConnectionManager (admit, track, sweep)
//!                      │
//!                      ▼ per-connection receive loop
//!                 Request::try_parse ──▶ route ──▶ handle
//!                      │                             │
//!                 SessionRegistry            AuthEngine / ShowTimer
//!                 (device identities)        CueDocument bridge
//! ```
//!
//! The document the handlers mutate is owned by the desktop layer; see
//! [`CueDocument`] for the seam.

mod config;
mod connection;
mod document;
mod error;
mod handlers;
mod http;
mod router;
mod server;
mod session;

pub use config::ServerConfig;
pub use connection::{ConnectionDiagnostics, ConnectionId, ConnectionManager, ConnectionState};
pub use document::{parse_timer_label, CueDocument, MemoryCueDocument, SelectedStack};
pub use error::{ServerError, ServerResult};
pub use handlers::{handle, AppState};
pub use http::{Request, Response};
pub use router::{route, Route};
pub use server::Server;
pub use session::{ClientCategory, ClientSession, SessionOrdering, SessionRegistry};
