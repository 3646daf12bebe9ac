//! The `serve` command.

use cuelink_auth::AuthEngine;
use cuelink_model::{Column, Cue, CueStack};
use cuelink_server::{AppState, MemoryCueDocument, Server, ServerConfig};
use cuelink_store::{unix_millis, CredentialStore};
use cuelink_timer::{spawn_ticker, ShowTimer};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Starts the server and runs until ctrl-c.
pub async fn run(
    bind: SocketAddr,
    store_path: &Path,
    stacks_path: Option<&Path>,
    seed_admin: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = CredentialStore::open(store_path, unix_millis())?;
    let auth = Arc::new(AuthEngine::new(store));

    if seed_admin && auth.seed_default_admin()? {
        warn!("default admin credentials are active; change them before show night");
    }
    if auth.user_count() == 0 {
        warn!("credential store has no users; run with --seed-admin to bootstrap");
    }

    let stacks = match stacks_path {
        Some(path) => load_stacks(path)?,
        None => vec![demo_stack()],
    };
    auth.migrate_legacy_grants(&stacks)?;

    let timer = Arc::new(ShowTimer::new());
    let ticker = spawn_ticker(Arc::clone(&timer));

    let state = AppState {
        config: ServerConfig::new(bind).with_store_path(store_path),
        auth,
        timer,
        document: Arc::new(MemoryCueDocument::new(stacks)),
    };
    let server = Server::bind(state).await?;
    info!(addr = %server.local_addr()?, "cuelink serving");

    tokio::select! {
        result = server.serve() => {
            result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    ticker.abort();
    Ok(())
}

fn load_stacks(path: &Path) -> Result<Vec<CueStack>, Box<dyn std::error::Error>> {
    let raw = std::fs::read(path)?;
    let stacks: Vec<CueStack> = serde_json::from_slice(&raw)?;
    info!(count = stacks.len(), path = %path.display(), "loaded cue stacks");
    Ok(stacks)
}

fn demo_stack() -> CueStack {
    let mut stack = CueStack::new(
        "Demo Show",
        vec![
            Column::new("Cue", 60.0),
            Column::new("Action", 160.0),
            Column::new("Notes", 200.0),
        ],
    );
    stack.cues.push(Cue::new(
        vec!["1".into(), "House to half".into(), String::new()],
        "0:30",
    ));
    stack.cues.push(Cue::new(
        vec!["2".into(), "House out, curtain up".into(), String::new()],
        "5:00",
    ));
    stack
}
