//! TCP accept loop, per-connection receive loops, and periodic sweeps.

use crate::connection::{ConnectionId, ConnectionManager};
use crate::error::ServerResult;
use crate::handlers::{handle, AppState};
use crate::http::{Request, Response};
use crate::session::SessionRegistry;
use bytes::{Buf, BytesMut};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// How long a read may sit on a partial request before the connection is
/// marked waiting.
const READ_SLICE: Duration = Duration::from_secs(1);

/// The CueLink server.
///
/// Owns the listener, the connection manager, and the session registry;
/// request handling is delegated to [`handle`]. Connections are kept open
/// for pipelined keep-alive requests and reclaimed by the periodic sweep
/// when they fail, stall, or go idle.
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    connections: Arc<ConnectionManager>,
    sessions: Arc<SessionRegistry>,
}

impl Server {
    /// Binds the listener for the configured address.
    pub async fn bind(state: AppState) -> ServerResult<Self> {
        let listener = TcpListener::bind(state.config.bind_addr).await?;
        let connections = Arc::new(ConnectionManager::new(&state.config));
        let sessions = Arc::new(SessionRegistry::new(state.config.session_inactive_after));
        Ok(Self {
            listener,
            state: Arc::new(state),
            connections,
            sessions,
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// The connection manager, for operator diagnostics.
    pub fn connections(&self) -> Arc<ConnectionManager> {
        Arc::clone(&self.connections)
    }

    /// The session registry, for operator diagnostics.
    pub fn sessions(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.sessions)
    }

    /// Accepts and serves connections until the listener fails.
    pub async fn serve(self) -> ServerResult<()> {
        let addr = self.local_addr()?;
        info!(%addr, capacity = self.connections.capacity(), "server listening");

        let sweep_connections = Arc::clone(&self.connections);
        let sweep_sessions = Arc::clone(&self.sessions);
        let sweep_interval = self.state.config.sweep_interval;
        let sweeper = tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let reclaimed = sweep_connections.sweep();
                let retired = sweep_sessions.sweep();
                if reclaimed > 0 || retired > 0 {
                    debug!(reclaimed, retired, "sweep pass");
                }
            }
        });

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    error!(%err, "accept failed");
                    sweeper.abort();
                    return Err(err.into());
                }
            };

            let id = match self.connections.admit(peer) {
                Ok(id) => id,
                // Rejected at the ceiling or duplicate endpoint: close
                // immediately, nothing is tracked.
                Err(_) => {
                    drop(stream);
                    continue;
                }
            };

            let state = Arc::clone(&self.state);
            let connections = Arc::clone(&self.connections);
            let sessions = Arc::clone(&self.sessions);
            tokio::spawn(async move {
                serve_connection(state, connections, sessions, stream, peer, id).await;
            });
        }
    }
}

/// Receive loop for one connection.
///
/// Requests are framed out of the buffer and handled in arrival order, with
/// the pacing delay between pipelined requests. A partial request that stops
/// making progress marks the connection waiting; the sweep reclaims it if
/// that lasts.
async fn serve_connection(
    state: Arc<AppState>,
    connections: Arc<ConnectionManager>,
    sessions: Arc<SessionRegistry>,
    mut stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
) {
    connections.mark_ready(id);
    let pacing = state.config.pacing_delay;
    let mut buf = BytesMut::with_capacity(4 * 1024);

    loop {
        if !connections.is_active(id) {
            debug!(id, %peer, "connection no longer tracked, dropping");
            break;
        }

        match Request::try_parse(&buf) {
            Ok(Some((request, consumed))) => {
                buf.advance(consumed);

                let signature = request.header("user-agent").map(|s| s.to_string());
                connections.record_request(id, signature.as_deref());
                if let Some(signature) = &signature {
                    sessions.touch(peer.ip(), signature);
                }

                let response = handle(&state, &request).await;
                debug!(
                    id,
                    method = request.method,
                    path = request.path,
                    status = response.status(),
                    "handled request"
                );
                if let Err(err) = stream.write_all(&response.to_bytes()).await {
                    note_send_failure(&connections, id, peer, &err);
                    break;
                }

                // Pacing before re-arming for the next pipelined request.
                tokio::time::sleep(pacing).await;
                continue;
            }
            Ok(None) => {}
            Err(err) => {
                // Malformed bytes: answer 500-class and drop the connection.
                error!(id, %peer, %err, "malformed request");
                let farewell = Response::from_error(&err).closing();
                let _ = stream.write_all(&farewell.to_bytes()).await;
                connections.mark_failed(id);
                break;
            }
        }

        match tokio::time::timeout(READ_SLICE, stream.read_buf(&mut buf)).await {
            // No bytes this slice. An empty buffer is just an idle
            // keep-alive connection; a stalled partial request is waiting.
            Err(_) => {
                if !buf.is_empty() {
                    connections.mark_waiting(id);
                }
            }
            Ok(Ok(0)) => {
                debug!(id, %peer, "peer closed connection");
                connections.mark_cancelled(id);
                break;
            }
            Ok(Ok(_)) => {
                connections.mark_ready(id);
            }
            Ok(Err(err)) => {
                if is_benign_cancellation(&err) {
                    debug!(id, %peer, %err, "connection cancelled");
                    connections.mark_cancelled(id);
                } else {
                    error!(id, %peer, %err, "connection read failed");
                    connections.mark_failed(id);
                }
                break;
            }
        }
    }

    connections.release(id);
}

fn note_send_failure(
    connections: &ConnectionManager,
    id: ConnectionId,
    peer: SocketAddr,
    err: &io::Error,
) {
    if is_benign_cancellation(err) {
        debug!(id, %peer, %err, "send cancelled");
        connections.mark_cancelled(id);
    } else {
        error!(id, %peer, %err, "send failed");
        connections.mark_failed(id);
    }
}

/// Error kinds a disappearing phone produces in normal operation.
fn is_benign_cancellation(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
    )
}
