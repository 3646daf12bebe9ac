//! Connection admission, lifecycle tracking, and reclamation.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::session::ClientCategory;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Identifier of a tracked connection.
pub type ConnectionId = u64;

/// Lifecycle state of a tracked connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Admitted, receive loop not yet armed.
    Preparing,
    /// Serving requests.
    Ready,
    /// Transient network unavailability; reclaimed if sustained.
    Waiting,
    /// Transport reported a real failure.
    Failed,
    /// Closed by the peer or cancelled benignly.
    Cancelled,
}

impl ConnectionState {
    /// Returns true for states that are reclaimed on the next sweep.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Cancelled)
    }
}

#[derive(Debug)]
struct TrackedConnection {
    endpoint: SocketAddr,
    state: ConnectionState,
    request_count: u64,
    last_activity: Instant,
    waiting_since: Option<Instant>,
    signature: Option<String>,
}

/// Diagnostic view of one tracked connection.
#[derive(Debug, Clone)]
pub struct ConnectionDiagnostics {
    /// Connection identifier.
    pub id: ConnectionId,
    /// Remote endpoint.
    pub endpoint: SocketAddr,
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Requests served so far.
    pub request_count: u64,
    /// Time since the last request.
    pub idle: Duration,
    /// Category derived from the client signature, if one was seen.
    pub category: ClientCategory,
}

#[derive(Debug, Default)]
struct ManagerInner {
    connections: HashMap<ConnectionId, TrackedConnection>,
    next_id: ConnectionId,
}

/// Tracks every live connection behind one mutex.
///
/// Admission, state changes, request accounting, and the periodic sweep all
/// go through the same lock, so concurrent accepts and reclamation callbacks
/// never race on the maps.
pub struct ConnectionManager {
    inner: Mutex<ManagerInner>,
    max_connections: usize,
    idle_timeout: Duration,
    waiting_timeout: Duration,
}

impl ConnectionManager {
    /// Creates a manager with the limits from the given configuration.
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            inner: Mutex::new(ManagerInner::default()),
            max_connections: config.max_connections,
            idle_timeout: config.idle_timeout,
            waiting_timeout: config.waiting_timeout,
        }
    }

    /// Admits a connection, or rejects it at the ceiling or when the remote
    /// endpoint is already tracked.
    ///
    /// An endpoint is the full remote `ip:port`. Devices sharing an address
    /// (NAT, several apps on one phone) stay admissible; the duplicate rule
    /// only guards against tracking the same socket twice.
    pub fn admit(&self, endpoint: SocketAddr) -> ServerResult<ConnectionId> {
        let mut inner = self.inner.lock();

        if inner.connections.len() >= self.max_connections {
            warn!(%endpoint, limit = self.max_connections, "rejected connection at ceiling");
            return Err(ServerError::ConnectionLimitExceeded {
                limit: self.max_connections,
            });
        }
        if inner.connections.values().any(|c| c.endpoint == endpoint) {
            debug!(%endpoint, "rejected duplicate endpoint");
            return Err(ServerError::DuplicateEndpoint(endpoint));
        }

        let id = inner.next_id;
        inner.next_id += 1;
        inner.connections.insert(
            id,
            TrackedConnection {
                endpoint,
                state: ConnectionState::Preparing,
                request_count: 0,
                last_activity: Instant::now(),
                waiting_since: None,
                signature: None,
            },
        );
        debug!(id, %endpoint, tracked = inner.connections.len(), "admitted connection");
        Ok(id)
    }

    /// Marks a connection ready, clearing any waiting marker.
    pub fn mark_ready(&self, id: ConnectionId) {
        let mut inner = self.inner.lock();
        if let Some(conn) = inner.connections.get_mut(&id) {
            conn.state = ConnectionState::Ready;
            conn.waiting_since = None;
        }
    }

    /// Marks a connection waiting; the first call starts the waiting clock.
    pub fn mark_waiting(&self, id: ConnectionId) {
        let mut inner = self.inner.lock();
        if let Some(conn) = inner.connections.get_mut(&id) {
            if conn.state != ConnectionState::Waiting {
                conn.state = ConnectionState::Waiting;
                conn.waiting_since = Some(Instant::now());
            }
        }
    }

    /// Marks a connection failed.
    pub fn mark_failed(&self, id: ConnectionId) {
        self.set_state(id, ConnectionState::Failed);
    }

    /// Marks a connection cancelled.
    pub fn mark_cancelled(&self, id: ConnectionId) {
        self.set_state(id, ConnectionState::Cancelled);
    }

    fn set_state(&self, id: ConnectionId, state: ConnectionState) {
        let mut inner = self.inner.lock();
        if let Some(conn) = inner.connections.get_mut(&id) {
            conn.state = state;
        }
    }

    /// Returns true if the connection is still tracked and ready.
    ///
    /// The receive loop checks this before re-arming; a swept connection
    /// answers false and the loop drops the socket.
    pub fn is_ready(&self, id: ConnectionId) -> bool {
        self.inner
            .lock()
            .connections
            .get(&id)
            .map(|c| c.state == ConnectionState::Ready)
            .unwrap_or(false)
    }

    /// Returns true if the connection is still tracked and not terminal.
    ///
    /// Waiting counts as live here; the sweep decides when sustained
    /// waiting becomes reclamation.
    pub fn is_active(&self, id: ConnectionId) -> bool {
        self.inner
            .lock()
            .connections
            .get(&id)
            .map(|c| !c.state.is_terminal())
            .unwrap_or(false)
    }

    /// Bumps the request counter and refreshes last-activity.
    pub fn record_request(&self, id: ConnectionId, signature: Option<&str>) {
        let mut inner = self.inner.lock();
        if let Some(conn) = inner.connections.get_mut(&id) {
            conn.request_count += 1;
            conn.last_activity = Instant::now();
            if conn.signature.is_none() {
                conn.signature = signature.map(|s| s.to_string());
            }
        }
    }

    /// Stops tracking a connection (receive loop exit).
    pub fn release(&self, id: ConnectionId) {
        self.inner.lock().connections.remove(&id);
    }

    /// Number of currently tracked connections.
    pub fn count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    /// The configured connection ceiling.
    pub fn capacity(&self) -> usize {
        self.max_connections
    }

    /// Diagnostic snapshot of every tracked connection, for the operator UI.
    pub fn diagnostics(&self) -> Vec<ConnectionDiagnostics> {
        let now = Instant::now();
        let inner = self.inner.lock();
        let mut entries: Vec<ConnectionDiagnostics> = inner
            .connections
            .iter()
            .map(|(id, conn)| ConnectionDiagnostics {
                id: *id,
                endpoint: conn.endpoint,
                state: conn.state,
                request_count: conn.request_count,
                idle: now.saturating_duration_since(conn.last_activity),
                category: conn
                    .signature
                    .as_deref()
                    .map(ClientCategory::from_signature)
                    .unwrap_or(ClientCategory::Unknown),
            })
            .collect();
        entries.sort_by_key(|e| e.id);
        entries
    }

    /// Reclaims failed/cancelled, stale-waiting, and idle connections.
    ///
    /// Returns the number of connections reclaimed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let idle_timeout = self.idle_timeout;
        let waiting_timeout = self.waiting_timeout;

        let before = inner.connections.len();
        inner.connections.retain(|id, conn| {
            let stale_waiting = conn
                .waiting_since
                .is_some_and(|since| now.saturating_duration_since(since) >= waiting_timeout);
            let idle = now.saturating_duration_since(conn.last_activity) >= idle_timeout;

            let reclaim = conn.state.is_terminal() || stale_waiting || idle;
            if reclaim {
                debug!(id, endpoint = %conn.endpoint, state = ?conn.state, "reclaimed connection");
            }
            !reclaim
        });
        before - inner.connections.len()
    }
}
