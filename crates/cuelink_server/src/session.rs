//! Durable client-session identities, aggregated across connections.
//!
//! A device opens many short-lived connections over time; what the operator
//! wants to see is the device. Sessions are keyed by `(ip, signature)` and
//! survive transient network churn: silence moves a session to the inactive
//! set, never deletes it, and a returning device reclaims its identity.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tracing::debug;

/// Device family derived from the client signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCategory {
    /// iPhone.
    Ios,
    /// iPad.
    IPadOs,
    /// Android phone or tablet.
    Android,
    /// Desktop browser on macOS.
    MacOs,
    /// Desktop browser on Windows.
    Windows,
    /// The native companion app, platform not declared.
    App,
    /// No signature seen, or nothing recognized.
    Unknown,
}

impl ClientCategory {
    /// Derives a category from a client signature (User-Agent).
    ///
    /// OS families win over the app marker so "CueLink iPadOS/2.1" reads as
    /// an iPad, not a generic app.
    pub fn from_signature(signature: &str) -> Self {
        let s = signature.to_ascii_lowercase();
        if s.contains("ipad") {
            ClientCategory::IPadOs
        } else if s.contains("iphone") || s.contains("ios") {
            ClientCategory::Ios
        } else if s.contains("android") {
            ClientCategory::Android
        } else if s.contains("macintosh") || s.contains("mac os") || s.contains("macos") {
            ClientCategory::MacOs
        } else if s.contains("windows") {
            ClientCategory::Windows
        } else if s.contains("cuelink") {
            ClientCategory::App
        } else {
            ClientCategory::Unknown
        }
    }
}

impl fmt::Display for ClientCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ClientCategory::Ios => "iOS",
            ClientCategory::IPadOs => "iPadOS",
            ClientCategory::Android => "Android",
            ClientCategory::MacOs => "macOS",
            ClientCategory::Windows => "Windows",
            ClientCategory::App => "App",
            ClientCategory::Unknown => "Unknown",
        };
        f.write_str(label)
    }
}

/// A logical device identity.
#[derive(Debug, Clone)]
pub struct ClientSession {
    /// Source address.
    pub ip: IpAddr,
    /// Declared client identity string.
    pub signature: String,
    /// Derived device family.
    pub category: ClientCategory,
    /// First request ever seen from this identity.
    pub first_seen: Instant,
    /// Most recent request.
    pub last_seen: Instant,
}

type SessionKey = (IpAddr, String);

/// Ordering for session list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrdering {
    /// Oldest identity first.
    FirstSeen,
    /// Most recently active last.
    LastSeen,
    /// By source address.
    Address,
    /// First-seen, then address, then signature. Deterministic, for UI rows.
    Stable,
}

#[derive(Debug, Default)]
struct RegistryInner {
    active: HashMap<SessionKey, ClientSession>,
    inactive: HashMap<SessionKey, ClientSession>,
}

/// Tracks active and inactive sessions behind one mutex.
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
    inactive_after: Duration,
}

impl SessionRegistry {
    /// Creates a registry that retires sessions after the given silence.
    pub fn new(inactive_after: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            inactive_after,
        }
    }

    /// Records a request from `(ip, signature)`.
    ///
    /// Creates the session on first sight, refreshes `last_seen` otherwise,
    /// and pulls a retired session back out of the inactive set so the two
    /// sets never hold the same identity.
    pub fn touch(&self, ip: IpAddr, signature: &str) {
        let key = (ip, signature.to_string());
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if let Some(session) = inner.active.get_mut(&key) {
            session.last_seen = now;
            return;
        }

        let session = match inner.inactive.remove(&key) {
            Some(mut session) => {
                session.last_seen = now;
                debug!(%ip, signature, "session reactivated");
                session
            }
            None => {
                debug!(%ip, signature, "new client session");
                ClientSession {
                    ip,
                    signature: signature.to_string(),
                    category: ClientCategory::from_signature(signature),
                    first_seen: now,
                    last_seen: now,
                }
            }
        };
        inner.active.insert(key, session);
    }

    /// Moves sessions silent for the configured window to the inactive set.
    ///
    /// Returns the number of sessions retired.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock();
        let inactive_after = self.inactive_after;

        let retired: Vec<SessionKey> = inner
            .active
            .iter()
            .filter(|(_, s)| now.saturating_duration_since(s.last_seen) >= inactive_after)
            .map(|(k, _)| k.clone())
            .collect();

        for key in &retired {
            if let Some(session) = inner.active.remove(key) {
                debug!(ip = %session.ip, signature = session.signature, "session retired");
                // Overwrites any stale entry for the same identity.
                inner.inactive.insert(key.clone(), session);
            }
        }
        retired.len()
    }

    /// Active sessions in the requested order.
    pub fn active(&self, ordering: SessionOrdering) -> Vec<ClientSession> {
        let mut sessions: Vec<ClientSession> =
            self.inner.lock().active.values().cloned().collect();
        sort_sessions(&mut sessions, ordering);
        sessions
    }

    /// Inactive sessions in the requested order.
    ///
    /// Retained until process exit for operator visibility.
    pub fn inactive(&self, ordering: SessionOrdering) -> Vec<ClientSession> {
        let mut sessions: Vec<ClientSession> =
            self.inner.lock().inactive.values().cloned().collect();
        sort_sessions(&mut sessions, ordering);
        sessions
    }

    /// Number of active sessions.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active.len()
    }

    /// Number of inactive sessions.
    pub fn inactive_count(&self) -> usize {
        self.inner.lock().inactive.len()
    }
}

fn sort_sessions(sessions: &mut [ClientSession], ordering: SessionOrdering) {
    match ordering {
        SessionOrdering::FirstSeen => sessions.sort_by_key(|s| s.first_seen),
        SessionOrdering::LastSeen => sessions.sort_by_key(|s| s.last_seen),
        SessionOrdering::Address => sessions.sort_by_key(|s| s.ip),
        SessionOrdering::Stable => {
            sessions.sort_by(|a, b| {
                a.first_seen
                    .cmp(&b.first_seen)
                    .then(a.ip.cmp(&b.ip))
                    .then(a.signature.cmp(&b.signature))
            });
        }
    }
}
