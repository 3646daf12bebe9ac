//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the CueLink server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrently tracked connections.
    pub max_connections: usize,
    /// Cadence of the connection and session sweeps.
    pub sweep_interval: Duration,
    /// A ready connection with no activity for this long is reclaimed.
    pub idle_timeout: Duration,
    /// A connection stuck in the waiting state this long is reclaimed.
    pub waiting_timeout: Duration,
    /// A session with no request for this long moves to the inactive set.
    pub session_inactive_after: Duration,
    /// Delay between pipelined requests on one connection.
    pub pacing_delay: Duration,
    /// Bounded wait on an externally-applied cue mutation.
    pub mutation_timeout: Duration,
    /// Path of the credential store file.
    pub store_path: PathBuf,
}

impl ServerConfig {
    /// Creates a configuration with the standard limits.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 100,
            sweep_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300),
            waiting_timeout: Duration::from_secs(30),
            session_inactive_after: Duration::from_secs(30),
            pacing_delay: Duration::from_millis(100),
            mutation_timeout: Duration::from_secs(10),
            store_path: PathBuf::from("cuelink_credentials.json"),
        }
    }

    /// Sets the maximum concurrently tracked connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the sweep cadence.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Sets the idle reclamation timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the bounded wait on cue mutations.
    pub fn with_mutation_timeout(mut self, timeout: Duration) -> Self {
        self.mutation_timeout = timeout;
        self
    }

    /// Sets the credential store path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_limits() {
        let config = ServerConfig::default();
        assert_eq!(config.max_connections, 100);
        assert_eq!(config.idle_timeout, Duration::from_secs(300));
        assert_eq!(config.waiting_timeout, Duration::from_secs(30));
        assert_eq!(config.session_inactive_after, Duration::from_secs(30));
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_connections(8)
            .with_mutation_timeout(Duration::from_secs(2))
            .with_store_path("/tmp/creds.json");

        assert_eq!(config.max_connections, 8);
        assert_eq!(config.mutation_timeout, Duration::from_secs(2));
        assert_eq!(config.store_path, PathBuf::from("/tmp/creds.json"));
    }
}
