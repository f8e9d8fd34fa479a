//! Server Configuration
//!
//! Defaults with environment variable overrides. CLI flags in `main.rs`
//! take precedence over both.

use std::net::SocketAddr;

/// Default manager port peers send commands to.
pub const DEFAULT_PORT: u16 = 44000;

/// Largest command datagram accepted.
pub const DEFAULT_MAX_DATAGRAM: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// UDP address commands are received on (env: RINGMESH_BIND)
    pub bind_addr: SocketAddr,

    /// Receive buffer size; longer datagrams are truncated (env: RINGMESH_MAX_DATAGRAM)
    pub max_datagram: usize,

    /// Prometheus listener, disabled when unset (env: RINGMESH_METRICS_ADDR)
    pub metrics_addr: Option<SocketAddr>,

    /// Fixed seed for member selection, entropy when unset (env: RINGMESH_SEED)
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_datagram: DEFAULT_MAX_DATAGRAM,
            metrics_addr: None,
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by any parseable environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("RINGMESH_BIND").and_then(|v| v.parse().ok()) {
            config.bind_addr = addr;
        }

        if let Some(size) = lookup("RINGMESH_MAX_DATAGRAM").and_then(|v| v.parse().ok()) {
            config.max_datagram = size;
        }

        if let Some(addr) = lookup("RINGMESH_METRICS_ADDR").and_then(|v| v.parse().ok()) {
            config.metrics_addr = Some(addr);
        }

        if let Some(seed) = lookup("RINGMESH_SEED").and_then(|v| v.parse().ok()) {
            config.seed = Some(seed);
        }

        config
    }
}
