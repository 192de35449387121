//! Configuration for commlink
//!
//! Centralized configuration with sensible defaults.

use std::time::Duration;

use crate::error::{CommError, Result};

/// Configuration shared by servers, clients, datagram endpoints and the reactor
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Stream Configuration
    // -------------------------------------------------------------------------
    /// Max simultaneous inbound connections per server
    pub max_connections: usize,

    /// Deadline for an outbound connect attempt
    pub connect_timeout: Duration,

    /// Bytes read from a stream socket per read call
    pub read_chunk_size: usize,

    /// Disable Nagle's algorithm on stream sockets
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Datagram Configuration
    // -------------------------------------------------------------------------
    /// Largest datagram the receiver will read (longer ones are truncated)
    pub max_datagram_size: usize,

    // -------------------------------------------------------------------------
    // Reactor Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the mio event buffer per poll
    pub event_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(20),
            read_chunk_size: 4096,
            nodelay: true,
            max_datagram_size: 4096,
            event_capacity: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values the reactor cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            return Err(CommError::Config("max_connections must be > 0".into()));
        }
        if self.read_chunk_size == 0 {
            return Err(CommError::Config("read_chunk_size must be > 0".into()));
        }
        if self.max_datagram_size == 0 {
            return Err(CommError::Config("max_datagram_size must be > 0".into()));
        }
        if self.event_capacity == 0 {
            return Err(CommError::Config("event_capacity must be > 0".into()));
        }
        if self.connect_timeout.is_zero() {
            return Err(CommError::Config("connect_timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the maximum number of simultaneous inbound connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.max_connections = count;
        self
    }

    /// Set the outbound connect deadline
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the per-read chunk size for stream sockets (in bytes)
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.config.read_chunk_size = size;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the largest datagram the receiver reads (in bytes)
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.config.max_datagram_size = size;
        self
    }

    /// Set the reactor's event buffer capacity
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
