//! Configuration for resptap
//!
//! Centralized configuration with sensible defaults. How the values get here
//! (flags, environment, a file) is up to the caller.

use crate::error::{ProxyError, Result};

/// Default maximum nesting depth for aggregate responses
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Main configuration for a proxy instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address for clients
    pub listen_addr: String,

    /// Address of the real server every session is relayed to
    pub backend_addr: String,

    /// Socket read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm on both legs
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Decoder Configuration
    // -------------------------------------------------------------------------
    /// Deepest aggregate nesting accepted from the backend
    pub max_depth: usize,

    // -------------------------------------------------------------------------
    // Observer Configuration
    // -------------------------------------------------------------------------
    /// Register the tracing log observer
    pub log_commands: bool,

    /// Publish completed events to an external store
    pub publisher: Option<PublisherConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:6400".to_string(),
            backend_addr: "127.0.0.1:6379".to_string(),
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            nodelay: true,
            max_depth: DEFAULT_MAX_DEPTH,
            log_commands: true,
            publisher: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject values no session could run with
    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.trim().is_empty() {
            return Err(ProxyError::Config("listen address is empty".to_string()));
        }
        if self.backend_addr.trim().is_empty() {
            return Err(ProxyError::Config("backend address is empty".to_string()));
        }
        if self.max_depth == 0 {
            return Err(ProxyError::Config(
                "max decode depth must be at least 1".to_string(),
            ));
        }
        if let Some(publisher) = &self.publisher {
            publisher.validate()?;
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
    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the backend address
    pub fn backend_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.backend_addr = addr.into();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Enable or disable TCP_NODELAY
    pub fn nodelay(mut self, enabled: bool) -> Self {
        self.config.nodelay = enabled;
        self
    }

    /// Set the maximum aggregate nesting depth
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    /// Enable or disable the log observer
    pub fn log_commands(mut self, enabled: bool) -> Self {
        self.config.log_commands = enabled;
        self
    }

    /// Publish completed events with the given settings
    pub fn publisher(mut self, publisher: PublisherConfig) -> Self {
        self.config.publisher = Some(publisher);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// How the publisher delivers records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishMode {
    /// `PUBLISH <channel> <record>`
    Channel,

    /// `LPUSH <list_key> <record>`, then trimmed to `max_list_len`
    List,
}

/// Settings for the external-store publisher observer
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    /// Address of the store receiving records
    pub addr: String,

    /// Sent with AUTH on connect when set
    pub password: Option<String>,

    /// Database selected on connect
    pub db: u32,

    /// Channel name for `PublishMode::Channel`
    pub channel: String,

    /// List key for `PublishMode::List`
    pub list_key: String,

    /// Records kept in the list (0 = unbounded)
    pub max_list_len: u64,

    pub mode: PublishMode,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:6379".to_string(),
            password: None,
            db: 0,
            channel: "redis:commands".to_string(),
            list_key: "redis:command_list".to_string(),
            max_list_len: 0,
            mode: PublishMode::Channel,
        }
    }
}

impl PublisherConfig {
    fn validate(&self) -> Result<()> {
        if self.addr.trim().is_empty() {
            return Err(ProxyError::Config("publisher address is empty".to_string()));
        }
        match self.mode {
            PublishMode::Channel if self.channel.is_empty() => Err(ProxyError::Config(
                "publisher channel is empty".to_string(),
            )),
            PublishMode::List if self.list_key.is_empty() => Err(ProxyError::Config(
                "publisher list key is empty".to_string(),
            )),
            _ => Ok(()),
        }
    }
}
