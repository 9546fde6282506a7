//! Configuration types for opencode-ctl.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// Controller configuration, optionally loaded from a YAML file.
///
/// Every value the controller uses flows from this struct; there is no
/// process-wide default state.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct ControllerConfig {
    /// Server location and lifecycle settings
    pub server: ServerSettings,
    /// HTTP client settings
    pub client: ClientSettings,
    /// Completion polling settings
    pub completion: CompletionSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

impl ControllerConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ControllerConfig =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;
        if server.host.trim().is_empty() {
            return Err(Error::Config("server.host cannot be empty".to_string()));
        }
        if server.port == 0 {
            return Err(Error::Config("server.port must be > 0".to_string()));
        }
        if server.executable.trim().is_empty() {
            return Err(Error::Config(
                "server.executable cannot be empty".to_string(),
            ));
        }
        if server.startup_timeout_secs == 0
            || server.probe_timeout_ms == 0
            || server.probe_interval_ms == 0
        {
            return Err(Error::Config(
                "server timeouts and intervals must be > 0".to_string(),
            ));
        }

        let client = &self.client;
        if client.request_timeout_secs == 0
            || client.message_timeout_secs == 0
            || client.async_timeout_secs == 0
        {
            return Err(Error::Config("client timeouts must be > 0".to_string()));
        }
        if matches!(&client.default_agent, Some(agent) if agent.trim().is_empty()) {
            return Err(Error::Config(
                "client.default_agent cannot be blank".to_string(),
            ));
        }

        if self.completion.timeout_secs == 0 {
            return Err(Error::Config(
                "completion.timeout_secs must be > 0".to_string(),
            ));
        }
        if self.completion.message_window == 0 {
            return Err(Error::Config(
                "completion.message_window must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the server lives and how it is supervised.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerSettings {
    /// Hostname the server binds to and the client connects to
    pub host: String,
    /// TCP port
    pub port: u16,
    /// Working directory handed to the server; created if missing
    pub working_dir: PathBuf,
    /// Start the server when it is not reachable
    pub auto_start: bool,
    /// Server executable, resolved on the command search path
    pub executable: String,
    /// Seconds to wait for a launched server to become healthy
    pub startup_timeout_secs: u64,
    /// Health probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Interval between startup health probes in milliseconds
    pub probe_interval_ms: u64,
    /// Grace period between SIGTERM and a forced kill, in milliseconds
    pub shutdown_grace_ms: u64,
    /// File receiving the server's stdout and stderr (discarded when unset)
    pub log_file: Option<PathBuf>,
    /// Leave a server we started running when the controller is dropped
    pub keep_alive: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4096,
            working_dir: PathBuf::from("."),
            auto_start: true,
            executable: "opencode".to_string(),
            startup_timeout_secs: 30,
            probe_timeout_ms: 2000,
            probe_interval_ms: 500,
            shutdown_grace_ms: 5000,
            log_file: None,
            keep_alive: false,
        }
    }
}

impl ServerSettings {
    /// Base URL derived from host and port.
    ///
    /// Computed on every call so it always tracks the current host/port.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Startup window as a duration.
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    /// Health probe timeout as a duration.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    /// Startup probe interval as a duration.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    /// Shutdown grace period as a duration.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientSettings {
    /// Timeout for ordinary API calls in seconds
    pub request_timeout_secs: u64,
    /// Timeout for synchronous message sends in seconds
    pub message_timeout_secs: u64,
    /// Timeout for best-effort async sends in seconds
    pub async_timeout_secs: u64,
    /// Agent used when a send does not name one
    pub default_agent: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            request_timeout_secs: 30,
            message_timeout_secs: 120,
            async_timeout_secs: 5,
            default_agent: None,
        }
    }
}

/// Completion polling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CompletionSettings {
    /// Maximum time to wait for a session to go idle, in seconds
    pub timeout_secs: u64,
    /// Delay between status polls in milliseconds
    pub poll_interval_ms: u64,
    /// Number of recent messages fetched once the session is idle
    pub message_window: usize,
    /// Treat a session missing from the status map as idle
    pub missing_status_is_idle: bool,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            poll_interval_ms: 2000,
            message_window: 10,
            missing_status_is_idle: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
