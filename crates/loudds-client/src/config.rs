//! # Client Configuration
//!
//! Configuration management for the SDK and CLI.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     LOUDDS_API_URL=https://staging-b.louddata.space                    │
//! │     LOUDDS_ACCESS_TOKEN=eyJ0eXAi...                                    │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/loudds/loudds.toml (Linux)                               │
//! │     ~/Library/Application Support/space.louddata.loudds/loudds.toml   │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     http://cl-backend:8000, ssh/rsync from $PATH                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # loudds.toml
//! [api]
//! url = "https://staging-b.louddata.space"
//! request_timeout_secs = 30
//!
//! [tunnel]
//! ssh_binary = "ssh"
//! local_bind_port = 10873
//! ready_timeout_secs = 15
//!
//! [rsync]
//! binary = "rsync"
//! runs_dir = "../runs/"
//! ```

use std::path::PathBuf;
use std::time::Duration;

use loudds_core::validation::{validate_port, validate_rsync_module};
use loudds_core::{DEFAULT_API_URL, DEFAULT_LOCAL_RSYNCD_BIND_PORT, DEFAULT_RUNS_DIR, RUNS_MODULE};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// Backend HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the backend.
    #[serde(default = "default_api_url")]
    pub url: String,

    /// Bearer token. Usually supplied through the environment instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    /// Whole-request timeout (seconds). Archive downloads ignore it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            url: default_api_url(),
            access_token: None,
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Tunnel Settings
// =============================================================================

/// SSH tunnel settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TunnelSettings {
    /// ssh client executable.
    #[serde(default = "default_ssh_binary")]
    pub ssh_binary: String,

    /// Local address the forward listens on.
    #[serde(default = "default_bind_addr")]
    pub local_bind_addr: String,

    /// Local port the forward listens on.
    #[serde(default = "default_local_bind_port")]
    pub local_bind_port: u16,

    /// How long to wait for the forward to accept connections (seconds).
    #[serde(default = "default_ready_timeout")]
    pub ready_timeout_secs: u64,

    /// Verify the proxy host key against known_hosts.
    /// Off by default: proxies are provisioned per cluster.
    #[serde(default)]
    pub strict_host_key_checking: bool,
}

fn default_ssh_binary() -> String {
    "ssh".to_string()
}

fn default_bind_addr() -> String {
    "127.0.0.1".to_string()
}

fn default_local_bind_port() -> u16 {
    DEFAULT_LOCAL_RSYNCD_BIND_PORT
}

fn default_ready_timeout() -> u64 {
    15
}

impl Default for TunnelSettings {
    fn default() -> Self {
        TunnelSettings {
            ssh_binary: default_ssh_binary(),
            local_bind_addr: default_bind_addr(),
            local_bind_port: default_local_bind_port(),
            ready_timeout_secs: default_ready_timeout(),
            strict_host_key_checking: false,
        }
    }
}

impl TunnelSettings {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}

// =============================================================================
// Rsync Settings
// =============================================================================

/// rsync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RsyncSettings {
    /// rsync executable.
    #[serde(default = "default_rsync_binary")]
    pub binary: String,

    /// Local TensorBoard log directory.
    #[serde(default = "default_runs_dir")]
    pub runs_dir: String,

    /// rsyncd module for TensorBoard runs.
    #[serde(default = "default_module")]
    pub module: String,
}

fn default_rsync_binary() -> String {
    "rsync".to_string()
}

fn default_runs_dir() -> String {
    DEFAULT_RUNS_DIR.to_string()
}

fn default_module() -> String {
    RUNS_MODULE.to_string()
}

impl Default for RsyncSettings {
    fn default() -> Self {
        RsyncSettings {
            binary: default_rsync_binary(),
            runs_dir: default_runs_dir(),
            module: default_module(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub tunnel: TunnelSettings,

    #[serde(default)]
    pub rsync: RsyncSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (loudds.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading loudds config from file");
                let contents = std::fs::read_to_string(&path)
                    .map_err(|e| ClientError::ConfigLoadFailed(e.to_string()))?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load loudds config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).map_err(|e| ClientError::ConfigSaveFailed(e.to_string()))?;

        info!(?path, "loudds config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = url::Url::parse(&self.api.url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.url
            )));
        }

        if self.api.request_timeout_secs == 0 || self.api.connect_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "API timeouts must be greater than 0".into(),
            ));
        }

        if self.tunnel.local_bind_addr.parse::<std::net::IpAddr>().is_err() {
            return Err(ClientError::InvalidConfig(format!(
                "local_bind_addr must be an IP address, got: {}",
                self.tunnel.local_bind_addr
            )));
        }

        validate_port("local_bind_port", self.tunnel.local_bind_port)?;

        if self.tunnel.ready_timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "ready_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.tunnel.ssh_binary.trim().is_empty() || self.rsync.binary.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "ssh and rsync binaries must be set".into(),
            ));
        }

        validate_rsync_module(&self.rsync.module)?;

        Ok(())
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LOUDDS_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.url = url;
        }

        if let Ok(token) = std::env::var("LOUDDS_ACCESS_TOKEN") {
            self.api.access_token = Some(token);
        }

        if let Ok(binary) = std::env::var("LOUDDS_SSH_BINARY") {
            self.tunnel.ssh_binary = binary;
        }

        if let Ok(binary) = std::env::var("LOUDDS_RSYNC_BINARY") {
            self.rsync.binary = binary;
        }

        if let Ok(port) = std::env::var("LOUDDS_LOCAL_BIND_PORT") {
            match port.parse::<u16>() {
                Ok(p) => {
                    debug!(port = p, "Overriding local bind port from environment");
                    self.tunnel.local_bind_port = p;
                }
                Err(_) => warn!(port = %port, "Ignoring invalid LOUDDS_LOCAL_BIND_PORT"),
            }
        }

        if let Ok(dir) = std::env::var("LOUDDS_RUNS_DIR") {
            self.rsync.runs_dir = dir;
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("space", "louddata", "loudds")
            .map(|dirs| dirs.config_dir().join("loudds.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    pub fn api_url(&self) -> &str {
        &self.api.url
    }

    pub fn access_token(&self) -> Option<&str> {
        self.api.access_token.as_deref()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.api.connect_timeout_secs)
    }
}
