//! # Client Error Types
//!
//! Error types for SDK operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Client Error Categories                            │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Backend API   │  │     Tunnel              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Unauthorized   │  │  TunnelAlreadyActive    │ │
//! │  │  InvalidUrl     │  │  NotFound       │  │  TunnelExited           │ │
//! │  │  ConfigLoad/Save│  │  Backend        │  │  TunnelTimeout          │ │
//! │  │  InvalidToken   │  │  Http / Timeout │  │  LocalPortInUse         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │    Process      │  │     Rsync       │  │      Archive            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Spawn          │  │  RsyncFailed    │  │  ArchiveFailed          │ │
//! │  │  Io             │  │  LocalPathMissing│ │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use loudds_core::{CoreError, ValidationError};
use thiserror::Error;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type covering every SDK failure.
#[derive(Debug, Error)]
pub enum ClientError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid URL (backend, archive or rsync).
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Access token is missing or malformed.
    #[error("Invalid access token: {0}")]
    InvalidToken(String),

    /// Input or payload rejected by validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Backend data could not be used.
    #[error(transparent)]
    Core(#[from] CoreError),

    // =========================================================================
    // Backend API Errors
    // =========================================================================
    /// Backend rejected the access token.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Resource does not exist on the backend.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-success response.
    #[error("Backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Request timed out.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Response body was not the expected JSON.
    #[error("Unexpected response from {endpoint}: {reason}")]
    UnexpectedResponse { endpoint: String, reason: String },

    // =========================================================================
    // Tunnel Errors
    // =========================================================================
    /// `start()` on a tunnel that is already running.
    #[error("Tunnel on local port {0} is already active")]
    TunnelAlreadyActive(u16),

    /// ssh exited before the forward came up.
    #[error("ssh exited with {status}: {stderr}")]
    TunnelExited { status: String, stderr: String },

    /// Something else already listens on the local forward port.
    #[error("Local port {0} is already in use")]
    LocalPortInUse(u16),

    /// Forwarded port never accepted connections.
    #[error("Tunnel not ready after {0} seconds")]
    TunnelTimeout(u64),

    // =========================================================================
    // Process / Filesystem Errors
    // =========================================================================
    /// Failed to launch an external program.
    #[error("Failed to spawn {program}: {reason}")]
    Spawn { program: String, reason: String },

    /// rsync finished with a non-zero exit code.
    #[error("rsync failed (exit code {code:?}): {stderr}")]
    RsyncFailed { code: Option<i32>, stderr: String },

    /// Local source directory does not exist.
    #[error("Local path does not exist: {0}")]
    LocalPathMissing(String),

    /// Archive could not be unpacked.
    #[error("Archive extraction failed: {0}")]
    ArchiveFailed(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Background task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ClientError::Timeout(err.to_string())
        } else if err.is_decode() {
            ClientError::UnexpectedResponse {
                endpoint: err
                    .url()
                    .map(|u| u.path().to_string())
                    .unwrap_or_default(),
                reason: err.to_string(),
            }
        } else {
            ClientError::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::InvalidUrl(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::UnexpectedResponse {
            endpoint: "json".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for ClientError {
    fn from(err: toml::de::Error) -> Self {
        ClientError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for ClientError {
    fn from(err: toml::ser::Error) -> Self {
        ClientError::ConfigSaveFailed(err.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for ClientError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ClientError::InvalidToken(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ClientError {
    fn from(err: tokio::task::JoinError) -> Self {
        ClientError::Internal(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl ClientError {
    /// Returns true if the caller should re-authenticate rather than retry.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ClientError::Unauthorized(_) | ClientError::InvalidToken(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_)
                | ClientError::InvalidUrl(_)
                | ClientError::ConfigLoadFailed(_)
                | ClientError::ConfigSaveFailed(_)
        )
    }

    /// Returns true if the failure happened on the wire (HTTP or SSH) rather
    /// than in local input.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_)
                | ClientError::Timeout(_)
                | ClientError::TunnelExited { .. }
                | ClientError::TunnelTimeout(_)
        )
    }
}
