//! # loudds-client: SDK for the loudds Platform
//!
//! Authenticates against the loudds backend, opens an SSH tunnel to the
//! user's rsync daemon and moves TensorBoard logs and dataset archives.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           LoudData (facade)                             │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  BackendApi    │  │   SshTunnel    │  │  RsyncCommand          │    │
//! │  │                │  │                │  │                        │    │
//! │  │ reqwest + JSON │  │ ssh -N -L      │  │ rsync -rv --inplace    │    │
//! │  │ bearer token   │  │ temp key file  │  │ upload / download      │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │  archive       │  │  ClientConfig  │  │  AccessToken           │    │
//! │  │                │  │                │  │                        │    │
//! │  │ .tgz download  │  │ TOML + env     │  │ JWT claims (unverified)│    │
//! │  │ + extraction   │  │                │  │                        │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`api`] - Typed backend endpoints
//! - [`archive`] - Dataset archive download and extraction
//! - [`auth`] - Access token handling
//! - [`client`] - `LoudData` facade
//! - [`config`] - Configuration (file, env, defaults)
//! - [`error`] - Client error types
//! - [`rsync`] - rsync invocation
//! - [`tunnel`] - SSH port forward
//!
//! ## Usage
//!
//! ```rust,ignore
//! use loudds_client::{ClientConfig, LoudData};
//!
//! let config = ClientConfig::load_or_default(None);
//! let loud = LoudData::with_config(config, token)?;
//!
//! loud.sync_tensorboard_logs(1, "../runs/").await?;
//! loud.download_archive("https://staging-b.louddata.space/assets/f5Isrpkw.tgz", "../data").await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod api;
pub mod archive;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod rsync;
pub mod tunnel;

// =============================================================================
// Re-exports
// =============================================================================

pub use api::BackendApi;
pub use archive::ArchiveSummary;
pub use auth::{AccessToken, TokenClaims};
pub use client::LoudData;
pub use config::{ApiSettings, ClientConfig, RsyncSettings, TunnelSettings};
pub use error::{ClientError, ClientResult};
pub use rsync::{RsyncCommand, RsyncOutput};
pub use tunnel::{SshTunnel, TunnelOptions, TunnelState};

pub use loudds_core::{
    ClusterInfo, ConnectionInfo, PredictionSummary, SshKeyMaterial, SummaryItem, TunnelTarget,
    UserInfo, DEFAULT_LOCAL_RSYNCD_BIND_PORT,
};
