//! # loudds-core: Wire Types for the loudds Platform
//!
//! Pure data types and validation shared by the SDK and the CLI.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          loudds Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                       apps/cli (`loudds`)                       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  loudds-client (LoudData facade)                │   │
//! │  │      BackendApi ─► SshTunnel ─► RsyncCommand ─► archive         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ loudds-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌────────────┐  ┌───────────┐                  │   │
//! │  │   │   types   │  │ validation │  │   error   │                  │   │
//! │  │   │ UserInfo  │  │   token    │  │ CoreError │                  │   │
//! │  │   │ Cluster   │  │   ports    │  │ Validation│                  │   │
//! │  │   │ Summary   │  │   keys     │  │   Error   │                  │   │
//! │  │   └───────────┘  └────────────┘  └───────────┘                  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO SUBPROCESSES                         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Backend payloads (UserInfo, ClusterInfo, PredictionSummary, ...)
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use loudds_core::{rsync_module_url, DEFAULT_LOCAL_RSYNCD_BIND_PORT, RUNS_MODULE};
//!
//! let url = rsync_module_url("127.0.0.1", DEFAULT_LOCAL_RSYNCD_BIND_PORT, RUNS_MODULE);
//! assert_eq!(url, "rsync://127.0.0.1:10873/runs");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Backend address used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "http://cl-backend:8000";

/// Local port the rsyncd tunnel binds to by default.
pub const DEFAULT_LOCAL_RSYNCD_BIND_PORT: u16 = 10873;

/// Port of the rsync daemon inside the user's namespace.
pub const REMOTE_RSYNCD_PORT: u16 = 873;

/// rsyncd module holding TensorBoard runs.
pub const RUNS_MODULE: &str = "runs";

/// Local TensorBoard log directory used when the caller gives none.
///
/// The trailing slash matters: rsync copies the directory *contents*.
pub const DEFAULT_RUNS_DIR: &str = "../runs/";

/// Login name on the SSH proxy when the backend does not send one.
pub const DEFAULT_SSH_USER: &str = "tunnel";

/// Host as it must appear before `:port`. IPv6 literals get brackets.
pub fn host_literal(host: &str) -> String {
    if host.parse::<std::net::Ipv6Addr>().is_ok() {
        format!("[{}]", host)
    } else {
        host.to_string()
    }
}

/// Builds an rsync daemon URL.
///
/// ```rust
/// assert_eq!(
///     loudds_core::rsync_module_url("tb.example", 873, "runs"),
///     "rsync://tb.example:873/runs"
/// );
/// ```
pub fn rsync_module_url(host: &str, port: u16, module: &str) -> String {
    format!("rsync://{}:{}/{}", host_literal(host), port, module)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rsync_module_url_brackets_ipv6() {
        assert_eq!(rsync_module_url("::1", 10873, RUNS_MODULE), "rsync://[::1]:10873/runs");
        assert_eq!(
            rsync_module_url("127.0.0.1", 10873, RUNS_MODULE),
            "rsync://127.0.0.1:10873/runs"
        );
        assert_eq!(host_literal("[::1]"), "[::1]");
        assert_eq!(host_literal("tb.example"), "tb.example");
    }
}
