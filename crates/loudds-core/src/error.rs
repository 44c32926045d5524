//! # Error Types
//!
//! Domain-specific error types for loudds-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  loudds-core errors (this file)                                        │
//! │  ├── CoreError        - Malformed backend data                         │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  loudds-client errors (separate crate)                                 │
//! │  └── ClientError      - HTTP, tunnel, rsync, archive failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → ClientError → CLI (anyhow)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Errors raised when backend-supplied data cannot be used as-is.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The backend response is missing something the SDK needs.
    ///
    /// ## When This Occurs
    /// - Cluster info without a proxy host
    /// - Empty cluster domain
    #[error("Incomplete {payload} from backend: {reason}")]
    IncompletePayload { payload: String, reason: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before any request leaves the machine.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., not a JWT, not a PEM key).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
