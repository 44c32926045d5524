//! # Validation Module
//!
//! Input checks run before anything is sent to the backend or handed to
//! `ssh` / `rsync`.
//!
//! ## Usage
//! ```rust,no_run
//! use loudds_core::validation::{validate_dataset_id, validate_port};
//!
//! validate_dataset_id(1).unwrap();
//! validate_port("local_bind_port", 10873).unwrap();
//! ```

use crate::error::ValidationError;
use crate::types::PredictionSummary;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Credentials
// =============================================================================

/// Validates the shape of a bearer access token.
///
/// ## Rules
/// - Must not be empty
/// - Must be a compact JWT: three non-empty, dot-separated segments
/// - No whitespace (it ends up in an HTTP header)
///
/// ## Example
/// ```rust
/// use loudds_core::validation::validate_access_token;
///
/// assert!(validate_access_token("aaa.bbb.ccc").is_ok());
/// assert!(validate_access_token("").is_err());
/// assert!(validate_access_token("not-a-jwt").is_err());
/// ```
pub fn validate_access_token(token: &str) -> ValidationResult<()> {
    if token.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "access_token".to_string(),
        });
    }

    if token.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidFormat {
            field: "access_token".to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 || segments.iter().any(|s| s.is_empty()) {
        return Err(ValidationError::InvalidFormat {
            field: "access_token".to_string(),
            reason: "expected a JWT with three dot-separated segments".to_string(),
        });
    }

    Ok(())
}

/// Validates PEM armor around a private key.
///
/// Only the framing is checked; ssh does the real parsing.
pub fn validate_private_key(key: &str) -> ValidationResult<()> {
    let key = key.trim();

    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "private_key".to_string(),
        });
    }

    let first = key.lines().next().unwrap_or_default().trim();
    let last = key.lines().last().unwrap_or_default().trim();

    let armored = first.starts_with("-----BEGIN ")
        && first.ends_with("PRIVATE KEY-----")
        && last.starts_with("-----END ")
        && last.ends_with("PRIVATE KEY-----");

    if !armored {
        return Err(ValidationError::InvalidFormat {
            field: "private_key".to_string(),
            reason: "expected PEM armored private key".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Identifiers & Ports
// =============================================================================

/// Validates a dataset id. The backend numbers datasets from 1.
pub fn validate_dataset_id(dataset_id: u64) -> ValidationResult<()> {
    if dataset_id == 0 {
        return Err(ValidationError::MustBePositive {
            field: "dataset_id".to_string(),
        });
    }
    Ok(())
}

/// Validates a TCP port. Port 0 would let the OS pick one, which a tunnel
/// caller could never learn.
pub fn validate_port(field: &str, port: u16) -> ValidationResult<()> {
    if port == 0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates an rsyncd module name.
///
/// ## Example
/// ```rust
/// use loudds_core::validation::validate_rsync_module;
///
/// assert!(validate_rsync_module("runs").is_ok());
/// assert!(validate_rsync_module("runs/../etc").is_err());
/// ```
pub fn validate_rsync_module(module: &str) -> ValidationResult<()> {
    if module.is_empty() {
        return Err(ValidationError::Required {
            field: "rsync module".to_string(),
        });
    }

    if !module
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "rsync module".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// Prediction Summary
// =============================================================================

/// Validates a prediction summary before upload.
///
/// ## Rules
/// - Every item has at least one class score
/// - Every score and loss is finite (JSON has no NaN)
/// - The target is one of the scored classes
/// - The split name (`type`) is set
///
/// An empty summary is allowed; the backend treats it as "no predictions".
pub fn validate_summary(summary: &PredictionSummary) -> ValidationResult<()> {
    for (index, item) in summary.items.iter().enumerate() {
        let field = |name: &str| format!("items[{}].{}", index, name);

        if item.predictions.is_empty() {
            return Err(ValidationError::Required {
                field: field("predictions"),
            });
        }

        if item.predictions.values().any(|v| !v.is_finite()) || !item.loss.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: field("predictions"),
                reason: "scores and loss must be finite numbers".to_string(),
            });
        }

        if !item.predictions.contains_key(&item.target) {
            return Err(ValidationError::NotAllowed {
                field: field("target"),
                allowed: item.predictions.keys().cloned().collect(),
            });
        }

        if item.kind.trim().is_empty() {
            return Err(ValidationError::Required {
                field: field("type"),
            });
        }
    }

    Ok(())
}
