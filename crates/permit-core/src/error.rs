//! Error types for the `permit` core library.

use thiserror::Error;

use crate::catalog::Permission;

/// Result type alias using the core [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for `permit` operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A result was queried for a permission that was never requested.
    #[error("Permission {permission} not in result")]
    PermissionNotInResult { permission: Permission },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Durable flag storage error
    #[error("Flag store error: {0}")]
    FlagStore(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
