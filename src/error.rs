//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Lookups never produce an error: a missing or expired key is reported as
/// `None`. Errors are reserved for snapshot I/O and rejected configuration.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Snapshot encoding or decoding failed
    #[error("Serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// The snapshot sink could not be flushed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Construction options were rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
