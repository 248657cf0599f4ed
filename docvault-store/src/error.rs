//! Store error types.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by [`crate::DocumentStore`] implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] docvault_crypto::CryptoError),

    /// The security record changed since the rotation batch was staged.
    #[error("security record version conflict: expected {expected}, found {found:?}")]
    VersionConflict { expected: u32, found: Option<u32> },

    /// Stored data that cannot be valid, such as an exhausted record version.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    #[error("background task failed: {0}")]
    Task(String),
}
