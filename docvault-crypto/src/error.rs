//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in key derivation, wrapping and AEAD operations.
///
/// Messages never carry key bytes or plaintext.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("password must not be empty")]
    EmptyPassword,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("invalid salt: expected at least {min} bytes, got {actual}")]
    InvalidSalt { min: usize, actual: usize },

    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The AEAD tag did not verify: wrong key, tampered data or mismatched AAD.
    #[error("authentication failed (wrong key or tampered data)")]
    Authentication,

    #[error("unsupported document version: {0}")]
    UnsupportedVersion(String),

    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CryptoError {
    // serde_json's Display can quote fragments of the input, which may be
    // decrypted plaintext. Only the category and position are kept.
    fn from(e: serde_json::Error) -> Self {
        CryptoError::Serialization(format!(
            "{:?} error at line {} column {}",
            e.classify(),
            e.line(),
            e.column()
        ))
    }
}
