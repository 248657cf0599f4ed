//! Vault error types.

use docvault_crypto::CryptoError;
use docvault_store::StoreError;
use thiserror::Error;

/// Result type for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;

/// Message shown for both a rejected password and a failed decryption, so the
/// UI cannot be used to tell them apart.
const INCORRECT_PASSWORD: &str = "Incorrect password. Please try again.";

/// Errors that can occur in vault operations.
///
/// Messages carry the error kind and at most a document id.
#[derive(Debug, Error)]
pub enum VaultError {
    #[error("vault is locked")]
    Locked,

    /// The session was locked by the idle timeout rather than by `lock()`.
    #[error("session expired after inactivity")]
    SessionExpired,

    #[error("wrong password")]
    WrongPassword,

    /// An AEAD tag failed while decrypting a document.
    #[error("authentication failed for document {}", .document_id.as_deref().unwrap_or("<unknown>"))]
    Authentication { document_id: Option<String> },

    /// Password rotation stopped before anything was written.
    #[error("password rotation aborted at {}: {reason}", .document_id.as_deref().unwrap_or("commit"))]
    RotationAborted {
        document_id: Option<String>,
        reason: String,
    },

    #[error("vault not initialized")]
    NotInitialized,

    #[error("vault already initialized")]
    AlreadyInitialized,

    #[error("password too short (min {min} characters)")]
    PasswordTooShort { min: usize },

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Maps a document decryption failure, attaching the document id to tag
    /// failures.
    pub(crate) fn from_decrypt(err: CryptoError, document_id: &str) -> Self {
        match err {
            CryptoError::Authentication => VaultError::Authentication {
                document_id: Some(document_id.to_string()),
            },
            other => VaultError::Crypto(other),
        }
    }

    /// Whether the user can fix this by re-entering a password or retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            VaultError::Locked
                | VaultError::SessionExpired
                | VaultError::WrongPassword
                | VaultError::Authentication { .. }
                | VaultError::PasswordTooShort { .. }
                | VaultError::RotationAborted { .. }
        )
    }

    /// Text suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            VaultError::WrongPassword | VaultError::Authentication { .. } => {
                INCORRECT_PASSWORD.to_string()
            }
            VaultError::Locked => "The vault is locked. Unlock it to continue.".to_string(),
            VaultError::SessionExpired => {
                "The vault locked after a period of inactivity. Unlock it to continue.".to_string()
            }
            VaultError::PasswordTooShort { min } => {
                format!("Password must be at least {min} characters.")
            }
            VaultError::RotationAborted { .. } => {
                "Password change failed. Nothing was modified; please try again.".to_string()
            }
            VaultError::NotInitialized => "The vault has not been set up yet.".to_string(),
            VaultError::AlreadyInitialized => "The vault is already set up.".to_string(),
            VaultError::DocumentNotFound(_) => "The document no longer exists.".to_string(),
            VaultError::Store(_) | VaultError::Crypto(_) | VaultError::Internal(_) => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}

impl From<tokio::task::JoinError> for VaultError {
    fn from(e: tokio::task::JoinError) -> Self {
        VaultError::Internal(format!("background task failed: {e}"))
    }
}
