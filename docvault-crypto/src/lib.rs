//! Encryption layer for DocVault.
//!
//! Provides per-document encryption using:
//! - PBKDF2-HMAC-SHA256 for key derivation from passwords
//! - AES-256-GCM for authenticated encryption
//! - Truncated SHA-256 verifiers for password checks
//! - Secure key handling with zeroization
//!
//! # Architecture
//!
//! The encryption uses a two-tier key system:
//!
//! 1. **Master Key**: Derived from the user's password with PBKDF2.
//!    This key is never stored - it's derived each time the user unlocks.
//!
//! 2. **Item Key**: A random key generated for each document.
//!    The item key is wrapped under the master key, with the document id
//!    as associated data, and stored alongside the encrypted content.
//!
//! Nothing in this crate performs I/O; it is safe to call from any thread.

mod cipher;
mod document;
mod encoding;
mod error;
mod item_key;
mod key;
mod verifier;

pub use cipher::{
    decrypt, decrypt_value, encrypt, encrypt_value, EncryptedData, NONCE_SIZE, TAG_SIZE,
};
pub use document::{
    content_hash, decrypt_document, decrypt_document_bytes, encrypt_document,
    encrypt_document_bytes, reencrypt_document, DecryptedDocument, DocumentMetadata,
    EncryptedDocument, EncryptedDocumentSummary, IntegrityWarning, FORMAT_VERSION,
};
pub use error::{CryptoError, CryptoResult};
pub use item_key::{unwrap_item_key, wrap_item_key, WrappedItemKey};
pub use key::{
    derive_key, generate_item_key, ItemKey, KdfParams, MasterKey, Salt, SymmetricKey,
    DEFAULT_KDF_ITERATIONS, KEY_SIZE, MIN_SALT_SIZE, SALT_SIZE,
};
pub use verifier::{create_verifier, verify_password, Verifier, VERIFIER_SIZE};
