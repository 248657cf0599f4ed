//! Document-level encryption.
//!
//! Two-tier keys, as everywhere in DocVault:
//!
//! 1. Master Key: derived from the user's password, never stored
//! 2. Item Key: random per document, stored only wrapped under the master key
//!
//! A document record also carries a SHA-256 of its plaintext. The AEAD tag is
//! the authoritative integrity check; the hash is a secondary corruption
//! detector and a mismatch is reported as an [`IntegrityWarning`], never an
//! error.

use crate::cipher::{self, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::item_key::{unwrap_item_key, wrap_item_key, WrappedItemKey};
use crate::key::{generate_item_key, MasterKey};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Current document format version.
pub const FORMAT_VERSION: &str = "1.0";

/// Plaintext metadata stored next to the encrypted content.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// The item key, wrapped under the master key with `document_id` as AAD.
    pub wrapped_item_key: WrappedItemKey,
    /// Stable id; also the AAD of the wrapped key.
    pub document_id: String,
    /// Hex SHA-256 of the plaintext payload bytes.
    pub content_hash: String,
    pub encrypted_at: DateTime<Utc>,
    pub version: String,
}

/// An encrypted document as persisted in the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedDocument {
    /// Payload encrypted under the item key.
    pub content: EncryptedData,
    pub metadata: DocumentMetadata,
}

impl EncryptedDocument {
    pub fn document_id(&self) -> &str {
        &self.metadata.document_id
    }

    pub fn to_json(&self) -> CryptoResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CryptoResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Content hash mismatch found after a successful tag verification.
///
/// Non-blocking: the payload is still returned alongside it.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("content hash mismatch for document {document_id}")]
pub struct IntegrityWarning {
    pub document_id: String,
    pub expected_hash: String,
    pub actual_hash: String,
}

/// Result of a successful decrypt.
#[derive(Clone, Debug, PartialEq)]
pub struct DecryptedDocument<T> {
    pub document_id: String,
    pub payload: T,
    pub warning: Option<IntegrityWarning>,
}

/// Metadata about an encrypted document (for listing without decryption).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedDocumentSummary {
    pub document_id: String,
    pub version: String,
    /// Approximate encrypted size in bytes.
    pub encrypted_size: usize,
    pub encrypted_at: DateTime<Utc>,
}

impl From<&EncryptedDocument> for EncryptedDocumentSummary {
    fn from(doc: &EncryptedDocument) -> Self {
        Self {
            document_id: doc.metadata.document_id.clone(),
            version: doc.metadata.version.clone(),
            encrypted_size: doc.content.len() + doc.metadata.wrapped_item_key.0.len(),
            encrypted_at: doc.metadata.encrypted_at,
        }
    }
}

/// Hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn resolve_document_id(document_id: Option<&str>) -> CryptoResult<String> {
    match document_id {
        None => Ok(uuid::Uuid::new_v4().to_string()),
        Some(id) if id.trim().is_empty() => Err(CryptoError::InvalidDocumentId(
            "document id must not be empty".to_string(),
        )),
        Some(id) => Ok(id.to_string()),
    }
}

/// Encrypts raw payload bytes under a fresh item key.
///
/// # Process
/// 1. Resolve the document id (a new UUID when absent)
/// 2. Generate a random item key
/// 3. Encrypt the payload with the item key
/// 4. Wrap the item key under the master key, bound to the id
/// 5. Hash the plaintext
pub fn encrypt_document_bytes(
    plaintext: &[u8],
    master_key: &MasterKey,
    document_id: Option<&str>,
) -> CryptoResult<EncryptedDocument> {
    let document_id = resolve_document_id(document_id)?;
    let item_key = generate_item_key();

    let content = cipher::encrypt(&item_key, plaintext, None)?;
    let wrapped_item_key = wrap_item_key(&item_key, master_key, &document_id)?;

    Ok(EncryptedDocument {
        content,
        metadata: DocumentMetadata {
            wrapped_item_key,
            document_id,
            content_hash: content_hash(plaintext),
            encrypted_at: Utc::now(),
            version: FORMAT_VERSION.to_string(),
        },
    })
}

/// Decrypts a document to raw payload bytes.
///
/// A wrong master key fails at the unwrap step with
/// [`CryptoError::Authentication`]. A hash mismatch after both tags verified
/// is returned as a warning next to the payload.
pub fn decrypt_document_bytes(
    doc: &EncryptedDocument,
    master_key: &MasterKey,
) -> CryptoResult<DecryptedDocument<Zeroizing<Vec<u8>>>> {
    if doc.metadata.version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(doc.metadata.version.clone()));
    }

    let document_id = &doc.metadata.document_id;
    let item_key = unwrap_item_key(&doc.metadata.wrapped_item_key, master_key, document_id)?;
    let plaintext = Zeroizing::new(cipher::decrypt(&item_key, &doc.content, None)?);

    let actual = content_hash(&plaintext);
    let warning = if actual.eq_ignore_ascii_case(&doc.metadata.content_hash) {
        None
    } else {
        Some(IntegrityWarning {
            document_id: document_id.clone(),
            expected_hash: doc.metadata.content_hash.clone(),
            actual_hash: actual,
        })
    };

    Ok(DecryptedDocument {
        document_id: document_id.clone(),
        payload: plaintext,
        warning,
    })
}

/// Serializes `payload` as JSON and encrypts it.
pub fn encrypt_document<T: Serialize>(
    payload: &T,
    master_key: &MasterKey,
    document_id: Option<&str>,
) -> CryptoResult<EncryptedDocument> {
    let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);
    encrypt_document_bytes(&plaintext, master_key, document_id)
}

/// Decrypts a document and deserializes its JSON payload.
pub fn decrypt_document<T: DeserializeOwned>(
    doc: &EncryptedDocument,
    master_key: &MasterKey,
) -> CryptoResult<DecryptedDocument<T>> {
    let decrypted = decrypt_document_bytes(doc, master_key)?;
    let payload = serde_json::from_slice(&decrypted.payload)?;
    Ok(DecryptedDocument {
        document_id: decrypted.document_id,
        payload,
        warning: decrypted.warning,
    })
}

/// Fully re-encrypts a document from `old_key` to `new_key`.
///
/// Unlike a plain re-wrap, this draws a new item key, IV and hash, so a
/// leaked item key does not survive a password change. The document id is
/// preserved.
pub fn reencrypt_document(
    doc: &EncryptedDocument,
    old_key: &MasterKey,
    new_key: &MasterKey,
) -> CryptoResult<(EncryptedDocument, Option<IntegrityWarning>)> {
    let decrypted = decrypt_document_bytes(doc, old_key)?;
    let reencrypted =
        encrypt_document_bytes(&decrypted.payload, new_key, Some(&decrypted.document_id))?;
    Ok((reencrypted, decrypted.warning))
}
