//! The remote document store boundary.

use crate::error::StoreResult;
use crate::record::{RotationBatch, SecurityRecord};
use async_trait::async_trait;
use docvault_crypto::EncryptedDocument;

/// Persistence for ciphertext records and the per-user security record.
///
/// Implementations see only opaque ciphertext and non-secret metadata.
/// Network retry policy, if any, belongs to the implementation.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads the user's security record, if the vault was ever initialized.
    async fn load_security_record(&self, user_id: &str) -> StoreResult<Option<SecurityRecord>>;

    /// Writes `record` only if the user has none yet. Returns whether it was
    /// written. The check and the write are one atomic step.
    async fn create_security_record(
        &self,
        user_id: &str,
        record: &SecurityRecord,
    ) -> StoreResult<bool>;

    /// Upserts the user's security record.
    async fn save_security_record(&self, user_id: &str, record: &SecurityRecord)
    -> StoreResult<()>;

    async fn get_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> StoreResult<Option<EncryptedDocument>>;

    /// Upserts a document keyed by its `metadata.documentId`.
    async fn put_document(&self, user_id: &str, document: &EncryptedDocument) -> StoreResult<()>;

    /// Deletes a document. Returns whether it existed.
    async fn delete_document(&self, user_id: &str, document_id: &str) -> StoreResult<bool>;

    async fn list_documents(&self, user_id: &str) -> StoreResult<Vec<EncryptedDocument>>;

    /// Writes every document in the batch plus the new security record, or
    /// nothing at all. Fails with
    /// [`StoreError::VersionConflict`](crate::StoreError::VersionConflict)
    /// when the stored record version differs from `batch.expected_version`.
    async fn commit_rotation(&self, user_id: &str, batch: RotationBatch) -> StoreResult<()>;
}
