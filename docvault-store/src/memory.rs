//! In-memory document store.
//!
//! Keeps everything behind a single async `RwLock`, which makes
//! `commit_rotation` trivially atomic. Used in tests and as the reference
//! behavior for real backends.

use crate::error::{StoreError, StoreResult};
use crate::record::{RotationBatch, SecurityRecord};
use crate::store::DocumentStore;
use async_trait::async_trait;
use docvault_crypto::EncryptedDocument;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Default)]
struct UserData {
    record: Option<SecurityRecord>,
    documents: BTreeMap<String, EncryptedDocument>,
}

/// Thread-safe in-memory [`DocumentStore`].
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    users: Arc<RwLock<HashMap<String, UserData>>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `commit_rotation` fail with [`StoreError::Unavailable`]
    /// before touching any data.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of documents stored for `user_id`.
    pub async fn document_count(&self, user_id: &str) -> usize {
        self.users
            .read()
            .await
            .get(user_id)
            .map_or(0, |u| u.documents.len())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn load_security_record(&self, user_id: &str) -> StoreResult<Option<SecurityRecord>> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .and_then(|u| u.record.clone()))
    }

    async fn create_security_record(
        &self,
        user_id: &str,
        record: &SecurityRecord,
    ) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        let user = users.entry(user_id.to_string()).or_default();
        if user.record.is_some() {
            return Ok(false);
        }
        user.record = Some(record.clone());
        Ok(true)
    }

    async fn save_security_record(
        &self,
        user_id: &str,
        record: &SecurityRecord,
    ) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users.entry(user_id.to_string()).or_default().record = Some(record.clone());
        Ok(())
    }

    async fn get_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> StoreResult<Option<EncryptedDocument>> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .and_then(|u| u.documents.get(document_id).cloned()))
    }

    async fn put_document(&self, user_id: &str, document: &EncryptedDocument) -> StoreResult<()> {
        let mut users = self.users.write().await;
        users
            .entry(user_id.to_string())
            .or_default()
            .documents
            .insert(document.document_id().to_string(), document.clone());
        Ok(())
    }

    async fn delete_document(&self, user_id: &str, document_id: &str) -> StoreResult<bool> {
        let mut users = self.users.write().await;
        Ok(users
            .get_mut(user_id)
            .is_some_and(|u| u.documents.remove(document_id).is_some()))
    }

    async fn list_documents(&self, user_id: &str) -> StoreResult<Vec<EncryptedDocument>> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .map(|u| u.documents.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn commit_rotation(&self, user_id: &str, batch: RotationBatch) -> StoreResult<()> {
        let mut users = self.users.write().await;

        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected commit failure".to_string()));
        }

        let user = users.entry(user_id.to_string()).or_default();
        let found = user.record.as_ref().map(|r| r.version);
        if found != Some(batch.expected_version) {
            return Err(StoreError::VersionConflict {
                expected: batch.expected_version,
                found,
            });
        }

        let count = batch.documents.len();
        for doc in batch.documents {
            user.documents.insert(doc.document_id().to_string(), doc);
        }
        user.record = Some(batch.security_record);

        debug!("committed rotation batch of {count} documents for user {user_id}");
        Ok(())
    }
}
