//! The DocumentVault facade.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::rotation::{RotationPipeline, RotationReport};
use crate::session::{derive_key_blocking, SessionKeyHolder, SessionState};
use docvault_crypto::{
    create_verifier, DecryptedDocument, EncryptedDocument, EncryptedDocumentSummary, Salt,
};
use docvault_store::{DocumentStore, SecurityRecord};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Password-protected document vault for one user.
///
/// Keys never leave the vault; all encryption and decryption happens here and
/// the store only ever sees ciphertext.
pub struct DocumentVault {
    user_id: String,
    store: Arc<dyn DocumentStore>,
    session: SessionKeyHolder,
    config: VaultConfig,
}

impl DocumentVault {
    /// Creates a locked vault. Nothing is read from the store until
    /// [`unlock`](Self::unlock) or [`initialize`](Self::initialize).
    pub fn new(
        user_id: impl Into<String>,
        store: Arc<dyn DocumentStore>,
        config: VaultConfig,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            store,
            session: SessionKeyHolder::new(config.idle_timeout()),
            config,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Whether a security record exists for this user.
    pub async fn is_initialized(&self) -> VaultResult<bool> {
        Ok(self
            .store
            .load_security_record(&self.user_id)
            .await?
            .is_some())
    }

    /// First-time setup: writes a fresh security record and leaves the vault
    /// unlocked.
    pub async fn initialize(&self, password: &str) -> VaultResult<()> {
        self.config.check_password(password)?;
        if self.is_initialized().await? {
            return Err(VaultError::AlreadyInitialized);
        }

        let salt = Salt::random();
        let params = self.config.kdf_params();
        let key = derive_key_blocking(password, &salt, &params).await?;
        let record = SecurityRecord::new(salt, create_verifier(&key), params);
        // A concurrent initialize may have written a record since the check
        // above; only the one whose record lands gets to activate its key.
        if !self
            .store
            .create_security_record(&self.user_id, &record)
            .await?
        {
            return Err(VaultError::AlreadyInitialized);
        }

        info!(user_id = %self.user_id, "vault initialized");
        self.session.activate(key).await;
        Ok(())
    }

    /// Unlocks with `password`, checked against the stored verifier.
    pub async fn unlock(&self, password: &str) -> VaultResult<()> {
        let record = self
            .store
            .load_security_record(&self.user_id)
            .await?
            .ok_or(VaultError::NotInitialized)?;
        let params = record.kdf_params(self.config.kdf_params());

        self.session
            .unlock(password, &record.salt, &params, record.verifier.as_ref())
            .await?;
        Ok(())
    }

    pub async fn lock(&self) {
        self.session.lock().await;
    }

    pub async fn is_ready(&self) -> bool {
        self.session.is_ready().await
    }

    pub async fn state(&self) -> SessionState {
        self.session.state().await
    }

    pub async fn key_epoch(&self) -> u64 {
        self.session.key_epoch().await
    }

    /// Encrypts `payload` without storing it. A new id is generated when
    /// `document_id` is `None`.
    pub async fn encrypt_document<T: Serialize>(
        &self,
        payload: &T,
        document_id: Option<&str>,
    ) -> VaultResult<EncryptedDocument> {
        self.session
            .with_key(|key| Ok(docvault_crypto::encrypt_document(payload, key, document_id)?))
            .await
    }

    /// Decrypts `doc`. A content hash mismatch is logged and returned in
    /// [`DecryptedDocument::warning`]; it does not fail the call.
    pub async fn decrypt_document<T: DeserializeOwned>(
        &self,
        doc: &EncryptedDocument,
    ) -> VaultResult<DecryptedDocument<T>> {
        let decrypted = self
            .session
            .with_key(|key| {
                docvault_crypto::decrypt_document(doc, key)
                    .map_err(|e| VaultError::from_decrypt(e, doc.document_id()))
            })
            .await?;
        if let Some(warning) = &decrypted.warning {
            warn!(document_id = %warning.document_id, "document content hash mismatch");
        }
        Ok(decrypted)
    }

    /// Rotates the password, re-encrypting every stored document.
    pub async fn rotate_password(&self, new_password: &str) -> VaultResult<RotationReport> {
        RotationPipeline::new(&self.user_id, self.store.as_ref(), &self.session, &self.config)
            .run(new_password)
            .await
    }

    /// Encrypts `payload` and writes it to the store.
    pub async fn save_document<T: Serialize>(
        &self,
        payload: &T,
        document_id: Option<&str>,
    ) -> VaultResult<EncryptedDocumentSummary> {
        // The key guard is held across the write so a rotation cannot slip in
        // between encrypting and storing.
        let key = self.session.read_key().await?;
        let doc = docvault_crypto::encrypt_document(payload, &key, document_id)?;
        self.store.put_document(&self.user_id, &doc).await?;
        self.session.touch().await;
        drop(key);

        debug!(document_id = %doc.document_id(), "document saved");
        Ok(EncryptedDocumentSummary::from(&doc))
    }

    /// Loads and decrypts a stored document.
    pub async fn load_document<T: DeserializeOwned>(
        &self,
        document_id: &str,
    ) -> VaultResult<DecryptedDocument<T>> {
        let doc = self
            .store
            .get_document(&self.user_id, document_id)
            .await?
            .ok_or_else(|| VaultError::DocumentNotFound(document_id.to_string()))?;
        self.decrypt_document(&doc).await
    }

    /// Deletes a stored document. Fails with
    /// [`VaultError::DocumentNotFound`] if it did not exist.
    pub async fn delete_document(&self, document_id: &str) -> VaultResult<()> {
        let _key = self.session.read_key().await?;
        if !self.store.delete_document(&self.user_id, document_id).await? {
            return Err(VaultError::DocumentNotFound(document_id.to_string()));
        }
        debug!(document_id, "document deleted");
        Ok(())
    }

    /// Lists stored documents without decrypting them.
    pub async fn list_documents(&self) -> VaultResult<Vec<EncryptedDocumentSummary>> {
        let _key = self.session.read_key().await?;
        let docs = self.store.list_documents(&self.user_id).await?;
        Ok(docs.iter().map(EncryptedDocumentSummary::from).collect())
    }
}
