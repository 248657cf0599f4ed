//! Password rotation.
//!
//! Re-encrypts every document under a key derived from the new password and
//! commits the result as one batch. Until that commit succeeds nothing in the
//! store changes and the session keeps the old key.

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};
use crate::session::{derive_key_blocking, SessionKeyHolder};
use docvault_crypto::{create_verifier, reencrypt_document, Salt};
use docvault_store::{DocumentStore, RotationBatch};
use tracing::{info, warn};

/// Outcome of a successful rotation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RotationReport {
    pub documents_rotated: usize,
    /// Version of the security record now in the store.
    pub record_version: u32,
    /// Session key epoch after the new key was installed.
    pub key_epoch: u64,
}

/// One password rotation for one user.
pub struct RotationPipeline<'a> {
    user_id: &'a str,
    store: &'a dyn DocumentStore,
    session: &'a SessionKeyHolder,
    config: &'a VaultConfig,
}

impl<'a> RotationPipeline<'a> {
    pub fn new(
        user_id: &'a str,
        store: &'a dyn DocumentStore,
        session: &'a SessionKeyHolder,
        config: &'a VaultConfig,
    ) -> Self {
        Self {
            user_id,
            store,
            session,
            config,
        }
    }

    /// Rotates to `new_password`.
    ///
    /// # Process
    /// 1. Validate the new password
    /// 2. Quiesce the session (fails with [`VaultError::Locked`] or
    ///    [`VaultError::SessionExpired`] without a key)
    /// 3. Derive the new key, with a fresh salt unless configured otherwise
    /// 4. Re-encrypt every document in memory; the first failure aborts
    /// 5. Commit documents and the new security record together
    /// 6. Install the new key
    pub async fn run(&self, new_password: &str) -> VaultResult<RotationReport> {
        self.config.check_password(new_password)?;

        let guard = self.session.begin_rotation().await?;
        let old_key = guard.old_key()?;

        let record = self
            .store
            .load_security_record(self.user_id)
            .await
            .map_err(|e| aborted(None, e))?
            .ok_or(VaultError::NotInitialized)?;

        let salt = if self.config.regenerate_salt_on_rotation {
            Salt::random()
        } else {
            record.salt.clone()
        };
        let params = self.config.kdf_params();
        let new_key = derive_key_blocking(new_password, &salt, &params)
            .await
            .map_err(|e| aborted(None, e))?;

        let documents = self
            .store
            .list_documents(self.user_id)
            .await
            .map_err(|e| aborted(None, e))?;

        let mut rotated = Vec::with_capacity(documents.len());
        for doc in &documents {
            let (reencrypted, warning) = reencrypt_document(doc, old_key, &new_key)
                .map_err(|e| aborted(Some(doc.document_id()), e))?;
            if let Some(warning) = warning {
                warn!(document_id = %warning.document_id, "integrity warning during rotation");
            }
            rotated.push(reencrypted);
        }

        let security_record = record
            .rotated(salt, create_verifier(&new_key), params)
            .map_err(|e| aborted(None, e))?;
        let record_version = security_record.version;
        let documents_rotated = rotated.len();

        let batch = RotationBatch {
            expected_version: record.version,
            documents: rotated,
            security_record,
        };
        self.store
            .commit_rotation(self.user_id, batch)
            .await
            .map_err(|e| aborted(None, e))?;

        let key_epoch = guard.install(new_key).await;

        info!(
            documents_rotated,
            record_version, key_epoch, "password rotation complete"
        );
        Ok(RotationReport {
            documents_rotated,
            record_version,
            key_epoch,
        })
    }
}

fn aborted(document_id: Option<&str>, reason: impl std::fmt::Display) -> VaultError {
    let document_id = document_id.map(str::to_string);
    warn!(
        document_id = document_id.as_deref().unwrap_or("-"),
        "password rotation aborted"
    );
    VaultError::RotationAborted {
        document_id,
        reason: reason.to_string(),
    }
}
