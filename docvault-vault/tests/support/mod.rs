//! Shared fixtures for vault tests.

#![allow(dead_code)]

use docvault_crypto::EncryptedDocument;
use docvault_store::{DocumentStore, InMemoryDocumentStore};
use docvault_vault::{DocumentVault, VaultConfig};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const USER: &str = "user-1";
pub const PASSWORD: &str = "correct-horse";

/// Routes vault logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("docvault_vault=debug,docvault_store=debug"))
        .with_test_writer()
        .try_init();
}

/// Cheap KDF and a one-minute idle timeout.
pub fn test_config() -> VaultConfig {
    VaultConfig {
        idle_timeout_secs: 60,
        kdf_iterations: 1_000,
        ..VaultConfig::default()
    }
}

pub fn new_vault() -> (DocumentVault, InMemoryDocumentStore) {
    let store = InMemoryDocumentStore::new();
    let vault = DocumentVault::new(USER, Arc::new(store.clone()), test_config());
    (vault, store)
}

pub async fn initialized_vault() -> (DocumentVault, InMemoryDocumentStore) {
    let (vault, store) = new_vault();
    vault.initialize(PASSWORD).await.unwrap();
    (vault, store)
}

pub fn doc_id(i: usize) -> String {
    format!("doc-{i:02}")
}

pub async fn stored(store: &InMemoryDocumentStore, id: &str) -> EncryptedDocument {
    store.get_document(USER, id).await.unwrap().unwrap()
}

/// Flips one bit in the stored ciphertext of `id`.
pub async fn corrupt_ciphertext(store: &InMemoryDocumentStore, id: &str) {
    let mut doc = stored(store, id).await;
    doc.content.ciphertext[0] ^= 0x01;
    store.put_document(USER, &doc).await.unwrap();
}
