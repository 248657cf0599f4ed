//! Shared fixtures and backend-agnostic checks for store tests.

#![allow(dead_code)]

use docvault_crypto::{
    create_verifier, derive_key, encrypt_document, EncryptedDocument, KdfParams, MasterKey, Salt,
};
use docvault_store::{DocumentStore, RotationBatch, SecurityRecord, StoreError};
use pretty_assertions::assert_eq;

pub const USER: &str = "user-1";

pub fn fast_params() -> KdfParams {
    KdfParams::with_iterations(1_000)
}

pub fn master_key(password: &str) -> MasterKey {
    derive_key(password, &Salt::random(), &fast_params()).unwrap()
}

pub fn record(key: &MasterKey) -> SecurityRecord {
    SecurityRecord::new(Salt::random(), create_verifier(key), fast_params())
}

pub fn document(key: &MasterKey, id: &str, title: &str) -> EncryptedDocument {
    encrypt_document(&serde_json::json!({ "title": title }), key, Some(id)).unwrap()
}

// ── Contract checks, run against every backend ───────────────────

pub async fn put_get_delete(store: &dyn DocumentStore) {
    let key = master_key("pw");
    let doc = document(&key, "doc-1", "hello");

    assert!(store.get_document(USER, "doc-1").await.unwrap().is_none());

    store.put_document(USER, &doc).await.unwrap();
    let loaded = store.get_document(USER, "doc-1").await.unwrap().unwrap();
    assert_eq!(loaded, doc);

    assert!(store.delete_document(USER, "doc-1").await.unwrap());
    assert!(!store.delete_document(USER, "doc-1").await.unwrap());
    assert!(store.get_document(USER, "doc-1").await.unwrap().is_none());
}

pub async fn put_overwrites_same_id(store: &dyn DocumentStore) {
    let key = master_key("pw");
    store.put_document(USER, &document(&key, "doc-1", "v1")).await.unwrap();
    let v2 = document(&key, "doc-1", "v2");
    store.put_document(USER, &v2).await.unwrap();

    let docs = store.list_documents(USER).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0], v2);
}

pub async fn users_are_isolated(store: &dyn DocumentStore) {
    let key = master_key("pw");
    store.put_document("alice", &document(&key, "a", "x")).await.unwrap();
    store.put_document("bob", &document(&key, "b", "y")).await.unwrap();

    let alice = store.list_documents("alice").await.unwrap();
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].document_id(), "a");
    assert!(store.get_document("alice", "b").await.unwrap().is_none());
    assert!(store.list_documents("carol").await.unwrap().is_empty());
}

pub async fn security_record_roundtrip(store: &dyn DocumentStore) {
    assert!(store.load_security_record(USER).await.unwrap().is_none());

    let key = master_key("pw");
    let rec = record(&key);
    store.save_security_record(USER, &rec).await.unwrap();
    assert_eq!(store.load_security_record(USER).await.unwrap(), Some(rec));
}

pub async fn create_security_record_only_once(store: &dyn DocumentStore) {
    let first = record(&master_key("first"));
    let second = record(&master_key("second"));

    assert!(store.create_security_record(USER, &first).await.unwrap());
    assert!(!store.create_security_record(USER, &second).await.unwrap());
    assert_eq!(store.load_security_record(USER).await.unwrap(), Some(first));
}

pub async fn racing_creates_have_one_winner(store: &dyn DocumentStore) {
    let a = record(&master_key("a"));
    let b = record(&master_key("b"));

    let (won_a, won_b) = tokio::join!(
        store.create_security_record(USER, &a),
        store.create_security_record(USER, &b),
    );
    let (won_a, won_b) = (won_a.unwrap(), won_b.unwrap());
    assert!(won_a != won_b, "exactly one create must win");

    let expected = if won_a { a } else { b };
    assert_eq!(store.load_security_record(USER).await.unwrap(), Some(expected));
}

pub async fn commit_rotation_applies_everything(store: &dyn DocumentStore) {
    let old = master_key("old");
    let new = master_key("new");
    let rec = record(&old);
    store.save_security_record(USER, &rec).await.unwrap();
    for i in 0..3 {
        store
            .put_document(USER, &document(&old, &format!("doc-{i}"), "t"))
            .await
            .unwrap();
    }

    let rotated: Vec<_> = (0..3)
        .map(|i| document(&new, &format!("doc-{i}"), "t"))
        .collect();
    let next = rec
        .rotated(Salt::random(), create_verifier(&new), fast_params())
        .unwrap();
    let batch = RotationBatch {
        expected_version: rec.version,
        documents: rotated.clone(),
        security_record: next.clone(),
    };
    store.commit_rotation(USER, batch).await.unwrap();

    assert_eq!(store.load_security_record(USER).await.unwrap(), Some(next));
    assert_eq!(store.list_documents(USER).await.unwrap(), rotated);
}

pub async fn commit_rotation_rejects_stale_version(store: &dyn DocumentStore) {
    let old = master_key("old");
    let rec = record(&old);
    store.save_security_record(USER, &rec).await.unwrap();
    let original = document(&old, "doc-1", "t");
    store.put_document(USER, &original).await.unwrap();

    let new = master_key("new");
    let batch = RotationBatch {
        expected_version: rec.version + 5,
        documents: vec![document(&new, "doc-1", "t")],
        security_record: rec
            .rotated(Salt::random(), create_verifier(&new), fast_params())
            .unwrap(),
    };
    let err = store.commit_rotation(USER, batch).await.unwrap_err();
    assert!(
        matches!(err, StoreError::VersionConflict { found: Some(1), .. }),
        "got {err:?}"
    );

    assert_eq!(store.load_security_record(USER).await.unwrap(), Some(rec));
    assert_eq!(
        store.get_document(USER, "doc-1").await.unwrap(),
        Some(original)
    );
}

pub async fn commit_rotation_without_record_conflicts(store: &dyn DocumentStore) {
    let key = master_key("pw");
    let batch = RotationBatch {
        expected_version: 1,
        documents: vec![document(&key, "doc-1", "t")],
        security_record: record(&key),
    };
    let err = store.commit_rotation(USER, batch).await.unwrap_err();
    assert!(matches!(err, StoreError::VersionConflict { found: None, .. }));
    assert!(store.list_documents(USER).await.unwrap().is_empty());
}
