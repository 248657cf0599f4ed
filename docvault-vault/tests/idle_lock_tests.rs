//! Idle auto-lock, driven by a paused tokio clock.

mod support;

use docvault_vault::{SessionState, VaultError};
use serde_json::{json, Value};
use std::time::Duration;
use support::*;

#[tokio::test(start_paused = true)]
async fn locks_after_idle_timeout() {
    let (vault, _store) = initialized_vault().await;
    assert!(vault.is_ready().await);

    tokio::time::advance(Duration::from_secs(61)).await;

    assert!(!vault.is_ready().await);
    assert_eq!(vault.state().await, SessionState::Expired);
    assert!(matches!(
        vault.encrypt_document(&json!({"a": 1}), None).await,
        Err(VaultError::SessionExpired)
    ));
}

#[tokio::test(start_paused = true)]
async fn explicit_lock_is_not_reported_as_expiry() {
    let (vault, _store) = initialized_vault().await;
    vault.lock().await;

    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(vault.state().await, SessionState::Locked);
    assert!(matches!(
        vault.list_documents().await,
        Err(VaultError::Locked)
    ));
}

#[tokio::test(start_paused = true)]
async fn expiry_clears_on_unlock() {
    let (vault, _store) = initialized_vault().await;
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(vault.state().await, SessionState::Expired);

    vault.unlock(PASSWORD).await.unwrap();
    assert!(vault.state().await.is_unlocked());
}

#[tokio::test(start_paused = true)]
async fn successful_use_slides_the_deadline() {
    let (vault, _store) = initialized_vault().await;

    tokio::time::advance(Duration::from_secs(40)).await;
    vault.encrypt_document(&json!({"a": 1}), None).await.unwrap();

    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(vault.is_ready().await);

    tokio::time::advance(Duration::from_secs(21)).await;
    assert!(!vault.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn failed_use_does_not_slide_the_deadline() {
    let (vault, store) = initialized_vault().await;
    vault.save_document(&json!({"a": 1}), Some("a")).await.unwrap();
    corrupt_ciphertext(&store, "a").await;

    tokio::time::advance(Duration::from_secs(40)).await;
    assert!(vault.load_document::<Value>("a").await.is_err());

    tokio::time::advance(Duration::from_secs(21)).await;
    assert!(!vault.is_ready().await);
}

#[tokio::test(start_paused = true)]
async fn unlock_after_auto_lock() {
    let (vault, _store) = initialized_vault().await;
    tokio::time::advance(Duration::from_secs(61)).await;
    assert!(!vault.is_ready().await);

    vault.unlock(PASSWORD).await.unwrap();
    assert!(vault.is_ready().await);
    assert_eq!(vault.key_epoch().await, 2);
}

#[tokio::test(start_paused = true)]
async fn explicit_lock_then_unlock_restarts_timer() {
    let (vault, _store) = initialized_vault().await;
    tokio::time::advance(Duration::from_secs(50)).await;
    vault.lock().await;
    vault.unlock(PASSWORD).await.unwrap();

    tokio::time::advance(Duration::from_secs(50)).await;
    assert!(vault.is_ready().await);
}
