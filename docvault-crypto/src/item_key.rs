//! Item key wrapping.
//!
//! Each document's item key is encrypted under the master key with the
//! document id as associated data, so a wrapped key lifted from one document
//! record cannot be unwrapped under another.

use crate::cipher::{self, EncryptedData};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{ItemKey, KEY_SIZE, MasterKey};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// An item key encrypted under a master key. Serialized as `{iv, ciphertext}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WrappedItemKey(pub EncryptedData);

/// Wraps `item_key` under `master_key`, bound to `document_id`.
pub fn wrap_item_key(
    item_key: &ItemKey,
    master_key: &MasterKey,
    document_id: &str,
) -> CryptoResult<WrappedItemKey> {
    let enc = cipher::encrypt(master_key, item_key.as_bytes(), Some(document_id.as_bytes()))?;
    Ok(WrappedItemKey(enc))
}

/// Unwraps an item key. Fails with [`CryptoError::Authentication`] for a
/// wrong master key or a `document_id` other than the one it was wrapped for.
pub fn unwrap_item_key(
    wrapped: &WrappedItemKey,
    master_key: &MasterKey,
    document_id: &str,
) -> CryptoResult<ItemKey> {
    let bytes = Zeroizing::new(cipher::decrypt(
        master_key,
        &wrapped.0,
        Some(document_id.as_bytes()),
    )?);

    if bytes.len() != KEY_SIZE {
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        });
    }

    let mut arr = Zeroizing::new([0u8; KEY_SIZE]);
    arr.copy_from_slice(&bytes);
    Ok(ItemKey::from_bytes(*arr))
}
