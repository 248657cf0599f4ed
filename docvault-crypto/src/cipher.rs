//! AES-256-GCM authenticated encryption.
//!
//! Every call to [`encrypt`] draws a fresh random 96-bit IV. Optional
//! associated data is authenticated but not encrypted; decryption with a
//! different AAD fails the tag check exactly like a wrong key does.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{key_bytes, SymmetricKey};
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// IV length in bytes (96 bits).
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag length in bytes (128 bits).
pub const TAG_SIZE: usize = 16;

/// IV plus ciphertext (tag appended). Binary fields are base64 in JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedData {
    #[serde(with = "encoding::base64_array")]
    pub iv: [u8; NONCE_SIZE],
    #[serde(with = "encoding::base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Total encrypted size in bytes, IV included.
    pub fn len(&self) -> usize {
        NONCE_SIZE + self.ciphertext.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphertext.is_empty()
    }
}

fn cipher_for<K: SymmetricKey>(key: &K) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_bytes(key)))
}

/// Encrypts `plaintext` under `key`, binding `aad` when given.
pub fn encrypt<K: SymmetricKey>(
    key: &K,
    plaintext: &[u8],
    aad: Option<&[u8]>,
) -> CryptoResult<EncryptedData> {
    let mut iv = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut iv);

    let ciphertext = cipher_for(key)
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: plaintext,
                aad: aad.unwrap_or_default(),
            },
        )
        .map_err(|_| CryptoError::Encryption("AES-GCM encryption failed".to_string()))?;

    Ok(EncryptedData { iv, ciphertext })
}

/// Decrypts `data` under `key`. Fails with [`CryptoError::Authentication`]
/// when the tag does not verify; no plaintext is returned in that case.
pub fn decrypt<K: SymmetricKey>(
    key: &K,
    data: &EncryptedData,
    aad: Option<&[u8]>,
) -> CryptoResult<Vec<u8>> {
    if data.ciphertext.len() < TAG_SIZE {
        return Err(CryptoError::Authentication);
    }

    cipher_for(key)
        .decrypt(
            Nonce::from_slice(&data.iv),
            Payload {
                msg: &data.ciphertext,
                aad: aad.unwrap_or_default(),
            },
        )
        .map_err(|_| CryptoError::Authentication)
}

/// Serializes `value` to JSON and encrypts it.
pub fn encrypt_value<K: SymmetricKey, T: Serialize>(
    key: &K,
    value: &T,
    aad: Option<&[u8]>,
) -> CryptoResult<EncryptedData> {
    let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
    encrypt(key, &plaintext, aad)
}

/// Decrypts and deserializes a value produced by [`encrypt_value`].
pub fn decrypt_value<K: SymmetricKey, T: DeserializeOwned>(
    key: &K,
    data: &EncryptedData,
    aad: Option<&[u8]>,
) -> CryptoResult<T> {
    let plaintext = Zeroizing::new(decrypt(key, data, aad)?);
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::generate_item_key;

    #[test]
    fn roundtrip_without_aad() {
        let key = generate_item_key();
        let enc = encrypt(&key, b"hello", None).unwrap();
        assert_eq!(decrypt(&key, &enc, None).unwrap(), b"hello");
        assert_eq!(enc.ciphertext.len(), 5 + TAG_SIZE);
    }

    #[test]
    fn aad_must_match() {
        let key = generate_item_key();
        let enc = encrypt(&key, b"payload", Some(b"doc-a")).unwrap();

        assert!(decrypt(&key, &enc, Some(b"doc-a")).is_ok());
        assert!(matches!(
            decrypt(&key, &enc, Some(b"doc-b")),
            Err(CryptoError::Authentication)
        ));
        assert!(matches!(
            decrypt(&key, &enc, None),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn truncated_ciphertext_fails_closed() {
        let key = generate_item_key();
        let mut enc = encrypt(&key, b"payload", None).unwrap();
        enc.ciphertext.truncate(TAG_SIZE - 1);
        assert!(matches!(decrypt(&key, &enc, None), Err(CryptoError::Authentication)));
    }

    #[test]
    fn structured_value_roundtrip() {
        let key = generate_item_key();
        let value = serde_json::json!({"note": "hello", "n": 3});
        let enc = encrypt_value(&key, &value, None).unwrap();
        let back: serde_json::Value = decrypt_value(&key, &enc, None).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn shape_mismatch_error_does_not_echo_plaintext() {
        let key = generate_item_key();
        let enc = encrypt_value(&key, &"top-secret-string", None).unwrap();
        let err = decrypt_value::<_, u32>(&key, &enc, None).unwrap_err();
        assert!(!err.to_string().contains("top-secret-string"));
    }

    #[test]
    fn json_form_is_base64() {
        let key = generate_item_key();
        let enc = encrypt(&key, b"x", None).unwrap();
        let json = serde_json::to_value(&enc).unwrap();
        assert!(json["iv"].is_string());
        assert!(json["ciphertext"].is_string());
        let back: EncryptedData = serde_json::from_value(json).unwrap();
        assert_eq!(back, enc);
    }
}
