//! Key types and password-based key derivation.
//!
//! The master key is stretched from the user's password with
//! PBKDF2-HMAC-SHA256. Item keys are drawn from the thread CSPRNG.
//! Both are zeroized on drop and redacted in `Debug` output.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of master and item keys in bytes (256 bits).
pub const KEY_SIZE: usize = 32;

/// Size of a freshly generated salt in bytes.
pub const SALT_SIZE: usize = 16;

/// Smallest salt accepted from storage.
pub const MIN_SALT_SIZE: usize = 16;

/// Default PBKDF2 iteration count.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

mod sealed {
    pub trait Sealed {
        fn key_bytes(&self) -> &[u8; super::KEY_SIZE];
    }
}

/// A 256-bit key usable with the authenticated cipher.
///
/// Sealed: only [`MasterKey`] and [`ItemKey`] implement it, and raw bytes
/// are not reachable from outside this crate.
pub trait SymmetricKey: sealed::Sealed {}

/// Key derived from the user's password. Never persisted.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey([u8; KEY_SIZE]);

impl MasterKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl sealed::Sealed for MasterKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl SymmetricKey for MasterKey {}

impl PartialEq for MasterKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for MasterKey {}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Random per-document key. Lives in memory only during encrypt/decrypt.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct ItemKey([u8; KEY_SIZE]);

impl ItemKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl sealed::Sealed for ItemKey {
    fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl SymmetricKey for ItemKey {}

impl PartialEq for ItemKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for ItemKey {}

impl std::fmt::Debug for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ItemKey(<redacted>)")
    }
}

pub(crate) fn key_bytes<K: SymmetricKey>(key: &K) -> &[u8; KEY_SIZE] {
    sealed::Sealed::key_bytes(key)
}

/// Per-user KDF salt. Not secret; persisted in the security record as base64.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Generates a fresh random salt of [`SALT_SIZE`] bytes.
    pub fn random() -> Self {
        let mut bytes = vec![0u8; SALT_SIZE];
        rand::rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Wraps stored salt bytes, rejecting anything shorter than [`MIN_SALT_SIZE`].
    pub fn from_bytes(bytes: Vec<u8>) -> CryptoResult<Self> {
        if bytes.len() < MIN_SALT_SIZE {
            return Err(CryptoError::InvalidSalt {
                min: MIN_SALT_SIZE,
                actual: bytes.len(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        Self::from_bytes(encoding::decode(text)?)
    }
}

impl Serialize for Salt {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Salt {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Salt::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// PBKDF2 cost parameters. Must stay constant for a user between rotations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// Stretches `password` into a 256-bit master key with PBKDF2-HMAC-SHA256.
///
/// Deterministic: the same password, salt and parameters always yield the
/// same key, so the key can be re-derived on every unlock instead of stored.
pub fn derive_key(password: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<MasterKey> {
    if password.is_empty() {
        return Err(CryptoError::EmptyPassword);
    }
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation(
            "iteration count must be positive".to_string(),
        ));
    }

    let mut out = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), params.iterations, &mut out);
    let key = MasterKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}

/// Generates a fresh random item key.
pub fn generate_item_key() -> ItemKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    let key = ItemKey::from_bytes(bytes);
    bytes.zeroize();
    key
}
