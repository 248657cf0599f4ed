//! Password verifier.
//!
//! A verifier is the first 16 bytes of SHA-256 over the master key. It lets a
//! password be checked before the key is trusted, without storing or sending
//! anything key-equivalent.

use crate::encoding;
use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, KdfParams, MasterKey, Salt};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Verifier length in bytes.
pub const VERIFIER_SIZE: usize = 16;

/// Truncated SHA-256 of a master key.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Verifier([u8; VERIFIER_SIZE]);

impl Verifier {
    pub fn from_bytes(bytes: [u8; VERIFIER_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; VERIFIER_SIZE] {
        &self.0
    }

    /// Constant-time check of `key` against this verifier.
    pub fn matches(&self, key: &MasterKey) -> bool {
        create_verifier(key).0.ct_eq(&self.0).into()
    }

    pub fn to_base64(&self) -> String {
        encoding::encode(&self.0)
    }

    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let bytes = encoding::decode(text)?;
        let len = bytes.len();
        let arr: [u8; VERIFIER_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::Encoding(format!("verifier must be {VERIFIER_SIZE} bytes, got {len}"))
        })?;
        Ok(Self(arr))
    }
}

impl Serialize for Verifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Verifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Verifier::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// Builds the verifier for `key`.
pub fn create_verifier(key: &MasterKey) -> Verifier {
    let digest = Sha256::digest(key.as_bytes());
    let mut out = [0u8; VERIFIER_SIZE];
    out.copy_from_slice(&digest[..VERIFIER_SIZE]);
    Verifier(out)
}

/// Re-derives the key for `password` and checks it against `stored`.
///
/// Only the boolean leaves this function; the derived key is zeroized on drop.
pub fn verify_password(
    password: &str,
    salt: &Salt,
    params: &KdfParams,
    stored: &Verifier,
) -> CryptoResult<bool> {
    let key = derive_key(password, salt, params)?;
    Ok(stored.matches(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams::with_iterations(1_000)
    }

    #[test]
    fn verifier_is_deterministic() {
        let salt = Salt::random();
        let a = create_verifier(&derive_key("correct-horse", &salt, &fast()).unwrap());
        let b = create_verifier(&derive_key("correct-horse", &salt, &fast()).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn verifier_differs_for_other_password() {
        let salt = Salt::random();
        let a = create_verifier(&derive_key("correct-horse", &salt, &fast()).unwrap());
        let b = create_verifier(&derive_key("wrong-password", &salt, &fast()).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn verify_password_accepts_and_rejects() {
        let salt = Salt::random();
        let stored = create_verifier(&derive_key("correct-horse", &salt, &fast()).unwrap());

        assert!(verify_password("correct-horse", &salt, &fast(), &stored).unwrap());
        assert!(!verify_password("wrong-password", &salt, &fast(), &stored).unwrap());
    }

    #[test]
    fn verifier_is_truncated_sha256() {
        let key = derive_key("pw", &Salt::random(), &fast()).unwrap();
        let full = Sha256::digest(key.as_bytes());
        assert_eq!(create_verifier(&key).as_bytes(), &full[..VERIFIER_SIZE]);
    }

    #[test]
    fn base64_roundtrip_and_length_check() {
        let v = Verifier::from_bytes([9u8; VERIFIER_SIZE]);
        let back = Verifier::from_base64(&v.to_base64()).unwrap();
        assert_eq!(v, back);

        let short = encoding::encode(&[1u8; 8]);
        assert!(matches!(Verifier::from_base64(&short), Err(CryptoError::Encoding(_))));
    }
}
