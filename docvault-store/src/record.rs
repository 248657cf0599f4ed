//! Persisted per-user security record and the rotation batch.

use crate::error::{StoreError, StoreResult};
use chrono::{DateTime, Utc};
use docvault_crypto::{EncryptedDocument, KdfParams, Salt, Verifier};
use serde::{Deserialize, Serialize};

/// Per-user key material parameters: `{salt, verifier, version, createdAt}`.
///
/// Nothing here is secret. `verifier` is absent on legacy records, in which
/// case password correctness is only discovered at the first decrypt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRecord {
    pub salt: Salt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<Verifier>,
    /// Bumped on every password rotation.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    /// PBKDF2 iterations this record was derived with. Absent on records
    /// written before the cost factor was stored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kdf_iterations: Option<u32>,
}

impl SecurityRecord {
    /// Initial record for a newly initialized vault.
    pub fn new(salt: Salt, verifier: Verifier, params: KdfParams) -> Self {
        Self {
            salt,
            verifier: Some(verifier),
            version: 1,
            created_at: Utc::now(),
            kdf_iterations: Some(params.iterations),
        }
    }

    /// KDF parameters for this record, falling back to `default` when unrecorded.
    pub fn kdf_params(&self, default: KdfParams) -> KdfParams {
        self.kdf_iterations
            .map(KdfParams::with_iterations)
            .unwrap_or(default)
    }

    /// The record that replaces this one after a password rotation.
    ///
    /// Fails with [`StoreError::Corrupt`] when the version cannot be bumped.
    pub fn rotated(
        &self,
        salt: Salt,
        verifier: Verifier,
        params: KdfParams,
    ) -> StoreResult<Self> {
        let version = self.version.checked_add(1).ok_or_else(|| {
            StoreError::Corrupt(format!("security record version {} is exhausted", self.version))
        })?;
        Ok(Self {
            salt,
            verifier: Some(verifier),
            version,
            created_at: self.created_at,
            kdf_iterations: Some(params.iterations),
        })
    }
}

/// Everything a password rotation writes, committed all-or-nothing.
#[derive(Clone, Debug)]
pub struct RotationBatch {
    /// Version of the record the batch was staged against.
    pub expected_version: u32,
    pub documents: Vec<EncryptedDocument>,
    pub security_record: SecurityRecord,
}

#[cfg(test)]
mod tests {
    use super::*;
    use docvault_crypto::VERIFIER_SIZE;

    #[test]
    fn wire_format_is_camel_case_base64() {
        let record = SecurityRecord::new(
            Salt::random(),
            Verifier::from_bytes([3u8; VERIFIER_SIZE]),
            KdfParams::default(),
        );
        let v = serde_json::to_value(&record).unwrap();

        assert!(v["salt"].is_string());
        assert!(v["verifier"].is_string());
        assert_eq!(v["version"], 1);
        assert!(v["createdAt"].is_string());
        assert_eq!(v["kdfIterations"], 100_000);

        let back: SecurityRecord = serde_json::from_value(v).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn legacy_record_without_verifier_parses() {
        let json = serde_json::json!({
            "salt": Salt::random().to_base64(),
            "version": 1,
            "createdAt": "2024-01-01T00:00:00Z",
        });
        let record: SecurityRecord = serde_json::from_value(json).unwrap();
        assert!(record.verifier.is_none());
        assert_eq!(
            record.kdf_params(KdfParams::with_iterations(42)),
            KdfParams::with_iterations(42)
        );
    }

    #[test]
    fn rotated_bumps_version_and_keeps_created_at() {
        let first = SecurityRecord::new(
            Salt::random(),
            Verifier::from_bytes([1u8; VERIFIER_SIZE]),
            KdfParams::default(),
        );
        let next = first
            .rotated(
                Salt::random(),
                Verifier::from_bytes([2u8; VERIFIER_SIZE]),
                KdfParams::with_iterations(200_000),
            )
            .unwrap();
        assert_eq!(next.version, 2);
        assert_eq!(next.created_at, first.created_at);
        assert_ne!(next.salt, first.salt);
        assert_eq!(next.kdf_iterations, Some(200_000));
    }

    #[test]
    fn rotated_rejects_exhausted_version() {
        let mut record = SecurityRecord::new(
            Salt::random(),
            Verifier::from_bytes([1u8; VERIFIER_SIZE]),
            KdfParams::default(),
        );
        record.version = u32::MAX;

        let err = record
            .rotated(
                Salt::random(),
                Verifier::from_bytes([2u8; VERIFIER_SIZE]),
                KdfParams::default(),
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
