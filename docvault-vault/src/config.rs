//! Vault configuration.

use crate::error::{VaultError, VaultResult};
use docvault_crypto::{KdfParams, DEFAULT_KDF_ITERATIONS};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest idle timeout honored; larger configured values are clamped.
pub const MAX_IDLE_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

/// Configuration for a [`DocumentVault`](crate::DocumentVault).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Inactivity period after which the session key is dropped (seconds).
    /// Capped at [`MAX_IDLE_TIMEOUT_SECS`].
    pub idle_timeout_secs: u64,

    /// PBKDF2 iterations for newly written security records.
    pub kdf_iterations: u32,

    /// Minimum password length, in characters.
    pub min_password_len: usize,

    /// Draw a fresh salt when rotating the password.
    pub regenerate_salt_on_rotation: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 2 * 60 * 60,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            min_password_len: 8,
            regenerate_salt_on_rotation: true,
        }
    }
}

impl VaultConfig {
    /// Parses a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> VaultResult<Self> {
        serde_json::from_str(json).map_err(|e| VaultError::Internal(format!("invalid config: {e}")))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs.min(MAX_IDLE_TIMEOUT_SECS))
    }

    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::with_iterations(self.kdf_iterations)
    }

    pub(crate) fn check_password(&self, password: &str) -> VaultResult<()> {
        let min = self.min_password_len.max(1);
        if password.chars().count() < min {
            return Err(VaultError::PasswordTooShort { min });
        }
        Ok(())
    }
}
