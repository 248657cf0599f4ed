//! Password-protected document vault.
//!
//! Ties the crypto primitives to a [`DocumentStore`](docvault_store::DocumentStore):
//!
//! - [`SessionKeyHolder`] keeps the derived master key in memory between
//!   unlock and lock, and drops it after a period of inactivity
//! - [`RotationPipeline`] re-encrypts every document when the password changes,
//!   committing all of it or none of it
//! - [`DocumentVault`] is the surface the UI talks to
//!
//! The master key is never persisted and never leaves this crate.

mod config;
mod error;
mod rotation;
mod session;
mod vault;

pub use config::{VaultConfig, MAX_IDLE_TIMEOUT_SECS};
pub use error::{VaultError, VaultResult};
pub use rotation::{RotationPipeline, RotationReport};
pub use session::{RotationGuard, SessionKeyHolder, SessionState};
pub use vault::DocumentVault;
