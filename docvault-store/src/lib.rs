//! Document store layer for DocVault.
//!
//! Defines the [`DocumentStore`] boundary the vault talks to and ships two
//! backends:
//!
//! - [`InMemoryDocumentStore`] for tests and embedding
//! - [`DuckDbDocumentStore`] for durable local persistence
//!
//! Stores only ever hold ciphertext and non-secret metadata. Every binary
//! field crosses this boundary as base64 or hex text inside JSON.

mod duckdb_store;
mod error;
mod memory;
mod record;
mod store;

pub use duckdb_store::DuckDbDocumentStore;
pub use error::{StoreError, StoreResult};
pub use memory::InMemoryDocumentStore;
pub use record::{RotationBatch, SecurityRecord};
pub use store::DocumentStore;
