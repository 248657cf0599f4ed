//! DuckDB-backed document store.
//!
//! Documents and security records are stored as their JSON wire form in
//! TEXT columns, keyed by user id. Rotation batches are written inside one
//! transaction, so a failed commit leaves every row untouched.

use crate::error::{StoreError, StoreResult};
use crate::record::{RotationBatch, SecurityRecord};
use crate::store::DocumentStore;
use async_trait::async_trait;
use chrono::Utc;
use docvault_crypto::EncryptedDocument;
use duckdb::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// DuckDB otherwise sizes itself for analytics, taking most of the RAM and
/// every core. A vault database holds small JSON rows and needs neither.
const MEMORY_LIMIT: &str = "64MB";
const THREADS: u32 = 1;

/// [`DocumentStore`] persisted in a DuckDB database.
#[derive(Clone)]
pub struct DuckDbDocumentStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbDocumentStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = open_with_wal_recovery(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut *guard)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

/// Opens `path`, retrying once without the `.wal` file if the first open
/// fails. An unclean shutdown can leave a WAL that blocks reopening.
fn open_with_wal_recovery(path: &Path) -> StoreResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if !wal_path.exists() || std::fs::remove_file(&wal_path).is_err() {
                return Err(first_err.into());
            }
            warn!("removed stale DuckDB WAL {}, retrying open", wal_path.display());
            Connection::open(path)?
        }
    };
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{MEMORY_LIMIT}'; PRAGMA threads={THREADS};"
    ))?;
    Ok(conn)
}

fn initialize_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS security_records (
            user_id VARCHAR PRIMARY KEY,
            record_json VARCHAR NOT NULL,
            version BIGINT NOT NULL,
            modified_at BIGINT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS documents (
            user_id VARCHAR NOT NULL,
            document_id VARCHAR NOT NULL,
            document_json VARCHAR NOT NULL,
            modified_at BIGINT NOT NULL,
            PRIMARY KEY (user_id, document_id)
        );",
    )?;
    Ok(())
}

fn upsert_record(conn: &Connection, user_id: &str, record: &SecurityRecord) -> StoreResult<()> {
    let json = serde_json::to_string(record)?;
    conn.execute(
        "INSERT OR REPLACE INTO security_records (user_id, record_json, version, modified_at)
         VALUES (?, ?, ?, ?)",
        params![user_id, json, i64::from(record.version), Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn upsert_document(conn: &Connection, user_id: &str, doc: &EncryptedDocument) -> StoreResult<()> {
    let json = doc.to_json()?;
    conn.execute(
        "INSERT OR REPLACE INTO documents (user_id, document_id, document_json, modified_at)
         VALUES (?, ?, ?, ?)",
        params![user_id, doc.document_id(), json, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn optional<T>(result: duckdb::Result<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn record_version(conn: &Connection, user_id: &str) -> StoreResult<Option<u32>> {
    let version: Option<i64> = optional(conn.query_row(
        "SELECT version FROM security_records WHERE user_id = ?",
        params![user_id],
        |row| row.get(0),
    ))?;
    version
        .map(|v| {
            u32::try_from(v)
                .map_err(|_| StoreError::Corrupt(format!("record version {v} out of range")))
        })
        .transpose()
}

#[async_trait]
impl DocumentStore for DuckDbDocumentStore {
    async fn load_security_record(&self, user_id: &str) -> StoreResult<Option<SecurityRecord>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let json: Option<String> = optional(conn.query_row(
                "SELECT record_json FROM security_records WHERE user_id = ?",
                params![user_id],
                |row| row.get(0),
            ))?;
            json.map(|j| serde_json::from_str(&j).map_err(StoreError::from))
                .transpose()
        })
        .await
    }

    async fn create_security_record(
        &self,
        user_id: &str,
        record: &SecurityRecord,
    ) -> StoreResult<bool> {
        let user_id = user_id.to_string();
        let record = record.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            if record_version(&tx, &user_id)?.is_some() {
                return Ok(false);
            }
            upsert_record(&tx, &user_id, &record)?;
            tx.commit()?;
            Ok(true)
        })
        .await
    }

    async fn save_security_record(
        &self,
        user_id: &str,
        record: &SecurityRecord,
    ) -> StoreResult<()> {
        let user_id = user_id.to_string();
        let record = record.clone();
        self.with_conn(move |conn| upsert_record(conn, &user_id, &record))
            .await
    }

    async fn get_document(
        &self,
        user_id: &str,
        document_id: &str,
    ) -> StoreResult<Option<EncryptedDocument>> {
        let user_id = user_id.to_string();
        let document_id = document_id.to_string();
        self.with_conn(move |conn| {
            let json: Option<String> = optional(conn.query_row(
                "SELECT document_json FROM documents WHERE user_id = ? AND document_id = ?",
                params![user_id, document_id],
                |row| row.get(0),
            ))?;
            Ok(json.map(|j| EncryptedDocument::from_json(&j)).transpose()?)
        })
        .await
    }

    async fn put_document(&self, user_id: &str, document: &EncryptedDocument) -> StoreResult<()> {
        let user_id = user_id.to_string();
        let document = document.clone();
        self.with_conn(move |conn| upsert_document(conn, &user_id, &document))
            .await
    }

    async fn delete_document(&self, user_id: &str, document_id: &str) -> StoreResult<bool> {
        let user_id = user_id.to_string();
        let document_id = document_id.to_string();
        self.with_conn(move |conn| {
            let affected = conn.execute(
                "DELETE FROM documents WHERE user_id = ? AND document_id = ?",
                params![user_id, document_id],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn list_documents(&self, user_id: &str) -> StoreResult<Vec<EncryptedDocument>> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT document_json FROM documents WHERE user_id = ? ORDER BY document_id",
            )?;
            let rows: Vec<String> = stmt
                .query_map(params![user_id], |row| row.get(0))?
                .collect::<Result<_, _>>()?;

            let mut docs = Vec::with_capacity(rows.len());
            for json in rows {
                docs.push(EncryptedDocument::from_json(&json)?);
            }
            Ok(docs)
        })
        .await
    }

    async fn commit_rotation(&self, user_id: &str, batch: RotationBatch) -> StoreResult<()> {
        let user_id = user_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let found = record_version(&tx, &user_id)?;
            if found != Some(batch.expected_version) {
                return Err(StoreError::VersionConflict {
                    expected: batch.expected_version,
                    found,
                });
            }

            for doc in &batch.documents {
                upsert_document(&tx, &user_id, doc)?;
            }
            upsert_record(&tx, &user_id, &batch.security_record)?;
            tx.commit()?;

            debug!(
                "committed rotation batch of {} documents for user {user_id}",
                batch.documents.len()
            );
            Ok(())
        })
        .await
    }
}
