// ── Local object store ──
//
// The mirror's persistent side: uid -> object document. The reconciler
// only needs the `LocalStore` trait; `SqliteStore` is the on-disk
// implementation.

mod sqlite;

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::model::RemoteObject;

pub use sqlite::SqliteStore;

/// Errors from the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another connection holds the database lock. Retryable.
    #[error("database is busy or locked")]
    Busy,

    /// Any other SQLite failure. Not retryable.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// A stored document could not be encoded or decoded.
    #[error("document serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                Self::Busy
            }
            _ => Self::Database(err),
        }
    }
}

/// A mirrored object as held locally.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredObject {
    pub uid: String,
    #[serde(rename = "type")]
    pub object_type: String,
    pub name: Option<String>,
    pub document: Value,
    pub synced_at: DateTime<Utc>,
}

/// Persistent uid -> document mapping.
///
/// Writes made through `insert_or_replace` and `delete` become durable at
/// the next `commit`. Any method may fail with [`StoreError::Busy`] when
/// another writer holds the lock.
pub trait LocalStore: Send + Sync {
    /// Write `object` under its uid, replacing any existing record.
    fn insert_or_replace(&self, object: &RemoteObject) -> Result<(), StoreError>;

    /// Remove the record for `uid`. Returns whether one existed.
    fn delete(&self, uid: &str) -> Result<bool, StoreError>;

    fn get(&self, uid: &str) -> Result<Option<StoredObject>, StoreError>;

    /// Every uid currently held.
    fn keys(&self) -> Result<HashSet<String>, StoreError>;

    fn count(&self) -> Result<u64, StoreError>;

    fn commit(&self) -> Result<(), StoreError>;
}
