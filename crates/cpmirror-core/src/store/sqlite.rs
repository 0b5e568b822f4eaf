//! `SQLite`-backed local store.
//!
//! One table keyed by uid. Writes open an immediate transaction lazily and
//! stay pending until [`LocalStore::commit`]. The busy timeout is zero so
//! lock contention surfaces at once as [`StoreError::Busy`] and the
//! reconciler's retry policy decides how long to wait.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use tracing::debug;

use super::{LocalStore, StoreError, StoredObject};
use crate::model::RemoteObject;

const SCHEMA_SQL: &str = r"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA busy_timeout = 0;

CREATE TABLE IF NOT EXISTS objects (
    uid       TEXT PRIMARY KEY NOT NULL,
    type      TEXT NOT NULL,
    name      TEXT,
    document  TEXT NOT NULL,
    synced_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_objects_type ON objects(type);
";

// Unchanged documents are left alone so re-syncing the same inventory
// doesn't touch a single row.
const UPSERT_SQL: &str = r"
INSERT INTO objects (uid, type, name, document, synced_at)
VALUES (?1, ?2, ?3, ?4, ?5)
ON CONFLICT(uid) DO UPDATE SET
    type = excluded.type,
    name = excluded.name,
    document = excluded.document,
    synced_at = excluded.synced_at
WHERE objects.document IS NOT excluded.document
   OR objects.type IS NOT excluded.type
";

/// Raw columns of one row, decoded outside the rusqlite closure.
type Row = (String, String, Option<String>, String, i64);

/// The on-disk mirror.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates a store at `path`, creating parent directories.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.execute_batch(SCHEMA_SQL)?;
        debug!(path = %path.display(), "opened local store");

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory store for testing.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Backing file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Every stored object, optionally only those of one type, by name.
    pub fn list(&self, object_type: Option<&str>) -> Result<Vec<StoredObject>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT uid, type, name, document, synced_at FROM objects
             WHERE ?1 IS NULL OR type = ?1
             ORDER BY type, name, uid",
        )?;
        let rows = stmt
            .query_map(params![object_type], read_row)?
            .collect::<Result<Vec<Row>, _>>()?;
        rows.into_iter().map(decode_row).collect()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_if_needed(conn: &Connection) -> Result<(), StoreError> {
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        Ok(())
    }
}

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_row((uid, object_type, name, document, synced_at): Row) -> Result<StoredObject, StoreError> {
    Ok(StoredObject {
        uid,
        object_type,
        name,
        document: serde_json::from_str(&document)?,
        synced_at: DateTime::from_timestamp_millis(synced_at).unwrap_or_default(),
    })
}

impl LocalStore for SqliteStore {
    fn insert_or_replace(&self, object: &RemoteObject) -> Result<(), StoreError> {
        let document = serde_json::to_string(object)?;
        let conn = self.conn();
        Self::begin_if_needed(&conn)?;
        conn.execute(
            UPSERT_SQL,
            params![
                object.uid,
                object.object_type,
                object.name,
                document,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, uid: &str) -> Result<bool, StoreError> {
        let conn = self.conn();
        Self::begin_if_needed(&conn)?;
        let changed = conn.execute("DELETE FROM objects WHERE uid = ?1", params![uid])?;
        Ok(changed > 0)
    }

    fn get(&self, uid: &str) -> Result<Option<StoredObject>, StoreError> {
        let row = self
            .conn()
            .query_row(
                "SELECT uid, type, name, document, synced_at FROM objects WHERE uid = ?1",
                params![uid],
                read_row,
            )
            .optional()?;
        row.map(decode_row).transpose()
    }

    fn keys(&self) -> Result<HashSet<String>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT uid FROM objects")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(keys)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM objects", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    fn commit(&self) -> Result<(), StoreError> {
        let conn = self.conn();
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn host(uid: &str, name: &str, ip: &str) -> RemoteObject {
        serde_json::from_value(json!({
            "uid": uid,
            "type": "host",
            "name": name,
            "ipv4-address": ip
        }))
        .unwrap()
    }

    #[test]
    fn insert_or_replace_never_duplicates() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_or_replace(&host("u1", "web01", "10.0.0.1")).unwrap();
        store.insert_or_replace(&host("u1", "web01", "10.0.0.2")).unwrap();
        store.commit().unwrap();

        assert_eq!(store.count().unwrap(), 1);
        let stored = store.get("u1").unwrap().unwrap();
        assert_eq!(stored.document["ipv4-address"], "10.0.0.2");
        assert_eq!(stored.name.as_deref(), Some("web01"));
    }

    #[test]
    fn unchanged_document_is_not_rewritten() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_or_replace(&host("u1", "web01", "10.0.0.1")).unwrap();
        store.commit().unwrap();
        store
            .conn()
            .execute("UPDATE objects SET synced_at = 1 WHERE uid = 'u1'", [])
            .unwrap();

        store.insert_or_replace(&host("u1", "web01", "10.0.0.1")).unwrap();
        store.commit().unwrap();

        let stored = store.get("u1").unwrap().unwrap();
        assert_eq!(stored.synced_at.timestamp_millis(), 1);
    }

    #[test]
    fn delete_reports_presence() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_or_replace(&host("u1", "a", "10.0.0.1")).unwrap();
        store.commit().unwrap();

        assert!(store.delete("u1").unwrap());
        assert!(!store.delete("u1").unwrap());
        store.commit().unwrap();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.get("u1").unwrap().is_none());
    }

    #[test]
    fn keys_and_list_by_type() {
        let store = SqliteStore::in_memory().unwrap();
        store.insert_or_replace(&host("u1", "b", "10.0.0.1")).unwrap();
        store.insert_or_replace(&host("u2", "a", "10.0.0.2")).unwrap();
        let net: RemoteObject = serde_json::from_value(json!({
            "uid": "n1", "type": "network", "name": "lan"
        }))
        .unwrap();
        store.insert_or_replace(&net).unwrap();
        store.commit().unwrap();

        let keys = store.keys().unwrap();
        assert_eq!(keys.len(), 3);
        assert!(keys.contains("n1"));

        let hosts = store.list(Some("host")).unwrap();
        let names: Vec<_> = hosts.iter().map(|o| o.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(store.list(None).unwrap().len(), 3);
    }

    #[test]
    fn commit_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("mirror.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_or_replace(&host("u1", "a", "10.0.0.1")).unwrap();
            store.insert_or_replace(&host("u2", "b", "10.0.0.2")).unwrap();
            store.commit().unwrap();
            store.insert_or_replace(&host("u3", "c", "10.0.0.3")).unwrap();
            // u3 never committed
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.count().unwrap(), 2);
        assert!(store.get("u3").unwrap().is_none());
    }

    #[test]
    fn competing_writer_surfaces_as_busy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror.db");
        let store = SqliteStore::open(&path).unwrap();

        let other = Connection::open(&path).unwrap();
        other.execute_batch("BEGIN IMMEDIATE").unwrap();

        let err = store
            .insert_or_replace(&host("u1", "a", "10.0.0.1"))
            .unwrap_err();
        assert!(err.is_busy(), "got {err:?}");

        other.execute_batch("COMMIT").unwrap();
        store.insert_or_replace(&host("u1", "a", "10.0.0.1")).unwrap();
        store.commit().unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
