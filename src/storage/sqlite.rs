//! The durable mapping underneath the Composite Store's backing store,
//! backed by a transactional row store with a blob column.
//!
//! Grounded in `examples/original_source/src/notebooks/lib/database.py`'s
//! `AsyncDataBase` (schema, upsert-by-replace, `key IN (...)` multi-read)
//! and in the `rusqlite` idiom shown in the retrieval pack's
//! `rust-lang/cargo` registry index cache (`Connection`, `params!`,
//! `INSERT OR REPLACE`, a `CREATE TABLE IF NOT EXISTS` migration).

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::{Error, Result};

/// Synchronous, blocking SQLite-backed implementation of the backing
/// store. Always called from within
/// [`crate::storage::async_ops`]'s `spawn_blocking` wrappers; never
/// directly from async code.
pub struct SqliteStore {
    conn: Arc<Mutex<Option<Connection>>>,
    table_name: String,
    collection: String,
}

impl SqliteStore {
    /// Opens (or creates) the durable file at `path` and ensures the
    /// collection table exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the connection cannot be established
    /// or the table cannot be created.
    pub fn open(path: impl AsRef<Path>, table_name: &str, collection: &str) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::storage(collection, e))?;
        let store = Self {
            conn: Arc::new(Mutex::new(Some(conn))),
            table_name: table_name.to_string(),
            collection: collection.to_string(),
        };
        store.create()?;
        info!(collection = %store.collection, table = %store.table_name, "connection to backing store established");
        Ok(store)
    }

    /// Idempotent creation of the collection table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the statement fails, or
    /// [`Error::NotOpen`] if the connection was already closed.
    pub fn create(&self) -> Result<()> {
        self.with_conn(|conn, table_name, collection| {
            conn.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {table_name} (key BLOB PRIMARY KEY, value BLOB NOT NULL)"
                ),
                [],
            )
            .map_err(|e| {
                error!(collection, "create table failed: {e}");
                Error::storage(collection, e)
            })?;
            Ok(())
        })
    }

    /// Upserts a single (key, value) pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a failed statement.
    pub fn write_one(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.with_conn(|conn, table_name, collection| {
            conn.execute(
                &format!("INSERT OR REPLACE INTO {table_name} (key, value) VALUES (?1, ?2)"),
                rusqlite::params![key, value],
            )
            .map_err(|e| {
                error!(collection, "write failed: {e}");
                Error::storage(collection, e)
            })?;
            debug!(collection, "write successful, count=1");
            Ok(())
        })
    }

    /// Upserts a batch of (key, value) pairs atomically, in one unit of
    /// work.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the transaction fails.
    pub fn write_many(&self, entries: &HashMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        self.with_conn_mut(|conn, table_name, collection| {
            let tx = conn.transaction().map_err(|e| Error::storage(collection, e))?;
            {
                let mut stmt = tx
                    .prepare_cached(&format!(
                        "INSERT OR REPLACE INTO {table_name} (key, value) VALUES (?1, ?2)"
                    ))
                    .map_err(|e| Error::storage(collection, e))?;
                for (key, value) in entries {
                    stmt.execute(rusqlite::params![key, value])
                        .map_err(|e| {
                            error!(collection, "batch write failed: {e}");
                            Error::storage(collection, e)
                        })?;
                }
            }
            tx.commit().map_err(|e| Error::storage(collection, e))?;
            debug!(collection, count = entries.len(), "batch write successful");
            Ok(())
        })
    }

    /// Point lookup for a single key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a failed statement. A missing key is
    /// not an error; it returns `Ok(None)`.
    pub fn read_one(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.with_conn(|conn, table_name, collection| {
            conn.query_row(
                &format!("SELECT value FROM {table_name} WHERE key = ?1"),
                [key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| {
                error!(collection, "read failed: {e}");
                Error::storage(collection, e)
            })
        })
    }

    /// Multi-key lookup. Returns only the subset of matching records; a
    /// zero-match result is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a failed statement.
    pub fn read_many(&self, keys: &[Vec<u8>]) -> Result<HashMap<Vec<u8>, Vec<u8>>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        self.with_conn(|conn, table_name, collection| {
            let placeholders = std::iter::repeat("?").take(keys.len()).collect::<Vec<_>>().join(", ");
            let sql = format!("SELECT key, value FROM {table_name} WHERE key IN ({placeholders})");
            let mut stmt = conn.prepare(&sql).map_err(|e| Error::storage(collection, e))?;
            let rows = stmt
                .query_map(params_from_iter(keys.iter()), |row| {
                    Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Vec<u8>>(1)?))
                })
                .map_err(|e| Error::storage(collection, e))?;

            let mut results = HashMap::new();
            for row in rows {
                let (key, value) = row.map_err(|e| {
                    error!(collection, "multi-read failed: {e}");
                    Error::storage(collection, e)
                })?;
                results.insert(key, value);
            }
            Ok(results)
        })
    }

    /// Returns the full set of persisted keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a failed statement.
    pub fn keys(&self) -> Result<Vec<Vec<u8>>> {
        self.with_conn(|conn, table_name, collection| {
            let mut stmt = conn
                .prepare(&format!("SELECT key FROM {table_name}"))
                .map_err(|e| Error::storage(collection, e))?;
            let rows = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))
                .map_err(|e| Error::storage(collection, e))?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row.map_err(|e| Error::storage(collection, e))?);
            }
            Ok(out)
        })
    }

    /// Removes a single key. No error if the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] on a failed statement.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.with_conn(|conn, table_name, collection| {
            conn.execute(
                &format!("DELETE FROM {table_name} WHERE key = ?1"),
                [key],
            )
            .map_err(|e| {
                error!(collection, "delete failed: {e}");
                Error::storage(collection, e)
            })?;
            debug!(collection, "delete successful");
            Ok(())
        })
    }

    /// Flushes pending work and releases the connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the underlying engine refuses to
    /// close cleanly.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.conn.lock();
        if let Some(conn) = guard.take() {
            conn.close().map_err(|(_, e)| Error::storage(self.collection.clone(), e))?;
            info!(collection = %self.collection, "connection closed");
        }
        Ok(())
    }

    fn with_conn<R>(&self, f: impl FnOnce(&Connection, &str, &str) -> Result<R>) -> Result<R> {
        let guard = self.conn.lock();
        let conn = guard
            .as_ref()
            .ok_or_else(|| Error::NotOpen(self.collection.clone()))?;
        f(conn, &self.table_name, &self.collection)
    }

    fn with_conn_mut<R>(&self, f: impl FnOnce(&mut Connection, &str, &str) -> Result<R>) -> Result<R> {
        let mut guard = self.conn.lock();
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::NotOpen(self.collection.clone()))?;
        f(conn, &self.table_name, &self.collection)
    }
}
