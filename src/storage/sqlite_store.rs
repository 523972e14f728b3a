use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Result as SqlResult, params};
use std::path::Path;
use std::time::Duration;

use super::kv::KeyValueStore;

/// How long a writer waits on a locked database file before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed key/value store for state that must survive a restart
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> SqlResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::with_connection(conn)
    }

    /// Store that lives only as long as this value
    pub fn in_memory() -> SqlResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> SqlResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn try_get(&self, key: &str) -> SqlResult<Option<String>> {
        self.conn
            .lock()
            .query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
    }

    fn try_set(&self, key: &str, value: &str) -> SqlResult<()> {
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO kv_entries (key, value, updated_at)
             VALUES (?1, ?2, strftime('%s', 'now'))",
            params![key, value],
        )?;
        Ok(())
    }

    fn try_remove(&self, key: &str) -> SqlResult<()> {
        self.conn
            .lock()
            .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn try_remove_prefix(&self, prefix: &str) -> SqlResult<()> {
        self.conn.lock().execute(
            "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
            params![prefix],
        )?;
        Ok(())
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Option<String> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                log::error!("Failed to read `{key}` from store: {err}");
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.try_set(key, value) {
            log::error!("Failed to write `{key}` to store: {err}");
        }
    }

    fn remove(&self, key: &str) {
        if let Err(err) = self.try_remove(key) {
            log::error!("Failed to remove `{key}` from store: {err}");
        }
    }

    fn remove_prefix(&self, prefix: &str) {
        if let Err(err) = self.try_remove_prefix(prefix) {
            log::error!("Failed to remove `{prefix}*` from store: {err}");
        }
    }
}
