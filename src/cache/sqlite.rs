use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{AppError, AppResult};

use super::ModelCache;

/// SQLite-backed cache. Opened explicitly at startup and closed at shutdown;
/// after `close` every operation fails with a cache error.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Option<Connection>>,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> AppResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> AppResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                expires_at_ms INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Delete expired rows, returning how many were removed.
    pub fn purge_expired(&self) -> AppResult<usize> {
        self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM cache_entries WHERE expires_at_ms <= ?1",
                params![now_ms()],
            )?)
        })
    }

    pub fn close(&self) -> AppResult<()> {
        let conn = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_, e)| AppError::Cache(e))?;
        }
        Ok(())
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let guard = self
            .conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(AppError::CacheClosed("sqlite cache is closed".to_string())),
        }
    }
}

impl ModelCache for SqliteCache {
    fn get(&self, key: &str) -> AppResult<Option<Vec<u8>>> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT value FROM cache_entries WHERE key = ?1 AND expires_at_ms > ?2",
                    params![key, now_ms()],
                    |row| row.get::<_, Vec<u8>>(0),
                )
                .optional()?)
        })
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> AppResult<()> {
        let expires = now_ms().saturating_add(i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX));
        self.with_conn(|conn| {
            conn.execute(
                r#"
                INSERT INTO cache_entries (key, value, expires_at_ms) VALUES (?1, ?2, ?3)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    expires_at_ms = excluded.expires_at_ms
                "#,
                params![key, value, expires],
            )?;
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> AppResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
