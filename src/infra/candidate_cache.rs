use crate::error::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// Small key/value store with expiry for expensive source query results
pub struct CandidateCache {
    conn: Mutex<Connection>,
}

impl CandidateCache {
    pub fn open_at_root<P: AsRef<Path>>(cache_root: P) -> Result<Self> {
        let root = cache_root.as_ref();
        std::fs::create_dir_all(root)?;
        let conn = Connection::open(root.join("cache.db"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key   TEXT PRIMARY KEY,
                value       TEXT NOT NULL,
                expires_at  INTEGER NOT NULL
            );
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Stored value for `key`, unless it has expired
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Utc::now().timestamp();
        let conn = self.conn();
        let value = conn
            .query_row(
                "SELECT value FROM cache_entries WHERE cache_key = ?1 AND expires_at > ?2",
                params![key, now],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp().saturating_add(ttl_secs);
        self.conn().execute(
            "INSERT INTO cache_entries (cache_key, value, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(cache_key) DO UPDATE SET value=excluded.value, expires_at=excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }

    /// Remove every entry, returning how many were removed
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn().execute("DELETE FROM cache_entries", [])?;
        Ok(removed)
    }

    /// Remove expired entries
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now().timestamp();
        let removed = self
            .conn()
            .execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
        Ok(removed)
    }
}
