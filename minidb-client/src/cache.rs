use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Key-value store for raw portal responses, keyed by the exact request URL.
///
/// There is no TTL or eviction: a cached URL yields the same body for the
/// lifetime of the store, which is exactly the contract the crawler relies on
/// for a self-consistent closure.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl CacheStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let store = CacheStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store, used by tests and cache-less runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = CacheStore {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().expect("cache store lock poisoned");
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS responses (
                url        TEXT PRIMARY KEY,
                body       TEXT NOT NULL,
                fetched_at INTEGER NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    pub fn get(&self, url: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().expect("cache store lock poisoned");
        let mut stmt = conn.prepare("SELECT body FROM responses WHERE url = ?1")?;
        let body = stmt.query_row(params![url], |row| row.get(0)).optional()?;
        Ok(body)
    }

    pub fn set(&self, url: &str, body: &str) -> Result<()> {
        let conn = self.conn.lock().expect("cache store lock poisoned");
        conn.execute(
            "INSERT INTO responses (url, body, fetched_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(url) DO UPDATE SET body = excluded.body, fetched_at = excluded.fetched_at",
            params![url, body, current_timestamp()],
        )?;
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().expect("cache store lock poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM responses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
