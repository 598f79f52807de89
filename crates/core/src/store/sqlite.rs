//! SQLite-backed key/value + set storage.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::backend::{KvBackend, StoreError};

/// SQLite implementation of [`KvBackend`].
///
/// Hash fields and set members live in two tables keyed like their Redis
/// counterparts, so the same key layout works on either backend.
pub struct SqliteBackend {
    conn: Mutex<Option<Connection>>,
}

impl SqliteBackend {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS kv_hash (
                key TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (key, field)
            );

            CREATE TABLE IF NOT EXISTS kv_set (
                key TEXT NOT NULL,
                member TEXT NOT NULL,
                PRIMARY KEY (key, member)
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> Result<T, StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn).map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl KvBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.with_conn(|conn| conn.query_row("SELECT 1", [], |_| Ok(())))
    }

    async fn hash_get(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT value FROM kv_hash WHERE key = ? AND field = ?",
                params![key, field],
                |row| row.get(0),
            )
            .optional()
        })
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT field, value FROM kv_hash WHERE key = ?")?;
            let rows = stmt.query_map(params![key], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect()
        })
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, String)]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO kv_hash (key, field, value) VALUES (?, ?, ?)
                     ON CONFLICT(key, field) DO UPDATE SET value = excluded.value",
                )?;
                for (field, value) in fields {
                    stmt.execute(params![key, field, value])?;
                }
            }
            tx.commit()
        })
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("DELETE FROM kv_hash WHERE key = ? AND field = ?")?;
                for field in fields {
                    stmt.execute(params![key, field])?;
                }
            }
            tx.commit()
        })
    }

    async fn set_add(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        if members.is_empty() {
            return Ok(());
        }
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT OR IGNORE INTO kv_set (key, member) VALUES (?, ?)")?;
                for member in members {
                    stmt.execute(params![key, member])?;
                }
            }
            tx.commit()
        })
    }

    async fn set_remove(&self, key: &str, members: &[String]) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("DELETE FROM kv_set WHERE key = ? AND member = ?")?;
                for member in members {
                    stmt.execute(params![key, member])?;
                }
            }
            tx.commit()
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached("SELECT member FROM kv_set WHERE key = ?")?;
            let rows = stmt.query_map(params![key], |row| row.get(0))?;
            rows.collect()
        })
    }

    async fn set_contains(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM kv_set WHERE key = ? AND member = ?)",
                params![key, member],
                |row| row.get::<_, bool>(0),
            )
        })
    }

    async fn set_len(&self, key: &str) -> Result<usize, StoreError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT COUNT(*) FROM kv_set WHERE key = ?",
                params![key],
                |row| row.get::<_, i64>(0),
            )
        })
        .map(|count| count as usize)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv_hash WHERE key = ?", params![key])?;
            conn.execute("DELETE FROM kv_set WHERE key = ?", params![key])?;
            Ok(())
        })
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut guard = self
            .conn
            .lock()
            .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
        if let Some(conn) = guard.take() {
            conn.close()
                .map_err(|(_, e)| StoreError::Database(e.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn members(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_hash_roundtrip() {
        let store = SqliteBackend::in_memory().unwrap();
        assert_eq!(store.hash_get("h", "a").await.unwrap(), None);

        store
            .hash_set("h", &[("a", "1".to_string()), ("b", "2".to_string())])
            .await
            .unwrap();
        store.hash_set("h", &[("a", "3".to_string())]).await.unwrap();

        assert_eq!(store.hash_get("h", "a").await.unwrap().as_deref(), Some("3"));
        let all = store.hash_get_all("h").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all["b"], "2");

        store.hash_delete("h", &["b"]).await.unwrap();
        assert_eq!(store.hash_get("h", "b").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_semantics() {
        let store = SqliteBackend::in_memory().unwrap();
        store.set_add("s", &members(&["1", "2", "2"])).await.unwrap();
        store.set_add("s", &members(&["3"])).await.unwrap();
        store.set_add("s", &[]).await.unwrap();

        let mut all = store.set_members("s").await.unwrap();
        all.sort();
        assert_eq!(all, members(&["1", "2", "3"]));
        assert_eq!(store.set_len("s").await.unwrap(), 3);

        store.set_remove("s", &members(&["2", "missing"])).await.unwrap();
        assert_eq!(store.set_len("s").await.unwrap(), 2);
        assert!(store.set_contains("s", "3").await.unwrap());
        assert!(!store.set_contains("s", "2").await.unwrap());
        assert!(!store.set_contains("other", "1").await.unwrap());
        assert!(store.set_members("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_clears_both_kinds() {
        let store = SqliteBackend::in_memory().unwrap();
        store.set_add("k", &members(&["x"])).await.unwrap();
        store.hash_set("k", &[("f", "v".to_string())]).await.unwrap();

        store.delete("k").await.unwrap();
        assert_eq!(store.set_len("k").await.unwrap(), 0);
        assert!(store.hash_get_all("k").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kv.db");

        {
            let store = SqliteBackend::new(&path).unwrap();
            store.set_add("s", &members(&["a"])).await.unwrap();
            store.close().await.unwrap();
        }

        let store = SqliteBackend::new(&path).unwrap();
        assert_eq!(store.set_members("s").await.unwrap(), members(&["a"]));
    }

    #[tokio::test]
    async fn test_closed_store_rejects_calls() {
        let store = SqliteBackend::in_memory().unwrap();
        store.ping().await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(store.ping().await, Err(StoreError::Closed)));
        // Closing twice is fine
        store.close().await.unwrap();
    }
}
