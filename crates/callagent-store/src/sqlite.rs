//! SQLite-backed key-value table. Survives restarts and keeps all three
//! records in a single file.

use std::path::Path;
use std::sync::Mutex;

use callagent_core::{CallAgentError, Result};
use rusqlite::{Connection, OptionalExtension, params};

use crate::backend::KvBackend;

/// SQLite key-value backend.
pub struct SqliteBackend {
    conn: Mutex<Connection>,
}

fn db_err(e: rusqlite::Error) -> CallAgentError {
    CallAgentError::Storage(format!("sqlite: {e}"))
}

impl SqliteBackend {
    /// Open or create the database at `path` (`:memory:` works too).
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Run migrations to create tables.
    fn migrate(&self) -> Result<()> {
        self.conn()?
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,       -- JSON blob
                updated_at TEXT NOT NULL
            );
         ",
            )
            .map_err(db_err)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CallAgentError::Storage("sqlite connection lock poisoned".into()))
    }
}

impl KvBackend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn()?
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()
            .map_err(db_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(db_err)?;
        Ok(())
    }
}
