//! Durable key/value storage for session state, backed by SQLite.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// Trait for durable session storage backends.
pub trait SessionStorage: Send + Sync {
  /// Read the value stored under `key`.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Apply every write in one transaction. A `None` value removes the key.
  fn write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()>;
}

/// SQLite-based session storage.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the session database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create session directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open session database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  #[cfg(test)]
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(SESSION_SCHEMA)
      .map_err(|e| eyre!("Failed to run session migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

const SESSION_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS local_storage (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SessionStorage for SqliteStorage {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM local_storage WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn write_batch(&self, entries: &[(&str, Option<&str>)]) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    for (key, value) in entries {
      match value {
        Some(value) => tx
          .execute(
            "INSERT OR REPLACE INTO local_storage (key, value, updated_at)
             VALUES (?, ?, datetime('now'))",
            params![key, value],
          )
          .map_err(|e| eyre!("Failed to write {}: {}", key, e))?,
        None => tx
          .execute("DELETE FROM local_storage WHERE key = ?", params![key])
          .map_err(|e| eyre!("Failed to remove {}: {}", key, e))?,
      };
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}
