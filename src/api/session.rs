//! Process-wide session token and its persistent key-value store.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

use crate::error::{ApiError, Result};

/// Key under which the bearer token is persisted.
const TOKEN_KEY: &str = "auth_token";

/// Small persistent key-value store. Survives restarts, cleared explicitly.
pub trait KeyValueStore: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<String>>;

  fn set(&self, key: &str, value: &str) -> Result<()>;

  fn remove(&self, key: &str) -> Result<()>;
}

/// Store that keeps values in memory only.
#[derive(Default)]
pub struct MemoryStore {
  values: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let values = self.values.lock().map_err(poisoned)?;
    Ok(values.get(key).cloned())
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let mut values = self.values.lock().map_err(poisoned)?;
    values.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let mut values = self.values.lock().map_err(poisoned)?;
    values.remove(key);
    Ok(())
  }
}

fn poisoned<E: std::fmt::Display>(e: E) -> ApiError {
  ApiError::storage(format!("lock poisoned: {}", e))
}

/// SQLite-backed key-value store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| ApiError::storage(format!("Failed to create session directory: {}", e)))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| ApiError::storage(format!("Failed to open session store at {}: {}", path.display(), e)))?;
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| ApiError::storage(format!("Failed to run session store migrations: {}", e)))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| ApiError::storage("Could not determine data directory"))?;

    Ok(data_dir.join("bizdesk").join("session.db"))
  }
}

impl KeyValueStore for SqliteStore {
  fn get(&self, key: &str) -> Result<Option<String>> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| ApiError::storage(format!("Failed to read {}: {}", key, e)))
  }

  fn set(&self, key: &str, value: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| ApiError::storage(format!("Failed to store {}: {}", key, e)))?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<()> {
    let conn = self.conn.lock().map_err(poisoned)?;
    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| ApiError::storage(format!("Failed to remove {}: {}", key, e)))?;
    Ok(())
  }
}

/// Authentication state shared by every clone.
///
/// Set at login, cleared at logout. The API client reads the token on
/// every request, so a login takes effect without rebuilding the client.
#[derive(Clone)]
pub struct Session {
  token: Arc<RwLock<Option<String>>>,
  store: Arc<dyn KeyValueStore>,
}

impl Session {
  /// Session that forgets its token when the process exits.
  pub fn in_memory() -> Self {
    Self {
      token: Arc::new(RwLock::new(None)),
      store: Arc::new(MemoryStore::default()),
    }
  }

  /// Session backed by `store`, restoring any token saved there.
  pub fn restore(store: impl KeyValueStore + 'static) -> Result<Self> {
    let token = store.get(TOKEN_KEY)?;
    if token.is_some() {
      debug!("restored session token from store");
    }
    Ok(Self {
      token: Arc::new(RwLock::new(token)),
      store: Arc::new(store),
    })
  }

  pub fn token(&self) -> Option<String> {
    self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn is_authenticated(&self) -> bool {
    self.token().is_some()
  }

  /// Store the token in memory and in the persistent store.
  pub fn login(&self, token: impl Into<String>) -> Result<()> {
    let token = token.into();
    self.store.set(TOKEN_KEY, &token)?;
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    info!("session started");
    Ok(())
  }

  /// Replace the in-memory token without persisting it (env overrides).
  pub fn set_transient(&self, token: impl Into<String>) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.into());
  }

  pub fn logout(&self) -> Result<()> {
    self.store.remove(TOKEN_KEY)?;
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    info!("session ended");
    Ok(())
  }
}

impl std::fmt::Debug for Session {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Session")
      .field("authenticated", &self.is_authenticated())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_login_logout_in_memory() {
    let session = Session::in_memory();
    assert!(!session.is_authenticated());

    session.login("abc").unwrap();
    assert_eq!(session.token().as_deref(), Some("abc"));

    session.logout().unwrap();
    assert_eq!(session.token(), None);
  }

  #[test]
  fn test_clones_share_token() {
    let session = Session::in_memory();
    let other = session.clone();
    session.login("shared").unwrap();
    assert_eq!(other.token().as_deref(), Some("shared"));
  }

  #[test]
  fn test_sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.db");

    let session = Session::restore(SqliteStore::open_at(&path).unwrap()).unwrap();
    session.login("persisted").unwrap();
    drop(session);

    let session = Session::restore(SqliteStore::open_at(&path).unwrap()).unwrap();
    assert_eq!(session.token().as_deref(), Some("persisted"));

    session.logout().unwrap();
    let session = Session::restore(SqliteStore::open_at(&path).unwrap()).unwrap();
    assert_eq!(session.token(), None);
  }

  #[test]
  fn test_store_failure_is_storage_error() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "x").unwrap();

    let err = SqliteStore::open_at(&blocker.join("session.db")).err().unwrap();
    assert!(matches!(err, ApiError::Storage { .. }), "got: {:?}", err);
    assert!(err.message().starts_with("Failed to create session directory"));
  }
}
