// SPDX-License-Identifier: MPL-2.0

use crate::config::DATA_DIR_NAME;
use crate::remote::{Document, ListenerRegistry, StoreError};
use crate::store::schema::SCHEMA;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// SQLite-backed document store for a specific account
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    pub(crate) listeners: Arc<ListenerRegistry<Document>>,
    /// Held from commit through notification so subscribers see commit order
    dispatch: Arc<Mutex<()>>,
}

impl SqliteStore {
    /// Open or create the store for an account
    /// Path: ~/.local/share/kidquest/{account_id}/documents.db
    pub fn open(account_id: &str) -> Result<Self, StoreError> {
        let path = Self::store_path(account_id)?;

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Path(format!("failed to create data dir: {}", e)))?;
        }

        Self::from_connection(Connection::open(&path)?)
    }

    /// Private in-memory database, gone when the last handle drops
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        Self::migrate(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            listeners: Arc::new(ListenerRegistry::new()),
            dispatch: Arc::new(Mutex::new(())),
        })
    }

    /// Run schema migrations
    fn migrate(conn: &Connection) -> Result<(), StoreError> {
        // Execute the schema (all CREATE IF NOT EXISTS)
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get XDG data directory for the store
    fn store_path(account_id: &str) -> Result<PathBuf, StoreError> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| StoreError::Path("could not find data directory".to_string()))?;

        // Sanitize id for filesystem
        let safe_id: String = account_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();

        Ok(data_dir.join(DATA_DIR_NAME).join(safe_id).join("documents.db"))
    }

    /// Access connection for operations
    pub(crate) fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("store lock poisoned")
    }

    /// Serializes write-then-notify. Taken before the connection lock.
    pub(crate) fn dispatch(&self) -> std::sync::MutexGuard<'_, ()> {
        self.dispatch.lock().expect("store lock poisoned")
    }

    /// Get current unix timestamp
    pub fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .ok()
            .and_then(|d| i64::try_from(d.as_secs()).ok())
            .unwrap_or(0)
    }
}
