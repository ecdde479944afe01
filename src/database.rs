use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info};

use crate::storage::{Collection, Storage, StorageError};

/// SQLite-backed [`Storage`]: one row per collection.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Create a new database connection and initialize the schema
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db_path = path.as_ref();

        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StorageError::DirectoryError(format!("{}: {}", parent.display(), e)))?;
            }
        }

        info!("Opening database at {}", db_path.display());
        let conn = Connection::open(db_path)?;

        let db = Database { conn };
        db.initialize_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let db = Database {
            conn: Connection::open_in_memory()?,
        };
        db.initialize_schema()?;
        Ok(db)
    }

    fn initialize_schema(&self) -> Result<(), StorageError> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS collections (
                key             TEXT PRIMARY KEY,
                value           TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// Get a reference to the underlying connection
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn timestamp() -> String {
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

const UPSERT_COLLECTION: &str = "INSERT INTO collections (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at";

impl Storage for Database {
    fn load(&self, collection: Collection) -> Result<Option<String>, StorageError> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM collections WHERE key = ?1",
                rusqlite::params![collection.key()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn save(&mut self, collection: Collection, json: &str) -> Result<(), StorageError> {
        self.conn.execute(
            UPSERT_COLLECTION,
            rusqlite::params![collection.key(), json, Self::timestamp()],
        )?;
        debug!("Saved {} ({} bytes)", collection.key(), json.len());
        Ok(())
    }

    fn save_batch(&mut self, batch: &[(Collection, String)]) -> Result<(), StorageError> {
        let updated_at = Self::timestamp();
        let tx = self.conn.transaction()?;
        for (collection, json) in batch {
            tx.execute(
                UPSERT_COLLECTION,
                rusqlite::params![collection.key(), json, updated_at],
            )?;
        }
        tx.commit()?;
        debug!("Saved {} collection(s) in one transaction", batch.len());
        Ok(())
    }
}
