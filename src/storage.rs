//! Persistence seam: three collections, each stored as one opaque JSON document.

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Plants,
    History,
    Reminders,
}

impl Collection {
    pub const ALL: [Collection; 3] = [Collection::Plants, Collection::History, Collection::Reminders];

    /// Key the collection is stored under.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Plants => "plants",
            Collection::History => "history",
            Collection::Reminders => "reminders",
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    SqliteError(#[from] rusqlite::Error),
    #[error("Failed to create database directory: {0}")]
    DirectoryError(String),
}

/// Durable key-value store for the engine's collections.
pub trait Storage {
    /// The stored JSON for `collection`, or `None` if it was never written.
    fn load(&self, collection: Collection) -> Result<Option<String>, StorageError>;

    fn save(&mut self, collection: Collection, json: &str) -> Result<(), StorageError>;

    /// Write several collections as one unit. Adapters that can do this
    /// atomically should override it.
    fn save_batch(&mut self, batch: &[(Collection, String)]) -> Result<(), StorageError> {
        for (collection, json) in batch {
            self.save(*collection, json)?;
        }
        Ok(())
    }

    fn load_plants(&self) -> Result<Option<String>, StorageError> {
        self.load(Collection::Plants)
    }

    fn save_plants(&mut self, json: &str) -> Result<(), StorageError> {
        self.save(Collection::Plants, json)
    }

    fn load_history(&self) -> Result<Option<String>, StorageError> {
        self.load(Collection::History)
    }

    fn save_history(&mut self, json: &str) -> Result<(), StorageError> {
        self.save(Collection::History, json)
    }

    fn load_reminders(&self) -> Result<Option<String>, StorageError> {
        self.load(Collection::Reminders)
    }

    fn save_reminders(&mut self, json: &str) -> Result<(), StorageError> {
        self.save(Collection::Reminders, json)
    }
}

/// Process-local storage, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    collections: HashMap<Collection, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with raw contents.
    pub fn with(mut self, collection: Collection, json: impl Into<String>) -> Self {
        self.collections.insert(collection, json.into());
        self
    }

    pub fn get(&self, collection: Collection) -> Option<&str> {
        self.collections.get(&collection).map(String::as_str)
    }
}

impl Storage for MemoryStorage {
    fn load(&self, collection: Collection) -> Result<Option<String>, StorageError> {
        Ok(self.collections.get(&collection).cloned())
    }

    fn save(&mut self, collection: Collection, json: &str) -> Result<(), StorageError> {
        self.collections.insert(collection, json.to_string());
        Ok(())
    }
}
