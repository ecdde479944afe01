use thiserror::Error;

use crate::models::PlantId;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Plant not found: {0}")]
    NotFound(PlantId),
    #[error("Plant {0} has no watering schedule")]
    NoSchedule(PlantId),
    #[error("Invalid watering schedule: {0}")]
    InvalidSchedule(String),
    #[error("Malformed import: {0}")]
    MalformedImport(String),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
