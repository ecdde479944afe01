pub mod backup;
pub mod cli;
pub mod clock;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod history;
pub mod models;
pub mod poller;
pub mod reminders;
pub mod schedule;
pub mod stats;
pub mod storage;
pub mod utils;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use database::Database;
pub use engine::{EngineOptions, WateringScheduleEngine};
pub use error::EngineError;
pub use models::{HistoryEntry, Plant, PlantId, Reminder, StatusKind, WateringSchedule, WateringStatus};
pub use storage::{MemoryStorage, Storage};
pub use utils::Profile;
