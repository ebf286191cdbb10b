use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{config::Database, domain::stats::TrackStats, storage::error::StorageError};

pub mod catalog;
pub mod db;
pub mod error;
pub mod json;
pub mod memory;
pub mod normalize;
pub mod operations;
pub(crate) mod schema;

/// Stored records keyed by track id, exactly as the backend holds them.
///
/// Values are kept loosely typed so that [`normalize::normalize_record`]
/// can repair whatever older writers left behind.
pub type RawRecords = Map<String, Value>;

/// Capability the stats store needs from its backing storage.
///
/// `save` always receives the complete map; backends rewrite everything.
pub trait StatsBackend: Send {
    fn load(&mut self) -> Result<RawRecords, StorageError>;

    fn save(&mut self, records: &BTreeMap<String, TrackStats>) -> Result<(), StorageError>;

    /// Human readable location for logs
    fn describe(&self) -> String;
}

pub fn open_backend(config: &Database) -> Result<Box<dyn StatsBackend>, StorageError> {
    let backend: Box<dyn StatsBackend> = match config {
        Database::InMemory => Box::new(memory::MemoryBackend::default()),
        Database::Json { path } => Box::new(json::JsonFileBackend::new(path)),
        Database::Sqlite { path } => Box::new(db::SqliteBackend::new(db::open(path)?)),
    };
    log::info!("Using stats backend {}", backend.describe());
    Ok(backend)
}
