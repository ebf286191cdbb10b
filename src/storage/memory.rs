use std::{
    collections::BTreeMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use anyhow::anyhow;

use crate::{
    domain::stats::TrackStats,
    storage::{RawRecords, StatsBackend, error::StorageError},
};

/// Keeps the serialized document in memory.
///
/// Clones share the same document, so a test can keep one handle to inspect
/// what the store wrote, count writes, or make writes fail.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    document: Arc<Mutex<RawRecords>>,
    writes: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl MemoryBackend {
    pub fn with_records(records: RawRecords) -> Self {
        Self {
            document: Arc::new(Mutex::new(records)),
            ..Default::default()
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn document(&self) -> RawRecords {
        self.document
            .lock()
            .map(|doc| doc.clone())
            .unwrap_or_default()
    }
}

impl StatsBackend for MemoryBackend {
    fn load(&mut self) -> Result<RawRecords, StorageError> {
        let document = self
            .document
            .lock()
            .map_err(|e| StorageError::Internal(anyhow!("memory backend lock poisoned: {e}")))?;
        Ok(document.clone())
    }

    fn save(&mut self, records: &BTreeMap<String, TrackStats>) -> Result<(), StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Fs(std::io::Error::other(
                "memory backend configured to fail",
            )));
        }

        let serialized = match serde_json::to_value(records)? {
            serde_json::Value::Object(map) => map,
            _ => return Err(StorageError::Malformed("stats did not serialize to an object".into())),
        };

        let mut document = self
            .document
            .lock()
            .map_err(|e| StorageError::Internal(anyhow!("memory backend lock poisoned: {e}")))?;
        *document = serialized;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory document".to_string()
    }
}
