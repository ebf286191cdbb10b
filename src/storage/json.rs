//! Stats stored as one pretty printed JSON document on disk

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{
    domain::stats::TrackStats,
    storage::{RawRecords, StatsBackend, error::StorageError},
};

pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl StatsBackend for JsonFileBackend {
    /// A missing or empty file is an empty store.
    /// A document that is not a JSON object is refused.
    fn load(&mut self) -> Result<RawRecords, StorageError> {
        if !self.path.exists() {
            return Ok(RawRecords::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(RawRecords::new());
        }

        match serde_json::from_str::<Value>(&contents)? {
            Value::Object(records) => Ok(records),
            other => Err(StorageError::Malformed(format!(
                "{} holds a JSON {} instead of an object",
                self.path.to_string_lossy(),
                json_kind(&other)
            ))),
        }
    }

    fn save(&mut self, records: &BTreeMap<String, TrackStats>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(records)?;
        fs::write(&self.path, contents)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.to_string_lossy())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
