//! Read-only access to the uploaded tracks

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde_json::Value;

use crate::{domain::track::Track, storage::error::StorageError};

/// Source of track metadata. The upload side owns it; stats only read it.
pub trait TrackCatalog: Send + Sync {
    fn list(&self) -> Result<Vec<Track>, StorageError>;
}

impl TrackCatalog for Vec<Track> {
    fn list(&self) -> Result<Vec<Track>, StorageError> {
        Ok(self.clone())
    }
}

/// Catalog kept as a JSON array of upload records (`music.json`)
pub struct JsonCatalog {
    path: PathBuf,
}

impl JsonCatalog {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TrackCatalog for JsonCatalog {
    /// An absent or unreadable catalog lists no tracks
    fn list(&self) -> Result<Vec<Track>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let contents = fs::read_to_string(&self.path)?;
        let records = match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Array(records)) => records,
            Ok(_) => {
                log::warn!(
                    "Catalog {} is not a JSON array, ignoring it",
                    self.path.to_string_lossy()
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                log::warn!(
                    "Catalog {} could not be parsed, ignoring it: {e}",
                    self.path.to_string_lossy()
                );
                return Ok(Vec::new());
            }
        };

        Ok(records
            .iter()
            .filter_map(|raw| {
                let track = Track::from_raw(raw);
                if track.is_none() {
                    log::debug!("Skipping catalog record without id");
                }
                track
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_missing_catalog_is_empty() -> anyhow::Result<()> {
        let dir = tempdir()?;

        let tracks = JsonCatalog::new(dir.path().join("music.json")).list()?;

        assert!(tracks.is_empty());
        Ok(())
    }

    #[test]
    fn test_lists_tracks_in_file_order() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("music.json");
        fs::write(
            &path,
            r#"[
                {"id": "b", "title": "Second", "createdAt": "2025-01-02T00:00:00Z"},
                {"title": "no id"},
                {"id": "a", "title": "First", "createdAt": "2025-01-01T00:00:00Z"}
            ]"#,
        )?;

        let tracks = JsonCatalog::new(&path).list()?;

        let ids = tracks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["b", "a"]);
        Ok(())
    }

    #[test]
    fn test_broken_catalog_is_ignored() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("music.json");

        fs::write(&path, "{ oops")?;
        assert!(JsonCatalog::new(&path).list()?.is_empty());

        fs::write(&path, r#"{"id": "a"}"#)?;
        assert!(JsonCatalog::new(&path).list()?.is_empty());
        Ok(())
    }
}
