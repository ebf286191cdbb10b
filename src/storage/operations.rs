use std::collections::BTreeMap;

use crate::{
    domain::stats::{LikeOutcome, StatsCounts, TrackStats},
    storage::{
        StatsBackend,
        error::{StatsError, StorageError},
        normalize::normalize_record,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub records: usize,
    pub repaired: usize,
}

/// Main structure that owns every track's counters.
///
/// The in-memory map is authoritative. Every mutation is written through to
/// the backend; a failed write is logged and retried by the next persist.
pub struct StatsStore {
    backend: Box<dyn StatsBackend>,
    records: BTreeMap<String, TrackStats>,
    /// holds changes the backend has not seen yet
    dirty: bool,
    last_load: LoadReport,
}

impl StatsStore {
    /// Creates the store and loads whatever the backend holds
    pub fn open(backend: Box<dyn StatsBackend>) -> Result<Self, StorageError> {
        let mut store = Self {
            backend,
            records: BTreeMap::new(),
            dirty: false,
            last_load: LoadReport {
                records: 0,
                repaired: 0,
            },
        };
        let report = store.load()?;
        log::info!(
            "Loaded stats for {} tracks ({} repaired)",
            report.records,
            report.repaired
        );
        Ok(store)
    }

    /// Replaces the in-memory map with the normalized backend content.
    ///
    /// If any record had to be repaired, the canonical form is written back once.
    pub fn load(&mut self) -> Result<LoadReport, StorageError> {
        let raw = self.backend.load()?;

        let mut repaired = 0;
        let mut records = BTreeMap::new();
        for (track_id, value) in &raw {
            let normalized = normalize_record(value);
            if normalized.repaired {
                log::debug!("Repaired stored stats of track {track_id}");
                repaired += 1;
            }
            records.insert(track_id.clone(), normalized.stats);
        }

        self.records = records;
        self.dirty = false;

        if repaired > 0 {
            self.persist_logged();
        }

        self.last_load = LoadReport {
            records: self.records.len(),
            repaired,
        };
        Ok(self.last_load)
    }

    /// outcome of the most recent load
    pub fn last_load(&self) -> LoadReport {
        self.last_load
    }

    pub fn get(&self, track_id: &str) -> Option<&TrackStats> {
        self.records.get(track_id)
    }

    /// counters of a track, zero for unknown tracks; does not create a record
    pub fn counts(&self, track_id: &str) -> StatsCounts {
        self.get(track_id).map(TrackStats::counts).unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_or_create(&mut self, track_id: &str) -> Result<&mut TrackStats, StatsError> {
        let track_id = required(track_id, StatsError::MissingTrackId)?;

        if !self.records.contains_key(track_id) {
            self.dirty = true;
        }
        Ok(self.records.entry(track_id.to_string()).or_default())
    }

    pub fn persist(&mut self) -> Result<(), StorageError> {
        self.backend.save(&self.records)?;
        self.dirty = false;
        Ok(())
    }

    /// persists, logging instead of failing. Counters stay valid in memory.
    fn persist_logged(&mut self) {
        if let Err(e) = self.persist() {
            log::error!(
                "Failed to persist stats to {}: {e}",
                self.backend.describe()
            );
            self.dirty = true;
        }
    }

    /// Records a like, at most once per user and track
    pub fn like(&mut self, track_id: &str, user_id: &str) -> Result<LikeOutcome, StatsError> {
        required(track_id, StatsError::MissingTrackId)?;
        let user_id = required(user_id, StatsError::MissingUserId)?;

        let stats = self.get_or_create(track_id)?;
        let added = stats.add_like(user_id);
        let counts = stats.counts();

        if added {
            self.persist_logged();
        }

        Ok(LikeOutcome {
            counts,
            already_liked: !added,
        })
    }

    /// Counts one more play. Every call counts; the client decides when a
    /// listen is long enough to be reported.
    pub fn report_play(&mut self, track_id: &str) -> Result<StatsCounts, StatsError> {
        let stats = self.get_or_create(track_id)?;
        stats.record_play();
        let counts = stats.counts();

        self.persist_logged();
        Ok(counts)
    }

    /// Final persist, if anything is still pending
    pub fn close(&mut self) -> Result<(), StorageError> {
        if self.dirty {
            self.persist()?;
        }
        Ok(())
    }
}

impl Drop for StatsStore {
    fn drop(&mut self) {
        if self.dirty {
            self.persist_logged();
        }
    }
}

fn required(id: &str, missing: StatsError) -> Result<&str, StatsError> {
    if id.trim().is_empty() {
        Err(missing)
    } else {
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::*;
    use crate::storage::memory::MemoryBackend;

    fn open_store() -> anyhow::Result<(StatsStore, MemoryBackend)> {
        let backend = MemoryBackend::default();
        let store = StatsStore::open(Box::new(backend.clone()))?;
        Ok((store, backend))
    }

    fn records(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_like_twice_is_idempotent() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;

        let first = store.like("t1", "u1")?;
        let second = store.like("t1", "u1")?;

        assert!(!first.already_liked);
        assert!(second.already_liked);
        assert_eq!(first.counts.likes, 1);
        assert_eq!(second.counts, first.counts);
        assert_eq!(backend.writes(), 1);
        Ok(())
    }

    #[test]
    fn test_likes_count_distinct_users() -> anyhow::Result<()> {
        let (mut store, _) = open_store()?;

        for user in ["a", "b", "a", "c", "b", "a"] {
            store.like("t1", user)?;
        }

        assert_eq!(store.counts("t1").likes, 3);
        Ok(())
    }

    #[test]
    fn test_plays_increment_once_per_report() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;

        for i in 0..10 {
            store.report_play("t1")?;
            if i % 3 == 0 {
                store.like("t1", &format!("u{i}"))?;
            }
        }

        let counts = store.counts("t1");
        assert_eq!(counts.plays, 10);
        assert_eq!(counts.likes, 4);
        assert_eq!(backend.writes(), 14);
        Ok(())
    }

    #[test]
    fn test_missing_ids_rejected_without_write() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;

        assert!(matches!(
            store.like("", "u1"),
            Err(StatsError::MissingTrackId)
        ));
        assert!(matches!(
            store.like("t1", "  "),
            Err(StatsError::MissingUserId)
        ));
        assert!(matches!(
            store.report_play(""),
            Err(StatsError::MissingTrackId)
        ));

        assert!(store.is_empty());
        assert_eq!(backend.writes(), 0);
        Ok(())
    }

    #[test]
    fn test_load_self_heals_and_persists_once() -> anyhow::Result<()> {
        let backend = MemoryBackend::with_records(records(json!({
            "t1": { "likes": "bad", "likedBy": { "u1": true, "u2": true } },
            "t2": { "plays": 3, "likes": 0, "saves": 1, "likedBy": {} }
        })));

        let store = StatsStore::open(Box::new(backend.clone()))?;

        assert_eq!(store.last_load().repaired, 1);
        assert_eq!(store.counts("t1").likes, 2);
        assert_eq!(store.counts("t2").plays, 3);
        assert_eq!(backend.writes(), 1);
        assert_eq!(backend.document()["t1"]["likes"], json!(2));
        assert_eq!(backend.document()["t1"]["plays"], json!(0));
        Ok(())
    }

    #[test]
    fn test_load_without_repairs_does_not_write() -> anyhow::Result<()> {
        let backend = MemoryBackend::with_records(records(json!({
            "t1": { "plays": 1, "likes": 1, "saves": 0, "likedBy": { "u1": true } }
        })));

        let mut store = StatsStore::open(Box::new(backend.clone()))?;

        assert_eq!(backend.writes(), 0);
        let report = store.load()?;
        assert_eq!(
            report,
            LoadReport {
                records: 1,
                repaired: 0
            }
        );
        Ok(())
    }

    #[test]
    fn test_failed_persist_keeps_memory_state() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;
        backend.set_failing(true);

        let counts = store.report_play("t1")?;
        assert_eq!(counts.plays, 1);
        assert_eq!(store.counts("t1").plays, 1);
        assert!(backend.document().is_empty());

        backend.set_failing(false);
        store.close()?;
        assert_eq!(backend.document()["t1"]["plays"], json!(1));
        Ok(())
    }

    #[test]
    fn test_get_or_create_is_flushed_on_close() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;

        assert_eq!(store.get_or_create("fresh")?.counts(), StatsCounts::default());
        assert!(matches!(
            store.get_or_create(""),
            Err(StatsError::MissingTrackId)
        ));
        assert_eq!(backend.writes(), 0);

        store.close()?;
        assert_eq!(backend.writes(), 1);
        assert!(backend.document().contains_key("fresh"));

        store.close()?;
        assert_eq!(backend.writes(), 1);
        Ok(())
    }

    #[test]
    fn test_drop_flushes_pending_records() -> anyhow::Result<()> {
        let (mut store, backend) = open_store()?;
        store.get_or_create("t9")?;

        drop(store);

        assert!(backend.document().contains_key("t9"));
        Ok(())
    }

    #[test]
    fn test_counts_do_not_create_records() -> anyhow::Result<()> {
        let (store, _) = open_store()?;

        assert_eq!(store.counts("ghost"), StatsCounts::default());
        assert!(store.get("ghost").is_none());
        Ok(())
    }
}
