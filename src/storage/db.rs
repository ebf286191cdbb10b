//! SQLite backed stats storage

use std::{collections::BTreeMap, path::Path};

use rusqlite::{Connection, params};
use serde_json::{Value, json};

use crate::{
    domain::stats::TrackStats,
    storage::{
        RawRecords, StatsBackend,
        error::StorageError,
        schema::{self, columns::*, tables::*},
    },
};

#[cfg(test)]
pub(crate) fn open_in_memory() -> Result<Connection, StorageError> {
    let db = Connection::open_in_memory()?;
    schema::init(&db)?;
    Ok(db)
}

pub fn open(path: &Path) -> Result<Connection, StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let db = Connection::open(path)?;
    schema::init(&db)?;
    Ok(db)
}

pub struct SqliteBackend {
    pub(crate) db: Connection,
    label: String,
}

impl SqliteBackend {
    pub fn new(db: Connection) -> Self {
        let label = db
            .path()
            .filter(|p| !p.is_empty())
            .map(|p| format!("sqlite database {p}"))
            .unwrap_or_else(|| "in-memory sqlite database".to_string());
        Self { db, label }
    }
}

impl StatsBackend for SqliteBackend {
    /// Rows are turned back into the JSON record shape so that they go
    /// through the same normalization as file documents.
    fn load(&mut self) -> Result<RawRecords, StorageError> {
        let tx = self.db.transaction()?;

        let mut records = RawRecords::new();
        {
            let mut stmt = tx.prepare(&format!(
                "SELECT {TRACK_ID}, {PLAYS}, {LIKES}, {SAVES} FROM {TRACK_STATS}"
            ))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;

            for (track_id, plays, likes, saves) in rows {
                records.insert(
                    track_id,
                    json!({ "plays": plays, "likes": likes, "saves": saves, "likedBy": {} }),
                );
            }

            let mut stmt = tx.prepare(&format!("SELECT {TRACK_ID}, {USER_ID} FROM {TRACK_LIKES}"))?;
            let likes = stmt
                .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;

            for (track_id, user_id) in likes {
                let record = records.entry(track_id).or_insert_with(|| {
                    log::warn!("Table {TRACK_LIKES} references a track missing from {TRACK_STATS}");
                    json!({ "likedBy": {} })
                });
                if let Some(liked_by) = record.get_mut("likedBy").and_then(Value::as_object_mut) {
                    liked_by.insert(user_id, Value::Bool(true));
                }
            }
        }

        tx.commit()?;
        Ok(records)
    }

    fn save(&mut self, records: &BTreeMap<String, TrackStats>) -> Result<(), StorageError> {
        let tx = self.db.transaction()?;

        for table in ALL_TABLES {
            tx.execute(&format!("DELETE FROM {table}"), [])?;
        }

        {
            let mut insert_stats = tx.prepare(&format!(
                "INSERT INTO {TRACK_STATS} ({TRACK_ID}, {PLAYS}, {LIKES}, {SAVES}) VALUES (?1, ?2, ?3, ?4)"
            ))?;
            let mut insert_like = tx.prepare(&format!(
                "INSERT INTO {TRACK_LIKES} ({TRACK_ID}, {USER_ID}) VALUES (?1, ?2)"
            ))?;

            for (track_id, stats) in records {
                insert_stats.execute(params![
                    track_id,
                    to_sql_int(stats.plays),
                    to_sql_int(stats.likes()),
                    to_sql_int(stats.saves)
                ])?;
                for user_id in stats.liked_by() {
                    insert_like.execute(params![track_id, user_id])?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

fn to_sql_int(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::storage::normalize::normalize_record;

    #[test]
    fn open_in_memory_db_initializes_schema() -> anyhow::Result<()> {
        let db = open_in_memory()?;

        let mut stmt = db.prepare("SELECT name FROM sqlite_master WHERE type='table'")?;
        let tables = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for table in ALL_TABLES {
            assert!(tables.contains(&table.to_string()), "missing table {table}");
        }
        Ok(())
    }

    #[test]
    fn save_and_load_round_trip_through_normalizer() -> anyhow::Result<()> {
        let mut backend = SqliteBackend::new(open_in_memory()?);

        let mut records = BTreeMap::new();
        records.insert(
            "t1".to_string(),
            TrackStats::new(5, 1, ["u1".to_string(), "u2".to_string()]),
        );
        records.insert("t2".to_string(), TrackStats::new(0, 0, Vec::<String>::new()));
        backend.save(&records)?;

        let loaded = backend.load()?;
        assert_eq!(loaded.len(), 2);

        let t1 = normalize_record(&loaded["t1"]);
        assert!(!t1.repaired);
        assert_eq!(t1.stats, records["t1"]);

        let t2 = normalize_record(&loaded["t2"]);
        assert!(!t2.repaired);
        assert_eq!(t2.stats.likes(), 0);
        Ok(())
    }

    #[test]
    fn save_replaces_previous_rows() -> anyhow::Result<()> {
        let mut backend = SqliteBackend::new(open_in_memory()?);

        let mut records = BTreeMap::new();
        records.insert("t1".to_string(), TrackStats::new(1, 0, ["u1".to_string()]));
        backend.save(&records)?;

        records.insert("t1".to_string(), TrackStats::new(2, 0, ["u1".to_string()]));
        backend.save(&records)?;

        let likes: i64 =
            backend
                .db
                .query_row(&format!("SELECT COUNT(*) FROM {TRACK_LIKES}"), [], |row| row.get(0))?;
        assert_eq!(likes, 1);

        let loaded = backend.load()?;
        assert_eq!(normalize_record(&loaded["t1"]).stats.plays, 2);
        Ok(())
    }

    #[test]
    fn drifted_like_column_is_reported_for_repair() -> anyhow::Result<()> {
        let mut backend = SqliteBackend::new(open_in_memory()?);
        backend.db.execute(
            &format!("INSERT INTO {TRACK_STATS} ({TRACK_ID}, {PLAYS}, {LIKES}, {SAVES}) VALUES ('t1', 0, 9, 0)"),
            [],
        )?;
        backend.db.execute(
            &format!("INSERT INTO {TRACK_LIKES} ({TRACK_ID}, {USER_ID}) VALUES ('t1', 'u1')"),
            [],
        )?;

        let loaded = backend.load()?;
        let normalized = normalize_record(&loaded["t1"]);

        assert!(normalized.repaired);
        assert_eq!(normalized.stats.likes(), 1);
        Ok(())
    }

    #[test]
    fn open_file_database_creates_parent_dirs() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("stats.db");

        let backend = SqliteBackend::new(open(&path)?);

        assert!(path.exists());
        assert!(backend.describe().contains("stats.db"));
        Ok(())
    }
}
