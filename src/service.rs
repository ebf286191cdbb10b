use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::anyhow;
use serde::Serialize;

use crate::{
    domain::stats::{LikeOutcome, StatsCounts, TrackUpdate},
    feed::{self, ProjectedTrack},
    realtime::Broadcaster,
    storage::{
        catalog::TrackCatalog,
        error::{StatsError, StorageError},
        operations::{LoadReport, StatsStore},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInsights {
    pub user_id: String,
    pub tracks: TrackTotals,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TrackTotals {
    pub count: usize,
    pub plays: u64,
    pub likes: u64,
    pub saves: u64,
}

/// Everything the HTTP layer and the CLI need from track stats.
///
/// The store sits behind one lock: each like/play runs
/// mutate → persist → publish without interleaving with other requests,
/// so updates reach subscribers in the order the counters changed.
pub struct StatsService {
    store: Mutex<StatsStore>,
    catalog: Box<dyn TrackCatalog>,
    broadcaster: Arc<Broadcaster>,
    recent_limit: usize,
}

impl StatsService {
    pub fn new(store: StatsStore, catalog: Box<dyn TrackCatalog>, recent_limit: usize) -> Self {
        Self {
            store: Mutex::new(store),
            catalog,
            broadcaster: Arc::new(Broadcaster::new()),
            recent_limit,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    fn store(&self) -> Result<MutexGuard<'_, StatsStore>, StatsError> {
        self.store.lock().map_err(|e| {
            StatsError::Storage(StorageError::Internal(anyhow!(
                "Could not access stats store under lock: {e}"
            )))
        })
    }

    fn publish(&self, track_id: &str, counts: StatsCounts) {
        self.broadcaster.publish(&TrackUpdate {
            track_id: track_id.to_string(),
            counts,
        });
    }

    /// Likes a track once per user. Repeated likes change nothing and
    /// publish nothing.
    pub fn like(&self, track_id: &str, user_id: &str) -> Result<LikeOutcome, StatsError> {
        let mut store = self.store()?;
        let outcome = store.like(track_id, user_id)?;
        if !outcome.already_liked {
            log::info!("Track {track_id} liked by {user_id}, likes: {}", outcome.counts.likes);
            self.publish(track_id, outcome.counts);
        }
        Ok(outcome)
    }

    pub fn report_play(&self, track_id: &str) -> Result<StatsCounts, StatsError> {
        let mut store = self.store()?;
        let counts = store.report_play(track_id)?;
        log::info!("Track {track_id} played, plays: {}", counts.plays);
        self.publish(track_id, counts);
        Ok(counts)
    }

    /// Current counters of one track, without registering it
    pub fn lookup(&self, track_id: &str) -> Result<StatsCounts, StatsError> {
        if track_id.trim().is_empty() {
            return Err(StatsError::MissingTrackId);
        }
        Ok(self.store()?.counts(track_id))
    }

    pub fn feed(&self, limit: usize) -> Result<Vec<ProjectedTrack>, StatsError> {
        let tracks = self.catalog.list()?;
        let mut store = self.store()?;
        Ok(feed::feed(tracks, limit, |id| stats_of(&mut store, id)))
    }

    pub fn recent(&self, limit: Option<usize>) -> Result<Vec<ProjectedTrack>, StatsError> {
        let tracks = self.catalog.list()?;
        let mut store = self.store()?;
        Ok(feed::recent(
            tracks,
            limit.unwrap_or(self.recent_limit),
            |id| stats_of(&mut store, id),
        ))
    }

    pub fn trending(&self) -> Result<Vec<ProjectedTrack>, StatsError> {
        let tracks = self.catalog.list()?;
        let mut store = self.store()?;
        Ok(feed::trending(tracks, |id| stats_of(&mut store, id)))
    }

    /// Totals over all tracks uploaded by `user_id`
    pub fn insights(&self, user_id: &str) -> Result<UserInsights, StatsError> {
        if user_id.trim().is_empty() {
            return Err(StatsError::MissingUserId);
        }

        let tracks = self.catalog.list()?;
        let mut store = self.store()?;

        let totals = tracks
            .iter()
            .filter(|t| t.is_owned_by(user_id))
            .map(|t| stats_of(&mut store, &t.id))
            .fold(TrackTotals::default(), |acc, c| TrackTotals {
                count: acc.count + 1,
                plays: acc.plays.saturating_add(c.plays),
                likes: acc.likes.saturating_add(c.likes),
                saves: acc.saves.saturating_add(c.saves),
            });

        Ok(UserInsights {
            user_id: user_id.to_string(),
            tracks: totals,
        })
    }

    /// Writes the whole store back in canonical form.
    ///
    /// Returns what the startup load had to repair.
    pub fn repair(&self) -> Result<LoadReport, StatsError> {
        let mut store = self.store()?;
        let report = store.last_load();
        store.persist()?;
        Ok(report)
    }

    /// Final persist of anything still pending
    pub fn shutdown(&self) -> Result<(), StatsError> {
        self.store()?.close()?;
        Ok(())
    }
}

/// Catalog ids are never empty, so the record always exists afterwards
fn stats_of(store: &mut StatsStore, track_id: &str) -> StatsCounts {
    store
        .get_or_create(track_id)
        .map(|stats| stats.counts())
        .unwrap_or_default()
}
