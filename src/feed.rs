//! Read views joining catalog tracks with their stats.
//!
//! Counters always come from the stats store, so feed, trending and recent
//! agree with each other and with the latest like/play response.

use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{stats::StatsCounts, track::Track};

pub const DEFAULT_RECENT_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedTrack {
    #[serde(flatten)]
    pub track: Track,
    #[serde(flatten)]
    pub counts: StatsCounts,
}

/// Attaches stats to every track, keeping the input order
pub fn project<F>(tracks: Vec<Track>, mut stats: F) -> Vec<ProjectedTrack>
where
    F: FnMut(&str) -> StatsCounts,
{
    tracks
        .into_iter()
        .map(|track| {
            let counts = stats(&track.id);
            ProjectedTrack { track, counts }
        })
        .collect()
}

/// Newest first. Tracks without a timestamp count as created at the epoch.
fn sort_newest_first(tracks: &mut [Track]) {
    tracks.sort_by_key(|t| Reverse(t.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH)));
}

/// All tracks, newest first. `limit == 0` means no limit.
pub fn feed<F>(mut tracks: Vec<Track>, limit: usize, stats: F) -> Vec<ProjectedTrack>
where
    F: FnMut(&str) -> StatsCounts,
{
    sort_newest_first(&mut tracks);
    if limit > 0 {
        tracks.truncate(limit);
    }
    project(tracks, stats)
}

/// The newest `limit` tracks; at least one is always requested
pub fn recent<F>(mut tracks: Vec<Track>, limit: usize, stats: F) -> Vec<ProjectedTrack>
where
    F: FnMut(&str) -> StatsCounts,
{
    sort_newest_first(&mut tracks);
    tracks.truncate(limit.max(1));
    project(tracks, stats)
}

/// All tracks by descending score; equal scores keep catalog order
pub fn trending<F>(tracks: Vec<Track>, stats: F) -> Vec<ProjectedTrack>
where
    F: FnMut(&str) -> StatsCounts,
{
    let mut projected = project(tracks, stats);
    projected.sort_by_key(|t| Reverse(t.counts.score()));
    projected
}
