use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Counters for one track.
///
/// `likes` is not stored: it is always the number of distinct users in
/// `liked_by`, and only gets written out when the record is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackStats {
    pub plays: u64,
    pub saves: u64,
    liked_by: BTreeSet<String>,
}

impl TrackStats {
    pub fn new(plays: u64, saves: u64, liked_by: impl IntoIterator<Item = String>) -> Self {
        Self {
            plays,
            saves,
            liked_by: liked_by.into_iter().collect(),
        }
    }

    pub fn likes(&self) -> u64 {
        self.liked_by.len() as u64
    }

    #[cfg(test)]
    pub(crate) fn has_liked(&self, user_id: &str) -> bool {
        self.liked_by.contains(user_id)
    }

    /// returns false if the user already liked this track
    pub fn add_like(&mut self, user_id: &str) -> bool {
        self.liked_by.insert(user_id.to_string())
    }

    pub fn record_play(&mut self) {
        self.plays = self.plays.saturating_add(1);
    }

    pub fn liked_by(&self) -> impl Iterator<Item = &str> {
        self.liked_by.iter().map(String::as_str)
    }

    pub fn counts(&self) -> StatsCounts {
        StatsCounts {
            plays: self.plays,
            likes: self.likes(),
            saves: self.saves,
        }
    }
}

/// On-disk shape of a record: `{plays, likes, saves, likedBy: {userId: true}}`
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredStats<'a> {
    plays: u64,
    likes: u64,
    saves: u64,
    liked_by: BTreeMap<&'a str, bool>,
}

impl Serialize for TrackStats {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StoredStats {
            plays: self.plays,
            likes: self.likes(),
            saves: self.saves,
            liked_by: self.liked_by().map(|user| (user, true)).collect(),
        }
        .serialize(serializer)
    }
}

/// Public view of a track's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsCounts {
    pub plays: u64,
    pub likes: u64,
    pub saves: u64,
}

impl StatsCounts {
    /// Trending rank: `plays * 2 + likes + saves`
    pub fn score(&self) -> u64 {
        self.plays
            .saturating_mul(2)
            .saturating_add(self.likes)
            .saturating_add(self.saves)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LikeOutcome {
    pub counts: StatsCounts,
    pub already_liked: bool,
}

/// Delta pushed to realtime subscribers after a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackUpdate {
    pub track_id: String,
    #[serde(flatten)]
    pub counts: StatsCounts,
}
