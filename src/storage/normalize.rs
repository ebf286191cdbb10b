//! Repairs stored stats records written by older versions or by hand.

use serde_json::{Map, Value};

use crate::domain::stats::TrackStats;

#[derive(Debug, PartialEq)]
pub struct Normalized {
    pub stats: TrackStats,
    /// the stored shape differed from the canonical one
    pub repaired: bool,
}

/// Brings one stored record into canonical shape. Never fails.
pub fn normalize_record(value: &Value) -> Normalized {
    let Some(record) = value.as_object() else {
        return Normalized {
            stats: TrackStats::default(),
            repaired: true,
        };
    };

    let (liked_by, mut repaired) = liked_by(record);
    let (plays, plays_repaired) = counter(record.get("plays"));
    let (saves, saves_repaired) = counter(record.get("saves"));
    repaired |= plays_repaired || saves_repaired;

    let stats = TrackStats::new(plays, saves, liked_by);

    if record.get("likes").and_then(Value::as_u64) != Some(stats.likes()) {
        repaired = true;
    }

    Normalized { stats, repaired }
}

fn liked_by(record: &Map<String, Value>) -> (Vec<String>, bool) {
    match record.get("likedBy") {
        Some(Value::Object(users)) => {
            let repaired = users.values().any(|v| *v != Value::Bool(true));
            (users.keys().cloned().collect(), repaired)
        }
        // legacy list form
        Some(Value::Array(users)) => (
            users
                .iter()
                .filter_map(|u| match u {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect(),
            true,
        ),
        _ => (Vec::new(), true),
    }
}

fn counter(value: Option<&Value>) -> (u64, bool) {
    match value {
        Some(Value::Number(n)) => match n.as_u64() {
            Some(n) => (n, false),
            None => (n.as_f64().map(coerce).unwrap_or(0), true),
        },
        Some(Value::String(s)) => (s.trim().parse::<f64>().map(coerce).unwrap_or(0), true),
        _ => (0, true),
    }
}

fn coerce(n: f64) -> u64 {
    if n.is_finite() && n > 0.0 {
        n.floor() as u64
    } else {
        0
    }
}
