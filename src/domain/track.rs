use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

pub const UNTITLED: &str = "Untitled track";

/// Represent an uploaded track, as listed by the catalog
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub user_id: Option<String>,
    pub title: String,
    pub url: Option<String>,
    pub cover: Option<String>,
    pub duration_ms: Option<u64>,
    pub created_at: Option<DateTime<Utc>>,
    pub has_lyrics: bool,
}

impl Track {
    pub fn new(id: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: id.into(),
            user_id: None,
            title: UNTITLED.to_string(),
            url: None,
            cover: None,
            duration_ms: None,
            created_at,
            has_lyrics: false,
        }
    }

    /// Builds a track from a loosely typed catalog record.
    ///
    /// Returns None when the record has no usable id.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let id = id_field(raw.get("id")?)?;

        let title = ["title", "originalName"]
            .iter()
            .filter_map(|key| raw.get(*key).and_then(Value::as_str))
            .find(|s| !s.is_empty())
            .unwrap_or(UNTITLED)
            .to_string();

        Some(Self {
            id,
            user_id: raw.get("userId").and_then(id_field),
            title,
            url: media_field(raw, "absUrl", "url", "relPath"),
            cover: media_field(raw, "absCover", "cover", "coverRelPath"),
            duration_ms: raw.get("durationMs").and_then(Value::as_u64),
            created_at: raw
                .get("createdAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
            has_lyrics: raw.get("hasLyrics").is_some_and(truthy),
        })
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id.as_deref() == Some(user_id)
    }
}

/// loose boolean flags, as JavaScript would read them
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// ids arrive either as strings or as plain numbers
fn id_field(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn media_field(raw: &Value, absolute: &str, direct: &str, relative: &str) -> Option<String> {
    let non_empty = |key: &str| {
        raw.get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    non_empty(absolute).or_else(|| non_empty(direct)).or_else(|| {
        non_empty(relative).map(|rel| format!("/uploads/{}", rel.trim_start_matches('/')))
    })
}
