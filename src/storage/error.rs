use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("filesystem error: {0}")]
    Fs(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed stats document: {0}")]
    Malformed(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Errors surfaced to callers of the stats operations
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("track id is missing")]
    MissingTrackId,

    #[error("user id is missing")]
    MissingUserId,

    #[error(transparent)]
    Storage(#[from] StorageError),
}
