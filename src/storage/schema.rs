use rusqlite::Connection;

pub mod tables {
    pub const TRACK_STATS: &str = "track_stats";
    pub const TRACK_LIKES: &str = "track_likes";

    pub const ALL_TABLES: &[&str] = &[TRACK_STATS, TRACK_LIKES];
}

pub mod columns {
    pub const TRACK_ID: &str = "track_id";
    pub const USER_ID: &str = "user_id";
    pub const PLAYS: &str = "plays";
    pub const LIKES: &str = "likes";
    pub const SAVES: &str = "saves";
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS track_stats (
    track_id TEXT NOT NULL PRIMARY KEY,
    plays INTEGER NOT NULL DEFAULT 0,
    likes INTEGER NOT NULL DEFAULT 0,
    saves INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS track_likes (
    track_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    PRIMARY KEY (track_id, user_id)
);
"#;

pub fn init(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA)
}
