pub mod models;
pub mod queries;

use rusqlite::Connection;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

pub struct Database {
    pub conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "synchronous", "NORMAL")?;
        self.migrate()?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        let version: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap_or(0);

        if version > SCHEMA_VERSION {
            return Err(DbError::Migration(format!(
                "database schema v{version} is newer than this build (v{SCHEMA_VERSION})"
            )));
        }
        if version < 1 {
            self.migrate_v1()?;
        }
        if version < 2 {
            self.migrate_v2()?;
        }

        self.conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    /// V1: server mirror tables + iTunes tracks + links.
    ///
    /// Mirrored tables reference each other by id but the references are not
    /// declared: albums and tracks can be fetched before their parents.
    fn migrate_v1(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS artists (
                id              TEXT PRIMARY KEY,
                name            TEXT,
                name_sort       TEXT,
                album_count     INTEGER,
                track_count     INTEGER,
                length_ms       INTEGER,
                time_added      TEXT,
                in_progress     BOOLEAN,
                media_kind      TEXT,
                data_kind       TEXT,
                uri             TEXT,
                artwork_url     TEXT
            );

            CREATE TABLE IF NOT EXISTS albums (
                id              TEXT PRIMARY KEY,
                name            TEXT,
                name_sort       TEXT,
                artist          TEXT,
                artist_id       TEXT,
                track_count     INTEGER,
                length_ms       INTEGER,
                time_added      TEXT,
                in_progress     BOOLEAN,
                media_kind      TEXT,
                data_kind       TEXT,
                date_released   TEXT,
                year            INTEGER,
                uri             TEXT,
                artwork_url     TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_albums_artist ON albums(artist_id);

            CREATE TABLE IF NOT EXISTS tracks (
                id                  INTEGER PRIMARY KEY,
                title               TEXT,
                title_sort          TEXT,
                artist              TEXT,
                artist_sort         TEXT,
                album               TEXT,
                album_sort          TEXT,
                album_id            TEXT,
                album_artist        TEXT,
                album_artist_sort   TEXT,
                album_artist_id     TEXT,
                genre               TEXT,
                comment             TEXT,
                year                INTEGER,
                track_number        INTEGER,
                disc_number         INTEGER,
                length_ms           INTEGER,
                rating              INTEGER,
                play_count          INTEGER,
                skip_count          INTEGER,
                time_added          TEXT,
                date_released       TEXT,
                seek_ms             INTEGER,
                type                TEXT,
                samplerate          INTEGER,
                bitrate             INTEGER,
                channels            INTEGER,
                usermark            INTEGER,
                media_kind          TEXT,
                data_kind           TEXT,
                path                TEXT,
                uri                 TEXT,
                artwork_url         TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_tracks_album ON tracks(album_id);
            CREATE INDEX IF NOT EXISTS idx_tracks_title_artist ON tracks(title, artist);

            CREATE TABLE IF NOT EXISTS itunes_tracks (
                track_id        INTEGER PRIMARY KEY,
                name            TEXT,
                artist          TEXT,
                album           TEXT,
                album_artist    TEXT,
                genre           TEXT,
                kind            TEXT,
                location        TEXT,
                total_time      INTEGER,
                track_number    INTEGER,
                disc_number     INTEGER,
                year            INTEGER,
                rating          INTEGER,
                play_count      INTEGER,
                play_date       INTEGER,
                skip_count      INTEGER,
                skip_date       TEXT,
                date_added      TEXT,

                -- Every key/value of the plist dict as a JSON object
                raw             TEXT NOT NULL DEFAULT '{}'
            );
            CREATE INDEX IF NOT EXISTS idx_itunes_name_artist ON itunes_tracks(name, artist);

            CREATE TABLE IF NOT EXISTS track_links (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                itunes_track_id     INTEGER NOT NULL,
                owntone_track_id    INTEGER NOT NULL,
                method              TEXT NOT NULL DEFAULT 'exact',
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                UNIQUE(itunes_track_id, owntone_track_id)
            );
            CREATE INDEX IF NOT EXISTS idx_links_owntone ON track_links(owntone_track_id);
            ",
        )?;
        Ok(())
    }

    /// V2: drift review state.
    fn migrate_v2(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS fixed_tracks (
                track_id    INTEGER PRIMARY KEY,
                fixed_at    TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }
}

const SCHEMA_VERSION: i32 = 2;
