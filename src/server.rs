use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::config::ServerConfig;
use crate::db::models::{Album, Artist, ServerTrack};
use crate::db::Database;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<ureq::Error>,
    },
}

/// Read access to a media server's library.
pub trait MediaServer {
    fn artists(&self) -> std::result::Result<Vec<Artist>, ServerError>;
    fn artist_albums(&self, artist_id: &str) -> std::result::Result<Vec<Album>, ServerError>;
    fn album_tracks(&self, album_id: &str) -> std::result::Result<Vec<ServerTrack>, ServerError>;
}

/// Paged list reply: `{"items": [...], "total": N, ...}`.
#[derive(Debug, Deserialize)]
struct ItemsResponse<T> {
    items: Option<Vec<T>>,
}

/// OwnTone JSON API client.
pub struct HttpServer {
    agent: ureq::Agent,
    base_url: String,
}

impl HttpServer {
    pub fn new(config: &ServerConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        }
    }

    fn get_items<T: DeserializeOwned>(&self, path: &str) -> std::result::Result<Vec<T>, ServerError> {
        let url = format!("{}{path}", self.base_url);
        log::debug!("Fetching {url}");

        let http_err = |e: ureq::Error| ServerError::Http {
            url: url.clone(),
            source: Box::new(e),
        };
        let response: ItemsResponse<T> = self
            .agent
            .get(&url)
            .call()
            .map_err(http_err)?
            .body_mut()
            .read_json()
            .map_err(http_err)?;

        match response.items {
            Some(items) => Ok(items),
            None => {
                log::warn!("No 'items' found in the response from {url}");
                Ok(Vec::new())
            }
        }
    }
}

/// Percent-encode an id for use as a single URL path segment.
fn encode_segment(id: &str) -> String {
    utf8_percent_encode(id, NON_ALPHANUMERIC).to_string()
}

impl MediaServer for HttpServer {
    fn artists(&self) -> std::result::Result<Vec<Artist>, ServerError> {
        self.get_items("/api/library/artists")
    }

    fn artist_albums(&self, artist_id: &str) -> std::result::Result<Vec<Album>, ServerError> {
        self.get_items(&format!("/api/library/artists/{}/albums", encode_segment(artist_id)))
    }

    fn album_tracks(&self, album_id: &str) -> std::result::Result<Vec<ServerTrack>, ServerError> {
        self.get_items(&format!("/api/library/albums/{}/tracks", encode_segment(album_id)))
    }
}

/// Result of a fetch run.
#[derive(Debug, Default, PartialEq)]
pub struct FetchResult {
    pub requests: usize,
    pub stored: usize,
    pub errors: usize,
}

/// Fetch every artist from the server and upsert it.
pub fn fetch_artists(db: &Database, server: &dyn MediaServer) -> Result<FetchResult> {
    let artists = server.artists().context("Failed to fetch artists")?;

    let tx = db.conn.unchecked_transaction()?;
    for artist in &artists {
        db.upsert_artist(artist)
            .with_context(|| format!("Failed to store artist {}", artist.id))?;
    }
    tx.commit()?;

    log::info!("Inserted {} artists into the database", artists.len());
    Ok(FetchResult {
        requests: 1,
        stored: artists.len(),
        errors: 0,
    })
}

/// Fetch the albums of every stored artist.
pub fn fetch_albums(db: &Database, server: &dyn MediaServer, rate_limit_ms: u64) -> Result<FetchResult> {
    let artist_ids = db.artist_ids().context("Failed to list artists")?;
    for_each_parent(db, &artist_ids, "artists", rate_limit_ms, |db, artist_id| {
        let albums = server.artist_albums(artist_id)?;
        for album in &albums {
            db.upsert_album(album)?;
        }
        log::debug!("Inserted {} albums for artist {artist_id}", albums.len());
        Ok(albums.len())
    })
}

/// Fetch the tracks of every stored album.
pub fn fetch_tracks(db: &Database, server: &dyn MediaServer, rate_limit_ms: u64) -> Result<FetchResult> {
    let album_ids = db.album_ids().context("Failed to list albums")?;
    for_each_parent(db, &album_ids, "albums", rate_limit_ms, |db, album_id| {
        let tracks = server.album_tracks(album_id)?;
        for track in &tracks {
            db.upsert_server_track(track)?;
        }
        log::debug!("Inserted {} tracks for album {album_id}", tracks.len());
        Ok(tracks.len())
    })
}

/// Run one request per parent id; a failed request is logged and counted, never fatal.
fn for_each_parent<F>(
    db: &Database,
    ids: &[String],
    label: &str,
    rate_limit_ms: u64,
    mut fetch_one: F,
) -> Result<FetchResult>
where
    F: FnMut(&Database, &str) -> Result<usize>,
{
    let pb = ProgressBar::new(ids.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {label} ({{eta}} remaining) {{msg}}"
            ))
            .context("Invalid progress template")?
            .progress_chars("=>-"),
    );

    let mut result = FetchResult::default();
    let tx = db.conn.unchecked_transaction()?;

    for (i, id) in ids.iter().enumerate() {
        pb.set_message(id.clone());
        result.requests += 1;

        match fetch_one(db, id) {
            Ok(n) => result.stored += n,
            Err(e) => {
                result.errors += 1;
                log::warn!("Failed to fetch children of {id}: {e:#}");
            }
        }

        pb.inc(1);
        if rate_limit_ms > 0 && i + 1 < ids.len() {
            thread::sleep(Duration::from_millis(rate_limit_ms));
        }
    }

    tx.commit()?;
    pb.finish_with_message("done");
    Ok(result)
}
