//! Review UI: matched pairs, tag drift, unmatched tracks and search.

mod html;
mod pages;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;

use crate::db::Database;

/// Shared handler state. SQLite access is serialized behind one mutex.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub music_root: Arc<str>,
}

impl AppState {
    pub fn new(db: Database, music_root: &str) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            music_root: Arc::from(music_root),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(pages::index_get).post(pages::index_post))
        .route(
            "/incorrect-tracks",
            get(pages::incorrect_tracks).post(pages::update_track),
        )
        .route("/mark-fixed", post(pages::mark_fixed))
        .route("/mark-album-fixed", post(pages::mark_album_fixed))
        .route("/unmatched_tracks", get(pages::unmatched_tracks))
        .route("/link_tracks", post(pages::link_tracks))
        .route("/search", get(pages::search))
        .route("/unrated", get(pages::unrated))
        .with_state(state)
}

/// Bind `bind` and serve until the process is stopped.
pub async fn serve(state: AppState, bind: &str) -> Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {bind}"))?;
    log::info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
