use axum::{
    extract::{Form, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::db::DbError;
use crate::reconcile;

use super::html::{escape_html, html_error, html_response, opt, page, redirect_to, select, stars};
use super::AppState;

/// Database failures become a 500 page.
pub struct PageError(DbError);

impl From<DbError> for PageError {
    fn from(e: DbError) -> Self {
        Self(e)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        log::error!("Request failed: {}", self.0);
        html_error(StatusCode::INTERNAL_SERVER_ERROR, &format!("database error: {}", self.0))
    }
}

type PageResult = Result<Response, PageError>;

#[derive(Debug, Default, Deserialize)]
pub struct FilterForm {
    artist: Option<String>,
    album: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TrackIdForm {
    track_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTagsForm {
    track_id: i64,
    updated_artist: String,
    updated_album: String,
    updated_title: String,
}

/// Either field may hold a comma-separated list; the lists are zipped.
#[derive(Debug, Deserialize)]
pub struct LinkForm {
    itunes_track_id: String,
    owntone_track_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    title: Option<String>,
    artist: Option<String>,
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Dropdown values are matched exactly as stored, so only "" means no filter.
fn selected(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

pub async fn index_get(State(state): State<AppState>, Query(filter): Query<FilterForm>) -> PageResult {
    render_index(&state, &filter)
}

pub async fn index_post(State(state): State<AppState>, Form(filter): Form<FilterForm>) -> PageResult {
    render_index(&state, &filter)
}

fn render_index(state: &AppState, filter: &FilterForm) -> PageResult {
    let artist = selected(&filter.artist);
    let album = selected(&filter.album);

    let db = state.db.lock();
    let artists = db.linked_artists()?;
    let albums = db.linked_albums()?;
    let matches = db.matched_pairs(artist, album)?;
    drop(db);

    let mut rows = String::new();
    for m in &matches {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
             <td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            opt(m.itunes_name.as_deref()),
            opt(m.itunes_artist.as_deref()),
            opt(m.itunes_album.as_deref()),
            stars(m.itunes_rating),
            opt(m.server_title.as_deref()),
            opt(m.server_artist.as_deref()),
            opt(m.server_album.as_deref()),
            stars(m.server_rating),
        ));
    }

    let body = format!(
        "<form method=\"post\" action=\"/\">Artist {} Album {} <button type=\"submit\">Filter</button></form>\
         <p>{} matched tracks</p>\
         <table><thead><tr><th>iTunes title</th><th>iTunes artist</th><th>iTunes album</th><th>iTunes rating</th>\
         <th>Server title</th><th>Server artist</th><th>Server album</th><th>Server rating</th></tr></thead>\
         <tbody>{rows}</tbody></table>",
        select("artist", &artists, artist),
        select("album", &albums, album),
        matches.len(),
    );
    Ok(html_response(StatusCode::OK, page("Matched tracks", &body)))
}

pub async fn incorrect_tracks(State(state): State<AppState>) -> PageResult {
    let drifted = {
        let db = state.db.lock();
        reconcile::find_drift(&db, &state.music_root)?
    };

    if drifted.is_empty() {
        let body = "<p class=\"muted\">Every track agrees with its path.</p>";
        return Ok(html_response(StatusCode::OK, page("Incorrect tracks", body)));
    }

    let mut rows = String::new();
    for t in &drifted {
        let id = t.id;
        rows.push_str(&format!(
            "<tr class=\"differs\"><td><code>{path}</code></td>\
             <td>{title}<br><span class=\"parsed\">{p_title}</span></td>\
             <td>{artist}<br><span class=\"parsed\">{p_artist}</span></td>\
             <td>{album}<br><span class=\"parsed\">{p_album}</span></td>\
             <td><form method=\"post\" action=\"/incorrect-tracks\">\
             <input type=\"hidden\" name=\"track_id\" value=\"{id}\">\
             <input name=\"updated_title\" value=\"{p_title}\">\
             <input name=\"updated_artist\" value=\"{p_artist}\">\
             <input name=\"updated_album\" value=\"{p_album_or_current}\">\
             <button type=\"submit\">Save</button></form>\
             <form class=\"inline\" method=\"post\" action=\"/mark-fixed\">\
             <input type=\"hidden\" name=\"track_id\" value=\"{id}\"><button type=\"submit\">Ignore</button></form>\
             <form class=\"inline\" method=\"post\" action=\"/mark-album-fixed\">\
             <input type=\"hidden\" name=\"track_id\" value=\"{id}\"><button type=\"submit\">Ignore album</button></form>\
             </td></tr>",
            path = escape_html(&t.path),
            title = opt(t.title.as_deref()),
            p_title = escape_html(&t.parsed_title),
            artist = opt(t.artist.as_deref()),
            p_artist = escape_html(&t.parsed_artist),
            album = opt(t.album.as_deref()),
            p_album = opt(t.parsed_album.as_deref()),
            p_album_or_current = opt(t.parsed_album.as_deref().or(t.album.as_deref())),
        ));
    }

    let body = format!(
        "<p>{} tracks whose tags differ from their path (current tags above, path-derived below)</p>\
         <table><thead><tr><th>Path</th><th>Title</th><th>Artist</th><th>Album</th><th>Fix</th></tr></thead>\
         <tbody>{rows}</tbody></table>",
        drifted.len(),
    );
    Ok(html_response(StatusCode::OK, page("Incorrect tracks", &body)))
}

pub async fn update_track(State(state): State<AppState>, Form(form): Form<UpdateTagsForm>) -> PageResult {
    let db = state.db.lock();
    let Some(before) = db.server_track(form.track_id)? else {
        return Ok(html_error(StatusCode::NOT_FOUND, &format!("no track {}", form.track_id)));
    };
    reconcile::fix_track_tags(
        &db,
        form.track_id,
        &form.updated_artist,
        &form.updated_album,
        &form.updated_title,
    )?;
    drop(db);

    log::info!(
        "Track {} retagged: {} / {} / {} -> {} / {} / {}",
        form.track_id,
        before.artist.as_deref().unwrap_or("-"),
        before.album.as_deref().unwrap_or("-"),
        before.title.as_deref().unwrap_or("-"),
        form.updated_artist,
        form.updated_album,
        form.updated_title
    );
    Ok(redirect_to("/incorrect-tracks"))
}

pub async fn mark_fixed(State(state): State<AppState>, Form(form): Form<TrackIdForm>) -> PageResult {
    state.db.lock().mark_fixed(form.track_id)?;
    log::info!("Track {} marked fixed", form.track_id);
    Ok(redirect_to("/incorrect-tracks"))
}

pub async fn mark_album_fixed(State(state): State<AppState>, Form(form): Form<TrackIdForm>) -> PageResult {
    let n = state.db.lock().mark_album_fixed(form.track_id)?;
    log::info!("Album of track {} marked fixed ({n} tracks)", form.track_id);
    Ok(redirect_to("/incorrect-tracks"))
}

pub async fn unmatched_tracks(State(state): State<AppState>) -> PageResult {
    let unmatched = {
        let db = state.db.lock();
        reconcile::unmatched_with_candidates(&db, 1)?
    };

    let mut rows = String::new();
    let mut single_itunes = Vec::new();
    let mut single_server = Vec::new();
    for u in &unmatched {
        if let [only] = u.candidates.as_slice() {
            single_itunes.push(u.track_id.to_string());
            single_server.push(only.id.to_string());
        }
        let mut candidates = String::new();
        for c in &u.candidates {
            candidates.push_str(&format!(
                "<li>{} / {} / {} <form class=\"inline\" method=\"post\" action=\"/link_tracks\">\
                 <input type=\"hidden\" name=\"itunes_track_id\" value=\"{}\">\
                 <input type=\"hidden\" name=\"owntone_track_id\" value=\"{}\">\
                 <button type=\"submit\">Link</button></form></li>",
                opt(c.title.as_deref()),
                opt(c.artist.as_deref()),
                opt(c.album.as_deref()),
                u.track_id,
                c.id,
            ));
        }
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td><ul>{candidates}</ul></td></tr>",
            opt(u.title.as_deref()),
            opt(u.artist.as_deref()),
            opt(u.album.as_deref()),
        ));
    }

    let bulk = if single_itunes.is_empty() {
        String::new()
    } else {
        format!(
            "<form method=\"post\" action=\"/link_tracks\">\
             <input type=\"hidden\" name=\"itunes_track_id\" value=\"{}\">\
             <input type=\"hidden\" name=\"owntone_track_id\" value=\"{}\">\
             <button type=\"submit\">Link all {} single-candidate tracks</button></form>",
            single_itunes.join(","),
            single_server.join(","),
            single_itunes.len(),
        )
    };

    let body = format!(
        "<p>{} unlinked iTunes tracks with possible matches</p>{bulk}\
         <table><thead><tr><th>iTunes title</th><th>Artist</th><th>Album</th><th>Candidates</th></tr></thead>\
         <tbody>{rows}</tbody></table>",
        unmatched.len(),
    );
    Ok(html_response(StatusCode::OK, page("Unmatched tracks", &body)))
}

pub async fn link_tracks(State(state): State<AppState>, Form(form): Form<LinkForm>) -> PageResult {
    let (Some(itunes_ids), Some(server_ids)) = (
        reconcile::parse_id_list(&form.itunes_track_id),
        reconcile::parse_id_list(&form.owntone_track_id),
    ) else {
        return Ok(html_error(StatusCode::BAD_REQUEST, "track ids must be integers"));
    };
    if itunes_ids.len() != server_ids.len() {
        log::warn!(
            "Link request with {} iTunes ids and {} server ids; extra ids ignored",
            itunes_ids.len(),
            server_ids.len()
        );
    }

    let pairs: Vec<(i64, i64)> = itunes_ids.into_iter().zip(server_ids).collect();
    let created = reconcile::link_manual(&state.db.lock(), &pairs)?;
    log::info!("Linked {created} of {} submitted pairs", pairs.len());
    Ok(redirect_to("/unmatched_tracks"))
}

pub async fn search(State(state): State<AppState>, Query(q): Query<SearchQuery>) -> PageResult {
    let title = non_empty(&q.title);
    let artist = non_empty(&q.artist);

    let form = format!(
        "<form method=\"get\" action=\"/search\">Title <input name=\"title\" value=\"{}\"> \
         Artist <input name=\"artist\" value=\"{}\"> <button type=\"submit\">Search</button></form>",
        opt(title),
        opt(artist),
    );

    if title.is_none() && artist.is_none() {
        return Ok(html_response(StatusCode::OK, page("Search", &form)));
    }

    let results = state
        .db
        .lock()
        .search_tracks(title.unwrap_or_default(), artist.unwrap_or_default())?;

    let mut rows = String::new();
    for t in &results {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            t.id,
            opt(t.title.as_deref()),
            opt(t.artist.as_deref()),
            opt(t.album.as_deref()),
        ));
    }
    let body = format!(
        "{form}<p>{} results</p><table><thead><tr><th>Id</th><th>Title</th><th>Artist</th><th>Album</th></tr></thead>\
         <tbody>{rows}</tbody></table>",
        results.len(),
    );
    Ok(html_response(StatusCode::OK, page("Search", &body)))
}

pub async fn unrated(State(state): State<AppState>) -> PageResult {
    let tracks = state.db.lock().unrated_tracks()?;

    let mut rows = String::new();
    for t in &tracks {
        rows.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
            opt(t.title.as_deref()),
            opt(t.artist.as_deref()),
            opt(t.album.as_deref()),
            stars(Some(t.itunes_rating)),
        ));
    }
    let body = format!(
        "<p>{} linked tracks rated in iTunes but not on the server</p>\
         <table><thead><tr><th>Title</th><th>Artist</th><th>Album</th><th>iTunes rating</th></tr></thead>\
         <tbody>{rows}</tbody></table>",
        tracks.len(),
    );
    Ok(html_response(StatusCode::OK, page("Unrated tracks", &body)))
}
