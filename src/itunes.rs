use std::collections::HashSet;
use std::path::Path;

use roxmltree::{Document, Node, ParsingOptions};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::db::models::ItunesTrack;
use crate::db::{Database, DbError};

#[derive(Error, Debug)]
pub enum ItunesError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("XML error: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("Not an iTunes library: {0}")]
    Structure(String),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, ItunesError>;

pub struct ImportResult {
    pub tracks: usize,
    /// Distinct plist keys seen across all track dicts.
    pub keys: usize,
}

/// Read and parse an iTunes `Library.xml` file.
pub fn read_library(path: &Path) -> Result<Vec<ItunesTrack>> {
    let xml = std::fs::read_to_string(path)?;
    parse_library(&xml)
}

/// Parse the `Tracks` dict of an iTunes library plist.
///
/// Each child dict becomes one track; dicts without a `Track ID` are skipped.
pub fn parse_library(xml: &str) -> Result<Vec<ItunesTrack>> {
    // Library.xml always carries the Apple plist DOCTYPE
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)?;
    let root_dict = doc
        .root_element()
        .children()
        .find(|n| n.has_tag_name("dict"))
        .ok_or_else(|| ItunesError::Structure("missing top-level <dict>".into()))?;

    let tracks_dict = dict_entries(root_dict)
        .find(|(key, _)| *key == "Tracks")
        .map(|(_, value)| value)
        .filter(|n| n.has_tag_name("dict"))
        .ok_or_else(|| ItunesError::Structure("missing Tracks dict".into()))?;

    let mut tracks = Vec::new();
    for (_, track_node) in dict_entries(tracks_dict) {
        if !track_node.has_tag_name("dict") {
            continue;
        }
        let raw = dict_to_map(track_node);
        match track_from_map(raw) {
            Some(track) => tracks.push(track),
            None => log::debug!("Skipping track dict without Track ID"),
        }
    }

    log::debug!("Parsed {} tracks from iTunes library", tracks.len());
    Ok(tracks)
}

/// Store parsed tracks in a single transaction.
pub fn import(db: &Database, tracks: &[ItunesTrack]) -> Result<ImportResult> {
    let keys: HashSet<&str> = tracks
        .iter()
        .flat_map(|t| t.raw.keys().map(|k| k.as_str()))
        .collect();
    log::info!("Captured {} keys", keys.len());

    let tx = db.conn.unchecked_transaction().map_err(DbError::from)?;
    for t in tracks {
        db.upsert_itunes_track(t)?;
    }
    tx.commit().map_err(DbError::from)?;

    Ok(ImportResult {
        tracks: tracks.len(),
        keys: keys.len(),
    })
}

/// Iterate `<key>` / value pairs of a plist `<dict>`.
fn dict_entries<'a, 'input: 'a>(
    dict: Node<'a, 'input>,
) -> impl Iterator<Item = (&'a str, Node<'a, 'input>)> {
    let mut elements = dict.children().filter(|n| n.is_element());
    std::iter::from_fn(move || {
        loop {
            let key = elements.next()?;
            if !key.has_tag_name("key") {
                continue;
            }
            let value = elements.next()?;
            return Some((key.text().unwrap_or_default(), value));
        }
    })
}

fn dict_to_map(dict: Node) -> Map<String, Value> {
    let mut map = Map::new();
    for (key, node) in dict_entries(dict) {
        if let Some(value) = plist_value(node) {
            map.insert(key.to_string(), value);
        }
    }
    map
}

fn plist_value(node: Node) -> Option<Value> {
    let text = node.text().unwrap_or_default().trim();
    match node.tag_name().name() {
        "integer" => text
            .parse::<i64>()
            .map(Value::from)
            .ok()
            .or_else(|| Some(Value::from(text))),
        "real" => text.parse::<f64>().ok().map(Value::from),
        "string" | "date" => Some(Value::from(node.text().unwrap_or_default())),
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        "data" => Some(Value::from(text)),
        _ => None,
    }
}

fn get_str(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn get_int(map: &Map<String, Value>, key: &str) -> Option<i64> {
    match map.get(key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn track_from_map(raw: Map<String, Value>) -> Option<ItunesTrack> {
    let track_id = get_int(&raw, "Track ID")?;
    Some(ItunesTrack {
        track_id,
        name: get_str(&raw, "Name"),
        artist: get_str(&raw, "Artist"),
        album: get_str(&raw, "Album"),
        album_artist: get_str(&raw, "Album Artist"),
        genre: get_str(&raw, "Genre"),
        kind: get_str(&raw, "Kind"),
        location: get_str(&raw, "Location"),
        total_time: get_int(&raw, "Total Time"),
        track_number: get_int(&raw, "Track Number"),
        disc_number: get_int(&raw, "Disc Number"),
        year: get_int(&raw, "Year"),
        rating: get_int(&raw, "Rating"),
        play_count: get_int(&raw, "Play Count"),
        play_date: get_int(&raw, "Play Date"),
        skip_count: get_int(&raw, "Skip Count"),
        skip_date: get_str(&raw, "Skip Date"),
        date_added: get_str(&raw, "Date Added"),
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple Computer//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
	<key>Major Version</key><integer>1</integer>
	<key>Application Version</key><string>12.9.5.5</string>
	<key>Tracks</key>
	<dict>
		<key>1001</key>
		<dict>
			<key>Track ID</key><integer>1001</integer>
			<key>Name</key><string>Dancing Queen</string>
			<key>Artist</key><string>ABBA</string>
			<key>Album</key><string>Arrival</string>
			<key>Total Time</key><integer>230400</integer>
			<key>Rating</key><integer>80</integer>
			<key>Play Count</key><integer>12</integer>
			<key>Play Date</key><integer>3600000000</integer>
			<key>Skip Date</key><date>2019-03-02T10:00:00Z</date>
			<key>Date Added</key><date>2010-01-01T00:00:00Z</date>
			<key>Compilation</key><true/>
		</dict>
		<key>1002</key>
		<dict>
			<key>Track ID</key><integer>1002</integer>
			<key>Name</key><string>Fernando &amp; Friends</string>
			<key>Artist</key><string>ABBA</string>
		</dict>
		<key>1003</key>
		<dict>
			<key>Name</key><string>Orphan</string>
		</dict>
	</dict>
	<key>Playlists</key>
	<array>
		<dict><key>Name</key><string>Library</string></dict>
	</array>
</dict>
</plist>"#;

    #[test]
    fn test_parse_library_tracks() {
        let tracks = parse_library(LIBRARY).unwrap();
        assert_eq!(tracks.len(), 2);

        let t = &tracks[0];
        assert_eq!(t.track_id, 1001);
        assert_eq!(t.name.as_deref(), Some("Dancing Queen"));
        assert_eq!(t.artist.as_deref(), Some("ABBA"));
        assert_eq!(t.total_time, Some(230400));
        assert_eq!(t.rating, Some(80));
        assert_eq!(t.play_date, Some(3600000000));
        assert_eq!(t.skip_date.as_deref(), Some("2019-03-02T10:00:00Z"));
        assert_eq!(t.raw.get("Compilation"), Some(&Value::Bool(true)));

        assert_eq!(tracks[1].name.as_deref(), Some("Fernando & Friends"));
        assert!(tracks[1].rating.is_none());
    }

    #[test]
    fn test_missing_tracks_dict_is_error() {
        let xml = r#"<plist version="1.0"><dict><key>Major Version</key><integer>1</integer></dict></plist>"#;
        assert!(matches!(parse_library(xml), Err(ItunesError::Structure(_))));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(matches!(parse_library("<plist><dict>"), Err(ItunesError::Xml(_))));
    }

    #[test]
    fn test_import_counts_keys_and_upserts() {
        let db = Database::open_in_memory().unwrap();
        let tracks = parse_library(LIBRARY).unwrap();

        let result = import(&db, &tracks).unwrap();
        assert_eq!(result.tracks, 2);
        // Track ID, Name, Artist, Album, Total Time, Rating, Play Count,
        // Play Date, Skip Date, Date Added, Compilation
        assert_eq!(result.keys, 11);

        import(&db, &tracks).unwrap();
        let n: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM itunes_tracks", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 2);
    }
}
