//! Linking iTunes tracks to server tracks, and detecting tag drift.

use std::collections::HashMap;

use crate::db::models::{DriftedTrack, LinkMethod, UnmatchedTrack};
use crate::db::{Database, Result};
use crate::pathmeta::{normalize, parse_path, strip_extension};

/// Result of an auto-link run.
#[derive(Debug, Default, PartialEq)]
pub struct LinkResult {
    pub exact: usize,
    pub normalized: usize,
    /// Normalized keys with more than one track on either side.
    pub ambiguous: usize,
}

/// Link pairs whose title and artist are identical.
pub fn link_exact(db: &Database) -> Result<usize> {
    let n = db.link_exact_matches()?;
    log::info!("{n} matches found and inserted into track_links");
    Ok(n)
}

/// Link still-unlinked pairs whose normalized title and artist agree.
///
/// A key that maps to several tracks on either side is skipped.
pub fn link_normalized(db: &Database) -> Result<LinkResult> {
    let mut itunes_by_key: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for (id, name, artist) in db.unlinked_itunes_tracks()? {
        let key = (normalize(name.as_deref()), normalize(artist.as_deref()));
        if key.0.is_empty() {
            continue;
        }
        itunes_by_key.entry(key).or_default().push(id);
    }

    let mut server_by_key: HashMap<(String, String), Vec<i64>> = HashMap::new();
    for t in db.unlinked_server_tracks()? {
        let key = (normalize(t.title.as_deref()), normalize(t.artist.as_deref()));
        if key.0.is_empty() {
            continue;
        }
        server_by_key.entry(key).or_default().push(t.id);
    }

    let mut result = LinkResult::default();
    let tx = db.conn.unchecked_transaction()?;
    for (key, itunes_ids) in &itunes_by_key {
        let Some(server_ids) = server_by_key.get(key) else {
            continue;
        };
        match (itunes_ids.as_slice(), server_ids.as_slice()) {
            ([itunes_id], [server_id]) => {
                if db.insert_link(*itunes_id, *server_id, LinkMethod::Normalized)? {
                    result.normalized += 1;
                }
            }
            _ => {
                log::debug!("Ambiguous normalized match for {:?} / {:?}", key.0, key.1);
                result.ambiguous += 1;
            }
        }
    }
    tx.commit()?;

    log::info!(
        "{} normalized matches linked, {} ambiguous keys skipped",
        result.normalized, result.ambiguous
    );
    Ok(result)
}

/// Exact pass, then optionally the normalized pass.
pub fn auto_link(db: &Database, normalized: bool) -> Result<LinkResult> {
    let exact = link_exact(db)?;
    let mut result = if normalized {
        link_normalized(db)?
    } else {
        LinkResult::default()
    };
    result.exact = exact;
    Ok(result)
}

/// Server tracks (not marked fixed) whose tags disagree with their path.
pub fn find_drift(db: &Database, music_root: &str) -> Result<Vec<DriftedTrack>> {
    let mut drifted = Vec::new();

    for track in db.unfixed_tracks()? {
        let Some(path) = track.path.as_deref() else {
            continue;
        };
        let Some(parsed) = parse_path(music_root, path) else {
            continue;
        };
        let parsed_title = strip_extension(&parsed.track).to_string();
        if parsed_title.trim().is_empty() {
            log::debug!("No title in path {path}");
            continue;
        }

        let path_album = parsed.album.as_deref().map(|a| normalize(Some(a)));
        let artist_differs = normalize(Some(&parsed.artist)) != normalize(track.artist.as_deref());
        let album_differs = match path_album {
            Some(ref a) if !a.is_empty() => *a != normalize(track.album.as_deref()),
            _ => false,
        };
        let title_differs = normalize(Some(&parsed_title)) != normalize(track.title.as_deref());

        if artist_differs || album_differs || title_differs {
            drifted.push(DriftedTrack {
                id: track.id,
                title: track.title,
                artist: track.artist,
                album: track.album,
                path: path.to_string(),
                parsed_title,
                parsed_artist: parsed.artist,
                parsed_album: parsed.album,
            });
        }
    }

    log::debug!("{} tracks drift from their paths", drifted.len());
    Ok(drifted)
}

/// Unlinked iTunes tracks that have at least `min_candidates` possible server matches.
pub fn unmatched_with_candidates(db: &Database, min_candidates: usize) -> Result<Vec<UnmatchedTrack>> {
    Ok(db
        .unmatched_tracks()?
        .into_iter()
        .filter(|u| u.candidates.len() >= min_candidates)
        .collect())
}

/// Parse a comma-separated id list, ignoring blanks. Returns `None` on a bad id.
pub fn parse_id_list(s: &str) -> Option<Vec<i64>> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| p.parse().ok())
        .collect()
}

/// Link explicit (iTunes, server) pairs. Returns the number of new links.
pub fn link_manual(db: &Database, pairs: &[(i64, i64)]) -> Result<usize> {
    let tx = db.conn.unchecked_transaction()?;
    let mut created = 0;
    for (itunes_id, server_id) in pairs {
        if db.insert_link(*itunes_id, *server_id, LinkMethod::Manual)? {
            created += 1;
        }
    }
    tx.commit()?;
    Ok(created)
}

/// Rewrite a track's tags and take it off the drift report.
pub fn fix_track_tags(db: &Database, track_id: i64, artist: &str, album: &str, title: &str) -> Result<bool> {
    let tx = db.conn.unchecked_transaction()?;
    let updated = db.update_track_tags(track_id, artist, album, title)?;
    if updated {
        db.mark_fixed(track_id)?;
    }
    tx.commit()?;
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::ServerTrack;
    use crate::db::queries::tests::{itunes_track, server_track};

    const ROOT: &str = "/music/Music";

    fn with_path(mut t: ServerTrack, path: &str) -> ServerTrack {
        t.path = Some(path.into());
        t
    }

    #[test]
    fn test_normalized_link_unique_only() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Don't Stop Me Now", "Queen", "Jazz", "j")).unwrap();
        db.upsert_server_track(&server_track(2, "Intro", "Various", "X", "x")).unwrap();
        db.upsert_server_track(&server_track(3, "Intro", "Various", "Y", "y")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "dont stop me now", "QUEEN")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "Intro!", "Various")).unwrap();

        let r = auto_link(&db, true).unwrap();
        assert_eq!(r.exact, 0);
        assert_eq!(r.normalized, 1);
        assert_eq!(r.ambiguous, 1);

        let second = link_normalized(&db).unwrap();
        assert_eq!(second.normalized, 0);
    }

    #[test]
    fn test_normalized_link_skips_duplicate_itunes_tracks() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Intro", "Various", "X", "x")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "Intro!", "Various")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "intro", "VARIOUS")).unwrap();

        let r = link_normalized(&db).unwrap();
        assert_eq!(r.normalized, 0);
        assert_eq!(r.ambiguous, 1);
        assert_eq!(db.stats().unwrap().links, 0);
    }

    #[test]
    fn test_drift_skips_path_without_title() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&with_path(
            server_track(1, "Something", "Queen", "Jazz", "j"),
            "/music/Music/Queen/Jazz/01 ",
        ))
        .unwrap();
        db.upsert_server_track(&with_path(
            server_track(2, "Something", "Queen", "Jazz", "j"),
            "/music/Music/Queen/Jazz/02 .mp3",
        ))
        .unwrap();
        assert!(find_drift(&db, ROOT).unwrap().is_empty());
    }

    #[test]
    fn test_auto_link_exact_only() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Jazz", "Queen", "Jazz", "j")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "Jazz", "Queen")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "jazz", "queen")).unwrap();
        let r = auto_link(&db, false).unwrap();
        assert_eq!(r, LinkResult { exact: 1, normalized: 0, ambiguous: 0 });
    }

    #[test]
    fn test_drift_detects_title_mismatch() {
        let db = Database::open_in_memory().unwrap();
        let t = with_path(
            server_track(1, "Bohemian Rapsody", "Queen", "A Night at the Opera", "o"),
            "/music/Music/Queen/A Night at the Opera/11 Bohemian Rhapsody.mp3",
        );
        db.upsert_server_track(&t).unwrap();

        let drift = find_drift(&db, ROOT).unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].parsed_title, "Bohemian Rhapsody");
        assert_eq!(drift[0].parsed_artist, "Queen");
        assert_eq!(drift[0].parsed_album.as_deref(), Some("A Night at the Opera"));
    }

    #[test]
    fn test_drift_ignores_case_and_punctuation() {
        let db = Database::open_in_memory().unwrap();
        let t = with_path(
            server_track(1, "Don't Stop Me Now", "Queen", "Jazz", "j"),
            "/music/Music/queen/Jazz/1-12 Dont Stop Me Now.flac",
        );
        db.upsert_server_track(&t).unwrap();
        assert!(find_drift(&db, ROOT).unwrap().is_empty());
    }

    #[test]
    fn test_drift_album_only_checked_when_in_path() {
        let db = Database::open_in_memory().unwrap();
        let t = with_path(
            server_track(1, "Single", "Queen", "Some Album", "s"),
            "/music/Music/Queen/Single.mp3",
        );
        db.upsert_server_track(&t).unwrap();
        assert!(find_drift(&db, ROOT).unwrap().is_empty());

        let t = with_path(
            server_track(2, "Track", "Queen", "Wrong Album", "w"),
            "/music/Music/Queen/Right Album/Track.mp3",
        );
        db.upsert_server_track(&t).unwrap();
        let drift = find_drift(&db, ROOT).unwrap();
        assert_eq!(drift.len(), 1);
        assert_eq!(drift[0].id, 2);
    }

    #[test]
    fn test_drift_skips_fixed_and_foreign_paths() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&with_path(
            server_track(1, "Wrong", "Queen", "Jazz", "j"),
            "/music/Music/Queen/Jazz/Right.mp3",
        ))
        .unwrap();
        db.upsert_server_track(&with_path(
            server_track(2, "Wrong", "Queen", "Jazz", "j"),
            "/srv/elsewhere/Queen/Jazz/Right.mp3",
        ))
        .unwrap();
        let mut no_path = server_track(3, "Wrong", "Queen", "Jazz", "j");
        no_path.path = None;
        db.upsert_server_track(&no_path).unwrap();

        assert_eq!(find_drift(&db, ROOT).unwrap().len(), 1);
        db.mark_fixed(1).unwrap();
        assert!(find_drift(&db, ROOT).unwrap().is_empty());
    }

    #[test]
    fn test_fix_track_tags_clears_drift() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&with_path(
            server_track(1, "Wrong", "Queen", "Jazz", "j"),
            "/music/Music/Queen/Jazz/Right.mp3",
        ))
        .unwrap();
        assert!(fix_track_tags(&db, 1, "Queen", "Jazz", "Right").unwrap());
        assert!(find_drift(&db, ROOT).unwrap().is_empty());
        assert!(!fix_track_tags(&db, 42, "a", "b", "c").unwrap());
    }

    #[test]
    fn test_unmatched_with_candidates_threshold() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "HELP!", "The Beatles")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "Lonely", "Nobody")).unwrap();

        assert_eq!(unmatched_with_candidates(&db, 0).unwrap().len(), 2);
        let with_one = unmatched_with_candidates(&db, 1).unwrap();
        assert_eq!(with_one.len(), 1);
        assert_eq!(with_one[0].track_id, 10);
        assert!(unmatched_with_candidates(&db, 2).unwrap().is_empty());
    }

    #[test]
    fn test_parse_id_list() {
        assert_eq!(parse_id_list("1, 2,3"), Some(vec![1, 2, 3]));
        assert_eq!(parse_id_list(""), Some(vec![]));
        assert_eq!(parse_id_list("1,,2,"), Some(vec![1, 2]));
        assert_eq!(parse_id_list("1,x"), None);
    }

    #[test]
    fn test_link_manual_counts_new_only() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(link_manual(&db, &[(1, 2), (3, 4)]).unwrap(), 2);
        assert_eq!(link_manual(&db, &[(1, 2), (5, 6)]).unwrap(), 1);
        assert_eq!(db.stats().unwrap().links, 3);
    }
}
