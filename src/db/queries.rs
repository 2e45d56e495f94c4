use super::models::{
    Album, Artist, ItunesTrack, LibraryStats, LinkMethod, MatchedPair, PlayStats, ServerTrack,
    TrackSummary, UnmatchedTrack, UnratedTrack,
};
use super::{Database, Result};
use rusqlite::{params, OptionalExtension};

impl Database {
    /// Insert or update an artist keyed by its server id.
    pub fn upsert_artist(&self, a: &Artist) -> Result<()> {
        self.conn.execute(
            "INSERT INTO artists (
                id, name, name_sort, album_count, track_count, length_ms, time_added,
                in_progress, media_kind, data_kind, uri, artwork_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                name_sort = excluded.name_sort,
                album_count = excluded.album_count,
                track_count = excluded.track_count,
                length_ms = excluded.length_ms,
                time_added = excluded.time_added,
                in_progress = excluded.in_progress,
                media_kind = excluded.media_kind,
                data_kind = excluded.data_kind,
                uri = excluded.uri,
                artwork_url = excluded.artwork_url
            ",
            params![
                a.id, a.name, a.name_sort, a.album_count, a.track_count, a.length_ms,
                a.time_added, a.in_progress, a.media_kind, a.data_kind, a.uri, a.artwork_url,
            ],
        )?;
        Ok(())
    }

    /// Insert or update an album keyed by its server id.
    pub fn upsert_album(&self, a: &Album) -> Result<()> {
        self.conn.execute(
            "INSERT INTO albums (
                id, name, name_sort, artist, artist_id, track_count, length_ms, time_added,
                in_progress, media_kind, data_kind, date_released, year, uri, artwork_url
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                name_sort = excluded.name_sort,
                artist = excluded.artist,
                artist_id = excluded.artist_id,
                track_count = excluded.track_count,
                length_ms = excluded.length_ms,
                time_added = excluded.time_added,
                in_progress = excluded.in_progress,
                media_kind = excluded.media_kind,
                data_kind = excluded.data_kind,
                date_released = excluded.date_released,
                year = excluded.year,
                uri = excluded.uri,
                artwork_url = excluded.artwork_url
            ",
            params![
                a.id, a.name, a.name_sort, a.artist, a.artist_id, a.track_count, a.length_ms,
                a.time_added, a.in_progress, a.media_kind, a.data_kind, a.date_released,
                a.year, a.uri, a.artwork_url,
            ],
        )?;
        Ok(())
    }

    /// Insert or update a server track keyed by its id.
    /// Fields absent from the server reply are stored as NULL.
    pub fn upsert_server_track(&self, t: &ServerTrack) -> Result<()> {
        self.conn.execute(
            "INSERT INTO tracks (
                id, title, title_sort, artist, artist_sort, album, album_sort, album_id,
                album_artist, album_artist_sort, album_artist_id, genre, comment, year,
                track_number, disc_number, length_ms, rating, play_count, skip_count,
                time_added, date_released, seek_ms, type, samplerate, bitrate, channels,
                usermark, media_kind, data_kind, path, uri, artwork_url
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8,
                ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25, ?26, ?27,
                ?28, ?29, ?30, ?31, ?32, ?33
            )
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                title_sort = excluded.title_sort,
                artist = excluded.artist,
                artist_sort = excluded.artist_sort,
                album = excluded.album,
                album_sort = excluded.album_sort,
                album_id = excluded.album_id,
                album_artist = excluded.album_artist,
                album_artist_sort = excluded.album_artist_sort,
                album_artist_id = excluded.album_artist_id,
                genre = excluded.genre,
                comment = excluded.comment,
                year = excluded.year,
                track_number = excluded.track_number,
                disc_number = excluded.disc_number,
                length_ms = excluded.length_ms,
                rating = excluded.rating,
                play_count = excluded.play_count,
                skip_count = excluded.skip_count,
                time_added = excluded.time_added,
                date_released = excluded.date_released,
                seek_ms = excluded.seek_ms,
                type = excluded.type,
                samplerate = excluded.samplerate,
                bitrate = excluded.bitrate,
                channels = excluded.channels,
                usermark = excluded.usermark,
                media_kind = excluded.media_kind,
                data_kind = excluded.data_kind,
                path = excluded.path,
                uri = excluded.uri,
                artwork_url = excluded.artwork_url
            ",
            params![
                t.id, t.title, t.title_sort, t.artist, t.artist_sort, t.album, t.album_sort,
                t.album_id, t.album_artist, t.album_artist_sort, t.album_artist_id, t.genre,
                t.comment, t.year, t.track_number, t.disc_number, t.length_ms, t.rating,
                t.play_count, t.skip_count, t.time_added, t.date_released, t.seek_ms,
                t.file_type, t.samplerate, t.bitrate, t.channels, t.usermark, t.media_kind,
                t.data_kind, t.path, t.uri, t.artwork_url,
            ],
        )?;
        Ok(())
    }

    /// Insert or update an iTunes track keyed by its `Track ID`.
    pub fn upsert_itunes_track(&self, t: &ItunesTrack) -> Result<()> {
        let raw = serde_json::to_string(&t.raw)?;
        self.conn.execute(
            "INSERT INTO itunes_tracks (
                track_id, name, artist, album, album_artist, genre, kind, location,
                total_time, track_number, disc_number, year, rating, play_count, play_date,
                skip_count, skip_date, date_added, raw
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            ON CONFLICT(track_id) DO UPDATE SET
                name = excluded.name,
                artist = excluded.artist,
                album = excluded.album,
                album_artist = excluded.album_artist,
                genre = excluded.genre,
                kind = excluded.kind,
                location = excluded.location,
                total_time = excluded.total_time,
                track_number = excluded.track_number,
                disc_number = excluded.disc_number,
                year = excluded.year,
                rating = excluded.rating,
                play_count = excluded.play_count,
                play_date = excluded.play_date,
                skip_count = excluded.skip_count,
                skip_date = excluded.skip_date,
                date_added = excluded.date_added,
                raw = excluded.raw
            ",
            params![
                t.track_id, t.name, t.artist, t.album, t.album_artist, t.genre, t.kind,
                t.location, t.total_time, t.track_number, t.disc_number, t.year, t.rating,
                t.play_count, t.play_date, t.skip_count, t.skip_date, t.date_added, raw,
            ],
        )?;
        Ok(())
    }

    /// All stored artist ids, in id order.
    pub fn artist_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM artists ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// All stored album ids, in id order.
    pub fn album_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM albums ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    /// Link every iTunes / server pair whose title and artist are identical.
    /// Returns the number of newly created links.
    pub fn link_exact_matches(&self) -> Result<usize> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO track_links (itunes_track_id, owntone_track_id, method)
             SELECT it.track_id, ot.id, ?1
             FROM itunes_tracks it
             JOIN tracks ot ON it.name = ot.title AND it.artist = ot.artist",
            params![LinkMethod::Exact.as_str()],
        )?;
        Ok(n)
    }

    /// Insert a single link. Returns false if the pair was already linked.
    pub fn insert_link(&self, itunes_track_id: i64, server_track_id: i64, method: LinkMethod) -> Result<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO track_links (itunes_track_id, owntone_track_id, method)
             VALUES (?1, ?2, ?3)",
            params![itunes_track_id, server_track_id, method.as_str()],
        )?;
        Ok(n > 0)
    }

    /// iTunes tracks that have no link yet: (track_id, name, artist).
    pub fn unlinked_itunes_tracks(&self) -> Result<Vec<(i64, Option<String>, Option<String>)>> {
        let mut stmt = self.conn.prepare(
            "SELECT track_id, name, artist FROM itunes_tracks
             WHERE track_id NOT IN (SELECT itunes_track_id FROM track_links)
             ORDER BY track_id",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Server tracks that have no link yet.
    pub fn unlinked_server_tracks(&self) -> Result<Vec<TrackSummary>> {
        self.track_summaries(
            "SELECT id, title, artist, album, path FROM tracks
             WHERE id NOT IN (SELECT owntone_track_id FROM track_links)
             ORDER BY id",
            [],
        )
    }

    /// Server tracks not yet marked as fixed (input to drift detection).
    pub fn unfixed_tracks(&self) -> Result<Vec<TrackSummary>> {
        self.track_summaries(
            "SELECT t.id, t.title, t.artist, t.album, t.path FROM tracks t
             WHERE NOT EXISTS (SELECT 1 FROM fixed_tracks f WHERE f.track_id = t.id)
             ORDER BY t.id",
            [],
        )
    }

    /// Substring search over server tracks by title and artist.
    pub fn search_tracks(&self, title: &str, artist: &str) -> Result<Vec<TrackSummary>> {
        self.track_summaries(
            "SELECT id, title, artist, album, path FROM tracks
             WHERE title LIKE ?1 AND artist LIKE ?2
             ORDER BY artist, album, title",
            params![format!("%{title}%"), format!("%{artist}%")],
        )
    }

    /// Look up a single server track.
    pub fn server_track(&self, id: i64) -> Result<Option<TrackSummary>> {
        let track = self
            .conn
            .query_row(
                "SELECT id, title, artist, album, path FROM tracks WHERE id = ?1",
                params![id],
                |row| {
                    Ok(TrackSummary {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        artist: row.get(2)?,
                        album: row.get(3)?,
                        path: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(track)
    }

    fn track_summaries<P: rusqlite::Params>(&self, sql: &str, p: P) -> Result<Vec<TrackSummary>> {
        let mut stmt = self.conn.prepare(sql)?;
        let tracks = stmt
            .query_map(p, |row| {
                Ok(TrackSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    artist: row.get(2)?,
                    album: row.get(3)?,
                    path: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(tracks)
    }

    /// Linked pairs, optionally filtered by iTunes artist and/or server album.
    pub fn matched_pairs(&self, artist: Option<&str>, album: Option<&str>) -> Result<Vec<MatchedPair>> {
        let mut stmt = self.conn.prepare(
            "SELECT it.name, it.artist, it.album, it.rating,
                    ot.title, ot.artist, ot.album, ot.rating
             FROM track_links tl
             JOIN itunes_tracks it ON it.track_id = tl.itunes_track_id
             JOIN tracks ot ON ot.id = tl.owntone_track_id
             WHERE (?1 IS NULL OR it.artist = ?1)
               AND (?2 IS NULL OR ot.album = ?2)
             ORDER BY it.artist, ot.album, ot.track_number, it.name",
        )?;
        let pairs = stmt
            .query_map(params![artist, album], |row| {
                Ok(MatchedPair {
                    itunes_name: row.get(0)?,
                    itunes_artist: row.get(1)?,
                    itunes_album: row.get(2)?,
                    itunes_rating: row.get(3)?,
                    server_title: row.get(4)?,
                    server_artist: row.get(5)?,
                    server_album: row.get(6)?,
                    server_rating: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Distinct iTunes artists that have at least one link.
    pub fn linked_artists(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT it.artist
             FROM itunes_tracks it
             JOIN track_links tl ON it.track_id = tl.itunes_track_id
             WHERE it.artist IS NOT NULL
             ORDER BY it.artist",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Distinct server albums that have at least one link.
    pub fn linked_albums(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT ot.album
             FROM tracks ot
             JOIN track_links tl ON ot.id = tl.owntone_track_id
             WHERE ot.album IS NOT NULL
             ORDER BY ot.album",
        )?;
        let rows = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Mark one track as reviewed. Returns false if it was already marked.
    pub fn mark_fixed(&self, track_id: i64) -> Result<bool> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO fixed_tracks (track_id) VALUES (?1)",
            params![track_id],
        )?;
        Ok(n > 0)
    }

    /// Mark `track_id` and every track on the same album. Returns the number newly marked.
    pub fn mark_album_fixed(&self, track_id: i64) -> Result<usize> {
        let n = self.conn.execute(
            "INSERT OR IGNORE INTO fixed_tracks (track_id)
             SELECT id FROM tracks
             WHERE id = ?1
                OR album_id = (SELECT album_id FROM tracks WHERE id = ?1)",
            params![track_id],
        )?;
        Ok(n)
    }

    /// Overwrite artist/album/title of a local track copy.
    /// Returns false if no such track exists.
    pub fn update_track_tags(&self, track_id: i64, artist: &str, album: &str, title: &str) -> Result<bool> {
        let n = self.conn.execute(
            "UPDATE tracks SET artist = ?1, album = ?2, title = ?3 WHERE id = ?4",
            params![artist, album, title, track_id],
        )?;
        Ok(n > 0)
    }

    /// Unlinked iTunes tracks together with the unlinked server tracks whose
    /// title and artist match case-insensitively.
    ///
    /// Tracks without any candidate are included with an empty list.
    pub fn unmatched_tracks(&self) -> Result<Vec<UnmatchedTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT it.track_id, it.name, it.artist, it.album,
                    t.id, t.title, t.artist, t.album, t.path
             FROM itunes_tracks it
             LEFT JOIN tracks t
               ON LOWER(it.name) = LOWER(t.title)
              AND LOWER(it.artist) = LOWER(t.artist)
              AND t.id NOT IN (SELECT owntone_track_id FROM track_links)
             WHERE it.track_id NOT IN (SELECT itunes_track_id FROM track_links)
             ORDER BY it.track_id, t.id",
        )?;

        let mut rows = stmt.query([])?;
        let mut out: Vec<UnmatchedTrack> = Vec::new();
        while let Some(row) = rows.next()? {
            let track_id: i64 = row.get(0)?;
            if out.last().map(|u| u.track_id) != Some(track_id) {
                out.push(UnmatchedTrack {
                    track_id,
                    title: row.get(1)?,
                    artist: row.get(2)?,
                    album: row.get(3)?,
                    candidates: Vec::new(),
                });
            }
            let candidate_id: Option<i64> = row.get(4)?;
            if let (Some(id), Some(current)) = (candidate_id, out.last_mut()) {
                current.candidates.push(TrackSummary {
                    id,
                    title: row.get(5)?,
                    artist: row.get(6)?,
                    album: row.get(7)?,
                    path: row.get(8)?,
                });
            }
        }
        Ok(out)
    }

    /// Linked pairs where iTunes has a rating and the server has none.
    pub fn unrated_tracks(&self) -> Result<Vec<UnratedTrack>> {
        let mut stmt = self.conn.prepare(
            "SELECT tl.itunes_track_id, ot.id, ot.title, ot.artist, ot.album, it.rating
             FROM track_links tl
             JOIN itunes_tracks it ON it.track_id = tl.itunes_track_id
             JOIN tracks ot ON ot.id = tl.owntone_track_id
             WHERE COALESCE(it.rating, 0) > 0
               AND COALESCE(ot.rating, 0) = 0
             ORDER BY ot.artist, ot.album, ot.track_number",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UnratedTrack {
                    itunes_track_id: row.get(0)?,
                    server_track_id: row.get(1)?,
                    title: row.get(2)?,
                    artist: row.get(3)?,
                    album: row.get(4)?,
                    itunes_rating: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// iTunes play statistics for every linked server track.
    pub fn play_stats(&self) -> Result<Vec<PlayStats>> {
        let mut stmt = self.conn.prepare(
            "SELECT tl.owntone_track_id, it.name, it.artist, it.skip_count, it.skip_date,
                    it.rating, it.date_added, it.play_count, it.play_date
             FROM itunes_tracks it
             JOIN track_links tl ON it.track_id = tl.itunes_track_id
             ORDER BY tl.owntone_track_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PlayStats {
                    server_track_id: row.get(0)?,
                    name: row.get(1)?,
                    artist: row.get(2)?,
                    skip_count: row.get(3)?,
                    skip_date: row.get(4)?,
                    rating: row.get(5)?,
                    date_added: row.get(6)?,
                    play_count: row.get(7)?,
                    play_date: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Get library statistics.
    pub fn stats(&self) -> Result<LibraryStats> {
        let count = |sql: &str| -> Result<i64> {
            Ok(self.conn.query_row(sql, [], |row| row.get(0))?)
        };

        let mut method_stmt = self.conn.prepare(
            "SELECT method, COUNT(*) FROM track_links GROUP BY method ORDER BY COUNT(*) DESC",
        )?;
        let links_by_method: Vec<(String, i64)> = method_stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(LibraryStats {
            artists: count("SELECT COUNT(*) FROM artists")?,
            albums: count("SELECT COUNT(*) FROM albums")?,
            server_tracks: count("SELECT COUNT(*) FROM tracks")?,
            itunes_tracks: count("SELECT COUNT(*) FROM itunes_tracks")?,
            links: count("SELECT COUNT(*) FROM track_links")?,
            links_by_method,
            fixed_tracks: count("SELECT COUNT(*) FROM fixed_tracks")?,
            unlinked_itunes: count(
                "SELECT COUNT(*) FROM itunes_tracks
                 WHERE track_id NOT IN (SELECT itunes_track_id FROM track_links)",
            )?,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn server_track(id: i64, title: &str, artist: &str, album: &str, album_id: &str) -> ServerTrack {
        ServerTrack {
            id,
            title: Some(title.into()),
            artist: Some(artist.into()),
            album: Some(album.into()),
            album_id: Some(album_id.into()),
            path: Some(format!("/music/Music/{artist}/{album}/{id:02} {title}.mp3")),
            ..Default::default()
        }
    }

    pub(crate) fn itunes_track(id: i64, name: &str, artist: &str) -> ItunesTrack {
        ItunesTrack {
            track_id: id,
            name: Some(name.into()),
            artist: Some(artist.into()),
            ..Default::default()
        }
    }

    fn row_count(db: &Database, table: &str) -> i64 {
        db.conn
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn test_upsert_artist_twice_keeps_one_row() {
        let db = Database::open_in_memory().unwrap();
        let mut a = Artist {
            id: "100".into(),
            name: Some("Beatles".into()),
            ..Default::default()
        };
        db.upsert_artist(&a).unwrap();
        a.name = Some("The Beatles".into());
        db.upsert_artist(&a).unwrap();

        assert_eq!(row_count(&db, "artists"), 1);
        let name: String = db
            .conn
            .query_row("SELECT name FROM artists WHERE id = '100'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(name, "The Beatles");
        assert_eq!(db.artist_ids().unwrap(), vec!["100".to_string()]);
    }

    #[test]
    fn test_upsert_album_and_track() {
        let db = Database::open_in_memory().unwrap();
        let album = Album {
            id: "a1".into(),
            name: Some("Abbey Road".into()),
            artist_id: Some("100".into()),
            year: Some(1969),
            ..Default::default()
        };
        db.upsert_album(&album).unwrap();
        db.upsert_album(&album).unwrap();
        assert_eq!(db.album_ids().unwrap(), vec!["a1".to_string()]);

        let mut t = server_track(1, "Come Together", "The Beatles", "Abbey Road", "a1");
        db.upsert_server_track(&t).unwrap();
        t.rating = Some(80);
        db.upsert_server_track(&t).unwrap();
        assert_eq!(row_count(&db, "tracks"), 1);
        let rating: i64 = db
            .conn
            .query_row("SELECT rating FROM tracks WHERE id = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rating, 80);
    }

    #[test]
    fn test_upsert_itunes_track_stores_raw() {
        let db = Database::open_in_memory().unwrap();
        let mut t = itunes_track(7, "Something", "The Beatles");
        t.raw.insert("Track ID".into(), serde_json::json!(7));
        t.raw.insert("Compilation".into(), serde_json::json!(true));
        db.upsert_itunes_track(&t).unwrap();
        db.upsert_itunes_track(&t).unwrap();

        assert_eq!(row_count(&db, "itunes_tracks"), 1);
        let raw: String = db
            .conn
            .query_row("SELECT raw FROM itunes_tracks WHERE track_id = 7", [], |r| r.get(0))
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["Compilation"], serde_json::json!(true));
    }

    #[test]
    fn test_link_exact_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(2, "Yesterday", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "Help!", "The Beatles")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "yesterday", "The Beatles")).unwrap();

        assert_eq!(db.link_exact_matches().unwrap(), 1);
        assert_eq!(db.link_exact_matches().unwrap(), 0);
        assert_eq!(row_count(&db, "track_links"), 1);
    }

    #[test]
    fn test_insert_link_reports_duplicates() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_link(1, 2, LinkMethod::Manual).unwrap());
        assert!(!db.insert_link(1, 2, LinkMethod::Manual).unwrap());
        let method: String = db
            .conn
            .query_row("SELECT method FROM track_links", [], |r| r.get(0))
            .unwrap();
        assert_eq!(method, "manual");
    }

    #[test]
    fn test_matched_pairs_filters() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(2, "Angie", "The Rolling Stones", "Goats Head Soup", "a2")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "Help!", "The Beatles")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "Angie", "The Rolling Stones")).unwrap();
        db.link_exact_matches().unwrap();

        assert_eq!(db.matched_pairs(None, None).unwrap().len(), 2);
        let beatles = db.matched_pairs(Some("The Beatles"), None).unwrap();
        assert_eq!(beatles.len(), 1);
        assert_eq!(beatles[0].server_title.as_deref(), Some("Help!"));
        assert_eq!(db.matched_pairs(None, Some("Goats Head Soup")).unwrap().len(), 1);
        assert!(db.matched_pairs(Some("The Beatles"), Some("Goats Head Soup")).unwrap().is_empty());

        assert_eq!(db.linked_artists().unwrap(), vec!["The Beatles", "The Rolling Stones"]);
        assert_eq!(db.linked_albums().unwrap(), vec!["Goats Head Soup", "Help!"]);
    }

    #[test]
    fn test_mark_fixed_twice_is_noop() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        assert!(db.mark_fixed(1).unwrap());
        assert!(!db.mark_fixed(1).unwrap());
        assert!(db.unfixed_tracks().unwrap().is_empty());
    }

    #[test]
    fn test_mark_album_fixed_marks_siblings_once() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(2, "Yesterday", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(3, "Angie", "The Rolling Stones", "Goats Head Soup", "a2")).unwrap();
        db.mark_fixed(2).unwrap();

        assert_eq!(db.mark_album_fixed(1).unwrap(), 1);
        assert_eq!(row_count(&db, "fixed_tracks"), 2);
        let unfixed = db.unfixed_tracks().unwrap();
        assert_eq!(unfixed.len(), 1);
        assert_eq!(unfixed[0].id, 3);
    }

    #[test]
    fn test_update_track_tags() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Hlep", "Beatles", "Help", "a1")).unwrap();
        assert!(db.update_track_tags(1, "The Beatles", "Help!", "Help!").unwrap());
        assert!(!db.update_track_tags(99, "x", "y", "z").unwrap());
        let t = db.server_track(1).unwrap().unwrap();
        assert_eq!(t.title.as_deref(), Some("Help!"));
        assert_eq!(t.artist.as_deref(), Some("The Beatles"));
        assert_eq!(t.album.as_deref(), Some("Help!"));
        assert!(db.server_track(99).unwrap().is_none());
    }

    #[test]
    fn test_search_tracks_substring() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(2, "Helpless", "Neil Young", "Deja Vu", "a2")).unwrap();
        assert_eq!(db.search_tracks("Help", "").unwrap().len(), 2);
        let r = db.search_tracks("help", "beatles").unwrap();
        assert_eq!(r.len(), 1);
        assert_eq!(r[0].id, 1);
    }

    #[test]
    fn test_unmatched_tracks_groups_candidates() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_server_track(&server_track(2, "HELP!", "the beatles", "1", "a3")).unwrap();
        db.upsert_server_track(&server_track(3, "Angie, Live", "The Rolling Stones", "Live", "a2")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "help!", "The Beatles")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "Angie, live", "The Rolling Stones")).unwrap();
        db.upsert_itunes_track(&itunes_track(12, "Nothing Here", "Nobody")).unwrap();

        let unmatched = db.unmatched_tracks().unwrap();
        assert_eq!(unmatched.len(), 3);
        assert_eq!(unmatched[0].track_id, 10);
        assert_eq!(unmatched[0].candidates.iter().map(|c| c.id).collect::<Vec<_>>(), vec![1, 2]);
        // Commas in titles survive grouping
        assert_eq!(unmatched[1].candidates[0].title.as_deref(), Some("Angie, Live"));
        assert!(unmatched[2].candidates.is_empty());

        // Linking removes both sides from the report
        db.insert_link(10, 1, LinkMethod::Manual).unwrap();
        let unmatched = db.unmatched_tracks().unwrap();
        assert_eq!(unmatched.len(), 2);
        assert!(unmatched.iter().all(|u| u.track_id != 10));
    }

    #[test]
    fn test_unrated_tracks() {
        let db = Database::open_in_memory().unwrap();
        let mut rated = server_track(1, "Help!", "The Beatles", "Help!", "a1");
        rated.rating = Some(60);
        db.upsert_server_track(&rated).unwrap();
        db.upsert_server_track(&server_track(2, "Yesterday", "The Beatles", "Help!", "a1")).unwrap();
        for (id, name) in [(10, "Help!"), (11, "Yesterday")] {
            let mut t = itunes_track(id, name, "The Beatles");
            t.rating = Some(100);
            db.upsert_itunes_track(&t).unwrap();
        }
        db.link_exact_matches().unwrap();

        let unrated = db.unrated_tracks().unwrap();
        assert_eq!(unrated.len(), 1);
        assert_eq!(unrated[0].server_track_id, 2);
        assert_eq!(unrated[0].itunes_rating, 100);
    }

    #[test]
    fn test_stats_counts() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.server_tracks, 0);
        assert_eq!(stats.links, 0);

        db.upsert_server_track(&server_track(1, "Help!", "The Beatles", "Help!", "a1")).unwrap();
        db.upsert_itunes_track(&itunes_track(10, "Help!", "The Beatles")).unwrap();
        db.upsert_itunes_track(&itunes_track(11, "Other", "The Beatles")).unwrap();
        db.link_exact_matches().unwrap();

        let stats = db.stats().unwrap();
        assert_eq!(stats.server_tracks, 1);
        assert_eq!(stats.itunes_tracks, 2);
        assert_eq!(stats.links, 1);
        assert_eq!(stats.unlinked_itunes, 1);
        assert_eq!(stats.links_by_method, vec![("exact".to_string(), 1)]);
    }
}
