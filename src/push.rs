//! Push iTunes play statistics into the media server's own `files` table.

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::PlayStats;
use crate::db::{Database, Result};

/// Seconds between the HFS+ epoch (1904-01-01) and the Unix epoch.
const HFS_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Result of a push run.
#[derive(Debug, Default, PartialEq)]
pub struct PushResult {
    pub updated: usize,
    /// Linked server ids that have no row in `files`.
    pub missing: usize,
}

/// Parse an iTunes `YYYY-MM-DDTHH:MM:SSZ` date into Unix seconds; 0 if absent or malformed.
pub fn parse_itunes_date(date: Option<&str>) -> i64 {
    date.and_then(|d| NaiveDateTime::parse_from_str(d, "%Y-%m-%dT%H:%M:%SZ").ok())
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

/// Convert an HFS+ timestamp into Unix seconds, clamped at 0.
pub fn hfs_to_unix(hfs: Option<i64>) -> i64 {
    hfs.map(|s| s.saturating_sub(HFS_EPOCH_OFFSET).max(0)).unwrap_or(0)
}

/// Play statistics of every linked iTunes track, keyed by server id.
pub fn collect_stats(db: &Database) -> Result<Vec<PlayStats>> {
    let stats = db.play_stats()?;
    log::info!("Collected play statistics for {} linked tracks", stats.len());
    Ok(stats)
}

/// Apply iTunes statistics to the server's `files` table.
///
/// Counts are added to the server's counts, `rating` and `time_added` are
/// overwritten, and play/skip times keep whichever is later. With `dry_run`
/// the transaction is rolled back.
pub fn push_stats(files: &Connection, stats: &[PlayStats], dry_run: bool) -> Result<PushResult> {
    let tx = files.unchecked_transaction()?;
    let mut result = PushResult::default();

    for s in stats {
        let current: Option<(Option<i64>, Option<i64>, Option<i64>, Option<i64>)> = tx
            .query_row(
                "SELECT time_skipped, time_played, play_count, skip_count FROM files WHERE id = ?1",
                params![s.server_track_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .optional()?;

        let Some((current_skipped, current_played, current_plays, current_skips)) = current else {
            log::debug!("Server track {} not in files table", s.server_track_id);
            result.missing += 1;
            continue;
        };

        let skip_date = parse_itunes_date(s.skip_date.as_deref());
        let play_date = hfs_to_unix(s.play_date);
        let time_skipped = skip_date.max(current_skipped.unwrap_or(0));
        let time_played = play_date.max(current_played.unwrap_or(0));
        let plays = current_plays.unwrap_or(0);
        let skips = current_skips.unwrap_or(0);
        log::info!(
            "{} - {} (id {}): plays {} -> {}, skips {} -> {}, rating {:?}",
            s.artist.as_deref().unwrap_or("?"),
            s.name.as_deref().unwrap_or("?"),
            s.server_track_id,
            plays,
            plays.saturating_add(s.play_count.unwrap_or(0)),
            skips,
            skips.saturating_add(s.skip_count.unwrap_or(0)),
            s.rating,
        );

        tx.execute(
            "UPDATE files SET
                skip_count = ?1,
                play_count = ?2,
                rating = ?3,
                time_added = ?4,
                time_skipped = ?5,
                time_played = ?6
             WHERE id = ?7",
            params![
                skips.saturating_add(s.skip_count.unwrap_or(0)),
                plays.saturating_add(s.play_count.unwrap_or(0)),
                s.rating.unwrap_or(0),
                parse_itunes_date(s.date_added.as_deref()),
                time_skipped,
                time_played,
                s.server_track_id,
            ],
        )?;
        result.updated += 1;
    }

    if dry_run {
        tx.rollback()?;
        log::info!("Dry run: rolled back {} updates", result.updated);
    } else {
        tx.commit()?;
    }
    Ok(result)
}
