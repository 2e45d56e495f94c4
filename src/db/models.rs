use serde::Deserialize;

/// An artist as returned by `/api/library/artists`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Artist {
    pub id: String,
    pub name: Option<String>,
    pub name_sort: Option<String>,
    pub album_count: Option<i64>,
    pub track_count: Option<i64>,
    pub length_ms: Option<i64>,
    pub time_added: Option<String>,
    pub in_progress: Option<bool>,
    pub media_kind: Option<String>,
    pub data_kind: Option<String>,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
}

/// An album as returned by `/api/library/artists/{id}/albums`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Album {
    pub id: String,
    pub name: Option<String>,
    pub name_sort: Option<String>,
    pub artist: Option<String>,
    pub artist_id: Option<String>,
    pub track_count: Option<i64>,
    pub length_ms: Option<i64>,
    pub time_added: Option<String>,
    pub in_progress: Option<bool>,
    pub media_kind: Option<String>,
    pub data_kind: Option<String>,
    pub date_released: Option<String>,
    pub year: Option<i64>,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
}

/// A track as returned by `/api/library/albums/{id}/tracks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerTrack {
    pub id: i64,
    pub title: Option<String>,
    pub title_sort: Option<String>,
    pub artist: Option<String>,
    pub artist_sort: Option<String>,
    pub album: Option<String>,
    pub album_sort: Option<String>,
    pub album_id: Option<String>,
    pub album_artist: Option<String>,
    pub album_artist_sort: Option<String>,
    pub album_artist_id: Option<String>,
    pub genre: Option<String>,
    pub comment: Option<String>,
    pub year: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub length_ms: Option<i64>,
    pub rating: Option<i64>,
    pub play_count: Option<i64>,
    pub skip_count: Option<i64>,
    pub time_added: Option<String>,
    pub date_released: Option<String>,
    pub seek_ms: Option<i64>,
    #[serde(rename = "type")]
    pub file_type: Option<String>,
    pub samplerate: Option<i64>,
    pub bitrate: Option<i64>,
    pub channels: Option<i64>,
    pub usermark: Option<i64>,
    pub media_kind: Option<String>,
    pub data_kind: Option<String>,
    pub path: Option<String>,
    pub uri: Option<String>,
    pub artwork_url: Option<String>,
}

/// One track dict from an iTunes `Library.xml`.
#[derive(Debug, Clone, Default)]
pub struct ItunesTrack {
    pub track_id: i64,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub genre: Option<String>,
    pub kind: Option<String>,
    pub location: Option<String>,
    pub total_time: Option<i64>,
    pub track_number: Option<i64>,
    pub disc_number: Option<i64>,
    pub year: Option<i64>,
    pub rating: Option<i64>,
    pub play_count: Option<i64>,
    /// HFS+ seconds (since 1904-01-01), as iTunes stores it.
    pub play_date: Option<i64>,
    pub skip_count: Option<i64>,
    pub skip_date: Option<String>,
    pub date_added: Option<String>,
    /// Every key of the dict, verbatim.
    pub raw: serde_json::Map<String, serde_json::Value>,
}

/// How a link between the two libraries was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkMethod {
    Exact,
    Normalized,
    Manual,
}

impl LinkMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Normalized => "normalized",
            Self::Manual => "manual",
        }
    }
}

/// A linked iTunes / server pair, as shown on the review index page.
#[derive(Debug, Clone)]
pub struct MatchedPair {
    pub itunes_name: Option<String>,
    pub itunes_artist: Option<String>,
    pub itunes_album: Option<String>,
    pub itunes_rating: Option<i64>,
    pub server_title: Option<String>,
    pub server_artist: Option<String>,
    pub server_album: Option<String>,
    pub server_rating: Option<i64>,
}

/// Minimal view of a server track: id + tags + path.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackSummary {
    pub id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: Option<String>,
}

/// A server track whose tags disagree with its filesystem path.
#[derive(Debug, Clone)]
pub struct DriftedTrack {
    pub id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub path: String,
    pub parsed_title: String,
    pub parsed_artist: String,
    pub parsed_album: Option<String>,
}

/// An iTunes track with no link, plus the server tracks it could be linked to.
#[derive(Debug, Clone)]
pub struct UnmatchedTrack {
    pub track_id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub candidates: Vec<TrackSummary>,
}

/// A linked pair where iTunes holds a rating the server lacks.
#[derive(Debug, Clone)]
pub struct UnratedTrack {
    pub itunes_track_id: i64,
    pub server_track_id: i64,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub itunes_rating: i64,
}

/// iTunes play statistics for one linked server track.
#[derive(Debug, Clone, Default)]
pub struct PlayStats {
    pub server_track_id: i64,
    pub name: Option<String>,
    pub artist: Option<String>,
    pub skip_count: Option<i64>,
    pub skip_date: Option<String>,
    pub rating: Option<i64>,
    pub date_added: Option<String>,
    pub play_count: Option<i64>,
    pub play_date: Option<i64>,
}

/// Library statistics.
#[derive(Debug)]
pub struct LibraryStats {
    pub artists: i64,
    pub albums: i64,
    pub server_tracks: i64,
    pub itunes_tracks: i64,
    pub links: i64,
    pub links_by_method: Vec<(String, i64)>,
    pub fixed_tracks: i64,
    pub unlinked_itunes: i64,
}
