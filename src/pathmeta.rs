use regex::Regex;
use std::sync::LazyLock;

/// Tags recovered from a server file path.
#[derive(Debug, Default, PartialEq)]
pub struct PathMeta {
    pub artist: String,
    pub album: Option<String>,
    /// File name with any leading track number removed (extension kept).
    pub track: String,
}

// "01 Title", "7 Title"
static TRACK_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}\s+(?P<rest>.*)$").unwrap()
});

// "1-01 Title" (disc-track)
static DISC_TRACK_NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{1,2}-\d{1,2}\s+(?P<rest>.*)$").unwrap()
});

static EXTENSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.[^.]+$").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static PUNCTUATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Parse `{root}/{artist}/{album}/{file}` or `{root}/{artist}/{file}`.
///
/// Anything deeper, shallower, or outside `root` yields `None`.
pub fn parse_path(root: &str, path: &str) -> Option<PathMeta> {
    let root = root.trim_end_matches('/');
    let rest = path.strip_prefix(root)?.strip_prefix('/')?;

    let parts: Vec<&str> = rest.split('/').collect();
    if parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    match parts.as_slice() {
        [artist, album, file] => Some(PathMeta {
            artist: artist.to_string(),
            album: Some(album.to_string()),
            track: remove_track_number(file).to_string(),
        }),
        [artist, file] => Some(PathMeta {
            artist: artist.to_string(),
            album: None,
            track: remove_track_number(file).to_string(),
        }),
        _ => None,
    }
}

/// Strip a leading `NN ` or `N-NN ` track prefix.
pub fn remove_track_number(name: &str) -> &str {
    for re in [&*TRACK_NUMBER_RE, &*DISC_TRACK_NUMBER_RE] {
        if let Some(rest) = re.captures(name).and_then(|c| c.name("rest")) {
            return rest.as_str();
        }
    }
    name
}

/// Drop a trailing `.ext`, if any.
pub fn strip_extension(name: &str) -> &str {
    match EXTENSION_RE.find(name) {
        Some(m) => &name[..m.start()],
        None => name,
    }
}

/// Canonical form for tag comparison: trimmed, single-spaced, lowercase,
/// with everything that is not a word character or whitespace removed.
pub fn normalize(s: Option<&str>) -> String {
    let Some(s) = s else {
        return String::new();
    };
    let collapsed = WHITESPACE_RE.replace_all(s.trim(), " ").to_lowercase();
    PUNCTUATION_RE.replace_all(&collapsed, "").into_owned()
}
