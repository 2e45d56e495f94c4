use std::path::PathBuf;

use directories::ProjectDirs;
use serde::Deserialize;

/// Application configuration loaded from TOML config file.
/// All fields have sensible defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Custom database path (overrides XDG default).
    pub db_path: Option<PathBuf>,
    /// iTunes `Library.xml` export (used when `import-itunes` has no CLI arg).
    pub itunes_xml: Option<PathBuf>,
    /// Media server settings.
    pub server: ServerConfig,
    /// Review UI settings.
    pub web: WebConfig,
}

/// Media server (OwnTone) configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the JSON API, without the `/api` suffix.
    pub base_url: String,
    /// Pause between per-artist / per-album requests in milliseconds.
    pub rate_limit_ms: u64,
    /// Global timeout for a single request.
    pub timeout_secs: u64,
    /// Directory the server sees as the top of the music tree.
    /// Paths are parsed as `{music_root}/{artist}[/{album}]/{file}`.
    pub music_root: String,
    /// The server's own SQLite database (holds the `files` table).
    pub files_db: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3689".to_string(),
            rate_limit_ms: 0,
            timeout_secs: 30,
            music_root: "/music/Music".to_string(),
            files_db: None,
        }
    }
}

/// Review UI configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    pub bind: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl AppConfig {
    /// Load config from `~/.config/tunelink/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match std::fs::read_to_string(&path) {
                Ok(contents) => Self::parse(&contents).unwrap_or_else(|e| {
                    log::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }),
                Err(e) => {
                    log::warn!("Failed to read {}: {}. Using defaults.", path.display(), e);
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Parse config from TOML text.
    pub fn parse(contents: &str) -> Result<Self, toml::de::Error> {
        let config = toml::from_str::<AppConfig>(contents)?;
        log::info!("Loaded config ({} server)", config.server.base_url);
        Ok(config)
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Resolve the default database path using XDG data directory.
pub fn default_db_path() -> PathBuf {
    if let Some(dirs) = ProjectDirs::from("", "", crate::APP_NAME) {
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).ok();
        data_dir.join("tunelink.db")
    } else {
        // Fallback: current directory
        PathBuf::from("tunelink.db")
    }
}
