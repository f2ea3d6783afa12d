//! Configuration management for subfeed.
//!
//! Configuration is read from `~/.config/subfeed/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SCHEDULE_URL: &str = "https://api.anissia.net/anime/schedule/{week}";
pub const DEFAULT_CAPTION_URL: &str = "https://api.anissia.net/anime/caption/animeNo/{item}";

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub poller: PollerConfig,
    pub downloader: DownloaderConfig,
    pub http: HttpConfig,
    /// SQLite database file (default: `<data_dir>/subfeed/subfeed.db`)
    pub database_path: Option<PathBuf>,
}

/// Upstream endpoints of the schedule and caption feeds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Schedule endpoint; `{week}` is replaced by the bucket index (0-7)
    pub schedule_url: String,
    /// Caption endpoint; `{item}` is replaced by the item id
    pub caption_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            schedule_url: DEFAULT_SCHEDULE_URL.to_string(),
            caption_url: DEFAULT_CAPTION_URL.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn schedule_url_for(&self, week_index: u8) -> String {
        self.schedule_url.replace("{week}", &week_index.to_string())
    }

    pub fn caption_url_for(&self, item_id: i64) -> String {
        self.caption_url.replace("{item}", &item_id.to_string())
    }
}

/// Reconciliation loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between cycles in `watch` mode, e.g. "10m", "1h" (default: 10m)
    pub interval: String,
    /// Run a cycle immediately when `watch` starts (default: true)
    pub update_on_start: bool,
    /// Items processed concurrently within one cycle (default: 1)
    pub workers: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: "10m".to_string(),
            update_on_start: true,
            workers: 1,
        }
    }
}

/// Archive acquisition settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Where downloads and unpacked archives land (default: `<data_dir>/subfeed/downloads`)
    pub download_dir: Option<PathBuf>,
    /// Keep archives after a successful unpack (default: false)
    pub keep_archives: bool,
    /// Pages processed concurrently by `fetch` (default: 2)
    pub concurrency: usize,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            download_dir: None,
            keep_archives: false,
            concurrency: 2,
        }
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: concat!("subfeed/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path when `None`.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        Ok(config)
    }

    /// Get the default config file path: `~/.config/subfeed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDir("config"))?;
        Ok(config_dir.join("subfeed").join("config.toml"))
    }

    pub fn data_dir() -> Result<PathBuf, ConfigError> {
        let data_dir = dirs::data_dir().ok_or(ConfigError::NoDir("data"))?;
        Ok(data_dir.join("subfeed"))
    }

    pub fn database_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.database_path {
            Some(p) => Ok(p.clone()),
            None => Ok(Self::data_dir()?.join("subfeed.db")),
        }
    }

    pub fn download_dir(&self) -> Result<PathBuf, ConfigError> {
        match &self.downloader.download_dir {
            Some(p) => Ok(p.clone()),
            None => Ok(Self::data_dir()?.join("downloads")),
        }
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# subfeed configuration

# SQLite database file (defaults to the platform data directory)
# database_path = "/var/lib/subfeed/subfeed.db"

[api]
# {week} is the bucket index: 0 = Sunday ... 6 = Saturday, 7 = other
schedule_url = "https://api.anissia.net/anime/schedule/{week}"
# {item} is the item id from the schedule feed
caption_url = "https://api.anissia.net/anime/caption/animeNo/{item}"

[poller]
# Interval between cycles in watch mode ("30s", "10m", "1h", "1d")
interval = "10m"

# Run a cycle as soon as watch mode starts
update_on_start = true

# Items processed concurrently within one cycle
workers = 1

[downloader]
# download_dir = "/srv/subfeed/downloads"

# Keep archives after they have been unpacked
keep_archives = false

# Pages processed concurrently
concurrency = 2

[http]
timeout_secs = 30
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine {0} directory")]
    NoDir(&'static str),

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl From<ConfigError> for crate::app::SubfeedError {
    fn from(e: ConfigError) -> Self {
        crate::app::SubfeedError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let content = Config::default_config_content();
        let config: Config = toml::from_str(&content).expect("Default config should be valid TOML");

        assert_eq!(config.api.schedule_url, DEFAULT_SCHEDULE_URL);
        assert_eq!(config.api.caption_url, DEFAULT_CAPTION_URL);
        assert_eq!(config.poller.interval, "10m");
        assert_eq!(config.poller.workers, 1);
        assert!(!config.downloader.keep_archives);
        assert_eq!(config.http.timeout_secs, 30);
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[poller]
interval = "1m"
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.poller.interval, "1m");
        assert!(config.poller.update_on_start);
        assert_eq!(config.downloader.concurrency, 2);
        assert_eq!(config.api.schedule_url, DEFAULT_SCHEDULE_URL);
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.poller.interval, "10m");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_endpoint_templates() {
        let api = ApiConfig {
            schedule_url: "http://feed.local/schedule/{week}".into(),
            caption_url: "http://feed.local/caption/{item}".into(),
        };
        assert_eq!(api.schedule_url_for(7), "http://feed.local/schedule/7");
        assert_eq!(api.caption_url_for(4521), "http://feed.local/caption/4521");
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(config.poller.interval, "10m");

        // Second load parses the file that was just written
        let reloaded = Config::load(Some(&path)).unwrap();
        assert_eq!(reloaded.api.caption_url, DEFAULT_CAPTION_URL);
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[poller\ninterval = ").unwrap();

        let err = Config::load(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_explicit_paths_override_defaults() {
        let content = r##"
database_path = "/tmp/subfeed-test.db"

[downloader]
download_dir = "/tmp/subfeed-downloads"
"##;
        let config: Config = toml::from_str(content).unwrap();
        assert_eq!(
            config.database_path().unwrap(),
            PathBuf::from("/tmp/subfeed-test.db")
        );
        assert_eq!(
            config.download_dir().unwrap(),
            PathBuf::from("/tmp/subfeed-downloads")
        );
    }
}
