//! Persisted user settings and process configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::activity::{DEFAULT_GRACE_PERIOD, DEFAULT_HEARTBEAT_TIMEOUT};
use crate::task::MediaFormat;

/// Directory name used under the per-user config dir.
pub const APP_NAME: &str = "yt-to-mp3-or-mp4";

const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    #[error("{}", .source)]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// The single persisted settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    pub download_path: String,
}

/// Loads and persists [`UserConfig`] as JSON.
///
/// Reads are lazy: every call goes back to disk, so edits made by another
/// process show up without a restart.
pub struct ConfigStore {
    path: PathBuf,
    default_download_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl ConfigStore {
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        Self::with_default_download_dir(config_dir, default_download_dir())
    }

    pub fn with_default_download_dir(
        config_dir: impl AsRef<Path>,
        default_download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path: config_dir.as_ref().join(CONFIG_FILE),
            default_download_dir: default_download_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Store rooted at the platform's per-user config directory.
    pub fn open_default() -> Result<Self, ConfigError> {
        let dir = dirs_next::config_dir()
            .ok_or(ConfigError::NoConfigDir)?
            .join(APP_NAME);
        Ok(Self::new(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current settings, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn load(&self) -> UserConfig {
        let fallback = || UserConfig {
            download_path: self.default_download_dir.display().to_string(),
        };

        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "config not readable, using defaults");
                return fallback();
            }
        };

        #[derive(Deserialize)]
        struct Partial {
            download_path: Option<String>,
        }

        match serde_json::from_str::<Partial>(&data) {
            Ok(Partial {
                download_path: Some(download_path),
            }) => UserConfig { download_path },
            Ok(_) => fallback(),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "config not parseable, using defaults");
                fallback()
            }
        }
    }

    /// Overwrites the persisted settings.
    pub fn save(&self, config: &UserConfig) -> Result<(), ConfigError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Expands `~`, creates the directory if needed and persists it as the
    /// new download path.
    pub fn set_download_path(&self, raw: &str) -> Result<PathBuf, ConfigError> {
        let path = expand_home(raw);
        if !path.exists() {
            std::fs::create_dir_all(&path).map_err(|source| ConfigError::CreateDir {
                path: path.clone(),
                source,
            })?;
        }

        let mut config = self.load();
        config.download_path = path.display().to_string();
        self.save(&config)?;
        info!(path = %path.display(), "download path updated");
        Ok(path)
    }

    /// Output directory for `format`, created if absent.
    pub fn target_dir(&self, format: MediaFormat) -> Result<PathBuf, ConfigError> {
        let dir = PathBuf::from(self.load().download_path).join(format.subdir());
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }
}

/// The user's Downloads folder, or `~/Downloads` when the platform does not
/// report one.
pub fn default_download_dir() -> PathBuf {
    dirs_next::download_dir()
        .or_else(|| dirs_next::home_dir().map(|home| home.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

/// Replaces a leading `~` with the home directory.
pub fn expand_home(raw: &str) -> PathBuf {
    let home = dirs_next::home_dir();
    match (raw, home) {
        ("~", Some(home)) => home,
        (s, Some(home)) if s.starts_with("~/") || s.starts_with("~\\") => home.join(&s[2..]),
        (s, _) => PathBuf::from(s),
    }
}

/// Process settings read from the environment (optionally via `.env`).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub config_dir: Option<PathBuf>,
    pub ytdlp_path: PathBuf,
    pub ffmpeg_path: Option<PathBuf>,
    pub grace_period: Duration,
    pub heartbeat_timeout: Duration,
    pub idle_shutdown: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 8000),
            config_dir: None,
            ytdlp_path: PathBuf::from("yt-dlp"),
            ffmpeg_path: None,
            grace_period: DEFAULT_GRACE_PERIOD,
            heartbeat_timeout: DEFAULT_HEARTBEAT_TIMEOUT,
            idle_shutdown: true,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup. Unparseable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parsed = |key: &str| lookup(key).and_then(|v| v.trim().parse::<u64>().ok());

        let host = lookup("TOOLSERVER_HOST")
            .and_then(|v| v.parse::<IpAddr>().ok())
            .unwrap_or(defaults.addr.ip());
        let port = lookup("TOOLSERVER_PORT")
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(defaults.addr.port());

        Self {
            addr: SocketAddr::new(host, port),
            config_dir: lookup("TOOLSERVER_CONFIG_DIR").map(PathBuf::from),
            ytdlp_path: lookup("YTDLP_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ytdlp_path),
            ffmpeg_path: lookup("FFMPEG_PATH").map(PathBuf::from),
            grace_period: parsed("IDLE_GRACE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.grace_period),
            heartbeat_timeout: parsed("HEARTBEAT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.heartbeat_timeout),
            idle_shutdown: lookup("IDLE_SHUTDOWN")
                .map(|v| !matches!(v.trim(), "0" | "false" | "off"))
                .unwrap_or(defaults.idle_shutdown),
        }
    }
}
