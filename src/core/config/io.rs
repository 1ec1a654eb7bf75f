use directories::ProjectDirs;
use serde::Deserialize;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{ConnectionConfig, Timeouts};

/// User settings read from `config.toml`. Every key is optional.
#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Server address, e.g. `127.0.0.1:11434`
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    /// `0` disables the limit
    pub chat_timeout_secs: Option<u64>,
}

impl Settings {
    pub fn connection(&self) -> Option<ConnectionConfig> {
        self.base_url.as_deref().map(ConnectionConfig::new)
    }

    pub fn timeouts(&self) -> Timeouts {
        let defaults = Timeouts::default();
        Timeouts {
            connect: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connect),
            chat: self
                .chat_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.chat),
            probe: defaults.probe,
        }
    }
}

/// Errors that can occur when loading settings from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the settings file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(
                    f,
                    "Failed to read config at {}: {}",
                    path_display(path),
                    source
                )
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path_display(path),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

impl Settings {
    /// Load from the platform config directory; a missing file yields defaults.
    pub fn load() -> Result<Settings, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from_path(&path),
            None => Ok(Settings::default()),
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Settings, ConfigError> {
        if !config_path.exists() {
            return Ok(Settings::default());
        }

        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "palaver", "palaver")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

/// Render a path for messages, abbreviating the home directory as `~`.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
