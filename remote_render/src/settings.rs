use crate::{client::HealthStatus, models::quality::Quality};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};
use thiserror::Error;
use url::Url;

// path to config files
const SETTINGS_DIR: &str = "RemoteRender";
pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Overrides the base configuration directory, for portable setups and tests.
pub const CONFIG_HOME_ENV: &str = "REMOTE_RENDER_CONFIG_HOME";

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("No configuration directory available on this system")]
    NoConfigDir,
    #[error("Unable to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Settings file {path} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid server URL {0:?}: must be an http or https address")]
    InvalidServerUrl(String),
    #[error("Invalid frame range {start}..{end}: frames start at 1 and end must not precede start")]
    InvalidFrameRange { start: u32, end: u32 },
}

/// Resolve the directory holding settings and the job list, creating it when needed.
pub fn config_dir() -> Result<PathBuf, SettingsError> {
    let base = match std::env::var_os(CONFIG_HOME_ENV) {
        Some(path) => PathBuf::from(path),
        None => dirs::config_dir().ok_or(SettingsError::NoConfigDir)?,
    };
    let path = base.join(SETTINGS_DIR);
    fs::create_dir_all(&path).map_err(|source| SettingsError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Session configuration. Only the interactive side writes to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    server_url: String,
    start_frame: u32,
    end_frame: u32,
    quality: Quality,
    show_notifications: bool,
    server_status: String,
    last_check: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            start_frame: 1,
            end_frame: 1,
            quality: Quality::default(),
            show_notifications: true,
            server_status: UNKNOWN_STATUS.to_owned(),
            last_check: String::new(),
        }
    }
}

impl Settings {
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    pub fn set_server_url(&mut self, url: &str) -> Result<(), SettingsError> {
        let url = url.trim().trim_end_matches('/');
        validate_server_url(url)?;
        self.server_url = url.to_owned();
        Ok(())
    }

    pub fn frame_range(&self) -> (u32, u32) {
        (self.start_frame, self.end_frame)
    }

    pub fn set_frame_range(&mut self, start: u32, end: u32) -> Result<(), SettingsError> {
        validate_frame_range(start, end)?;
        self.start_frame = start;
        self.end_frame = end;
        Ok(())
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: Quality) {
        self.quality = quality;
    }

    pub fn show_notifications(&self) -> bool {
        self.show_notifications
    }

    pub fn set_show_notifications(&mut self, enabled: bool) {
        self.show_notifications = enabled;
    }

    pub fn server_status(&self) -> &str {
        &self.server_status
    }

    pub fn last_check(&self) -> &str {
        &self.last_check
    }

    /// Remember the outcome of a connection test. The check time only moves on success.
    pub fn record_health(&mut self, health: &HealthStatus, at: DateTime<Local>) {
        self.server_status = health.label();
        if health.is_connected() {
            self.last_check = at.format("%H:%M:%S").to_string();
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        validate_server_url(&self.server_url)?;
        validate_frame_range(self.start_frame, self.end_frame)
    }

    pub fn default_path() -> Result<PathBuf, SettingsError> {
        Ok(config_dir()?.join(SETTINGS_FILE_NAME))
    }

    /// Load settings from the user's config directory, falling back to defaults when none exist yet.
    pub fn load() -> Result<Self, SettingsError> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let settings: Settings =
            serde_json::from_str(&data).map_err(|source| SettingsError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self) -> Result<(), SettingsError> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        self.validate()?;
        let data = serde_json::to_string_pretty(self).map_err(|source| {
            SettingsError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, data).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn validate_server_url(url: &str) -> Result<(), SettingsError> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => Ok(()),
        _ => Err(SettingsError::InvalidServerUrl(url.to_owned())),
    }
}

fn validate_frame_range(start: u32, end: u32) -> Result<(), SettingsError> {
    if start < 1 || end < start {
        return Err(SettingsError::InvalidFrameRange { start, end });
    }
    Ok(())
}
