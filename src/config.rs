//! # Configuration Module
//!
//! Jukebox settings, grouped the way the operator menu groups them:
//! credits, playback and storage. Each field is changed through one
//! [`SettingChange`] variant; there is no string-path traversal.
//!
//! ## Persistence
//!
//! Only the song index location survives a restart. It is stored as JSON in
//! the platform data directory:
//! - Linux: `~/.local/share/karaoke/source_path.json`
//! - macOS: `~/Library/Application Support/karaoke/source_path.json`
//! - Windows: `%APPDATA%\karaoke\source_path.json`

use crate::catalog::DEFAULT_SOURCE_DIR;
use crate::error::{ConfigError, ConfigResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const APP_DIR: &str = "karaoke";
const SOURCE_PATH_FILE: &str = "source_path.json";

/// Credit accounting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreditSettings {
    /// Credits added per coin event.
    pub value: u32,
    pub cost_per_song: u32,
    /// When off, songs play without charging or checking the balance.
    pub auto_deduct: bool,
}

impl Default for CreditSettings {
    fn default() -> Self {
        Self {
            value: 1,
            cost_per_song: 1,
            auto_deduct: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoQuality {
    Low,
    Medium,
    High,
}

impl FromStr for VideoQuality {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(ConfigError::InvalidValue {
                name: "playback.video_quality",
                value: s.to_string(),
            }),
        }
    }
}

/// Playback and display timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// 0 to 100
    pub default_volume: u8,
    pub autoplay: bool,
    pub video_quality: VideoQuality,
    pub show_notes: bool,
    /// How long the score stays up before the next song starts.
    pub score_display: Duration,
    /// How long the insufficient-credits notice stays up.
    pub notice_display: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            default_volume: 75,
            autoplay: true,
            video_quality: VideoQuality::High,
            show_notes: true,
            score_display: Duration::from_secs(6),
            notice_display: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub use_external_usb: bool,
    /// Directory holding `db.ini` and the media files.
    pub db_path: PathBuf,
    pub custom_background: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            use_external_usb: false,
            db_path: PathBuf::from(DEFAULT_SOURCE_DIR),
            custom_background: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub credits: CreditSettings,
    pub playback: PlaybackSettings,
    pub storage: StorageSettings,
}

/// One settings edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    CreditValue(u32),
    CostPerSong(u32),
    AutoDeduct(bool),
    DefaultVolume(u8),
    Autoplay(bool),
    VideoQuality(VideoQuality),
    ShowNotes(bool),
    ScoreDisplay(Duration),
    NoticeDisplay(Duration),
    UseExternalUsb(bool),
    DbPath(PathBuf),
    CustomBackground(String),
}

impl SettingChange {
    /// Names accepted by [`SettingChange::parse`].
    pub const NAMES: [&'static str; 12] = [
        "credits.value",
        "credits.cost_per_song",
        "credits.auto_deduct",
        "playback.default_volume",
        "playback.autoplay",
        "playback.video_quality",
        "playback.show_notes",
        "playback.score_display_ms",
        "playback.notice_display_ms",
        "storage.use_external_usb",
        "storage.db_path",
        "storage.custom_background",
    ];

    /// Build a change from a setting name and its textual value.
    pub fn parse(name: &str, value: &str) -> ConfigResult<Self> {
        let value = value.trim();
        let change = match name.trim() {
            "credits.value" => Self::CreditValue(number("credits.value", value)?),
            "credits.cost_per_song" => Self::CostPerSong(number("credits.cost_per_song", value)?),
            "credits.auto_deduct" => Self::AutoDeduct(flag("credits.auto_deduct", value)?),
            "playback.default_volume" => {
                let volume: u8 = number("playback.default_volume", value)?;
                if volume > 100 {
                    return Err(ConfigError::InvalidValue {
                        name: "playback.default_volume",
                        value: value.to_string(),
                    });
                }
                Self::DefaultVolume(volume)
            }
            "playback.autoplay" => Self::Autoplay(flag("playback.autoplay", value)?),
            "playback.video_quality" => Self::VideoQuality(value.parse()?),
            "playback.show_notes" => Self::ShowNotes(flag("playback.show_notes", value)?),
            "playback.score_display_ms" => {
                Self::ScoreDisplay(Duration::from_millis(number("playback.score_display_ms", value)?))
            }
            "playback.notice_display_ms" => {
                Self::NoticeDisplay(Duration::from_millis(number("playback.notice_display_ms", value)?))
            }
            "storage.use_external_usb" => Self::UseExternalUsb(flag("storage.use_external_usb", value)?),
            "storage.db_path" => {
                if value.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        name: "storage.db_path",
                        value: value.to_string(),
                    });
                }
                Self::DbPath(PathBuf::from(value))
            }
            "storage.custom_background" => Self::CustomBackground(value.to_string()),
            other => return Err(ConfigError::UnknownSetting(other.to_string())),
        };
        Ok(change)
    }

    /// Parse a `name=value` pair.
    pub fn parse_assignment(assignment: &str) -> ConfigResult<Self> {
        let (name, value) = assignment
            .split_once('=')
            .ok_or_else(|| ConfigError::UnknownSetting(assignment.trim().to_string()))?;
        Self::parse(name, value)
    }
}

fn number<T: FromStr>(name: &'static str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        name,
        value: value.to_string(),
    })
}

fn flag(name: &'static str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        }),
    }
}

impl Settings {
    /// Apply one change in place.
    pub fn apply(&mut self, change: SettingChange) {
        debug!("Applying setting change {change:?}");
        match change {
            SettingChange::CreditValue(v) => self.credits.value = v,
            SettingChange::CostPerSong(v) => self.credits.cost_per_song = v,
            SettingChange::AutoDeduct(v) => self.credits.auto_deduct = v,
            SettingChange::DefaultVolume(v) => self.playback.default_volume = v.min(100),
            SettingChange::Autoplay(v) => self.playback.autoplay = v,
            SettingChange::VideoQuality(v) => self.playback.video_quality = v,
            SettingChange::ShowNotes(v) => self.playback.show_notes = v,
            SettingChange::ScoreDisplay(v) => self.playback.score_display = v,
            SettingChange::NoticeDisplay(v) => self.playback.notice_display = v,
            SettingChange::UseExternalUsb(v) => self.storage.use_external_usb = v,
            SettingChange::DbPath(v) => self.storage.db_path = v,
            SettingChange::CustomBackground(v) => self.storage.custom_background = v,
        }
    }

    /// Price actually charged per song given `auto_deduct`.
    pub fn effective_cost(&self) -> u32 {
        if self.credits.auto_deduct {
            self.credits.cost_per_song
        } else {
            0
        }
    }
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = &self.credits;
        let p = &self.playback;
        let s = &self.storage;
        writeln!(f, "credits.value = {}", c.value)?;
        writeln!(f, "credits.cost_per_song = {}", c.cost_per_song)?;
        writeln!(f, "credits.auto_deduct = {}", c.auto_deduct)?;
        writeln!(f, "playback.default_volume = {}", p.default_volume)?;
        writeln!(f, "playback.autoplay = {}", p.autoplay)?;
        writeln!(f, "playback.video_quality = {:?}", p.video_quality)?;
        writeln!(f, "playback.show_notes = {}", p.show_notes)?;
        writeln!(f, "playback.score_display_ms = {}", p.score_display.as_millis())?;
        writeln!(f, "playback.notice_display_ms = {}", p.notice_display.as_millis())?;
        writeln!(f, "storage.use_external_usb = {}", s.use_external_usb)?;
        writeln!(f, "storage.db_path = {}", s.db_path.display())?;
        write!(f, "storage.custom_background = {}", s.custom_background)
    }
}

/// Returns the platform data directory for the jukebox, creating it if needed.
pub fn get_data_dir() -> ConfigResult<PathBuf> {
    let app_dir = app_dir_in(dirs::data_dir())?;
    fs::create_dir_all(&app_dir).map_err(|source| ConfigError::Io {
        path: app_dir.clone(),
        source,
    })?;
    Ok(app_dir)
}

fn app_dir_in(data_dir: Option<PathBuf>) -> ConfigResult<PathBuf> {
    Ok(data_dir.ok_or(ConfigError::NoDataDir)?.join(APP_DIR))
}

/// Default location of the stored source path.
pub fn get_source_path_file() -> ConfigResult<PathBuf> {
    Ok(get_data_dir()?.join(SOURCE_PATH_FILE))
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPath {
    db_path: PathBuf,
}

/// Read the stored source path; `None` when nothing has been stored yet.
pub fn load_source_path(file: &Path) -> ConfigResult<Option<PathBuf>> {
    let content = match fs::read_to_string(file) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: file.to_path_buf(),
                source,
            })
        }
    };

    let stored: StoredPath = serde_json::from_str(&content).map_err(|source| ConfigError::Json {
        path: file.to_path_buf(),
        source,
    })?;
    debug!("Loaded stored song index location {}", stored.db_path.display());
    Ok(Some(stored.db_path))
}

/// Store the source path, replacing any previous value.
pub fn save_source_path(file: &Path, db_path: &Path) -> ConfigResult<()> {
    let stored = StoredPath {
        db_path: db_path.to_path_buf(),
    };
    let json = serde_json::to_string_pretty(&stored).map_err(|source| ConfigError::Json {
        path: file.to_path_buf(),
        source,
    })?;

    if let Some(parent) = file.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(file, json).map_err(|source| ConfigError::Io {
        path: file.to_path_buf(),
        source,
    })?;
    info!("Stored song index location {}", db_path.display());
    Ok(())
}
