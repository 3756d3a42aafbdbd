//! Error types for catalog lookups and session operations.
//!
//! None of these are process-fatal: every failure is recovered by the
//! operation that requested it (a dropped song request, a timed notice).

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or querying the song catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The index resource could not be read.
    #[error("song index unavailable at {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The index was read but no usable catalog could be built from it.
    #[error("song index at {} is malformed: {reason}", path.display())]
    ParseError { path: PathBuf, reason: String },

    /// The code has no entry in the catalog.
    #[error("no song with code {0}")]
    NotFound(String),

    /// No source path has been configured yet.
    #[error("no song index location configured")]
    NoSourcePath,
}

impl CatalogError {
    /// True when the whole catalog is unusable, as opposed to a single missing code.
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, CatalogError::NotFound(_))
    }
}

/// Errors raised by the session controller.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Balance is below the configured cost per song.
    #[error("insufficient credits: balance {balance}, song costs {cost}")]
    InsufficientCredits { balance: u32, cost: u32 },

    /// The requested code could not be resolved.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// `report_playback_ended` was called with nothing playing.
    #[error("nothing is playing")]
    NotPlaying,

    /// A timer was needed but no Tokio runtime is running on this thread.
    #[error("no async runtime available to schedule the score screen")]
    NoRuntime,

    /// The code is not a numeric song code.
    #[error("invalid song code: {0:?}")]
    InvalidCode(String),
}

/// Errors raised while reading, changing or persisting settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the system data directory")]
    NoDataDir,

    #[error("settings I/O failed for {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("stored settings at {} are invalid: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("unknown setting {0:?}")]
    UnknownSetting(String),

    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;
pub type SessionResult<T> = std::result::Result<T, SessionError>;
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
