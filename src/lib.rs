//! Karaoke jukebox core: song catalog, credits and playback queue.
//!
//! Core modules:
//! - [`catalog`] - Song index loading and the path-keyed catalog cache
//! - [`session`] - Credits, now playing, queue and the score screen
//! - [`jukebox`] - Composition of catalog, session and settings
//!
//! ### Supporting Modules
//!
//! - [`ini`] - Line parser for the `db.ini` index format
//! - [`queue`] - FIFO of pending requests with per-request identity
//! - [`score`] - Post-song score and cheer messages
//! - [`keypad`] - Digit entry buffer
//! - [`config`] - Operator settings and the persisted index location
//! - [`error`] - Error types for each layer
//! - [`cli`] - Command-line interface definitions with clap integration
//! - [`completion`] - Shell completion generation
//! - [`console`] - Interactive stdin front end
//!
//! ## Quick Start Example
//!
//! ```no_run
//! use karaoke::catalog::SongCode;
//! use karaoke::config::Settings;
//! use karaoke::jukebox::Jukebox;
//! use karaoke::session::{RequestMode, RequestOutcome};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let jukebox = Jukebox::open(Settings::default())?;
//! let session = jukebox.session();
//!
//! session.insert_coin();
//! let code = SongCode::new("10001").expect("digits");
//! match session.request_song(&code, RequestMode::PlayNow).await? {
//!     RequestOutcome::Playing(song) => println!("Playing {}", jukebox.media_path(&song).display()),
//!     RequestOutcome::Queued { position, .. } => println!("Queued at {position}"),
//! }
//!
//! // The media player reports the end of the song.
//! let score = session.report_playback_ended()?;
//! println!("{} {}", score.score, score.cheer);
//! # Ok(())
//! # }
//! ```
//!
//! ## Credits
//!
//! A song costs `credits.cost_per_song` while `credits.auto_deduct` is on.
//! The balance never goes negative, a failed lookup never charges, and a
//! cancelled queue entry is refunded exactly what it was charged.
//!
//! ## Logging
//!
//! Uses the `log` facade; the binary installs `env_logger`:
//! - `RUST_LOG=debug karaoke run`
//! - `RUST_LOG=karaoke::catalog=trace karaoke lookup 10001`

pub mod catalog;
pub mod cli;
pub mod completion;
pub mod config;
pub mod console;
pub mod error;
pub mod ini;
pub mod jukebox;
pub mod keypad;
pub mod queue;
pub mod score;
pub mod session;
