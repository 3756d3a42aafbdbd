//! # Command-Line Interface Module
//!
//! Clap definitions for the `karaoke` binary.
//!
//! ## Commands
//!
//! - `run`: Start the interactive jukebox console
//! - `lookup`: Resolve one song code
//! - `list`: Print the whole catalog
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! karaoke run --db-path /media/usb --cost 2
//! karaoke lookup 10001
//! karaoke list
//! ```

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};
use path_absolutize::Absolutize;
use std::path::PathBuf;

/// Shell types supported for completion generation
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    /// PowerShell
    PowerShell,
    /// Elvish shell
    Elvish,
}

#[derive(Parser, Debug)]
#[command(name = "karaoke")]
#[command(about = "Karaoke jukebox: song catalog, credits and playback queue")]
#[command(version)]
pub struct Args {
    #[command(flatten)]
    pub overrides: Overrides,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Settings that can be forced from the command line for one run.
#[derive(ClapArgs, Debug, Default, Clone)]
pub struct Overrides {
    /// Directory holding db.ini and the media files
    ///
    /// Overrides the stored location for this run without persisting it.
    #[arg(long, global = true, env = "KARAOKE_DB_PATH", value_hint = clap::ValueHint::DirPath)]
    pub db_path: Option<PathBuf>,

    /// Credits charged per song
    #[arg(long, global = true)]
    pub cost: Option<u32>,

    /// Credits added per coin
    #[arg(long, global = true)]
    pub credit_value: Option<u32>,

    /// Play without charging credits
    #[arg(long, global = true)]
    pub free_play: bool,
}

impl Overrides {
    /// `db_path` made absolute against the working directory.
    pub fn absolute_db_path(&self) -> std::io::Result<Option<PathBuf>> {
        self.db_path
            .as_deref()
            .map(|path| path.absolutize().map(|p| p.into_owned()))
            .transpose()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the interactive jukebox console
    ///
    /// Reads commands from stdin: digits request a song, `q <code>` queues
    /// one, `c` inserts a coin. Type `help` inside the console for the rest.
    Run,

    /// Look up one song code
    Lookup {
        /// Numeric song code, as typed on the keypad
        #[arg(value_hint = clap::ValueHint::Other)]
        code: String,
    },

    /// List every song in the index
    List,

    /// Generate shell completions
    ///
    /// Usage: karaoke completion bash > ~/.local/share/bash-completion/completions/karaoke
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },

    /// List song codes for completion (hidden command)
    #[command(hide = true)]
    CompleteCodes,
}
