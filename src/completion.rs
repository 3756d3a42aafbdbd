//! # Shell Completion Module
//!
//! Static completion scripts via `clap_complete`, plus the hidden
//! `complete-codes` helper that prints the song codes of the current index.
//!
//! ```bash
//! karaoke completion bash > ~/.local/share/bash-completion/completions/karaoke
//! karaoke completion zsh > ~/.config/zsh/completions/_karaoke
//! ```

use crate::catalog::Catalog;
use crate::cli::Shell;
use clap::Command;
use clap_complete::{generate, Generator, Shell as CompletionShell};
use std::io::{self, Write};

/// Generate shell completions for the given shell
pub fn generate_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
}

pub fn shell_to_completion_shell(shell: &Shell) -> CompletionShell {
    match shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    }
}

/// One `code<TAB>artist - title` line per song, the format fish shows as
/// a description and other shells ignore after the tab.
pub fn write_code_completions(catalog: &Catalog, out: &mut impl Write) -> io::Result<()> {
    for entry in catalog.iter() {
        writeln!(out, "{}\t{} - {}", entry.code, entry.artist, entry.title)?;
    }
    Ok(())
}
