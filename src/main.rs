use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use karaoke::catalog::{FsCatalogSource, SongCode};
use karaoke::cli::{self, Overrides};
use karaoke::config::{self, Settings};
use karaoke::jukebox::Jukebox;
use karaoke::score::RandomScorer;
use karaoke::{completion, console};
use log::{debug, info};
use std::sync::Arc;

/// Settings for this run: defaults with command-line overrides applied.
fn build_jukebox(overrides: &Overrides) -> Result<Jukebox> {
    let mut settings = Settings::default();
    if let Some(cost) = overrides.cost {
        settings.credits.cost_per_song = cost;
    }
    if let Some(value) = overrides.credit_value {
        settings.credits.value = value;
    }
    if overrides.free_play {
        settings.credits.auto_deduct = false;
    }

    let db_path = overrides
        .absolute_db_path()
        .context("Failed to resolve --db-path")?;
    let jukebox = match db_path {
        Some(path) => {
            debug!("Using index location from the command line: {}", path.display());
            settings.storage.db_path = path;
            Jukebox::new(settings, Arc::new(FsCatalogSource), Box::new(RandomScorer::from_entropy()))
                .persisting_to(config::get_source_path_file()?)
        }
        None => Jukebox::open(settings)?,
    };
    Ok(jukebox)
}

/// Main entry point for the karaoke binary.
///
/// Logging is controlled via `RUST_LOG`, e.g. `RUST_LOG=debug karaoke run`.
#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = cli::Args::parse();

    match args.command {
        cli::Command::Run => {
            let mut jukebox = build_jukebox(&args.overrides)?;
            info!("Starting console with index at {}", jukebox.settings().storage.db_path.display());
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console::run(&mut jukebox, stdin).await?;
        }
        cli::Command::Lookup { code } => {
            let jukebox = build_jukebox(&args.overrides)?;
            let song_code = SongCode::new(&code).with_context(|| format!("Not a song code: {code}"))?;
            let entry = jukebox
                .catalog()
                .resolve(&song_code)
                .await
                .with_context(|| format!("Lookup of {code} failed"))?;

            println!("♫ Song: {}", entry.title);
            println!("👤 Artist: {}", entry.artist);
            println!("📝 Starts: {}", entry.first_lyric);
            println!("📀 File: {}", jukebox.media_path(&entry).display());
        }
        cli::Command::List => {
            let jukebox = build_jukebox(&args.overrides)?;
            let catalog = jukebox.catalog().catalog().await.context("Failed to load the song index")?;
            for entry in catalog.iter() {
                println!("{:>6}  {} - {}", entry.code, entry.artist, entry.title);
            }
            println!("{} songs", catalog.len());
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            completion::generate_completions(completion::shell_to_completion_shell(&shell), &mut cmd);
        }
        cli::Command::CompleteCodes => {
            // Used by completion scripts; stay quiet when no index is reachable.
            let jukebox = build_jukebox(&args.overrides)?;
            if let Ok(catalog) = jukebox.catalog().catalog().await {
                completion::write_code_completions(&catalog, &mut std::io::stdout().lock())?;
            }
        }
    }

    Ok(())
}
