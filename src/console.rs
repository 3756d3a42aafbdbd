//! Line-oriented stand-in for the jukebox screen.
//!
//! Each stdin line is one operator or customer action. Song changes made by
//! the session on its own (the advance after the score screen) are printed
//! by a watcher task subscribed to session snapshots.

use crate::catalog::SongCode;
use crate::config::SettingChange;
use crate::error::SessionError;
use crate::jukebox::Jukebox;
use crate::keypad::Keypad;
use crate::queue::QueueEntryId;
use crate::session::{PlaybackState, RequestMode, RequestOutcome, SessionSnapshot};
use anyhow::Result;
use log::debug;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const HELP: &str = "\
Commands:
  <digits>        request a song (plays now, or queues if one is playing)
  q <digits>      add a song to the queue
  rm <id>         cancel a queued song and refund it
  c               insert a coin
  end             the current song finished
  skip            stop the current song without a score
  status          show credits, song and queue
  f               show settings
  set name=value  change a setting
  reset           clear playback
  quit            leave";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Request(String),
    Enqueue(String),
    Remove(String),
    Coin,
    Settings,
    Set(String),
    End,
    Skip,
    Status,
    Reset,
    Help,
    Quit,
    Unknown(String),
}

impl ConsoleCommand {
    /// None for blank lines.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "q" | "queue" => Self::Enqueue(rest.to_string()),
            "rm" | "remove" => Self::Remove(rest.to_string()),
            "c" | "coin" => Self::Coin,
            "f" | "settings" => Self::Settings,
            "set" => Self::Set(rest.to_string()),
            "end" => Self::End,
            "skip" => Self::Skip,
            "status" | "s" => Self::Status,
            "reset" => Self::Reset,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            _ if rest.is_empty() && word.bytes().all(|b| b.is_ascii_digit()) => Self::Request(word.to_string()),
            _ => Self::Unknown(line.to_string()),
        };
        Some(command)
    }
}

/// Read commands from `input` until it ends or `quit`.
pub async fn run<R: AsyncBufRead + Unpin>(jukebox: &mut Jukebox, input: R) -> Result<()> {
    let watcher = spawn_watcher(jukebox.session().subscribe());
    println!("🎤 Karaoke ready. Type 'help' for commands.");
    print_status(&jukebox.session().snapshot());

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = ConsoleCommand::parse(&line) else {
            continue;
        };
        debug!("Console command: {command:?}");
        if command == ConsoleCommand::Quit {
            break;
        }
        handle(jukebox, command).await;
    }

    watcher.abort();
    Ok(())
}

async fn handle(jukebox: &mut Jukebox, command: ConsoleCommand) {
    match command {
        ConsoleCommand::Request(digits) => match typed_code(&digits) {
            Some(code) => {
                if let Some(entry) = jukebox.preview(&code).await {
                    println!("🔎 {} - {}", entry.artist, entry.title);
                }
                request(jukebox, &code, RequestMode::PlayNow).await;
            }
            None => println!("❌ Song codes have {} digits: {digits}", SongCode::KEYPAD_LEN),
        },
        ConsoleCommand::Enqueue(digits) => match typed_code(&digits) {
            Some(code) => request(jukebox, &code, RequestMode::Enqueue).await,
            None => println!("❌ Song codes have {} digits: {digits}", SongCode::KEYPAD_LEN),
        },
        ConsoleCommand::Remove(text) => match QueueEntryId::parse(&text) {
            Some(id) => match jukebox.session().remove_from_queue(id) {
                Some(entry) => println!(
                    "🗑️  Removed {} - {}, refunded {} (balance {})",
                    entry.song.artist,
                    entry.song.title,
                    entry.charged,
                    jukebox.session().credits()
                ),
                None => println!("Nothing queued with id {id}"),
            },
            None => println!("❌ Not a queue id: {text}"),
        },
        ConsoleCommand::Coin => {
            let balance = jukebox.session().insert_coin();
            println!("🪙 Credits: {balance}");
        }
        ConsoleCommand::Settings => println!("{}", jukebox.settings()),
        ConsoleCommand::Set(assignment) => {
            match SettingChange::parse_assignment(&assignment).and_then(|change| jukebox.apply_setting(change)) {
                Ok(()) => println!("✅ {assignment}"),
                Err(e) => println!("❌ {e}"),
            }
        }
        ConsoleCommand::End => match jukebox.session().report_playback_ended() {
            Ok(score) => {
                println!("🏆 Score: {} (accuracy {}%)", score.score, score.accuracy);
                println!("   {}", score.cheer);
            }
            Err(e) => println!("❌ {e}"),
        },
        ConsoleCommand::Skip => {
            if !jukebox.session().skip() {
                println!("Nothing is playing");
            }
        }
        ConsoleCommand::Status => print_status(&jukebox.session().snapshot()),
        ConsoleCommand::Reset => jukebox.session().reset(),
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Unknown(line) => println!("Unknown command: {line} (try 'help')"),
        ConsoleCommand::Quit => {}
    }
}

/// Run `text` through the keypad. Only a complete code comes out; extra
/// digits void the entry.
fn typed_code(text: &str) -> Option<SongCode> {
    let mut keypad = Keypad::new();
    for c in text.chars() {
        if !keypad.push_digit(c) {
            return None;
        }
    }
    keypad.submit()
}

async fn request(jukebox: &Jukebox, code: &SongCode, mode: RequestMode) {
    match jukebox.session().request_song(code, mode).await {
        Ok(RequestOutcome::Playing(entry)) => {
            println!("▶️  {}", jukebox.media_path(&entry).display());
        }
        Ok(RequestOutcome::Queued { id, position }) => {
            println!("📋 Queued at position {position} (id {id})");
        }
        Err(SessionError::InsufficientCredits { balance, cost }) => {
            println!("💰 Insufficient credits: {balance} available, {cost} needed");
        }
        Err(SessionError::Catalog(e)) if e.is_unavailable() => println!("⚠️  {e}"),
        // Unknown codes are dropped without feedback.
        Err(e) => debug!("Request for {code} dropped: {e}"),
    }
}

fn spawn_watcher(mut updates: watch::Receiver<SessionSnapshot>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = updates.borrow_and_update().clone();
        while updates.changed().await.is_ok() {
            let next = updates.borrow_and_update().clone();
            if next.current != last.current || next.state != last.state {
                print_now_playing(&next);
            }
            last = next;
        }
    })
}

fn print_now_playing(snapshot: &SessionSnapshot) {
    match (&snapshot.current, snapshot.state) {
        (Some(song), PlaybackState::Playing) => {
            println!("🎵 Now playing: {} - {} [{}]", song.artist, song.title, song.code);
            if !song.first_lyric.is_empty() {
                println!("   “{}”", song.first_lyric);
            }
        }
        (_, PlaybackState::Idle) => println!("⏹️  Waiting for the next song"),
        _ => {}
    }
}

fn print_status(snapshot: &SessionSnapshot) {
    println!("🪙 Credits: {}", snapshot.credits);
    match &snapshot.current {
        Some(song) => println!("🎵 {:?}: {} - {} [{}]", snapshot.state, song.artist, song.title, song.code),
        None => println!("🎵 Idle"),
    }
    if let Some(score) = &snapshot.score {
        println!("🏆 Last score: {}", score.score);
    }
    if snapshot.queue.is_empty() {
        println!("📋 Queue empty");
    } else {
        println!("📋 Queue:");
        for item in &snapshot.queue {
            println!("  {}. {} - {} [{}] ({})", item.position, item.artist, item.title, item.code, item.id);
        }
    }
}
