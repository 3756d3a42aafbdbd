//! # Song Queue
//!
//! FIFO of songs waiting to play after the current one. Every queued song
//! gets its own [`QueueEntryId`], so the same code can sit in the queue
//! twice and each copy can be cancelled on its own.

use crate::catalog::{CatalogEntry, SongCode};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Identity of one queued request, distinct from the song code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueEntryId(Uuid);

impl QueueEntryId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parses the textual form produced by `Display`.
    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s.trim()).ok().map(Self)
    }
}

impl Default for QueueEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QueueEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A catalog entry waiting in the queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: QueueEntryId,
    pub song: Arc<CatalogEntry>,
    /// Enqueue order, increasing for the lifetime of the queue.
    pub ticket: u64,
    /// Credits taken for this request; given back if it is cancelled.
    pub charged: u32,
}

/// What the UI shows for one queued song.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedSong {
    pub id: QueueEntryId,
    /// 1-based place in line.
    pub position: usize,
    pub code: SongCode,
    pub artist: String,
    pub title: String,
}

/// Ordered pending songs.
#[derive(Debug, Default, Clone)]
pub struct SongQueue {
    entries: VecDeque<QueueEntry>,
    next_ticket: u64,
}

impl SongQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append to the tail and return the new entry's id.
    pub fn push_back(&mut self, song: Arc<CatalogEntry>, charged: u32) -> QueueEntryId {
        let id = QueueEntryId::new();
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.entries.push_back(QueueEntry {
            id,
            song,
            ticket,
            charged,
        });
        id
    }

    /// Take the head of the queue.
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        self.entries.pop_front()
    }

    /// Remove the entry with `id`, keeping the order of the rest.
    pub fn remove(&mut self, id: QueueEntryId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<QueuedSong> {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| QueuedSong {
                id: entry.id,
                position: index + 1,
                code: entry.song.code.clone(),
                artist: entry.song.artist.clone(),
                title: entry.song.title.clone(),
            })
            .collect()
    }
}
