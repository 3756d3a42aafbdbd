//! # Song Catalog
//!
//! Resolves numeric song codes to playable entries. The catalog is read from
//! the `db.ini` index inside a configurable source directory and cached in
//! memory until the directory changes.
//!
//! ## Cache lifecycle
//!
//! - **Lazy**: nothing is read until the first [`CatalogStore::resolve`].
//! - **Path-keyed**: [`CatalogStore::set_source_path`] drops the cached catalog
//!   immediately; the next lookup reloads from the new location.
//! - **Single-flight**: concurrent lookups during a load wait for that one
//!   load instead of reading the index again.
//! - **All-or-nothing**: a failed load caches nothing, so the next lookup retries.
//!
//! ```no_run
//! use karaoke::catalog::{CatalogStore, FsCatalogSource, SongCode};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), karaoke::error::CatalogError> {
//! let store = CatalogStore::new(Arc::new(FsCatalogSource));
//! store.set_source_path("/media/usb");
//!
//! let code = SongCode::new("10001").expect("numeric code");
//! let entry = store.resolve(&code).await?;
//! println!("{} - {}", entry.artist, entry.title);
//! # Ok(())
//! # }
//! ```

use crate::error::{CatalogError, CatalogResult};
use crate::ini::{self, Fields, IndexDocument};
use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;

/// File name of the index inside the source directory.
pub const INDEX_FILE_NAME: &str = "db.ini";

/// Source directory used when none has been stored.
pub const DEFAULT_SOURCE_DIR: &str = "/media/usb";

const FIELD_FILE_NAME: &str = "arquivo";
const FIELD_ARTIST: &str = "artista";
const FIELD_TITLE: &str = "musica";
const FIELD_FIRST_LYRIC: &str = "inicio";

/// Numeric song identifier, the key of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SongCode(String);

impl SongCode {
    /// Digits shown on the keypad for one code.
    pub const KEYPAD_LEN: usize = 5;

    /// Accepts a non-empty string of ASCII digits, surrounding whitespace ignored.
    pub fn new(code: &str) -> Option<Self> {
        let code = code.trim();
        if !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(code.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SongCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One playable song record. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: SongCode,
    /// Media file, relative to the source directory.
    pub file_name: String,
    pub artist: String,
    pub title: String,
    /// Opening words, shown before and at playback start.
    pub first_lyric: String,
}

impl CatalogEntry {
    fn from_fields(code: SongCode, mut fields: Fields) -> Self {
        let mut take = |name: &str| fields.remove(name).unwrap_or_default();
        Self {
            file_name: take(FIELD_FILE_NAME),
            artist: take(FIELD_ARTIST),
            title: take(FIELD_TITLE),
            first_lyric: take(FIELD_FIRST_LYRIC),
            code,
        }
    }

    /// Location of the media file under `source_dir`.
    pub fn media_path(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(&self.file_name)
    }

    /// True when any of the recognised fields was absent from the index.
    pub fn is_partial(&self) -> bool {
        self.file_name.is_empty() || self.artist.is_empty() || self.title.is_empty()
    }
}

/// Code-to-entry table built from one index document.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: BTreeMap<SongCode, Arc<CatalogEntry>>,
}

impl Catalog {
    /// Build a catalog from raw index bytes read from `path`.
    pub fn parse(bytes: Vec<u8>, path: &Path) -> CatalogResult<Self> {
        let text = String::from_utf8(bytes).map_err(|e| CatalogError::ParseError {
            path: path.to_path_buf(),
            reason: format!("not valid UTF-8 text ({e})"),
        })?;
        Self::from_document(ini::parse(&text), path)
    }

    /// Build a catalog from parsed sections. Fails only when the text had
    /// content but not a single section header.
    pub fn from_document(doc: IndexDocument, path: &Path) -> CatalogResult<Self> {
        if doc.is_empty() && doc.content_lines > 0 {
            return Err(CatalogError::ParseError {
                path: path.to_path_buf(),
                reason: format!("{} content lines but no [code] section", doc.content_lines),
            });
        }

        if doc.orphan_lines > 0 {
            warn!("{} field lines before the first section in {}", doc.orphan_lines, path.display());
        }

        let mut entries = BTreeMap::new();
        for (key, fields) in doc.sections {
            let Some(code) = SongCode::new(&key) else {
                continue;
            };
            let entry = CatalogEntry::from_fields(code.clone(), fields);
            if entry.is_partial() {
                debug!("Song {code} has missing fields");
            }
            entries.insert(code, Arc::new(entry));
        }

        Ok(Self { entries })
    }

    pub fn get(&self, code: &SongCode) -> Option<Arc<CatalogEntry>> {
        self.entries.get(code).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<CatalogEntry>> {
        self.entries.values()
    }
}

/// Where index bytes come from.
#[async_trait]
pub trait CatalogSource: Send + Sync + fmt::Debug {
    /// Read the raw index stored under `source_dir`.
    async fn read_index(&self, source_dir: &Path) -> std::io::Result<Vec<u8>>;

    /// Location reported in errors and logs.
    fn index_location(&self, source_dir: &Path) -> PathBuf {
        source_dir.join(INDEX_FILE_NAME)
    }
}

/// Reads `<source_dir>/db.ini` from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsCatalogSource;

#[async_trait]
impl CatalogSource for FsCatalogSource {
    async fn read_index(&self, source_dir: &Path) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(self.index_location(source_dir)).await
    }
}

#[derive(Debug)]
struct CacheSlot {
    source_dir: Option<PathBuf>,
    catalog: Arc<OnceCell<Arc<Catalog>>>,
}

impl CacheSlot {
    fn new(source_dir: Option<PathBuf>) -> Self {
        Self {
            source_dir,
            catalog: Arc::new(OnceCell::new()),
        }
    }
}

/// Lazily loaded, path-keyed catalog cache.
///
/// Owned by whatever composes the jukebox; there is no process-wide instance.
#[derive(Debug)]
pub struct CatalogStore {
    source: Arc<dyn CatalogSource>,
    slot: Mutex<CacheSlot>,
}

impl CatalogStore {
    pub fn new(source: Arc<dyn CatalogSource>) -> Self {
        Self {
            source,
            slot: Mutex::new(CacheSlot::new(None)),
        }
    }

    /// Store reading from `source_dir` on first lookup.
    pub fn with_source_path(source: Arc<dyn CatalogSource>, source_dir: impl Into<PathBuf>) -> Self {
        let store = Self::new(source);
        store.set_source_path(source_dir);
        store
    }

    fn lock_slot(&self) -> MutexGuard<'_, CacheSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record where the index lives and drop any cached catalog.
    ///
    /// Nothing is read here; existence is checked by the next lookup.
    pub fn set_source_path(&self, source_dir: impl Into<PathBuf>) {
        let source_dir = source_dir.into();
        let mut slot = self.lock_slot();
        if source_dir.as_os_str().is_empty() {
            warn!("Empty song index location; lookups will fail until one is set");
            *slot = CacheSlot::new(None);
        } else {
            info!("Song index location set to {}", source_dir.display());
            *slot = CacheSlot::new(Some(source_dir));
        }
    }

    pub fn source_path(&self) -> Option<PathBuf> {
        self.lock_slot().source_dir.clone()
    }

    /// Drop the cached catalog; the next lookup reloads it.
    pub fn invalidate(&self) {
        let mut slot = self.lock_slot();
        debug!("Invalidating song catalog cache");
        let source_dir = slot.source_dir.take();
        *slot = CacheSlot::new(source_dir);
    }

    /// True when a catalog is cached for the current location.
    pub fn is_loaded(&self) -> bool {
        self.lock_slot().catalog.initialized()
    }

    /// The catalog for the current location, loading it if needed.
    pub async fn catalog(&self) -> CatalogResult<Arc<Catalog>> {
        let (source_dir, cell) = {
            let slot = self.lock_slot();
            let source_dir = slot.source_dir.clone().ok_or(CatalogError::NoSourcePath)?;
            (source_dir, Arc::clone(&slot.catalog))
        };

        let catalog = cell.get_or_try_init(|| self.load(&source_dir)).await?;
        Ok(Arc::clone(catalog))
    }

    /// Resolve a code to its entry.
    pub async fn resolve(&self, code: &SongCode) -> CatalogResult<Arc<CatalogEntry>> {
        self.catalog()
            .await?
            .get(code)
            .ok_or_else(|| CatalogError::NotFound(code.to_string()))
    }

    async fn load(&self, source_dir: &Path) -> CatalogResult<Arc<Catalog>> {
        let location = self.source.index_location(source_dir);
        info!("Loading song index from {}", location.display());

        let bytes = self.source.read_index(source_dir).await.map_err(|source| {
            warn!("Song index unavailable at {}: {source}", location.display());
            CatalogError::SourceUnavailable {
                path: location.clone(),
                source,
            }
        })?;

        let catalog = Catalog::parse(bytes, &location)?;
        info!("Loaded {} songs from {}", catalog.len(), location.display());
        Ok(Arc::new(catalog))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct CountingSource {
        reads: AtomicUsize,
        content: Option<&'static str>,
        delay: Duration,
    }

    impl CountingSource {
        fn new(content: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                content,
                delay: Duration::ZERO,
            })
        }

        fn slow(content: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                reads: AtomicUsize::new(0),
                content: Some(content),
                delay,
            })
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn read_index(&self, _source_dir: &Path) -> std::io::Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match self.content {
                Some(text) => Ok(text.as_bytes().to_vec()),
                None => Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no index")),
            }
        }
    }

    const INDEX: &str = "\
; demo index
[10001]
arquivo = 10001.mp4
artista = Artist One
musica = Title One
inicio = La la la

[10002]
arquivo = 10002.mp4
musica = Title Two
";

    fn code(s: &str) -> SongCode {
        SongCode::new(s).unwrap()
    }

    #[test]
    fn test_song_code_validation() {
        assert_eq!(code(" 12345 ").as_str(), "12345");
        assert!(SongCode::new("").is_none());
        assert!(SongCode::new("12a45").is_none());
        assert!(SongCode::new("-1").is_none());
    }

    #[test]
    fn test_catalog_maps_known_fields_and_defaults_missing() {
        let catalog = Catalog::parse(INDEX.as_bytes().to_vec(), Path::new("db.ini")).unwrap();
        assert_eq!(catalog.len(), 2);

        let one = catalog.get(&code("10001")).unwrap();
        assert_eq!(one.file_name, "10001.mp4");
        assert_eq!(one.artist, "Artist One");
        assert_eq!(one.title, "Title One");
        assert_eq!(one.first_lyric, "La la la");
        assert!(!one.is_partial());

        let two = catalog.get(&code("10002")).unwrap();
        assert_eq!(two.artist, "");
        assert_eq!(two.first_lyric, "");
        assert!(two.is_partial());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let catalog =
            Catalog::parse(b"[1]\nmusica = t\ngenero = rock\n".to_vec(), Path::new("db.ini")).unwrap();
        assert_eq!(catalog.get(&code("1")).unwrap().title, "t");
    }

    #[test]
    fn test_empty_and_comment_only_index_is_valid() {
        assert!(Catalog::parse(Vec::new(), Path::new("db.ini")).unwrap().is_empty());
        assert!(Catalog::parse(b"; nothing\n\n".to_vec(), Path::new("db.ini")).unwrap().is_empty());
    }

    #[test]
    fn test_content_without_sections_is_parse_error() {
        let err = Catalog::parse(b"musica = x\nartista = y\n".to_vec(), Path::new("db.ini")).unwrap_err();
        assert!(matches!(err, CatalogError::ParseError { .. }));
    }

    #[test]
    fn test_invalid_utf8_is_parse_error() {
        let err = Catalog::parse(vec![b'[', b'1', b']', b'\n', 0xff, 0xfe], Path::new("db.ini")).unwrap_err();
        assert!(matches!(err, CatalogError::ParseError { .. }));
    }

    #[test]
    fn test_media_path() {
        let catalog = Catalog::parse(INDEX.as_bytes().to_vec(), Path::new("db.ini")).unwrap();
        let entry = catalog.get(&code("10001")).unwrap();
        assert_eq!(entry.media_path(Path::new("/media/usb")), PathBuf::from("/media/usb/10001.mp4"));
    }

    #[tokio::test]
    async fn test_resolve_reads_once() {
        let source = CountingSource::new(Some(INDEX));
        let store = CatalogStore::with_source_path(source.clone(), "/media/usb");

        assert!(!store.is_loaded());
        store.resolve(&code("10001")).await.unwrap();
        store.resolve(&code("10002")).await.unwrap();
        assert!(store.is_loaded());
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_missing_code_is_not_found_and_keeps_cache() {
        let source = CountingSource::new(Some(INDEX));
        let store = CatalogStore::with_source_path(source.clone(), "/media/usb");

        let err = store.resolve(&code("00000")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(ref c) if c == "00000"));
        assert!(store.is_loaded());
        assert_eq!(source.reads(), 1);
    }

    #[tokio::test]
    async fn test_set_source_path_and_invalidate_force_reload() {
        let source = CountingSource::new(Some(INDEX));
        let store = CatalogStore::with_source_path(source.clone(), "/media/usb");

        store.resolve(&code("10001")).await.unwrap();
        store.set_source_path("/media/other");
        assert!(!store.is_loaded());
        assert_eq!(store.source_path(), Some(PathBuf::from("/media/other")));
        store.resolve(&code("10001")).await.unwrap();
        assert_eq!(source.reads(), 2);

        store.invalidate();
        assert_eq!(store.source_path(), Some(PathBuf::from("/media/other")));
        store.resolve(&code("10001")).await.unwrap();
        assert_eq!(source.reads(), 3);
    }

    #[tokio::test]
    async fn test_unreadable_source_is_not_cached() {
        let source = CountingSource::new(None);
        let store = CatalogStore::with_source_path(source.clone(), "/nowhere");

        for _ in 0..2 {
            let err = store.resolve(&code("10001")).await.unwrap_err();
            assert!(matches!(err, CatalogError::SourceUnavailable { .. }));
        }
        assert!(!store.is_loaded());
        assert_eq!(source.reads(), 2);
    }

    #[tokio::test]
    async fn test_no_source_path() {
        let store = CatalogStore::new(CountingSource::new(Some(INDEX)));
        let err = store.resolve(&code("10001")).await.unwrap_err();
        assert!(matches!(err, CatalogError::NoSourcePath));

        store.set_source_path("");
        assert!(store.source_path().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_resolves_share_one_load() {
        let source = CountingSource::slow(INDEX, Duration::from_millis(200));
        let store = CatalogStore::with_source_path(source.clone(), "/media/usb");

        let (one, two, missing) = (code("10001"), code("10002"), code("99999"));
        let (a, b, c) = tokio::join!(store.resolve(&one), store.resolve(&two), store.resolve(&missing));

        assert_eq!(a.unwrap().title, "Title One");
        assert_eq!(b.unwrap().title, "Title Two");
        assert!(matches!(c, Err(CatalogError::NotFound(_))));
        assert_eq!(source.reads(), 1);
    }
}
