//! Wires the catalog, the session and the operator settings together.
//!
//! [`Jukebox`] is what a front end holds: it owns the one [`CatalogStore`],
//! hands the session a shared handle to it, and keeps both in step with
//! setting changes made from the operator menu.

use crate::catalog::{CatalogEntry, CatalogSource, CatalogStore, FsCatalogSource, SongCode};
use crate::config::{self, SettingChange, Settings};
use crate::error::ConfigResult;
use crate::score::{RandomScorer, Scorer};
use crate::session::{SessionConfig, SessionController};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug)]
pub struct Jukebox {
    settings: Settings,
    catalog: Arc<CatalogStore>,
    session: SessionController,
    /// Where the index location is persisted, if anywhere.
    source_path_file: Option<PathBuf>,
}

impl Jukebox {
    pub fn new(settings: Settings, source: Arc<dyn CatalogSource>, scorer: Box<dyn Scorer>) -> Self {
        let catalog = Arc::new(CatalogStore::with_source_path(source, settings.storage.db_path.clone()));
        let session = SessionController::new(Arc::clone(&catalog), SessionConfig::from(&settings), scorer);
        Self {
            settings,
            catalog,
            session,
            source_path_file: None,
        }
    }

    /// Filesystem-backed jukebox that remembers its index location in the
    /// data directory. A stored location overrides `settings.storage.db_path`.
    pub fn open(mut settings: Settings) -> ConfigResult<Self> {
        let file = config::get_source_path_file()?;
        if let Some(stored) = config::load_source_path(&file)? {
            debug!("Using stored song index location {}", stored.display());
            settings.storage.db_path = stored;
        }
        Ok(Self::new(settings, Arc::new(FsCatalogSource), Box::new(RandomScorer::from_entropy())).persisting_to(file))
    }

    /// Persist index location changes to `file`.
    pub fn persisting_to(mut self, file: PathBuf) -> Self {
        self.source_path_file = Some(file);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    /// Live lookup while digits are typed. Failures mean "nothing to show".
    pub async fn preview(&self, code: &SongCode) -> Option<Arc<CatalogEntry>> {
        match self.catalog.resolve(code).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("No preview for {code}: {e}");
                None
            }
        }
    }

    /// Where the media file of `entry` lives under the current index location.
    pub fn media_path(&self, entry: &CatalogEntry) -> PathBuf {
        entry.media_path(&self.settings.storage.db_path)
    }

    /// Apply one operator setting.
    ///
    /// Index location changes take effect at once: the cached catalog is
    /// dropped and the new location is persisted.
    pub fn apply_setting(&mut self, change: SettingChange) -> ConfigResult<()> {
        let new_source = match &change {
            SettingChange::DbPath(path) => Some(path.clone()),
            _ => None,
        };
        self.settings.apply(change);

        if let Some(path) = new_source {
            self.catalog.set_source_path(path.clone());
            if let Some(file) = &self.source_path_file {
                config::save_source_path(file, &path)?;
            }
            info!("Song index location changed to {}", path.display());
        }

        self.session.configure(SessionConfig::from(&self.settings));
        Ok(())
    }
}
