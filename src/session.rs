//! # Session Controller
//!
//! Owns the live state of one jukebox terminal: the credit balance, the song
//! on screen, the queue behind it and the score of the song that just ended.
//! The UI never touches this state directly; it calls the operations below
//! and renders [`SessionSnapshot`]s.
//!
//! ## States
//!
//! ```text
//!            request (nothing playing)
//!   Idle ────────────────────────────► Playing
//!    ▲                                  │  ▲
//!    │ queue empty      playback ended  │  │ queue head promoted
//!    │                                  ▼  │
//!    └──────────────────────────────── Finished
//!             (after the score display time)
//! ```
//!
//! ## Credits
//!
//! - A request is refused with `InsufficientCredits` before any lookup when
//!   the balance is below the song price.
//! - A failed lookup never charges.
//! - The charge and the queue/now-playing change happen under one lock.
//! - Cancelling a queued song gives back what it was charged.
//!
//! ## Timers
//!
//! Leaving `Finished` and clearing the insufficient-credits notice are
//! deferred tasks on the Tokio runtime. Both are cancelled by [`SessionController::reset`]
//! and when the controller is dropped, and a timer from before a reset can
//! never touch the session that replaced it.

use crate::catalog::{CatalogEntry, CatalogStore, SongCode};
use crate::config::Settings;
use crate::error::{SessionError, SessionResult};
use crate::queue::{QueueEntry, QueueEntryId, QueuedSong, SongQueue};
use crate::score::{RandomScorer, ScoreRecord, Scorer};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing on screen.
    Idle,
    /// One song playing, zero or more waiting.
    Playing,
    /// The song ended and its score is on screen.
    Finished,
}

/// How a submitted code should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestMode {
    /// Play immediately if nothing is playing, otherwise queue.
    PlayNow,
    /// Always join the back of the queue.
    Enqueue,
}

/// Result of an accepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// The song is now playing.
    Playing(Arc<CatalogEntry>),
    /// The song is waiting at `position` (1-based).
    Queued { id: QueueEntryId, position: usize },
}

/// Pricing and timing the controller works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub cost_per_song: u32,
    pub auto_deduct: bool,
    /// Credits added by one coin event.
    pub credit_value: u32,
    pub score_display: Duration,
    pub notice_display: Duration,
}

impl SessionConfig {
    pub fn effective_cost(&self) -> u32 {
        if self.auto_deduct {
            self.cost_per_song
        } else {
            0
        }
    }
}

impl From<&Settings> for SessionConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            cost_per_song: settings.credits.cost_per_song,
            auto_deduct: settings.credits.auto_deduct,
            credit_value: settings.credits.value,
            score_display: settings.playback.score_display,
            notice_display: settings.playback.notice_display,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

/// Everything the UI renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub credits: u32,
    pub current: Option<CatalogEntry>,
    pub queue: Vec<QueuedSong>,
    pub score: Option<ScoreRecord>,
    pub insufficient_credits: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            credits: 0,
            current: None,
            queue: Vec::new(),
            score: None,
            insufficient_credits: false,
        }
    }
}

struct Session {
    state: PlaybackState,
    credits: u32,
    current: Option<Arc<CatalogEntry>>,
    queue: SongQueue,
    score: Option<ScoreRecord>,
    insufficient_credits: bool,
    config: SessionConfig,
    scorer: Box<dyn Scorer>,
    /// Bumped on reset so older timers recognise they are stale.
    epoch: u64,
    advance_timer: Option<CancellationToken>,
    notice_timer: Option<CancellationToken>,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            credits: self.credits,
            current: self.current.as_deref().cloned(),
            queue: self.queue.snapshot(),
            score: self.score,
            insufficient_credits: self.insufficient_credits,
        }
    }

    /// Move the queue head on screen, or go idle.
    fn promote_next(&mut self) {
        self.score = None;
        match self.queue.pop_front() {
            Some(next) => {
                info!("Now playing {} - {} [{}]", next.song.artist, next.song.title, next.song.code);
                self.current = Some(next.song);
                self.state = PlaybackState::Playing;
            }
            None => {
                debug!("Queue empty, going idle");
                self.current = None;
                self.state = PlaybackState::Idle;
            }
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(token) = self.advance_timer.take() {
            debug!("Cancelling pending advance");
            token.cancel();
        }
        if let Some(token) = self.notice_timer.take() {
            token.cancel();
        }
    }
}

struct Shared {
    session: Mutex<Session>,
    updates: watch::Sender<SessionSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, session: &Session) {
        self.updates.send_replace(session.snapshot());
    }

    /// Runs when the score display time is over.
    fn finish_display(&self, epoch: u64) {
        let mut session = self.lock();
        if session.epoch != epoch || session.state != PlaybackState::Finished {
            debug!("Ignoring stale advance");
            return;
        }
        session.advance_timer = None;
        session.promote_next();
        self.publish(&session);
    }

    fn clear_notice(&self, epoch: u64) {
        let mut session = self.lock();
        if session.epoch != epoch {
            return;
        }
        session.notice_timer = None;
        if session.insufficient_credits {
            session.insufficient_credits = false;
            self.publish(&session);
        }
    }
}

/// Run `action` after `delay` unless `token` is cancelled first or the
/// session is gone.
fn schedule(
    runtime: &Handle,
    shared: Weak<Shared>,
    token: CancellationToken,
    delay: Duration,
    action: impl FnOnce(&Shared) + Send + 'static,
) {
    runtime.spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {
                if let Some(shared) = shared.upgrade() {
                    action(&shared);
                }
            }
        }
    });
}

/// The authoritative credits, now-playing and queue state machine.
///
/// Timers run on the Tokio runtime current at the call; `report_playback_ended`
/// fails with `NoRuntime` outside one.
pub struct SessionController {
    shared: Arc<Shared>,
    catalog: Arc<CatalogStore>,
}

impl SessionController {
    pub fn new(catalog: Arc<CatalogStore>, config: SessionConfig, scorer: Box<dyn Scorer>) -> Self {
        let session = Session {
            state: PlaybackState::Idle,
            credits: 0,
            current: None,
            queue: SongQueue::new(),
            score: None,
            insufficient_credits: false,
            config,
            scorer,
            epoch: 0,
            advance_timer: None,
            notice_timer: None,
        };
        let (updates, _) = watch::channel(session.snapshot());
        Self {
            shared: Arc::new(Shared {
                session: Mutex::new(session),
                updates,
            }),
            catalog,
        }
    }

    /// Controller with entropy-seeded random scores.
    pub fn with_random_scores(catalog: Arc<CatalogStore>, config: SessionConfig) -> Self {
        Self::new(catalog, config, Box::new(RandomScorer::from_entropy()))
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.updates.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.shared.lock().snapshot()
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().state
    }

    pub fn credits(&self) -> u32 {
        self.shared.lock().credits
    }

    pub fn current(&self) -> Option<Arc<CatalogEntry>> {
        self.shared.lock().current.clone()
    }

    pub fn queue(&self) -> Vec<QueuedSong> {
        self.shared.lock().queue.snapshot()
    }

    pub fn score(&self) -> Option<ScoreRecord> {
        self.shared.lock().score
    }

    pub fn insufficient_credits(&self) -> bool {
        self.shared.lock().insufficient_credits
    }

    pub fn config(&self) -> SessionConfig {
        self.shared.lock().config.clone()
    }

    /// Replace pricing and timings. Already-queued songs keep what they were charged.
    pub fn configure(&self, config: SessionConfig) {
        let mut session = self.shared.lock();
        debug!("Session reconfigured: {config:?}");
        session.config = config;
    }

    /// Add `amount` credits. The balance has no upper bound besides `u32::MAX`.
    pub fn add_credits(&self, amount: u32) -> u32 {
        let mut session = self.shared.lock();
        session.credits = session.credits.saturating_add(amount);
        info!("Added {amount} credits, balance {}", session.credits);
        self.shared.publish(&session);
        session.credits
    }

    /// Add the configured per-coin increment.
    pub fn insert_coin(&self) -> u32 {
        let value = self.shared.lock().config.credit_value;
        self.add_credits(value)
    }

    /// Request a song by code.
    ///
    /// Refused up front when credits are short; dropped without charge when
    /// the code does not resolve. On success the price is deducted and the
    /// song either starts or joins the back of the queue.
    pub async fn request_song(&self, code: &SongCode, mode: RequestMode) -> SessionResult<RequestOutcome> {
        self.ensure_credits()?;

        let song = self.catalog.resolve(code).await.map_err(|e| {
            if e.is_unavailable() {
                warn!("Dropping request for {code}: {e}");
            } else {
                info!("Dropping request for unknown code {code}");
            }
            SessionError::from(e)
        })?;

        let mut session = self.shared.lock();
        let cost = session.config.effective_cost();
        if session.credits < cost {
            let balance = session.credits;
            self.raise_notice(&mut session);
            self.shared.publish(&session);
            return Err(SessionError::InsufficientCredits { balance, cost });
        }
        session.credits -= cost;

        let outcome = if mode == RequestMode::PlayNow && session.current.is_none() {
            info!("Now playing {} - {} [{code}]", song.artist, song.title);
            session.current = Some(Arc::clone(&song));
            session.state = PlaybackState::Playing;
            RequestOutcome::Playing(song)
        } else {
            let id = session.queue.push_back(Arc::clone(&song), cost);
            if session.state == PlaybackState::Idle {
                session.promote_next();
                RequestOutcome::Playing(song)
            } else {
                let position = session.queue.len();
                info!("Queued {} - {} [{code}] at position {position}", song.artist, song.title);
                RequestOutcome::Queued { id, position }
            }
        };

        debug!("Charged {cost}, balance {}", session.credits);
        self.shared.publish(&session);
        Ok(outcome)
    }

    /// Convenience for raw keypad input.
    pub async fn request_code(&self, code: &str, mode: RequestMode) -> SessionResult<RequestOutcome> {
        let code = SongCode::new(code).ok_or_else(|| SessionError::InvalidCode(code.to_string()))?;
        self.request_song(&code, mode).await
    }

    fn ensure_credits(&self) -> SessionResult<()> {
        let mut session = self.shared.lock();
        let cost = session.config.effective_cost();
        if session.credits < cost {
            let balance = session.credits;
            info!("Refusing request: balance {balance}, price {cost}");
            self.raise_notice(&mut session);
            self.shared.publish(&session);
            return Err(SessionError::InsufficientCredits { balance, cost });
        }
        Ok(())
    }

    fn raise_notice(&self, session: &mut Session) {
        session.insufficient_credits = true;
        let token = CancellationToken::new();
        if let Some(previous) = session.notice_timer.replace(token.clone()) {
            previous.cancel();
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime; the insufficient-credits notice stays up");
            return;
        };
        let epoch = session.epoch;
        schedule(
            &runtime,
            Arc::downgrade(&self.shared),
            token,
            session.config.notice_display,
            move |shared| shared.clear_notice(epoch),
        );
    }

    /// Cancel a queued song and refund it. Unknown ids are ignored.
    pub fn remove_from_queue(&self, id: QueueEntryId) -> Option<QueueEntry> {
        let mut session = self.shared.lock();
        let Some(entry) = session.queue.remove(id) else {
            debug!("No queued song with id {id}");
            return None;
        };
        session.credits = session.credits.saturating_add(entry.charged);
        info!(
            "Removed {} from queue, refunded {}, balance {}",
            entry.song.code, entry.charged, session.credits
        );
        self.shared.publish(&session);
        Some(entry)
    }

    /// The media collaborator reports the current song ended.
    ///
    /// Computes the score and enters `Finished`; after the score display
    /// time the next queued song starts, or the session goes idle.
    pub fn report_playback_ended(&self) -> SessionResult<ScoreRecord> {
        let mut session = self.shared.lock();
        if session.state != PlaybackState::Playing {
            return Err(SessionError::NotPlaying);
        }
        let runtime = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;

        let score = session.scorer.score();
        info!("Song finished with score {} ({})", score.score, score.cheer);
        session.score = Some(score);
        session.state = PlaybackState::Finished;

        let token = CancellationToken::new();
        if let Some(previous) = session.advance_timer.replace(token.clone()) {
            previous.cancel();
        }
        let epoch = session.epoch;
        schedule(
            &runtime,
            Arc::downgrade(&self.shared),
            token,
            session.config.score_display,
            move |shared| shared.finish_display(epoch),
        );

        self.shared.publish(&session);
        Ok(score)
    }

    /// Stop the current song without a score and move on. Returns false when
    /// nothing was on screen.
    pub fn skip(&self) -> bool {
        let mut session = self.shared.lock();
        if session.state == PlaybackState::Idle {
            return false;
        }
        if let Some(token) = session.advance_timer.take() {
            token.cancel();
        }
        info!("Skipping current song");
        session.promote_next();
        self.shared.publish(&session);
        true
    }

    /// Clear playback and cancel pending timers. Queued songs are refunded;
    /// the balance otherwise stays.
    pub fn reset(&self) {
        let mut session = self.shared.lock();
        session.cancel_timers();
        session.epoch += 1;

        let refund: u32 = session.queue.iter().map(|e| e.charged).sum();
        session.credits = session.credits.saturating_add(refund);
        session.queue.clear();
        session.current = None;
        session.score = None;
        session.insufficient_credits = false;
        session.state = PlaybackState::Idle;
        info!("Session reset, refunded {refund}, balance {}", session.credits);
        self.shared.publish(&session);
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.shared.lock().cancel_timers();
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use crate::error::CatalogError;
    use crate::score::{Cheer, FixedScorer};
    use async_trait::async_trait;
    use std::path::Path;

    #[derive(Debug)]
    struct StaticSource(&'static str);

    #[async_trait]
    impl CatalogSource for StaticSource {
        async fn read_index(&self, _source_dir: &Path) -> std::io::Result<Vec<u8>> {
            Ok(self.0.as_bytes().to_vec())
        }
    }

    const INDEX: &str = "\
[12345]
arquivo = 12345.mp4
artista = Test Artist
musica = Test Song
inicio = This is a test song
[11111]
musica = A
[22222]
musica = B
[33333]
musica = C
";

    fn controller_with(config: SessionConfig, score: u8) -> SessionController {
        let catalog = Arc::new(CatalogStore::with_source_path(Arc::new(StaticSource(INDEX)), "/media/usb"));
        SessionController::new(catalog, config, Box::new(FixedScorer(ScoreRecord::new(score, 90))))
    }

    fn controller() -> SessionController {
        controller_with(SessionConfig::default(), 85)
    }

    fn code(s: &str) -> SongCode {
        SongCode::new(s).unwrap()
    }

    fn titles(c: &SessionController) -> Vec<String> {
        c.queue().into_iter().map(|q| q.title).collect()
    }

    #[tokio::test]
    async fn test_play_now_when_idle() {
        let c = controller();
        assert_eq!(c.add_credits(1), 1);

        let outcome = c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Playing(ref e) if e.title == "Test Song"));
        assert_eq!(c.credits(), 0);
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(c.current().unwrap().first_lyric, "This is a test song");
    }

    #[tokio::test]
    async fn test_unknown_code_changes_nothing() {
        let c = controller();
        c.add_credits(1);

        let err = c.request_song(&code("00000"), RequestMode::PlayNow).await.unwrap_err();
        assert!(matches!(err, SessionError::Catalog(CatalogError::NotFound(_))));
        assert_eq!(c.credits(), 1);
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(!c.insufficient_credits());
    }

    #[tokio::test(start_paused = true)]
    async fn test_insufficient_credits_raises_timed_notice() {
        let c = controller();

        let err = c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap_err();
        assert!(matches!(err, SessionError::InsufficientCredits { balance: 0, cost: 1 }));
        assert_eq!(c.credits(), 0);
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(c.insufficient_credits());

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert!(c.insufficient_credits());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!c.insufficient_credits());
    }

    #[tokio::test]
    async fn test_play_now_while_playing_queues_at_tail() {
        let c = controller();
        c.add_credits(3);
        c.request_song(&code("11111"), RequestMode::PlayNow).await.unwrap();
        c.request_song(&code("22222"), RequestMode::Enqueue).await.unwrap();

        let outcome = c.request_song(&code("33333"), RequestMode::PlayNow).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Queued { position: 2, .. }));
        assert_eq!(c.current().unwrap().title, "A");
        assert_eq!(titles(&c), ["B", "C"]);
        assert_eq!(c.credits(), 0);
    }

    #[tokio::test]
    async fn test_enqueue_when_idle_starts_playing() {
        let c = controller();
        c.add_credits(1);

        let outcome = c.request_song(&code("11111"), RequestMode::Enqueue).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Playing(_)));
        assert_eq!(c.state(), PlaybackState::Playing);
        assert!(c.queue().is_empty());
    }

    #[tokio::test]
    async fn test_remove_refunds_charge() {
        let c = controller();
        c.add_credits(2);
        c.request_song(&code("11111"), RequestMode::PlayNow).await.unwrap();
        let RequestOutcome::Queued { id, .. } = c.request_song(&code("22222"), RequestMode::Enqueue).await.unwrap() else {
            panic!("expected queued");
        };
        assert_eq!(c.credits(), 0);

        assert!(c.remove_from_queue(id).is_some());
        assert_eq!(c.credits(), 1);
        assert!(c.queue().is_empty());

        assert!(c.remove_from_queue(id).is_none());
        assert_eq!(c.credits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_then_advance_to_queue_head() {
        let c = controller_with(SessionConfig::default(), 95);
        c.add_credits(3);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.request_song(&code("11111"), RequestMode::Enqueue).await.unwrap();
        c.request_song(&code("22222"), RequestMode::Enqueue).await.unwrap();

        let score = c.report_playback_ended().unwrap();
        assert_eq!(score.cheer, Cheer::Star);
        assert_eq!(c.state(), PlaybackState::Finished);
        assert_eq!(c.score(), Some(score));

        tokio::time::sleep(Duration::from_millis(5_999)).await;
        assert_eq!(c.state(), PlaybackState::Finished);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(c.current().unwrap().title, "A");
        assert_eq!(titles(&c), ["B"]);
        assert_eq!(c.score(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_finished_with_empty_queue_goes_idle() {
        let c = controller();
        c.add_credits(1);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.report_playback_ended().unwrap();

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(c.current().is_none());
    }

    #[tokio::test]
    async fn test_playback_ended_requires_playing() {
        let c = controller();
        assert!(matches!(c.report_playback_ended(), Err(SessionError::NotPlaying)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_ended_twice_is_rejected() {
        let c = controller();
        c.add_credits(1);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.report_playback_ended().unwrap();
        assert!(matches!(c.report_playback_ended(), Err(SessionError::NotPlaying)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_during_finished_is_queued_and_promoted() {
        let c = controller();
        c.add_credits(2);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.report_playback_ended().unwrap();

        let outcome = c.request_song(&code("33333"), RequestMode::PlayNow).await.unwrap();
        assert!(matches!(outcome, RequestOutcome::Queued { position: 1, .. }));

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(c.current().unwrap().title, "C");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_pending_advance() {
        let c = controller();
        c.add_credits(2);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.request_song(&code("11111"), RequestMode::Enqueue).await.unwrap();
        c.report_playback_ended().unwrap();

        c.reset();
        assert_eq!(c.state(), PlaybackState::Idle);
        assert_eq!(c.credits(), 1);

        c.request_song(&code("22222"), RequestMode::PlayNow).await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(c.state(), PlaybackState::Playing);
        assert_eq!(c.current().unwrap().title, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_promotes_without_score() {
        let c = controller();
        c.add_credits(2);
        c.request_song(&code("11111"), RequestMode::PlayNow).await.unwrap();
        c.request_song(&code("22222"), RequestMode::Enqueue).await.unwrap();

        assert!(c.skip());
        assert_eq!(c.current().unwrap().title, "B");
        assert!(c.score().is_none());
        assert!(c.skip());
        assert_eq!(c.state(), PlaybackState::Idle);
        assert!(!c.skip());
    }

    #[tokio::test]
    async fn test_free_play_charges_nothing() {
        let config = SessionConfig {
            auto_deduct: false,
            ..SessionConfig::default()
        };
        let c = controller_with(config, 50);

        c.request_song(&code("11111"), RequestMode::PlayNow).await.unwrap();
        let RequestOutcome::Queued { id, .. } = c.request_song(&code("22222"), RequestMode::Enqueue).await.unwrap() else {
            panic!("expected queued");
        };
        c.remove_from_queue(id);
        assert_eq!(c.credits(), 0);
    }

    #[tokio::test]
    async fn test_insert_coin_uses_configured_value() {
        let config = SessionConfig {
            credit_value: 5,
            ..SessionConfig::default()
        };
        let c = controller_with(config, 50);
        assert_eq!(c.insert_coin(), 5);
        assert_eq!(c.insert_coin(), 10);
    }

    #[tokio::test]
    async fn test_invalid_code_text() {
        let c = controller();
        c.add_credits(1);
        let err = c.request_code("12a", RequestMode::PlayNow).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCode(_)));
        assert_eq!(c.credits(), 1);
    }

    #[derive(Debug)]
    struct SlowSource;

    #[async_trait]
    impl CatalogSource for SlowSource {
        async fn read_index(&self, _source_dir: &Path) -> std::io::Result<Vec<u8>> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Ok(INDEX.as_bytes().to_vec())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_credits_spent_during_lookup_raise_published_notice() {
        let catalog = Arc::new(CatalogStore::with_source_path(Arc::new(SlowSource), "/media/usb"));
        let c = SessionController::new(catalog, SessionConfig::default(), Box::new(FixedScorer(ScoreRecord::new(50, 90))));
        let rx = c.subscribe();
        c.add_credits(1);

        let (first, second) = (code("11111"), code("22222"));
        let (a, b) = tokio::join!(
            c.request_song(&first, RequestMode::PlayNow),
            c.request_song(&second, RequestMode::PlayNow),
        );

        assert!(a.is_ok());
        assert!(matches!(b, Err(SessionError::InsufficientCredits { balance: 0, cost: 1 })));
        assert_eq!(c.credits(), 0);
        assert!(rx.borrow().insufficient_credits);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_advance() {
        let c = controller();
        c.add_credits(2);
        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        c.request_song(&code("11111"), RequestMode::Enqueue).await.unwrap();
        c.report_playback_ended().unwrap();

        let mut rx = c.subscribe();
        assert_eq!(rx.borrow_and_update().state, PlaybackState::Finished);
        drop(c);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(rx.changed().await.is_err());
        let last = rx.borrow();
        assert_eq!(last.state, PlaybackState::Finished);
        assert_eq!(last.current.as_ref().unwrap().code.as_str(), "12345");
    }

    #[test]
    fn test_playback_ended_outside_runtime_is_error() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let c = controller();
        c.add_credits(1);
        runtime
            .block_on(c.request_song(&code("12345"), RequestMode::PlayNow))
            .unwrap();

        assert!(matches!(c.report_playback_ended(), Err(SessionError::NoRuntime)));
        assert_eq!(c.state(), PlaybackState::Playing);
        assert!(c.score().is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let c = controller();
        let mut rx = c.subscribe();
        c.add_credits(2);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().credits, 2);

        c.request_song(&code("12345"), RequestMode::PlayNow).await.unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.state, PlaybackState::Playing);
        assert_eq!(snapshot.credits, 1);
        assert_eq!(snapshot.current.unwrap().code.as_str(), "12345");
    }
}
