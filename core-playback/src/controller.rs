//! # Playback Controller
//!
//! Single authority over what plays now. Owns the host's [`MediaHost`],
//! resolves tracks through the [`TrackResolver`], retries failed loads and
//! walks the play queue.
//!
//! ## Architecture
//!
//! ```text
//!  UI intent ──► PlaybackController ──► TrackResolver (async)
//!                      │    ▲
//!                      │    │ MediaEvent callbacks (weak)
//!                      ▼    │
//!                   MediaHost
//!                      │
//!                      ▼
//!      watch::Receiver<PlaybackState> + EventBus ──► UI
//! ```
//!
//! ## Supersession
//!
//! Every request that changes what should play (`play_track`, `play_all`,
//! `play_next`, `play_previous`, `retry`, `stop`, `shutdown`) bumps a
//! generation counter. Async continuations compare the generation they
//! captured with the current one before touching state or the host, so a
//! late resolver answer for an old request is dropped instead of applied.
//!
//! ## Locking
//!
//! `Inner::core` is a `parking_lot::Mutex` and is never held across an
//! `.await` or while calling into the host. Hosts may deliver events
//! synchronously from inside `load()` or `pause()`, and the event handler
//! takes the same lock. When both are needed, `core` is locked before the
//! state channel.
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::{PlaybackConfig, PlaybackController, Track};
//!
//! let controller = PlaybackController::new(&core_config, PlaybackConfig::default())?;
//! let mut state = controller.subscribe();
//!
//! controller.play_all(album_tracks, 0).await?;
//! controller.seek(50.0);
//!
//! while state.changed().await.is_ok() {
//!     render(&state.borrow());
//! }
//! ```

use crate::config::{PlaybackConfig, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE};
use crate::error::{PlaybackError, PlaybackFailure, Result};
use crate::path::final_path;
use crate::queue::Queue;
use crate::state::{PlaybackErrorInfo, PlaybackState};
use crate::track::{AudioRef, Track};
use crate::url_cache::UrlCache;
use bridge_traits::{MediaEvent, MediaEventKind, MediaHost, TrackResolver};
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use core_runtime::logging::{redact_url, strip_path};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace, warn};

/// Readiness of the source loaded by the in-flight attempt.
#[derive(Debug, Clone)]
enum LoadSignal {
    Pending,
    Ready,
    Failed(PlaybackFailure),
}

struct PendingLoad {
    generation: u64,
    signal: watch::Sender<LoadSignal>,
}

enum AttemptOutcome {
    Started,
    Superseded,
    Failed(PlaybackFailure),
}

#[derive(Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}

/// Controller bookkeeping that is not part of the observable state.
#[derive(Default)]
struct Core {
    generation: u64,
    /// Present between `init()` and `shutdown()`.
    host: Option<Arc<dyn MediaHost>>,
    /// Runtime used to start auto-advance from host callbacks.
    runtime: Option<Handle>,
    queue: Queue,
    /// Attempts made by the current load request.
    load_attempts: u32,
    /// Generation of the load request still running, if any.
    in_flight: Option<u64>,
    /// The host holds a started source for the current track.
    source_loaded: bool,
    pending: Option<PendingLoad>,
}

struct Inner {
    config: PlaybackConfig,
    features: FeatureFlags,
    host_source: Arc<dyn MediaHost>,
    resolver: Arc<dyn TrackResolver>,
    url_cache: Option<UrlCache>,
    events: EventBus,
    state_tx: watch::Sender<PlaybackState>,
    core: Mutex<Core>,
}

/// Handle to the playback controller.
///
/// Cloning is cheap; every clone drives the same media output.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("config", &self.inner.config)
            .field("state", &*self.inner.state_tx.borrow())
            .finish()
    }
}

impl PlaybackController {
    /// Create a controller from the injected bridges and playback settings.
    ///
    /// The media host is not touched until [`init`](Self::init) or the first
    /// operation that needs it.
    pub fn new(core: &CoreConfig, config: PlaybackConfig) -> Result<Self> {
        core.validate()?;
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        let url_cache = core.features.enable_url_cache.then(|| {
            UrlCache::new(
                config.url_cache_capacity,
                config.signed_url_lifetime(),
                Arc::clone(&core.clock),
            )
        });

        let initial = PlaybackState {
            volume: config.initial_volume,
            muted: config.initial_volume == 0.0,
            playback_rate: config.initial_playback_rate,
            ..PlaybackState::default()
        };
        let (state_tx, _) = watch::channel(initial);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                features: core.features,
                host_source: Arc::clone(&core.media_host),
                resolver: Arc::clone(&core.track_resolver),
                url_cache,
                events: EventBus::new(core.event_buffer_size),
                state_tx,
                core: Mutex::new(Core::default()),
            }),
        })
    }

    /// Acquire the media host and register for its events.
    ///
    /// Idempotent. Every other operation calls this implicitly; after
    /// [`shutdown`](Self::shutdown) it acquires the host again.
    pub fn init(&self) {
        self.inner.ensure_init();
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> PlaybackState {
        self.inner.snapshot()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.inner.state_tx.subscribe()
    }

    /// Bus carrying [`PlaybackEvent`]s and [`QueueEvent`]s.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.inner.config
    }

    /// Replace the queue and play `track` at `index`.
    ///
    /// An empty `queue` is treated as `[track]`. Resolver and media failures
    /// are reported through [`PlaybackState::error`], not as `Err`.
    ///
    /// Resolves once this request has settled: playing, failed for good, or
    /// superseded by a newer request.
    pub async fn play_track(
        &self,
        track: Arc<Track>,
        queue: Vec<Arc<Track>>,
        index: usize,
    ) -> Result<()> {
        let queue = if queue.is_empty() {
            Queue::new(vec![Arc::clone(&track)], 0)?
        } else {
            Queue::new(queue, index)?
        };

        self.start(queue, track, false).await;
        Ok(())
    }

    /// Play `queue` from `start_index` and keep going until it runs out.
    pub async fn play_all(&self, queue: Vec<Arc<Track>>, start_index: usize) -> Result<()> {
        let queue = Queue::new(queue, start_index)?;
        let track = queue.current().cloned().ok_or(PlaybackError::EmptyQueue)?;

        self.start(queue, track, true).await;
        Ok(())
    }

    async fn start(&self, queue: Queue, track: Arc<Track>, auto_advance: bool) {
        let host = self.inner.ensure_init();
        let generation = self.inner.replace_queue(queue, &track, auto_advance);
        host.pause();
        self.inner.run_load(generation, track).await;
    }

    /// Pause if playing, otherwise resume.
    ///
    /// Without a current track this does nothing. While a load is running it
    /// is ignored. In the error state it behaves like [`retry`](Self::retry).
    /// Returns whether playback is running afterwards.
    pub async fn toggle_play(&self) -> bool {
        let host = self.inner.ensure_init();
        let (generation, in_flight, source_loaded) = {
            let core = self.inner.core.lock();
            (core.generation, core.in_flight.is_some(), core.source_loaded)
        };
        let state = self.inner.snapshot();

        let Some(track) = state.current_track else {
            debug!("toggle_play without a current track");
            return false;
        };

        if state.error.is_some() {
            self.retry().await;
            return self.inner.snapshot().is_playing;
        }

        if in_flight {
            debug!(track_id = %track.id, "toggle_play ignored while loading");
            return state.is_playing;
        }

        if !source_loaded {
            // The load for this track was abandoned before it started
            let generation = self.inner.restart(&track, 0);
            self.inner.run_load(generation, track).await;
            return self.inner.snapshot().is_playing;
        }

        if state.is_playing {
            host.pause();
            self.inner.update(|s| s.is_playing = false);
            self.inner.emit(CoreEvent::Playback(PlaybackEvent::Paused {
                track_id: track.id.clone(),
            }));
            return false;
        }

        match host.play().await {
            Ok(()) => {
                let resumed = self.inner.commit(generation, |_, s| {
                    s.is_playing = true;
                    s.error = None;
                });
                if resumed {
                    self.inner.emit(CoreEvent::Playback(PlaybackEvent::Resumed {
                        track_id: track.id.clone(),
                    }));
                }
                resumed
            }
            Err(err) => {
                self.inner.fail(generation, &track, err.into(), 1);
                false
            }
        }
    }

    /// Advance to the next queued track. Returns `false` at the end of the
    /// queue, where it also switches auto-advance off.
    pub async fn play_next(&self) -> bool {
        self.step(Direction::Forward, None).await
    }

    /// Step back to the previous queued track. Returns `false` at the start.
    pub async fn play_previous(&self) -> bool {
        self.step(Direction::Backward, None).await
    }

    async fn step(&self, direction: Direction, expected_generation: Option<u64>) -> bool {
        let host = self.inner.ensure_init();

        match self.inner.move_cursor(direction, expected_generation) {
            Some((generation, track)) => {
                host.pause();
                self.inner.run_load(generation, track).await;
                true
            }
            None => {
                // A conditional move that lost its race leaves the newer request alone
                if matches!(direction, Direction::Forward) && expected_generation.is_none() {
                    self.inner.state_tx.send_if_modified(|s| {
                        std::mem::replace(&mut s.auto_advance, false)
                    });
                }
                false
            }
        }
    }

    pub fn has_next(&self) -> bool {
        self.inner.core.lock().queue.has_next()
    }

    pub fn has_previous(&self) -> bool {
        self.inner.core.lock().queue.has_previous()
    }

    /// Jump to `percent` (0-100) of the current track.
    ///
    /// No-op while the duration is unknown. State is updated immediately
    /// without waiting for the host to confirm.
    pub fn seek(&self, percent: f64) {
        if !percent.is_finite() {
            return;
        }

        let state = self.inner.snapshot();
        let duration = state.duration;
        if !(duration.is_finite() && duration > 0.0) {
            trace!("seek ignored, duration unknown");
            return;
        }

        let percent = percent.clamp(0.0, 100.0);
        let position = (percent / 100.0 * duration).clamp(0.0, duration);

        let host = self.inner.ensure_init();
        host.seek(position);
        self.inner.update(|s| {
            s.elapsed = position;
            s.progress = percent;
        });

        if let Some(track) = state.current_track {
            self.inner.emit(CoreEvent::Playback(PlaybackEvent::Seeked {
                track_id: track.id.clone(),
                position_ms: (position * 1000.0) as u64,
            }));
        }
    }

    /// Set the output volume, clamped into `0.0..=1.0`.
    ///
    /// Zero mutes; any audible value clears a previous mute.
    pub fn set_volume(&self, volume: f64) {
        if volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        let host = self.inner.ensure_init();
        let was_muted = self.inner.snapshot().muted;
        let muted = volume == 0.0;

        host.set_volume(volume);
        if muted != was_muted {
            host.set_muted(muted);
        }

        self.inner.update(|s| {
            s.volume = volume;
            s.muted = muted;
        });
        self.inner.emit_volume(volume, muted);
    }

    /// Set the playback rate, clamped into `0.25..=3.0`.
    ///
    /// If the host refuses the rate the state is left unchanged.
    pub fn set_playback_rate(&self, rate: f64) {
        if rate.is_nan() {
            return;
        }
        let rate = rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE);
        let host = self.inner.ensure_init();

        match host.set_playback_rate(rate) {
            Ok(()) => self.inner.update(|s| s.playback_rate = rate),
            Err(err) => warn!(rate, error = %err, "Host rejected playback rate"),
        }
    }

    /// Flip the mute flag. The stored volume is kept so unmuting restores it.
    pub fn toggle_mute(&self) {
        let host = self.inner.ensure_init();
        let state = self.inner.snapshot();
        let muted = !state.muted;

        host.set_muted(muted);
        self.inner.update(|s| s.muted = muted);
        self.inner.emit_volume(state.volume, muted);
    }

    /// Load the current track again after an error.
    ///
    /// Only acts in the error state with a current track. Makes exactly one
    /// more attempt; if that fails the controller is back in the error state.
    /// Returns `false` when there was nothing to retry.
    pub async fn retry(&self) -> bool {
        let state = self.inner.snapshot();
        let (Some(_), Some(track)) = (state.error, state.current_track) else {
            return false;
        };

        self.inner.ensure_init();
        let spent = self.inner.config.max_load_attempts.saturating_sub(1);
        let generation = self.inner.restart(&track, spent);
        info!(track_id = %track.id, "Retrying playback");
        self.inner.run_load(generation, track).await;
        true
    }

    /// Pause, rewind to the start and stop auto-advance.
    ///
    /// Also abandons a load that is still running. The host source is then
    /// cleared, and the next `toggle_play()` loads the track from scratch.
    pub fn stop(&self) {
        let (host, abandoned) = {
            let mut core = self.inner.core.lock();
            core.generation += 1;
            let abandoned = core.in_flight.take().is_some();
            if abandoned {
                core.source_loaded = false;
            }
            core.pending = None;
            (core.host.clone(), abandoned)
        };

        if let Some(host) = host {
            host.pause();
            if abandoned {
                host.set_source(None);
            } else {
                host.seek(0.0);
            }
        }

        self.inner.update(|s| {
            s.is_playing = false;
            s.is_loading = false;
            s.auto_advance = false;
            s.reset_position();
        });
        self.inner.emit(CoreEvent::Playback(PlaybackEvent::Stopped));
        debug!("Playback stopped");
    }

    /// Release the media host and forget the queue, cached URLs and retry
    /// counter.
    ///
    /// Safe to call repeatedly. Volume, mute and rate survive so a later
    /// `init()` restores them on the host.
    pub fn shutdown(&self) {
        let host = {
            let mut core = self.inner.core.lock();
            core.generation += 1;
            core.in_flight = None;
            core.pending = None;
            core.load_attempts = 0;
            core.source_loaded = false;
            core.queue.clear();
            core.host.take()
        };

        if let Some(cache) = &self.inner.url_cache {
            cache.clear();
        }

        let Some(host) = host else {
            trace!("shutdown: media host already released");
            return;
        };

        host.pause();
        host.set_source(None);
        host.release();
        drop(host);

        self.inner.update(|s| {
            *s = PlaybackState {
                volume: s.volume,
                muted: s.muted,
                playback_rate: s.playback_rate,
                ..PlaybackState::default()
            };
        });
        self.inner.emit(CoreEvent::Queue(QueueEvent::Cleared));
        self.inner.emit(CoreEvent::Playback(PlaybackEvent::Shutdown));
        info!("Playback controller shut down");
    }
}

impl Inner {
    fn snapshot(&self) -> PlaybackState {
        self.state_tx.borrow().clone()
    }

    fn update(&self, f: impl FnOnce(&mut PlaybackState)) {
        self.state_tx.send_modify(f);
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is fine
        let _ = self.events.emit(event);
    }

    fn emit_volume(&self, volume: f64, muted: bool) {
        self.emit(CoreEvent::Playback(PlaybackEvent::VolumeChanged {
            volume_percent: (volume * 100.0).round() as u8,
            muted,
        }));
    }

    fn is_current(&self, generation: u64) -> bool {
        self.core.lock().generation == generation
    }

    /// Apply `f` only if `generation` is still the active request.
    fn commit(&self, generation: u64, f: impl FnOnce(&mut Core, &mut PlaybackState)) -> bool {
        let mut core = self.core.lock();
        if core.generation != generation {
            return false;
        }
        self.state_tx.send_modify(|state| f(&mut *core, state));
        true
    }

    fn ensure_init(self: &Arc<Self>) -> Arc<dyn MediaHost> {
        let (host, fresh) = {
            let mut core = self.core.lock();
            if core.runtime.is_none() {
                core.runtime = Handle::try_current().ok();
            }
            match &core.host {
                Some(host) => (Arc::clone(host), false),
                None => {
                    let host = Arc::clone(&self.host_source);
                    core.host = Some(Arc::clone(&host));
                    (host, true)
                }
            }
        };

        if fresh {
            for kind in MediaEventKind::ALL {
                let weak = Arc::downgrade(self);
                host.subscribe(
                    kind,
                    Arc::new(move |event| {
                        if let Some(inner) = weak.upgrade() {
                            inner.handle_media_event(event);
                        }
                    }),
                );
            }

            let state = self.snapshot();
            host.set_volume(state.volume);
            host.set_muted(state.muted);
            if let Err(err) = host.set_playback_rate(state.playback_rate) {
                warn!(rate = state.playback_rate, error = %err, "Host rejected initial playback rate");
            }
            debug!("Media host acquired");
        }

        host
    }

    /// Start a new playback context. Returns its generation.
    fn replace_queue(&self, queue: Queue, track: &Arc<Track>, auto_advance: bool) -> u64 {
        let (generation, position, length) = {
            let mut core = self.core.lock();
            core.generation += 1;
            let generation = core.generation;
            core.queue = queue;
            core.load_attempts = 0;
            core.in_flight = Some(generation);
            core.source_loaded = false;
            core.pending = None;

            let position = core.queue.position();
            let length = core.queue.len();
            self.state_tx.send_modify(|s| {
                s.auto_advance = auto_advance;
                begin_track(s, track, position, length);
            });
            (generation, position, length)
        };

        self.emit(CoreEvent::Queue(QueueEvent::Replaced {
            length,
            position: position.unwrap_or(0),
        }));
        self.emit_track_changed(track);
        generation
    }

    /// Move the queue cursor. `expected_generation` makes the move conditional
    /// on no other request having started since it was captured.
    fn move_cursor(
        &self,
        direction: Direction,
        expected_generation: Option<u64>,
    ) -> Option<(u64, Arc<Track>)> {
        let (generation, from, to, track) = {
            let mut core = self.core.lock();
            if expected_generation.is_some_and(|g| g != core.generation) {
                return None;
            }

            let from = core.queue.position()?;
            let track = match direction {
                Direction::Forward => core.queue.advance(),
                Direction::Backward => core.queue.retreat(),
            }?;

            core.generation += 1;
            let generation = core.generation;
            core.load_attempts = 0;
            core.in_flight = Some(generation);
            core.source_loaded = false;
            core.pending = None;

            let to = core.queue.position();
            let length = core.queue.len();
            self.state_tx
                .send_modify(|s| begin_track(s, &track, to, length));
            (generation, from, to.unwrap_or(from), track)
        };

        debug!(from, to, track_id = %track.id, "Queue position moved");
        self.emit(CoreEvent::Queue(QueueEvent::Advanced { from, to }));
        self.emit_track_changed(&track);
        Some((generation, track))
    }

    /// New request for the same track, with `spent` attempts already counted
    /// against the retry budget.
    fn restart(&self, track: &Arc<Track>, spent: u32) -> u64 {
        let mut core = self.core.lock();
        core.generation += 1;
        let generation = core.generation;
        core.load_attempts = spent;
        core.in_flight = Some(generation);
        core.source_loaded = false;
        core.pending = None;
        self.state_tx.send_modify(|s| {
            s.error = None;
            s.is_loading = true;
            s.is_playing = false;
            s.reset_position();
        });
        generation
    }

    fn emit_track_changed(&self, track: &Track) {
        self.emit(CoreEvent::Playback(PlaybackEvent::TrackChanged {
            track_id: track.id.clone(),
            title: track.title.clone(),
            artist: track.artist.clone(),
        }));
    }

    /// Drive one load request to a terminal outcome, retrying per the
    /// configured policy.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    async fn run_load(&self, generation: u64, track: Arc<Track>) {
        loop {
            let attempt = {
                let mut core = self.core.lock();
                if core.generation != generation {
                    None
                } else {
                    core.load_attempts += 1;
                    Some(core.load_attempts)
                }
            };
            let Some(attempt) = attempt else {
                trace!("Load superseded");
                return;
            };

            debug!(attempt, "Load attempt");
            self.commit(generation, |_, s| {
                s.is_loading = true;
                s.error = None;
            });
            self.emit(CoreEvent::Playback(PlaybackEvent::Loading {
                track_id: track.id.clone(),
                attempt,
            }));

            let failure = match self.attempt_load(generation, &track).await {
                AttemptOutcome::Started => {
                    self.finish_started(generation, &track);
                    return;
                }
                AttemptOutcome::Superseded => {
                    trace!("Load superseded");
                    return;
                }
                AttemptOutcome::Failed(failure) => failure,
            };

            if !self.is_current(generation) {
                return;
            }
            self.forget_url(&track);

            if !failure.is_retryable() || attempt >= self.config.max_load_attempts {
                self.fail(generation, &track, failure, attempt);
                return;
            }

            let delay = self.config.retry_delay(attempt);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "Load failed, retrying"
            );
            self.emit(CoreEvent::Playback(PlaybackEvent::RetryScheduled {
                track_id: track.id.clone(),
                attempt,
                delay_ms: delay.as_millis() as u64,
            }));

            tokio::time::sleep(delay).await;
        }
    }

    async fn attempt_load(&self, generation: u64, track: &Track) -> AttemptOutcome {
        let url = match self.resolve_url(track).await {
            Ok(url) => url,
            Err(failure) => return AttemptOutcome::Failed(failure),
        };

        let (signal_tx, mut signal_rx) = watch::channel(LoadSignal::Pending);
        let host = {
            let mut core = self.core.lock();
            if core.generation != generation {
                return AttemptOutcome::Superseded;
            }
            let Some(host) = core.host.clone() else {
                return AttemptOutcome::Superseded;
            };
            core.pending = Some(PendingLoad {
                generation,
                signal: signal_tx,
            });
            host
        };

        debug!(url = %redact_url(&url), "Loading source");
        host.set_source(Some(&url));
        host.load();

        let ready =
            tokio::time::timeout(self.config.load_timeout, wait_until_ready(&mut signal_rx)).await;

        {
            let mut core = self.core.lock();
            if core
                .pending
                .as_ref()
                .is_some_and(|pending| pending.generation == generation)
            {
                core.pending = None;
            }
        }

        if !self.is_current(generation) {
            return AttemptOutcome::Superseded;
        }

        match ready {
            Err(_) => {
                return AttemptOutcome::Failed(PlaybackFailure::LoadTimeout(
                    self.config.load_timeout,
                ))
            }
            Ok(None) => return AttemptOutcome::Superseded,
            Ok(Some(Err(failure))) => return AttemptOutcome::Failed(failure),
            Ok(Some(Ok(()))) => {}
        }

        let played = host.play().await;
        if !self.is_current(generation) {
            return AttemptOutcome::Superseded;
        }

        match played {
            Ok(()) => AttemptOutcome::Started,
            Err(err) => AttemptOutcome::Failed(err.into()),
        }
    }

    async fn resolve_url(&self, track: &Track) -> std::result::Result<String, PlaybackFailure> {
        let path = match &track.audio {
            AudioRef::Url(url) => return Ok(url.clone()),
            AudioRef::Path(path) => final_path(&self.config.storage_root, path),
        };

        if let Some(url) = self
            .url_cache
            .as_ref()
            .and_then(|cache| cache.get(&path, track.signed))
        {
            trace!(file = strip_path(&path), "Resolved URL cache hit");
            return Ok(url);
        }

        let url = self
            .resolver
            .resolve(&path, track.signed)
            .await
            .map_err(|err| {
                warn!(file = strip_path(&path), signed = track.signed, error = %err, "Track resolution failed");
                PlaybackFailure::from(err)
            })?;

        if let Some(cache) = &self.url_cache {
            cache.insert(&path, track.signed, url.clone());
        }
        Ok(url)
    }

    fn forget_url(&self, track: &Track) {
        if let (Some(cache), AudioRef::Path(path)) = (&self.url_cache, &track.audio) {
            cache.remove(&final_path(&self.config.storage_root, path), track.signed);
        }
    }

    fn finish_started(&self, generation: u64, track: &Track) {
        let started = self.commit(generation, |core, s| {
            core.load_attempts = 0;
            core.in_flight = None;
            core.source_loaded = true;
            s.is_playing = true;
            s.is_loading = false;
            s.error = None;
        });

        if started {
            info!(track_id = %track.id, title = %track.title, "Playback started");
            self.emit(CoreEvent::Playback(PlaybackEvent::Started {
                track_id: track.id.clone(),
            }));
        }
    }

    /// Put the controller in the error state for `generation`.
    fn fail(&self, generation: u64, track: &Track, failure: PlaybackFailure, attempts: u32) {
        let info = PlaybackErrorInfo::from(&failure);
        let failed = self.commit(generation, |core, s| {
            core.in_flight = None;
            s.error = Some(info);
            s.is_loading = false;
            s.is_playing = false;
        });

        if failed {
            self.report_failure(Some(track), &failure, attempts);
        }
    }

    fn report_failure(&self, track: Option<&Track>, failure: &PlaybackFailure, attempts: u32) {
        let track_id = track.map(|t| t.id.clone());
        error!(
            track_id = track_id.as_deref().unwrap_or("-"),
            attempts,
            kind = %failure.kind(),
            error = %failure,
            "Playback failed"
        );
        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            track_id,
            kind: failure.kind().as_str().to_string(),
            message: failure.user_message().to_string(),
            recoverable: failure.is_recoverable(),
        }));
    }

    fn handle_media_event(self: &Arc<Self>, event: MediaEvent) {
        match event {
            MediaEvent::LoadStart => trace!("Host started loading source"),
            MediaEvent::LoadedMetadata { duration } => self.on_metadata(duration),
            MediaEvent::TimeUpdate { current_time } => self.on_time_update(current_time),
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Play => {
                self.state_tx
                    .send_if_modified(|s| !std::mem::replace(&mut s.is_playing, true));
            }
            MediaEvent::Pause => {
                self.state_tx
                    .send_if_modified(|s| std::mem::replace(&mut s.is_playing, false));
            }
            MediaEvent::Waiting => {
                let core = self.core.lock();
                if core.in_flight.is_none() {
                    self.state_tx.send_if_modified(|s| {
                        s.current_track.is_some() && !std::mem::replace(&mut s.is_loading, true)
                    });
                }
            }
            MediaEvent::CanPlay | MediaEvent::CanPlayThrough => self.on_ready(),
            MediaEvent::Error { code, message } => {
                let message = message.unwrap_or_else(|| code.to_string());
                self.on_media_error(PlaybackFailure::from_media_code(code, message));
            }
        }
    }

    fn on_metadata(&self, duration: f64) {
        if !(duration.is_finite() && duration > 0.0) {
            return;
        }
        self.update(|s| {
            s.duration = duration;
            s.current_track = s
                .current_track
                .as_ref()
                .map(|track| Arc::new(track.with_duration(duration)));
            if s.elapsed > 0.0 {
                s.progress = (s.elapsed / duration * 100.0).clamp(0.0, 100.0);
            }
        });
    }

    fn on_time_update(&self, current_time: f64) {
        if !current_time.is_finite() {
            return;
        }
        if self.core.lock().in_flight.is_some() {
            trace!("Ignoring progress of previous source");
            return;
        }

        let mut tick = None;
        self.update(|s| {
            s.elapsed = current_time.max(0.0);
            if s.duration > 0.0 {
                s.progress = (s.elapsed / s.duration * 100.0).clamp(0.0, 100.0);
            }
            if let Some(track) = &s.current_track {
                tick = Some((track.id.clone(), s.elapsed, s.duration));
            }
        });

        if !self.features.enable_position_events {
            return;
        }
        if let Some((track_id, elapsed, duration)) = tick {
            self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
                track_id,
                position_ms: (elapsed * 1000.0) as u64,
                duration_ms: (duration * 1000.0) as u64,
            }));
        }
    }

    fn on_ready(&self) {
        let core = self.core.lock();
        match &core.pending {
            Some(pending) => {
                pending.signal.send_if_modified(|signal| {
                    if matches!(signal, LoadSignal::Pending) {
                        *signal = LoadSignal::Ready;
                        true
                    } else {
                        false
                    }
                });
            }
            None if core.in_flight.is_none() => {
                self.state_tx
                    .send_if_modified(|s| std::mem::replace(&mut s.is_loading, false));
            }
            None => {}
        }
    }

    fn on_media_error(&self, failure: PlaybackFailure) {
        let info = PlaybackErrorInfo::from(&failure);
        let track = {
            let core = self.core.lock();
            if let Some(pending) = &core.pending {
                // The load waiting on this source owns the retry policy
                let delivered = pending.signal.send_if_modified(|signal| {
                    if matches!(signal, LoadSignal::Pending) {
                        *signal = LoadSignal::Failed(failure.clone());
                        true
                    } else {
                        false
                    }
                });
                if delivered {
                    debug!(error = %failure, "Media error during load");
                    return;
                }
            }

            if core.in_flight.is_some() {
                debug!(error = %failure, "Ignoring media error from previous source");
                return;
            }

            let mut track = None;
            self.state_tx.send_modify(|s| {
                track = s.current_track.clone();
                if track.is_some() {
                    s.error = Some(info);
                    s.is_playing = false;
                    s.is_loading = false;
                }
            });
            track
        };

        match track {
            Some(track) => self.report_failure(Some(track.as_ref()), &failure, 0),
            None => debug!(error = %failure, "Media error without a current track"),
        }
    }

    fn on_ended(self: &Arc<Self>) {
        let (generation, has_next, length, runtime) = {
            let core = self.core.lock();
            if core.in_flight.is_some() {
                trace!("Ignoring end of previous source");
                return;
            }
            (
                core.generation,
                core.queue.has_next(),
                core.queue.len(),
                core.runtime.clone(),
            )
        };

        let mut finished = None;
        let mut auto_advance = false;
        self.update(|s| {
            s.is_playing = false;
            s.progress = 100.0;
            finished = s.current_track.clone();
            auto_advance = s.auto_advance;
        });

        if let Some(track) = &finished {
            self.emit(CoreEvent::Playback(PlaybackEvent::Completed {
                track_id: track.id.clone(),
            }));
        }

        if auto_advance && has_next {
            match runtime {
                Some(runtime) => {
                    let controller = PlaybackController {
                        inner: Arc::clone(self),
                    };
                    runtime.spawn(async move {
                        controller
                            .step(Direction::Forward, Some(generation))
                            .await;
                    });
                }
                None => {
                    warn!("No async runtime captured at init, cannot auto-advance");
                    self.update(|s| s.auto_advance = false);
                }
            }
            return;
        }

        if auto_advance {
            debug!(length, "Queue exhausted");
            self.emit(CoreEvent::Queue(QueueEvent::Exhausted { length }));
        }
        self.state_tx
            .send_if_modified(|s| std::mem::replace(&mut s.auto_advance, false));
    }
}

fn begin_track(state: &mut PlaybackState, track: &Arc<Track>, position: Option<usize>, len: usize) {
    state.current_track = Some(Arc::clone(track));
    state.is_playing = false;
    state.is_loading = true;
    state.error = None;
    state.reset_position();
    state.duration = track
        .duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .unwrap_or(0.0);
    state.queue_position = position;
    state.queue_len = len;
}

/// `None` when the load was replaced before the host answered.
async fn wait_until_ready(
    signal: &mut watch::Receiver<LoadSignal>,
) -> Option<std::result::Result<(), PlaybackFailure>> {
    loop {
        let current = signal.borrow_and_update().clone();
        match current {
            LoadSignal::Ready => return Some(Ok(())),
            LoadSignal::Failed(failure) => return Some(Err(failure)),
            LoadSignal::Pending => {}
        }
        if signal.changed().await.is_err() {
            return None;
        }
    }
}
