//! Shared fakes for controller tests.
//!
//! `FakeHost` fires media events synchronously from inside the calls that
//! would trigger them on a real audio element, which is the harshest
//! ordering the controller has to cope with.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, Clock, MediaCallback, MediaError, MediaErrorCode, MediaEvent, MediaEventKind,
    MediaHost, ResolveError, TrackResolver,
};
use core_playback::{AudioRef, PlaybackConfig, PlaybackController, PlaybackState, Track};
use core_runtime::config::CoreConfig;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};

// ============================================================================
// Fake MediaHost
// ============================================================================

pub struct FakeHost {
    listeners: Mutex<HashMap<MediaEventKind, Vec<MediaCallback>>>,
    source: Mutex<Option<String>>,
    /// Duration reported through `LoadedMetadata` on every load.
    duration: Mutex<f64>,
    /// Report `CanPlay` from inside `load()`.
    auto_ready: AtomicBool,
    load_errors: Mutex<VecDeque<MediaErrorCode>>,
    play_results: Mutex<VecDeque<Result<(), MediaError>>>,
    reject_rates: AtomicBool,
    pub volume: Mutex<f64>,
    pub muted: AtomicBool,
    pub rate: Mutex<f64>,
    pub position: Mutex<f64>,
    pub loads: AtomicUsize,
    pub play_calls: AtomicUsize,
    pub pause_calls: AtomicUsize,
    pub subscribe_calls: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            listeners: Mutex::new(HashMap::new()),
            source: Mutex::new(None),
            duration: Mutex::new(200.0),
            auto_ready: AtomicBool::new(true),
            load_errors: Mutex::new(VecDeque::new()),
            play_results: Mutex::new(VecDeque::new()),
            reject_rates: AtomicBool::new(false),
            volume: Mutex::new(1.0),
            muted: AtomicBool::new(false),
            rate: Mutex::new(1.0),
            position: Mutex::new(0.0),
            loads: AtomicUsize::new(0),
            play_calls: AtomicUsize::new(0),
            pause_calls: AtomicUsize::new(0),
            subscribe_calls: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
        })
    }

    pub fn set_duration(&self, duration: f64) {
        *self.duration.lock() = duration;
    }

    pub fn set_auto_ready(&self, ready: bool) {
        self.auto_ready.store(ready, Ordering::SeqCst);
    }

    pub fn fail_next_load(&self, code: MediaErrorCode) {
        self.load_errors.lock().push_back(code);
    }

    pub fn queue_play_result(&self, result: Result<(), MediaError>) {
        self.play_results.lock().push_back(result);
    }

    pub fn reject_rates(&self, reject: bool) {
        self.reject_rates.store(reject, Ordering::SeqCst);
    }

    pub fn source(&self) -> Option<String> {
        self.source.lock().clone()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Deliver `event` to every callback registered for its kind.
    pub fn emit(&self, event: MediaEvent) {
        let callbacks = self
            .listeners
            .lock()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for callback in callbacks {
            callback(event.clone());
        }
    }
}

#[async_trait]
impl MediaHost for FakeHost {
    fn set_source(&self, url: Option<&str>) {
        *self.source.lock() = url.map(str::to_string);
        *self.position.lock() = 0.0;
    }

    fn load(&self) {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.emit(MediaEvent::LoadStart);

        let failure = self.load_errors.lock().pop_front();
        if let Some(code) = failure {
            self.emit(MediaEvent::Error {
                code,
                message: None,
            });
            return;
        }

        if self.auto_ready.load(Ordering::SeqCst) {
            let duration = *self.duration.lock();
            self.emit(MediaEvent::LoadedMetadata { duration });
            self.emit(MediaEvent::CanPlay);
        }
    }

    async fn play(&self) -> Result<(), MediaError> {
        self.play_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.play_results.lock().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.emit(MediaEvent::Play);
        }
        result
    }

    fn pause(&self) {
        self.pause_calls.fetch_add(1, Ordering::SeqCst);
        self.emit(MediaEvent::Pause);
    }

    fn seek(&self, position_secs: f64) {
        *self.position.lock() = position_secs;
    }

    fn set_volume(&self, volume: f64) {
        *self.volume.lock() = volume;
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), BridgeError> {
        if self.reject_rates.load(Ordering::SeqCst) {
            return Err(BridgeError::Rejected(format!("rate {}", rate)));
        }
        *self.rate.lock() = rate;
        Ok(())
    }

    fn set_muted(&self, muted: bool) {
        self.muted.store(muted, Ordering::SeqCst);
    }

    fn subscribe(&self, kind: MediaEventKind, callback: MediaCallback) {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().entry(kind).or_default().push(callback);
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.listeners.lock().clear();
    }
}

// ============================================================================
// Fake TrackResolver
// ============================================================================

pub struct FakeResolver {
    calls: Mutex<Vec<(String, bool)>>,
    failures_left: AtomicUsize,
    failure: Mutex<ResolveError>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            failures_left: AtomicUsize::new(0),
            failure: Mutex::new(ResolveError::Other("storage unavailable".into())),
            gates: Mutex::new(HashMap::new()),
        })
    }

    /// Fail the next `times` calls with `error`.
    pub fn fail_times(&self, times: usize, error: ResolveError) {
        *self.failure.lock() = error;
        self.failures_left.store(times, Ordering::SeqCst);
    }

    /// Hold resolution of `path` until the returned gate is notified.
    pub fn gate(&self, path: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().insert(path.to_string(), Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

pub fn url_for(path: &str, signed: bool) -> String {
    if signed {
        format!("https://cdn.test/{}?token=signed", path)
    } else {
        format!("https://cdn.test/{}", path)
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, path: &str, signed: bool) -> Result<String, ResolveError> {
        self.calls.lock().push((path.to_string(), signed));

        let gate = self.gates.lock().get(path).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(self.failure.lock().clone());
        }

        Ok(url_for(path, signed))
    }
}

// ============================================================================
// Harness
// ============================================================================

pub fn track(id: &str) -> Arc<Track> {
    Arc::new(Track::new(
        id,
        format!("Title {}", id),
        "Artist",
        AudioRef::Path(format!("{}.mp3", id)),
    ))
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub resolver: Arc<FakeResolver>,
    pub controller: PlaybackController,
}

pub fn harness() -> Harness {
    harness_with(PlaybackConfig::default(), None)
}

pub fn harness_with(config: PlaybackConfig, clock: Option<Arc<dyn Clock>>) -> Harness {
    let host = FakeHost::new();
    let resolver = FakeResolver::new();

    let mut builder = CoreConfig::builder()
        .media_host(host.clone())
        .track_resolver(resolver.clone());
    if let Some(clock) = clock {
        builder = builder.clock(clock);
    }
    let core = builder.build().unwrap();

    let controller = PlaybackController::new(&core, config).unwrap();
    Harness {
        host,
        resolver,
        controller,
    }
}

/// Wait until the observed state satisfies `predicate`.
pub async fn wait_for(
    rx: &mut watch::Receiver<PlaybackState>,
    predicate: impl FnMut(&PlaybackState) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(120), rx.wait_for(predicate))
        .await
        .expect("state condition not reached")
        .expect("state channel closed");
}

/// Wait until `condition` holds, yielding to other tasks in between.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

pub fn current_id(state: &PlaybackState) -> Option<String> {
    state.current_track.as_ref().map(|t| t.id.clone())
}
