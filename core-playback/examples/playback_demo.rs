//! # Playback Controller Example
//!
//! Drives the controller against a simulated media host: plays an album with
//! auto-advance, seeks, mutes and finally shuts down.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bridge_traits::{
    BridgeError, LogLevel, MediaCallback, MediaError, MediaEvent, MediaEventKind, MediaHost,
    ResolveError, TrackResolver,
};
use core_playback::{AudioRef, PlaybackConfig, PlaybackController, PlaybackState, Track};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Simulated host (stands in for an audio element)
// ============================================================================

#[derive(Default)]
struct SimulatedHost {
    listeners: Mutex<HashMap<MediaEventKind, Vec<MediaCallback>>>,
    source: Mutex<Option<String>>,
}

impl SimulatedHost {
    fn fire(&self, event: MediaEvent) {
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

    /// Pretend the current source played to the end.
    fn finish(&self, duration: f64) {
        self.fire(MediaEvent::TimeUpdate {
            current_time: duration,
        });
        self.fire(MediaEvent::Ended);
    }
}

#[async_trait]
impl MediaHost for SimulatedHost {
    fn set_source(&self, url: Option<&str>) {
        *self.source.lock() = url.map(str::to_string);
    }

    fn load(&self) {
        self.fire(MediaEvent::LoadStart);
        self.fire(MediaEvent::LoadedMetadata { duration: 180.0 });
        self.fire(MediaEvent::CanPlay);
    }

    async fn play(&self) -> Result<(), MediaError> {
        self.fire(MediaEvent::Play);
        Ok(())
    }

    fn pause(&self) {
        self.fire(MediaEvent::Pause);
    }

    fn seek(&self, position_secs: f64) {
        self.fire(MediaEvent::TimeUpdate {
            current_time: position_secs,
        });
    }

    fn set_volume(&self, _volume: f64) {}

    fn set_playback_rate(&self, _rate: f64) -> Result<(), BridgeError> {
        Ok(())
    }

    fn set_muted(&self, _muted: bool) {}

    fn subscribe(&self, kind: MediaEventKind, callback: MediaCallback) {
        self.listeners.lock().entry(kind).or_default().push(callback);
    }

    fn release(&self) {
        self.listeners.lock().clear();
    }
}

struct PublicBucket;

#[async_trait]
impl TrackResolver for PublicBucket {
    async fn resolve(&self, path: &str, signed: bool) -> Result<String, ResolveError> {
        if signed {
            return Err(ResolveError::PermissionDenied(path.to_string()));
        }
        Ok(format!("https://storage.example.com/public/{}", path))
    }
}

fn print_state(label: &str, state: &PlaybackState) {
    let title = state
        .current_track
        .as_ref()
        .map(|t| t.title.as_str())
        .unwrap_or("-");
    println!(
        "{:<14} {:?} | {} | {:.1}s / {:.1}s ({:.0}%) | vol {:.2}{}",
        label,
        state.status(),
        title,
        state.elapsed,
        state.duration,
        state.progress,
        state.volume,
        if state.muted { " (muted)" } else { "" }
    );
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let host = Arc::new(SimulatedHost::default());
    let core = CoreConfig::builder()
        .media_host(host.clone())
        .track_resolver(Arc::new(PublicBucket))
        .build()?;
    let controller = PlaybackController::new(&core, PlaybackConfig::default())?;

    let album: Vec<Arc<Track>> = ["Overture", "Interlude", "Finale"]
        .iter()
        .enumerate()
        .map(|(i, title)| {
            Arc::new(
                Track::new(
                    format!("track-{}", i + 1),
                    *title,
                    "Demo Ensemble",
                    AudioRef::Path(format!("demo/{:02}.mp3", i + 1)),
                )
                .with_album("Demo Album"),
            )
        })
        .collect();

    controller.play_all(album.clone(), 0).await?;
    print_state("started", &controller.state());

    controller.seek(50.0);
    print_state("seek 50%", &controller.state());

    controller.set_volume(0.6);
    controller.toggle_mute();
    print_state("muted", &controller.state());
    controller.toggle_mute();

    let mut updates = controller.subscribe();
    for _ in 1..album.len() {
        let next_id = {
            let state = controller.state();
            let position = state.queue_position.unwrap_or(0);
            album[position + 1].id.clone()
        };
        host.finish(180.0);
        updates
            .wait_for(|s| s.is_playing && s.current_track.as_ref().is_some_and(|t| t.id == next_id))
            .await?;
        print_state("advanced", &controller.state());
    }

    host.finish(180.0);
    print_state("album done", &controller.state());

    controller.shutdown();
    print_state("shutdown", &controller.state());

    Ok(())
}
