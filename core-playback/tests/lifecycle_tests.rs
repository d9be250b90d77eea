//! Init/shutdown cycles, URL caching and published events.

mod common;

use bridge_traits::{ManualClock, MediaEvent, ResolveError, TrackResolver};
use common::{harness, harness_with, track, FakeHost};
use core_playback::{AudioRef, FailureKind, PlaybackConfig, PlaybackController, Track};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventSeverity, PlaybackEvent, QueueEvent};
use mockall::mock;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

mock! {
    Resolver {}

    #[async_trait::async_trait]
    impl TrackResolver for Resolver {
        async fn resolve(&self, path: &str, signed: bool) -> Result<String, ResolveError>;
    }
}

fn controller_with(resolver: MockResolver, clock: Arc<ManualClock>) -> (Arc<FakeHost>, PlaybackController) {
    let host = FakeHost::new();
    let core = CoreConfig::builder()
        .media_host(host.clone())
        .track_resolver(Arc::new(resolver))
        .clock(clock)
        .build()
        .unwrap();
    let controller = PlaybackController::new(&core, PlaybackConfig::default()).unwrap();
    (host, controller)
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<CoreEvent>) -> Vec<CoreEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test(start_paused = true)]
async fn init_is_idempotent() {
    let h = harness();

    h.controller.init();
    h.controller.init();
    h.controller.set_volume(0.5);

    assert_eq!(h.host.listener_count(), 10);
    assert_eq!(h.host.subscribe_calls.load(Ordering::SeqCst), 10);
}

#[tokio::test(start_paused = true)]
async fn shutdown_releases_host_across_cycles() {
    let h = harness();
    let baseline = Arc::strong_count(&h.host);

    for cycle in 1..=3 {
        h.controller.init();
        assert_eq!(h.host.listener_count(), 10);
        assert_eq!(Arc::strong_count(&h.host), baseline + 1);

        h.controller
            .play_all(vec![track("a"), track("b")], 0)
            .await
            .unwrap();
        h.controller.shutdown();

        assert_eq!(h.host.listener_count(), 0);
        assert_eq!(h.host.source(), None);
        assert_eq!(h.host.releases.load(Ordering::SeqCst), cycle);
        assert_eq!(Arc::strong_count(&h.host), baseline);
    }

    let state = h.controller.state();
    assert!(state.current_track.is_none());
    assert!(!state.is_playing);
    assert_eq!(state.queue_len, 0);
    assert!(!h.controller.has_next());
}

#[tokio::test(start_paused = true)]
async fn shutdown_twice_is_safe() {
    let h = harness();
    h.controller
        .play_track(track("a"), Vec::new(), 0)
        .await
        .unwrap();
    h.controller.set_volume(0.4);

    h.controller.shutdown();
    h.controller.shutdown();

    assert_eq!(h.host.releases.load(Ordering::SeqCst), 1);
    let state = h.controller.state();
    assert_eq!(state.volume, 0.4);
    assert!(state.current_track.is_none());

    // Never initialised at all
    let fresh = harness();
    fresh.controller.shutdown();
    assert_eq!(fresh.host.releases.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn reinit_restores_output_levels() {
    let h = harness();
    h.controller.set_volume(0.3);
    h.controller.set_playback_rate(1.25);
    h.controller.shutdown();

    *h.host.volume.lock() = 1.0;
    *h.host.rate.lock() = 1.0;
    h.controller.init();

    assert_eq!(*h.host.volume.lock(), 0.3);
    assert_eq!(*h.host.rate.lock(), 1.25);
}

#[tokio::test(start_paused = true)]
async fn host_callbacks_do_not_keep_controller_alive() {
    let h = harness();
    h.controller.init();
    let host = h.host.clone();
    drop(h);

    // The controller is gone; the weak callbacks must simply do nothing
    host.emit(MediaEvent::TimeUpdate { current_time: 3.0 });
    host.emit(MediaEvent::Ended);
    assert_eq!(host.listener_count(), 10);
}

// ============================================================================
// Resolution and URL cache
// ============================================================================

#[tokio::test(start_paused = true)]
async fn replay_uses_cached_public_url() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(1)
        .returning(|path, signed| {
            assert_eq!(path, "songs/albums/intro.mp3");
            assert!(!signed);
            Ok(format!("https://cdn.test/{}", path))
        });

    let (host, controller) = controller_with(resolver, Arc::new(ManualClock::default()));
    let intro = Arc::new(Track::new(
        "intro",
        "Intro",
        "Band",
        AudioRef::Path("/songs/albums/intro.mp3".into()),
    ));

    controller
        .play_track(intro.clone(), Vec::new(), 0)
        .await
        .unwrap();
    controller.play_track(intro, Vec::new(), 0).await.unwrap();

    assert_eq!(host.loads.load(Ordering::SeqCst), 2);
    assert!(controller.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn signed_url_is_reissued_after_expiry() {
    let clock = Arc::new(ManualClock::default());
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(2)
        .returning(|path, signed| {
            assert!(signed);
            Ok(format!("https://cdn.test/{}?token=abc", path))
        });

    let (_host, controller) = controller_with(resolver, clock.clone());
    let private = Arc::new(
        Track::new("p", "Private", "Band", AudioRef::Path("demo/p.mp3".into())).with_signed(true),
    );

    controller
        .play_track(private.clone(), Vec::new(), 0)
        .await
        .unwrap();

    // Still inside the usable lifetime: no new resolution
    clock.advance(Duration::from_secs(30 * 60));
    controller
        .play_track(private.clone(), Vec::new(), 0)
        .await
        .unwrap();

    // Past ttl minus refresh margin
    clock.advance(Duration::from_secs(30 * 60));
    controller.play_track(private, Vec::new(), 0).await.unwrap();

    assert!(controller.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn url_tracks_bypass_resolver() {
    let mut resolver = MockResolver::new();
    resolver.expect_resolve().never();

    let (host, controller) = controller_with(resolver, Arc::new(ManualClock::default()));
    let radio = Arc::new(Track::new(
        "r",
        "Radio",
        "Station",
        AudioRef::Url("https://stream.test/live.mp3".into()),
    ));

    controller.play_track(radio, Vec::new(), 0).await.unwrap();

    assert_eq!(host.source().as_deref(), Some("https://stream.test/live.mp3"));
    assert!(controller.state().is_playing);
}

#[tokio::test(start_paused = true)]
async fn missing_object_fails_after_all_attempts() {
    let mut resolver = MockResolver::new();
    resolver
        .expect_resolve()
        .times(3)
        .returning(|path, _| Err(ResolveError::NotFound(path.to_string())));

    let (host, controller) = controller_with(resolver, Arc::new(ManualClock::default()));
    let mut events = controller.events().subscribe();

    controller
        .play_track(track("gone"), Vec::new(), 0)
        .await
        .unwrap();

    let error = controller.state().error.expect("error state");
    assert_eq!(error.kind, FailureKind::ResolveNotFound);
    assert_eq!(host.loads.load(Ordering::SeqCst), 0);

    let events = drain(&mut events);
    let retries = events
        .iter()
        .filter(|e| matches!(e, CoreEvent::Playback(PlaybackEvent::RetryScheduled { .. })))
        .count();
    assert_eq!(retries, 2);

    let last = events.last().expect("events published");
    assert_eq!(last.severity(), EventSeverity::Error);
    match last {
        CoreEvent::Playback(PlaybackEvent::Error {
            track_id,
            kind,
            recoverable,
            ..
        }) => {
            assert_eq!(track_id.as_deref(), Some("gone"));
            assert_eq!(kind, "resolve_not_found");
            assert!(!recoverable);
        }
        other => panic!("unexpected last event {:?}", other),
    }
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test(start_paused = true)]
async fn successful_play_publishes_lifecycle_events() {
    let h = harness();
    let mut events = h.controller.events().subscribe();

    h.controller
        .play_all(vec![track("a"), track("b")], 0)
        .await
        .unwrap();

    let events = drain(&mut events);
    assert_eq!(
        events,
        vec![
            CoreEvent::Queue(QueueEvent::Replaced {
                length: 2,
                position: 0
            }),
            CoreEvent::Playback(PlaybackEvent::TrackChanged {
                track_id: "a".into(),
                title: "Title a".into(),
                artist: "Artist".into(),
            }),
            CoreEvent::Playback(PlaybackEvent::Loading {
                track_id: "a".into(),
                attempt: 1
            }),
            CoreEvent::Playback(PlaybackEvent::Started {
                track_id: "a".into()
            }),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn position_events_follow_feature_flag() {
    let host = FakeHost::new();
    let resolver = common::FakeResolver::new();
    let core = CoreConfig::builder()
        .media_host(host.clone())
        .track_resolver(resolver)
        .enable_position_events(true)
        .build()
        .unwrap();
    let controller = PlaybackController::new(&core, PlaybackConfig::default()).unwrap();

    controller
        .play_track(track("a"), Vec::new(), 0)
        .await
        .unwrap();
    let mut events = controller.events().subscribe();
    host.emit(MediaEvent::TimeUpdate { current_time: 1.5 });

    assert_eq!(
        drain(&mut events),
        vec![CoreEvent::Playback(PlaybackEvent::PositionChanged {
            track_id: "a".into(),
            position_ms: 1500,
            duration_ms: 200_000,
        })]
    );

    // Off by default
    let h = harness_with(PlaybackConfig::default(), None);
    h.controller
        .play_track(track("a"), Vec::new(), 0)
        .await
        .unwrap();
    let mut events = h.controller.events().subscribe();
    h.host.emit(MediaEvent::TimeUpdate { current_time: 1.5 });
    assert!(drain(&mut events).is_empty());
}
