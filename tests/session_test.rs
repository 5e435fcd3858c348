//! Session controller scenarios driven through the public handle.

mod common;

use std::time::{Duration, Instant};

use castit::device::{DeviceDescriptor, Player, PlayerEvent};
use castit::session::{FileOptions, PlayOptions};
use castit_av::probe::SubtitleStream;
use castit_core::events::{EventPayload, PlaybackState};
use castit_core::{Error, ErrorKind};
use common::{h264_metadata, next_matching, LoadBehavior, TestHarness};

#[tokio::test]
async fn play_connects_and_loads_through_the_stream_route() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.entry_id, Some(ids[0]));
    assert_eq!(snapshot.duration_secs, Some(600.0));
    assert_eq!(snapshot.device_id.as_ref().map(|d| d.as_str()), Some("tv"));

    let loads = h.player.loads();
    assert_eq!(loads.len(), 1);
    assert!(loads[0].url.starts_with("http://127.0.0.1:9696/media?entry="));
    assert_eq!(loads[0].content_type, "video/mp4");
    assert!(h.streamer.plan().is_some());
    assert_eq!(h.player.calls()[0], "connect tv");

    let history = h.history();
    assert!(history
        .iter()
        .any(|e| matches!(e, EventPayload::DeviceConnected { .. })));
    assert!(history
        .iter()
        .any(|e| matches!(e, EventPayload::FileLoaded { entry_id, .. } if *entry_id == ids[0])));
}

#[tokio::test]
async fn no_device_is_reported_to_the_user() {
    let h = TestHarness::new();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    let err = h.session.play(ids[0]).await.unwrap_err();
    assert!(matches!(err, Error::NoDevice));
    assert_eq!(h.session.snapshot().state, PlaybackState::Idle);
    assert!(h.player.loads().is_empty());
}

#[tokio::test]
async fn missing_file_is_not_found_and_flagged() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["gone.mkv"], &["gone.mkv"]);

    let err = h.session.play(ids[0]).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));

    let library = h.library.read();
    let (_, entry) = library.find_entry(ids[0]).unwrap();
    assert!(!entry.exists);
}

#[tokio::test]
async fn unprobed_file_is_not_ready() {
    let h = TestHarness::new();
    h.register_device();
    let (playlist_id, ids) = h.add_playlist(&["a.mp4"], &[]);
    let path = h.dir.path().join("b.mp4");
    std::fs::write(&path, b"media").unwrap();
    let unprobed = h
        .session
        .add_entries(playlist_id, vec![path.to_string_lossy().into_owned()])
        .await
        .unwrap();

    let err = h.session.play(unprobed[0]).await.unwrap_err();
    assert!(matches!(err, Error::NotReady(_)));
    assert_eq!(h.session.snapshot().state, PlaybackState::Idle);
    assert!(h.player.loads().is_empty());
    assert!(h
        .library
        .read()
        .find_entry(unprobed[0])
        .unwrap()
        .1
        .metadata
        .is_none());
    assert!(h.session.play(ids[0]).await.is_ok());
}

#[tokio::test]
async fn replaying_the_current_entry_needs_force() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();
    let err = h.session.play(ids[0]).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyPlaying(_)));

    h.session
        .play_with(ids[0], castit::session::PlayOptions::user().forced())
        .await
        .unwrap();
    assert_eq!(h.player.loads().len(), 2);
}

#[tokio::test]
async fn automatic_advance_skips_missing_files() {
    let h = TestHarness::new();
    h.register_device();
    let (playlist_id, ids) = h.add_playlist(&["1.mp4", "2.mp4", "3.mp4"], &["1.mp4", "2.mp4"]);
    h.set_playlist_looping(playlist_id);

    h.session.play(ids[2]).await.unwrap();
    let mut rx = h.events.subscribe();
    h.player.emit(PlayerEvent::EndReached);

    next_matching(&mut rx, |e| matches!(e, EventPayload::FileLoaded { .. })).await;
    let snapshot = h.wait_for(|s| s.state == PlaybackState::Playing).await;
    assert_eq!(snapshot.entry_id, Some(ids[2]));
    assert_eq!(h.player.loads().len(), 2);
    assert!(!h
        .history()
        .iter()
        .any(|e| matches!(e, EventPayload::PlaybackError { .. })));
}

#[tokio::test]
async fn end_of_playlist_stops_and_marks_played() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.player.emit(PlayerEvent::EndReached);

    h.wait_for(|s| s.state == PlaybackState::Stopped).await;
    let library = h.library.read();
    let (_, entry) = library.find_entry(ids[0]).unwrap();
    assert_eq!(entry.played_percentage, 100.0);
    assert_eq!(entry.elapsed_secs, 600.0);
}

#[tokio::test]
async fn looping_entry_replays_from_the_start() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4", "b.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.session.set_entry_loop(ids[0], true).await.unwrap();
    let mut rx = h.events.subscribe();
    h.player.emit(PlayerEvent::EndReached);

    next_matching(&mut rx, |e| matches!(e, EventPayload::FileLoaded { .. })).await;
    let loads = h.player.loads();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].url.contains(&format!("entry={}", ids[0])));
    assert!(loads[1].url.ends_with("&t=0"));
}

#[tokio::test]
async fn enabling_a_loop_clears_every_other_loop() {
    let h = TestHarness::new();
    let (_, first) = h.add_playlist(&["a.mp4"], &[]);
    let (_, second) = h.add_playlist(&["b.mp4"], &[]);

    h.session.set_entry_loop(first[0], true).await.unwrap();
    h.session.set_entry_loop(second[0], true).await.unwrap();

    let library = h.library.read();
    assert!(!library.find_entry(first[0]).unwrap().1.looping);
    assert!(library.find_entry(second[0]).unwrap().1.looping);
    drop(library);

    let changes: Vec<_> = h
        .history()
        .into_iter()
        .filter_map(|e| match e {
            EventPayload::LoopChanged { entry_id, looping } => Some((entry_id, looping)),
            _ => None,
        })
        .collect();
    assert_eq!(
        changes,
        vec![(first[0], true), (first[0], false), (second[0], true)]
    );
}

#[tokio::test]
async fn stop_is_idempotent_and_clears_loops() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.session.set_entry_loop(ids[0], true).await.unwrap();
    h.session.stop().await.unwrap();
    h.session.stop().await.unwrap();

    let stopped = h
        .history()
        .iter()
        .filter(|e| matches!(e, EventPayload::Stopped))
        .count();
    assert_eq!(stopped, 1);
    assert_eq!(h.session.snapshot().state, PlaybackState::Stopped);
    assert!(h.streamer.plan().is_none());
    assert!(!h.library.read().find_entry(ids[0]).unwrap().1.looping);

    // The cancelled token is re-armed: playing again works.
    h.session.play(ids[0]).await.unwrap();
    assert_eq!(h.session.snapshot().state, PlaybackState::Playing);
}

#[tokio::test]
async fn stop_can_preserve_loops() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.session.set_entry_loop(ids[0], true).await.unwrap();
    h.session.stop_with(true).await.unwrap();

    assert!(h.library.read().find_entry(ids[0]).unwrap().1.looping);
}

#[tokio::test]
async fn seeking_a_transcoded_stream_restarts_it() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mkv"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.session.seek(100.0).await.unwrap();

    let loads = h.player.loads();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].url.ends_with("&t=100"));
    assert_eq!(loads[1].seek_secs, 0.0);
    assert_eq!(h.streamer.plan().unwrap().seek_secs, 100.0);

    // Device time is relative to the restarted stream.
    h.player.emit(PlayerEvent::TimeChanged { secs: 5.0 });
    let snapshot = h.wait_for(|s| s.elapsed_secs == 105.0).await;
    assert!((snapshot.played_percentage - 17.5).abs() < 1e-9);
    assert_eq!(h.library.read().find_entry(ids[0]).unwrap().1.elapsed_secs, 105.0);
}

#[tokio::test]
async fn seek_targets_are_clamped() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mkv"], &[]);

    h.session.play(ids[0]).await.unwrap();
    h.session.seek(10_000.0).await.unwrap();
    assert_eq!(h.streamer.plan().unwrap().seek_secs, 599.0);

    h.session.go_to_position(50.0).await.unwrap();
    assert_eq!(h.streamer.plan().unwrap().seek_secs, 300.0);

    h.session.add_seconds(-500.0).await.unwrap();
    assert_eq!(h.streamer.plan().unwrap().seek_secs, 0.0);
}

#[tokio::test]
async fn play_resumes_from_stored_progress() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    {
        let mut library = h.library.write();
        let (_, entry) = library.find_entry_mut(ids[0]).unwrap();
        entry.duration_secs = Some(600.0);
        entry.record_progress(42.0);
    }

    h.session.play(ids[0]).await.unwrap();
    assert!(h.player.loads()[0].url.ends_with("&t=42"));
}

#[tokio::test]
async fn rejected_load_stops_with_a_notification() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.player.set_behavior(LoadBehavior::NoStatus);

    // Device failures are not returned to the caller.
    h.session.play(ids[0]).await.unwrap();

    assert_eq!(h.session.snapshot().state, PlaybackState::Stopped);
    let error = h
        .history()
        .into_iter()
        .find_map(|e| match e {
            EventPayload::PlaybackError { kind, .. } => Some(kind),
            _ => None,
        })
        .expect("a playback error was broadcast");
    assert_eq!(error, ErrorKind::LoadFailed);
}

#[tokio::test]
async fn stream_failure_stops_playback() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();

    h.session
        .report_stream_failure(Error::process("ffmpeg", "exit status 1"));

    h.wait_for(|s| s.state == PlaybackState::Stopped).await;
    assert!(h.history().iter().any(|e| matches!(
        e,
        EventPayload::PlaybackError {
            kind: ErrorKind::ProcessFailure,
            ..
        }
    )));
}

#[tokio::test]
async fn concurrent_skips_are_dropped() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4", "b.mp4", "c.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();

    let (first, second) = tokio::join!(h.session.next(), h.session.next());
    let accepted = [first.unwrap(), second.unwrap()];
    assert_eq!(accepted.iter().filter(|a| **a).count(), 1);
    assert_eq!(h.session.snapshot().entry_id, Some(ids[1]));
}

#[tokio::test]
async fn next_at_the_end_stops() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4", "b.mp4"], &[]);
    h.session.play(ids[1]).await.unwrap();

    assert!(h.session.next().await.unwrap());
    assert_eq!(h.session.snapshot().state, PlaybackState::Stopped);

    assert!(matches!(
        h.session.next().await.unwrap_err(),
        Error::InvalidState(_)
    ));
}

#[tokio::test]
async fn previous_moves_back() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4", "b.mp4"], &[]);
    h.session.play(ids[1]).await.unwrap();

    h.session.previous().await.unwrap();
    assert_eq!(h.session.snapshot().entry_id, Some(ids[0]));
}

#[tokio::test]
async fn disconnect_returns_to_idle() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();

    h.player.emit(PlayerEvent::Disconnected {
        epoch: h.player.epoch(),
        reason: Some("heartbeat lost".into()),
    });

    let snapshot = h.wait_for(|s| s.state == PlaybackState::Idle).await;
    assert!(snapshot.device_id.is_none());
    assert!(snapshot.entry_id.is_none());
    assert!(h.devices.connected().is_none());
    // The transcode plan is left alone until someone stops.
    assert!(h.streamer.plan().is_some());
    assert!(!h.player.calls().contains(&"stop".to_string()));
}

#[tokio::test]
async fn pause_and_resume() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);

    assert!(matches!(
        h.session.pause().await.unwrap_err(),
        Error::InvalidState(_)
    ));

    h.session.play(ids[0]).await.unwrap();
    h.session.pause().await.unwrap();
    h.session.pause().await.unwrap();
    assert_eq!(h.session.snapshot().state, PlaybackState::Paused);

    h.session.toggle_pause().await.unwrap();
    assert_eq!(h.session.snapshot().state, PlaybackState::Playing);
    let pauses = h.player.calls().iter().filter(|c| *c == "pause").count();
    assert_eq!(pauses, 1);
}

#[tokio::test]
async fn volume_is_clamped() {
    let h = TestHarness::new();
    h.session.set_volume(0.3, false).await.unwrap();
    h.session.set_volume(-2.0, true).await.unwrap();

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.volume, 0.0);
    assert!(snapshot.muted);

    let changes = h
        .history()
        .iter()
        .filter(|e| matches!(e, EventPayload::VolumeChanged { .. }))
        .count();
    assert_eq!(changes, 2);
}

#[tokio::test]
async fn remote_entry_needs_connectivity() {
    let h = TestHarness::new();
    h.register_device();
    let playlist_id = h.session.add_playlist("radio").await.unwrap();
    let ids = h
        .session
        .add_entries(playlist_id, vec!["https://example.com/stream.mp3".into()])
        .await
        .unwrap();
    h.connectivity
        .online
        .store(false, std::sync::atomic::Ordering::SeqCst);

    let err = h.session.play(ids[0]).await.unwrap_err();
    assert!(matches!(err, Error::NoConnectivity(_)));
}

#[tokio::test]
async fn changing_file_options_reloads_in_place() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mkv"], &[]);
    h.session.play(ids[0]).await.unwrap();
    h.player.emit(PlayerEvent::TimeChanged { secs: 30.0 });
    h.wait_for(|s| s.elapsed_secs == 30.0).await;

    h.session
        .set_file_options(FileOptions {
            audio_stream: Some(0),
            ..FileOptions::default()
        })
        .await
        .unwrap();

    let loads = h.player.loads();
    assert_eq!(loads.len(), 2);
    assert!(loads[1].url.ends_with("&t=30"));
    assert_eq!(h.session.snapshot().file_options.audio_stream, Some(0));
}

#[tokio::test]
async fn playlist_mutations_keep_positions_dense() {
    let h = TestHarness::new();
    let playlist_id = h.session.add_playlist("mix").await.unwrap();
    let ids = h
        .session
        .add_entries(
            playlist_id,
            vec!["/m/a.mp3".into(), "/m/b.mp3".into(), "/m/c.mp3".into()],
        )
        .await
        .unwrap();

    h.session.move_entry(playlist_id, ids[2], 1).await.unwrap();
    assert_eq!(h.session.remove_entries(playlist_id, vec![ids[0]]).await.unwrap(), 1);

    let library = h.library.read();
    let playlist = library.playlist(playlist_id).unwrap();
    let order: Vec<_> = playlist.entries.iter().map(|e| (e.id, e.position)).collect();
    assert_eq!(order, vec![(ids[2], 1), (ids[1], 2)]);
    drop(library);

    h.session.remove_playlist(playlist_id).await.unwrap();
    assert!(matches!(
        h.session.remove_playlist(playlist_id).await.unwrap_err(),
        Error::NotFound { .. }
    ));
}

#[tokio::test]
async fn shutdown_stops_the_actor() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();

    h.shutdown.cancel();
    h.task.await.unwrap();
    assert!(matches!(
        h.session.pause().await.unwrap_err(),
        Error::Internal(_)
    ));
    assert_eq!(h.player.calls().last().map(String::as_str), Some("disconnect"));
    assert!(!h.player.is_connected());
}

#[tokio::test]
async fn commands_are_served_while_a_file_is_inspected() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.prober.set_delay(Duration::from_millis(1500));

    let session = h.session.clone();
    let play_ids = ids.clone();
    let play = tokio::spawn(async move { session.play(play_ids[0]).await });
    h.prober.wait_for_calls(1).await;

    let started = Instant::now();
    h.session.set_volume(0.4, false).await.unwrap();
    assert!(started.elapsed() < Duration::from_millis(500));
    assert_eq!(h.session.snapshot().volume, 0.4);

    play.await.unwrap().unwrap();
    assert_eq!(h.session.snapshot().state, PlaybackState::Playing);
    assert!(h.library.read().find_entry(ids[0]).unwrap().1.metadata.is_some());
}

#[tokio::test]
async fn stop_abandons_a_load_in_flight() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.prober.set_delay(Duration::from_secs(30));

    let session = h.session.clone();
    let play = tokio::spawn(async move { session.play(ids[0]).await });
    h.prober.wait_for_calls(1).await;

    h.session.stop().await.unwrap();
    let result = tokio::time::timeout(Duration::from_secs(5), play)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(h.player.loads().is_empty());
    assert_eq!(h.session.snapshot().state, PlaybackState::Stopped);
}

#[tokio::test]
async fn disconnect_from_an_earlier_connection_is_ignored() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4", "b.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();
    let stale = h.player.epoch();

    // The link drops silently; the next play reconnects.
    h.player.drop_link();
    h.session.play(ids[1]).await.unwrap();
    assert!(h.player.epoch() > stale);

    // The old connection's loss is reported late.
    let mut rx = h.events.subscribe();
    h.player.emit(PlayerEvent::Disconnected {
        epoch: stale,
        reason: Some("socket closed".into()),
    });
    h.player.emit(PlayerEvent::TimeChanged { secs: 12.0 });
    next_matching(&mut rx, |e| matches!(e, EventPayload::TimeChanged { .. })).await;

    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.state, PlaybackState::Playing);
    assert_eq!(snapshot.entry_id, Some(ids[1]));
    assert_eq!(snapshot.device_id.as_ref().map(|d| d.as_str()), Some("tv"));
    assert!(h.devices.connected().is_some());
    assert!(!h
        .history()
        .iter()
        .any(|e| matches!(e, EventPayload::Disconnected { .. })));
}

#[tokio::test]
async fn switching_devices_closes_the_old_connection() {
    let h = TestHarness::new();
    h.register_device();
    h.devices
        .register(DeviceDescriptor::new("speaker", "Kitchen", "10.0.0.6", 8009));
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    h.session.play(ids[0]).await.unwrap();

    h.session
        .connect(castit_core::DeviceId::new("speaker"))
        .await
        .unwrap();

    let calls = h.player.calls();
    let tail: Vec<&str> = calls.iter().rev().take(3).rev().map(String::as_str).collect();
    assert_eq!(tail, vec!["stop", "disconnect", "connect speaker"]);
    let snapshot = h.session.snapshot();
    assert_eq!(snapshot.device_id.as_ref().map(|d| d.as_str()), Some("speaker"));
    assert_eq!(snapshot.state, PlaybackState::Stopped);
    assert_eq!(h.devices.connected().unwrap().id.as_str(), "speaker");
    assert!(h.history().iter().any(|e| matches!(
        e,
        EventPayload::Disconnected { device_id: Some(id) } if id.as_str() == "tv"
    )));
}

#[tokio::test]
async fn subtitles_are_converted_before_the_device_load() {
    let h = TestHarness::with_subtitle_tool(|config| {
        config.playback.subtitle_delay_secs = 1.5;
    });
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mkv"], &[]);
    let path = h.dir.path().join("a.mkv");
    let mut metadata = h264_metadata(600.0);
    metadata.subtitles.push(SubtitleStream {
        index: 2,
        codec_name: "subrip".into(),
        language: Some("eng".into()),
        title: None,
        is_default: true,
    });
    h.prober.insert(path.to_string_lossy(), metadata);

    h.session
        .play_with(ids[0], PlayOptions::user().at(30.0))
        .await
        .unwrap();

    let loads = h.player.loads();
    assert_eq!(
        loads[0].subtitle_url.as_deref(),
        Some(format!("http://127.0.0.1:9696/subtitles?entry={}", ids[0]).as_str())
    );
    let args = h.tool_log();
    assert!(args.contains("-itsoffset 1.500"), "{args}");
    assert!(args.contains("-ss 30.000"), "{args}");
    assert!(args.contains("-map 0:s:0"), "{args}");
    let vtt = std::fs::read_to_string(h.config.paths.subtitle_file()).unwrap();
    assert!(vtt.starts_with("WEBVTT"));
}

#[tokio::test]
async fn missing_subtitle_tool_only_costs_the_subtitles() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mkv"], &[]);
    h.session
        .set_file_options(FileOptions {
            subtitle_stream: Some(0),
            ..FileOptions::default()
        })
        .await
        .unwrap();

    h.session.play(ids[0]).await.unwrap();
    assert_eq!(h.session.snapshot().state, PlaybackState::Playing);
    assert!(h.player.loads()[0].subtitle_url.is_none());
}

#[tokio::test]
async fn preview_ranges_follow_the_loaded_file() {
    let h = TestHarness::new();
    h.register_device();
    let (_, ids) = h.add_playlist(&["a.mp4"], &[]);
    assert!(h.thumbnails.ranges().await.is_empty());

    h.session.play(ids[0]).await.unwrap();
    // 600 seconds at one tile per minute, plus the closing second.
    let ranges = h.thumbnails.ranges().await;
    assert_eq!(ranges.len(), 11);
    assert_eq!(ranges.last().unwrap().maximum, 600);
    assert!(h.thumbnails.get_tile(90).await.is_ok());

    h.session.stop().await.unwrap();
    assert!(h.thumbnails.ranges().await.is_empty());
    assert!(matches!(
        h.thumbnails.get_tile(90).await,
        Err(Error::NotReady(_))
    ));
}
