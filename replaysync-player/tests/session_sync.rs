// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Integration tests for session synchronization.

use replaysync_client::{MemorySession, MemorySource, TracesResponse};
use replaysync_core::{PlayerStatus, RecordedEvent, SyncConfig, SyncError, TickKind};
use replaysync_player::{CursorState, HeadlessEngine, PlaybackEvent, SessionSync};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const EPOCH: i64 = 1_000_000;

type Factory = fn(Vec<RecordedEvent>) -> HeadlessEngine;

fn recording(chunks: usize, per_chunk: usize) -> Vec<Vec<RecordedEvent>> {
    (0..chunks)
        .map(|c| {
            (0..per_chunk)
                .map(|i| {
                    let n = (c * per_chunk + i) as i64;
                    RecordedEvent::new(EPOCH + n * 1_000, 3, json!({"source": 2}))
                })
                .collect()
        })
        .collect()
}

fn actions() -> Vec<Value> {
    vec![
        json!({"type": "action", "id": "a1", "at": 50_000}),
        json!({"type": "request", "actionId": "a1", "rid": "r-1", "start": 53_000, "end": 53_400}),
        json!({"type": "email", "at": 60_000}),
    ]
}

fn traces() -> TracesResponse {
    serde_json::from_value(json!({
        "items": [{
            "key": "web-1",
            "traces": [{
                "requestRid": "r-1",
                "request": {"method": "POST", "path": "/checkout"},
                "batches": [{"trace": {"events": [
                    {"ts": 0.0, "phase": "enter", "fn": "{main}", "depth": 0},
                    {"ts": 1.0, "phase": "enter", "fn": "handle", "depth": 1},
                    {"ts": 2.0, "phase": "enter", "fn": "query", "file": "/app/vendor/db.php", "depth": 2},
                    {"ts": 9.0, "phase": "exit", "fn": "query", "depth": 2},
                    {"ts": 12.0, "phase": "exit", "fn": "handle", "depth": 1},
                    {"ts": 13.0, "phase": "exit", "fn": "{main}", "depth": 0}
                ]}}]
            }]
        }]
    }))
    .unwrap()
}

fn session() -> MemorySession {
    MemorySession::new()
        .with_actions(actions())
        .with_event_chunks(&recording(10, 2))
        .unwrap()
        .with_traces(traces())
}

fn config() -> SyncConfig {
    SyncConfig {
        pull_limit: 3,
        ..SyncConfig::default()
    }
}

fn sync_with(source: Arc<MemorySource>, config: SyncConfig) -> SessionSync<Factory> {
    SessionSync::new(config, source, HeadlessEngine::new as Factory)
}

/// Seeking to a backend tick shows only the ticks around it, and show-all
/// brings back the whole timeline.
#[tokio::test(start_paused = true)]
async fn test_seek_to_tick_filters_timeline() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(source, config());

    assert_eq!(sync.open("s1").await.unwrap(), PlayerStatus::Playing);
    assert_eq!(sync.view().clock().offset(), Some(50_000 - EPOCH));
    assert_eq!(sync.view().index().len(), 3);

    let second = sync.view().index().ticks()[1].clone();
    assert_eq!(second.kind, TickKind::Request);
    assert_eq!(sync.seek_to_tick(&second).unwrap(), 3_000);

    let visible = sync.visible_ticks();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].request_rid.as_deref(), Some("r-1"));
    assert_eq!(sync.view().server_time(), Some(53_000));

    sync.set_show_all(true);
    assert_eq!(sync.visible_ticks().len(), 3);
    sync.set_show_all(false);
    assert_eq!(sync.visible_ticks().len(), 1);
}

/// The feeder streams every remaining chunk into the engine.
#[tokio::test(start_paused = true)]
async fn test_stream_is_fully_fed() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(source, config());
    sync.open("s1").await.unwrap();

    loop {
        match sync.next_event().await {
            Some(PlaybackEvent::StreamFinished) => break,
            Some(_) => continue,
            None => panic!("session closed before the stream finished"),
        }
    }

    let progress = sync.stream_progress().unwrap();
    assert_eq!(progress.state, CursorState::Done);
    assert_eq!(progress.watermark, 10);
    assert_eq!(progress.streamed_events, 20);
    assert_eq!(progress.decode_failures, 0);

    let playback = sync.playback().unwrap();
    assert_eq!(playback.total_time, Some(19_000));
    assert_eq!(playback.fed_events, 14);
}

/// Positions published by the poller move the visible window.
#[tokio::test(start_paused = true)]
async fn test_position_updates_follow_playback() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(source, config());
    sync.open("s1").await.unwrap();

    // playback 0 maps to server 50_000: only the action is in range
    assert_eq!(sync.view().position(), Some(0));
    assert_eq!(sync.visible_ticks().len(), 1);
    assert_eq!(sync.visible_ticks()[0].kind, TickKind::Action);

    tokio::time::sleep(Duration::from_millis(2_100)).await;
    sync.pump();
    let position = sync.view().position().unwrap();
    assert!(position >= 1_800, "position {}", position);
    assert!(sync.visible_ticks().iter().any(|t| t.kind == TickKind::Request));
}

/// Zero timing values in a hand-built config are clamped instead of
/// crashing the background tasks.
#[tokio::test(start_paused = true)]
async fn test_zero_poll_interval_is_clamped() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(
        source,
        SyncConfig {
            poll_interval_ms: 0,
            min_bootstrap_events: 0,
            ..config()
        },
    );
    assert_eq!(sync.open("s1").await.unwrap(), PlayerStatus::Playing);

    tokio::time::sleep(Duration::from_millis(50)).await;
    sync.pump();
    let position = sync.view().position().unwrap();
    assert!(position > 0, "position {}", position);
    assert_eq!(sync.status(), PlayerStatus::Playing);
}

/// A refreshed backend log with an earlier record moves the offset but
/// not the playback position.
#[tokio::test]
async fn test_refresh_backend_recomputes_offset() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(
        source.clone(),
        SyncConfig {
            autoplay: false,
            ..config()
        },
    );
    assert_eq!(sync.open("s1").await.unwrap(), PlayerStatus::Paused);
    assert_eq!(sync.view().server_time(), Some(50_000));

    let mut refreshed = actions();
    refreshed.push(json!({"type": "action", "id": "a0", "at": 45_000}));
    source.insert("s1", session().with_actions(refreshed));

    assert!(sync.refresh_backend().await.unwrap());
    assert_eq!(sync.view().position(), Some(0));
    assert_eq!(sync.view().server_time(), Some(45_000));
    assert_eq!(sync.view().index().len(), 4);

    assert!(!sync.refresh_backend().await.unwrap());
}

/// Aborting while a refresh is in flight discards its result.
#[tokio::test(start_paused = true)]
async fn test_aborted_refresh_is_discarded() {
    let source = Arc::new(MemorySource::new().with_latency(Duration::from_millis(100)));
    source.insert("s1", session());
    let mut sync = sync_with(source.clone(), config());
    sync.open("s1").await.unwrap();

    source.insert("s1", session().with_actions(vec![json!({"type": "action", "at": 1})]));
    let handle = sync.abort_handle().unwrap();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.cancel();
    });

    let err = sync.refresh_backend().await.unwrap_err();
    assert!(err.is_stale());
    assert_eq!(sync.view().index().len(), 3);
    assert_eq!(sync.view().clock().earliest_tick(), Some(50_000));
}

/// Switching sessions mid-load leaves only the new session's state.
#[tokio::test(start_paused = true)]
async fn test_switch_session_while_loading() {
    let source = Arc::new(MemorySource::new().with_latency(Duration::from_millis(100)));
    source.insert("s1", session());
    source.insert(
        "s2",
        MemorySession::new()
            .with_actions(vec![json!({"type": "db", "start": 70_000, "durationMs": 30})])
            .with_event_chunks(&recording(2, 2))
            .unwrap(),
    );
    let mut sync = sync_with(source, config());

    let first = tokio::time::timeout(Duration::from_millis(150), sync.open("s1")).await;
    assert!(first.is_err());

    assert_eq!(sync.open("s2").await.unwrap(), PlayerStatus::Playing);
    assert_eq!(sync.session_id(), Some("s2"));
    assert_eq!(sync.view().index().len(), 1);
    assert_eq!(sync.view().index().ticks()[0].kind, TickKind::Db);
    assert!(sync.traces().is_empty());
    assert_eq!(sync.view().clock().earliest_tick(), Some(70_000));
}

/// A single recorded event is not enough to play, but the backend
/// timeline remains browsable.
#[tokio::test]
async fn test_single_event_session_has_no_data() {
    let source = Arc::new(MemorySource::new());
    source.insert(
        "s1",
        MemorySession::new()
            .with_actions(actions())
            .with_event_chunks(&recording(1, 1))
            .unwrap(),
    );
    let mut sync = sync_with(source, config());

    assert_eq!(sync.open("s1").await.unwrap(), PlayerStatus::NoData);
    assert!(sync.visible_ticks().is_empty());
    sync.set_show_all(true);
    assert_eq!(sync.visible_ticks().len(), 3);
    assert!(matches!(sync.seek(53_000), Err(SyncError::NotReady(_))));
    assert!(sync.toggle().is_err());
}

/// A failed chunk fetch is terminal until the session is reloaded.
#[tokio::test]
async fn test_reload_recovers_from_error() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session().failing_chunks());
    let mut sync = sync_with(source.clone(), config());

    let err = sync.open("s1").await.unwrap_err();
    assert!(matches!(err, SyncError::DataFetch(_)));
    assert_eq!(sync.status(), PlayerStatus::Error);
    assert!(sync.resume().is_err());

    source.insert("s1", session());
    assert_eq!(sync.reload().await.unwrap(), PlayerStatus::Playing);
    assert_eq!(sync.session_id(), Some("s1"));
}

/// The trace behind a request tick is built with wrappers removed and
/// the configured filters applied.
#[tokio::test]
async fn test_trace_for_request_tick() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(source, config());
    sync.open("s1").await.unwrap();
    assert_eq!(sync.traces().len(), 1);

    let tick = sync.view().index().find_request("r-1").cloned().unwrap();
    let forest = sync.trace_for_tick(&tick).unwrap();
    assert_eq!(forest.roots.len(), 1);
    assert_eq!(forest.roots[0].function_name, "handle");
    assert_eq!(forest.roots[0].children.len(), 1);

    let mut filter = sync.trace_filter().clone();
    filter.collapse_vendor = true;
    sync.set_trace_filter(filter);
    let collapsed = sync.trace_tree("r-1").unwrap();
    assert!(collapsed.roots[0].children.is_empty());

    assert!(sync.trace_tree("missing").is_none());
}

/// Pause, toggle and restart keep the view status in step.
#[tokio::test(start_paused = true)]
async fn test_playback_controls_update_status() {
    let source = Arc::new(MemorySource::new());
    source.insert("s1", session());
    let mut sync = sync_with(source, config());
    sync.open("s1").await.unwrap();

    sync.pause().unwrap();
    assert_eq!(sync.status(), PlayerStatus::Paused);
    assert_eq!(sync.toggle().unwrap(), PlayerStatus::Playing);
    assert_eq!(sync.status(), PlayerStatus::Playing);

    sync.seek(55_000).unwrap();
    sync.restart().unwrap();
    assert_eq!(sync.view().position(), Some(0));

    sync.close();
    assert_eq!(sync.status(), PlayerStatus::Idle);
    assert!(sync.session_id().is_none());
    assert!(sync.pause().is_err());
}
