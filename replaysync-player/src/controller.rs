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

//! Playback driver
//!
//! Owns the replay engine for one session and the player status machine.
//! Two background tasks run while a session is active: a poller that
//! samples the engine clock and publishes the position, and a feeder that
//! hands buffered events to the engine in small batches, pulling more
//! chunks whenever the buffer runs dry.
//!
//! Nothing is shared with the orchestrator except a message channel: every
//! status change and position update is sent upward as a
//! [`PlaybackEvent`]. After the session's cancellation token fires no
//! further messages are emitted.

use crate::cursor::{EventStreamCursor, PullOutcome};
use crate::engine::{EngineFactory, EngineMeta, ReplayEngine};
use parking_lot::Mutex;
use replaysync_core::{ClockAligner, PlayerEvent, PlayerStatus, Result, SyncConfig, SyncError};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

/// Messages sent from the playback driver to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Status(PlayerStatus),
    /// Playback position in ms
    Position(i64),
    /// Every chunk has been fed to the engine
    StreamFinished,
    /// The session failed and needs an explicit reload
    Failed(String),
}

/// Shortest position poll period; `tokio::time::interval` rejects zero.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Timing knobs of the playback driver.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub poll_interval: Duration,
    pub feed_batch_size: usize,
    pub feed_pause: Duration,
    pub pull_limit: usize,
    pub min_bootstrap_events: usize,
    pub autoplay: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for PlaybackSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            poll_interval: config.poll_interval().max(MIN_POLL_INTERVAL),
            feed_batch_size: config.feed_batch_size.max(1),
            feed_pause: config.feed_pause(),
            pull_limit: config.pull_limit.max(1),
            min_bootstrap_events: config.min_bootstrap_events.max(1),
            autoplay: config.autoplay,
        }
    }
}

/// Point-in-time view of the driver, for reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    pub status: PlayerStatus,
    pub position: Option<i64>,
    pub resume_point: i64,
    pub total_time: Option<i64>,
    pub fed_events: usize,
}

#[derive(Debug)]
struct ControlState {
    status: PlayerStatus,
    position: Option<i64>,
    resume_point: i64,
}

/// Drives one replay engine through the player status machine.
pub struct PlaybackController<E: ReplayEngine> {
    settings: PlaybackSettings,
    engine: Mutex<Option<E>>,
    state: Mutex<ControlState>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    cancel: CancellationToken,
    fed_events: AtomicUsize,
}

impl<E: ReplayEngine> PlaybackController<E> {
    /// Create a controller and the receiving end of its message channel.
    pub fn new(
        settings: PlaybackSettings,
        cancel: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            settings,
            engine: Mutex::new(None),
            state: Mutex::new(ControlState {
                status: PlayerStatus::Idle,
                position: None,
                resume_point: 0,
            }),
            events: tx,
            cancel,
            fed_events: AtomicUsize::new(0),
        };
        (controller, rx)
    }

    pub fn status(&self) -> PlayerStatus {
        self.state.lock().status
    }

    /// Last published playback position.
    pub fn position(&self) -> Option<i64> {
        self.state.lock().position
    }

    pub fn resume_point(&self) -> i64 {
        self.state.lock().resume_point
    }

    /// Events handed to the engine after the bootstrap batch.
    pub fn fed_events(&self) -> usize {
        self.fed_events.load(Ordering::Relaxed)
    }

    pub fn meta(&self) -> Option<EngineMeta> {
        self.engine.lock().as_ref().map(|e| e.meta())
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        let total_time = self.meta().map(|m| m.total_time);
        let state = self.state.lock();
        PlaybackSnapshot {
            status: state.status,
            position: state.position,
            resume_point: state.resume_point,
            total_time,
            fed_events: self.fed_events(),
        }
    }

    /// Run `f` against the engine, if one has been constructed.
    pub fn with_engine<R>(&self, f: impl FnOnce(&mut E) -> R) -> Result<R> {
        let mut engine = self.engine.lock();
        match engine.as_mut() {
            Some(engine) => Ok(f(engine)),
            None => Err(SyncError::NotReady("no replay engine".into())),
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        // A dropped receiver means the owner is gone; nothing left to notify.
        let _ = self.events.send(event);
    }

    fn apply(&self, event: PlayerEvent) -> Result<PlayerStatus> {
        let next = {
            let mut state = self.state.lock();
            let next = state.status.transition(event)?;
            if next == state.status {
                return Ok(next);
            }
            debug!(from = state.status.as_str(), to = next.as_str(), "Player status changed");
            state.status = next;
            next
        };
        self.emit(PlaybackEvent::Status(next));
        Ok(next)
    }

    fn publish_position(&self, position: i64) {
        let changed = {
            let mut state = self.state.lock();
            let changed = state.position != Some(position);
            state.position = Some(position);
            changed
        };
        if changed {
            self.emit(PlaybackEvent::Position(position));
        }
    }

    /// Move to `error` and report the failure upward.
    pub fn fail(&self, error: &SyncError) {
        warn!(error = %error, "Playback failed");
        if self.apply(PlayerEvent::Fail).is_ok() {
            self.emit(PlaybackEvent::Failed(error.to_string()));
        }
    }

    /// Load the initial batch and construct the engine.
    ///
    /// Fewer than the minimum number of events yields `no-data`; a fetch
    /// failure yields `error`. Stale results leave the status untouched.
    pub async fn start<F>(&self, cursor: &EventStreamCursor, factory: &F) -> Result<EngineMeta>
    where
        F: EngineFactory<Engine = E>,
    {
        self.apply(PlayerEvent::Load)?;

        let initial = match cursor
            .bootstrap(self.settings.min_bootstrap_events, self.settings.pull_limit)
            .await
        {
            Ok(initial) => initial,
            Err(e) if e.is_stale() => return Err(e),
            Err(e @ SyncError::InsufficientData { .. }) => {
                info!(session = cursor.session_id(), error = %e, "Not enough recorded data to play");
                self.apply(PlayerEvent::Insufficient)?;
                return Err(e);
            }
            Err(e) => {
                self.fail(&e);
                return Err(e);
            }
        };
        if self.cancel.is_cancelled() {
            return Err(SyncError::Stale(cursor.session_id().to_string()));
        }

        let initial_len = initial.len();
        let mut engine = factory.create(initial);
        let meta = engine.meta();
        if self.settings.autoplay {
            engine.play(0);
        }
        *self.engine.lock() = Some(engine);

        self.apply(PlayerEvent::Ready {
            autoplay: self.settings.autoplay,
        })?;
        self.publish_position(0);
        info!(
            session = cursor.session_id(),
            initial_events = initial_len,
            total_time = meta.total_time,
            "Replay engine started"
        );
        Ok(meta)
    }

    /// Continue from the last pause or seek point.
    pub fn resume(&self) -> Result<()> {
        let status = self.status();
        status.transition(PlayerEvent::Play)?;
        if status == PlayerStatus::Playing {
            return Ok(());
        }
        let at = self.resume_point();
        self.with_engine(|engine| engine.play(at))?;
        self.apply(PlayerEvent::Play)?;
        Ok(())
    }

    /// Pause and remember the position for [`Self::resume`].
    pub fn pause(&self) -> Result<()> {
        let status = self.status();
        status.transition(PlayerEvent::Pause)?;
        if status == PlayerStatus::Paused {
            return Ok(());
        }
        let at = self.with_engine(|engine| {
            engine.pause();
            engine.current_time()
        })?;
        self.state.lock().resume_point = at;
        self.publish_position(at);
        self.apply(PlayerEvent::Pause)?;
        Ok(())
    }

    pub fn toggle(&self) -> Result<PlayerStatus> {
        match self.status() {
            PlayerStatus::Playing => self.pause()?,
            _ => self.resume()?,
        }
        Ok(self.status())
    }

    /// Play from the start of the recording.
    pub fn restart(&self) -> Result<()> {
        self.status().transition(PlayerEvent::Restart)?;
        self.with_engine(|engine| engine.play(0))?;
        self.state.lock().resume_point = 0;
        self.apply(PlayerEvent::Restart)?;
        self.publish_position(0);
        Ok(())
    }

    /// Seek to a playback time, clamped to the recording.
    ///
    /// The engine is paused and then played from the target. Returns the
    /// clamped target.
    pub fn seek_playback(&self, target_ms: i64) -> Result<i64> {
        let status = self.status();
        if !status.has_engine() {
            return Err(SyncError::NotReady(format!(
                "cannot seek while {}",
                status.as_str()
            )));
        }
        let target = self.with_engine(|engine| {
            let target = target_ms.clamp(0, engine.meta().total_time.max(0));
            engine.pause();
            engine.play(target);
            target
        })?;
        self.state.lock().resume_point = target;
        self.apply(PlayerEvent::Play)?;
        self.publish_position(target);
        debug!(requested = target_ms, target, "Seek");
        Ok(target)
    }

    /// Seek to a server time using the session's clock mapping.
    pub fn seek(&self, server_ms: i64, clock: &ClockAligner) -> Result<i64> {
        let target = clock
            .seek_target(server_ms)
            .ok_or_else(|| SyncError::NotReady("clock offset not established".into()))?;
        self.seek_playback(target)
    }

    /// Sample the engine clock and publish it while playing.
    pub fn poll_once(&self) -> Option<i64> {
        if self.status() != PlayerStatus::Playing {
            return None;
        }
        let position = self.with_engine(|engine| engine.current_time()).ok()?;
        self.publish_position(position);
        Some(position)
    }

    /// Hand the next batch of buffered events to the engine.
    ///
    /// Returns the number of events fed.
    pub fn feed_once(&self, cursor: &EventStreamCursor) -> Result<usize> {
        let batch = cursor.take_events(self.settings.feed_batch_size);
        let fed = batch.len();
        if fed == 0 {
            return Ok(0);
        }
        self.with_engine(|engine| {
            for event in batch {
                engine.add_event(event);
            }
        })?;
        self.fed_events.fetch_add(fed, Ordering::Relaxed);
        Ok(fed)
    }

    /// Start the periodic position poller.
    pub fn spawn_poller(self: &Arc<Self>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let task = async move {
            let mut ticker = tokio::time::interval(this.settings.poll_interval.max(MIN_POLL_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        this.poll_once();
                    }
                }
            }
            debug!("Position poller stopped");
        };
        tokio::spawn(task.in_current_span())
    }

    /// Start the feeder that streams the rest of the recording into the engine.
    pub fn spawn_feeder(self: &Arc<Self>, cursor: Arc<EventStreamCursor>) -> JoinHandle<()> {
        let this = Arc::clone(self);
        let task = async move {
            loop {
                if this.cancel.is_cancelled() {
                    break;
                }
                match this.feed_once(&cursor) {
                    Ok(0) => {
                        if cursor.is_done() {
                            info!(session = cursor.session_id(), fed = this.fed_events(), "Stream fully fed");
                            this.emit(PlaybackEvent::StreamFinished);
                            break;
                        }
                        match cursor.pull_more(this.settings.pull_limit).await {
                            Ok(PullOutcome::Appended { .. }) | Ok(PullOutcome::Done) => continue,
                            Ok(PullOutcome::Busy) => {}
                            Err(e) if e.is_stale() => break,
                            Err(e) => {
                                this.fail(&e);
                                break;
                            }
                        }
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(error = %e, "Feeder stopped");
                        break;
                    }
                }
                tokio::select! {
                    _ = this.cancel.cancelled() => break,
                    _ = tokio::time::sleep(this.settings.feed_pause) => {}
                }
            }
        };
        tokio::spawn(task.in_current_span())
    }

    /// Stop the session: no further messages, engine dropped.
    pub fn abort(&self) {
        self.cancel.cancel();
        if let Some(mut engine) = self.engine.lock().take() {
            engine.pause();
        }
        let mut state = self.state.lock();
        state.status = PlayerStatus::Idle;
        state.position = None;
        state.resume_point = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HeadlessEngine;
    use replaysync_client::{MemorySession, MemorySource};
    use replaysync_core::RecordedEvent;
    use serde_json::json;

    fn slices(chunks: usize, per_chunk: usize) -> Vec<Vec<RecordedEvent>> {
        (0..chunks)
            .map(|c| {
                (0..per_chunk)
                    .map(|i| RecordedEvent::new(((c * per_chunk + i) * 1_000) as i64, 3, json!({})))
                    .collect()
            })
            .collect()
    }

    struct Fixture {
        cursor: Arc<EventStreamCursor>,
        controller: Arc<PlaybackController<HeadlessEngine>>,
        rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    }

    async fn fixture(session: MemorySession, settings: PlaybackSettings) -> Fixture {
        let source = MemorySource::new();
        source.insert("s1", session);
        let cancel = CancellationToken::new();
        let cursor = Arc::new(EventStreamCursor::new("s1", Arc::new(source), cancel.clone()));
        cursor.load_meta().await.unwrap();
        let (controller, rx) = PlaybackController::new(settings, cancel);
        Fixture {
            cursor,
            controller: Arc::new(controller),
            rx,
        }
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PlaybackEvent>) -> Vec<PlaybackEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn settings(pull_limit: usize) -> PlaybackSettings {
        PlaybackSettings {
            pull_limit,
            ..PlaybackSettings::default()
        }
    }

    #[test]
    fn test_settings_clamp_zero_values() {
        let settings = PlaybackSettings::from(&SyncConfig {
            poll_interval_ms: 0,
            pull_limit: 0,
            feed_batch_size: 0,
            min_bootstrap_events: 0,
            ..SyncConfig::default()
        });
        assert_eq!(settings.poll_interval, Duration::from_millis(1));
        assert_eq!(settings.pull_limit, 1);
        assert_eq!(settings.feed_batch_size, 1);
        assert_eq!(settings.min_bootstrap_events, 1);
    }

    #[tokio::test]
    async fn test_start_autoplays() {
        let session = MemorySession::new().with_event_chunks(&slices(3, 2)).unwrap();
        let mut f = fixture(session, settings(1)).await;

        let meta = f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();
        assert_eq!(meta.total_time, 1_000);
        assert_eq!(f.controller.status(), PlayerStatus::Playing);
        assert_eq!(
            drain(&mut f.rx),
            vec![
                PlaybackEvent::Status(PlayerStatus::Loading),
                PlaybackEvent::Status(PlayerStatus::Playing),
                PlaybackEvent::Position(0),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_without_autoplay_is_paused() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 2)).unwrap();
        let f = fixture(
            session,
            PlaybackSettings {
                autoplay: false,
                ..PlaybackSettings::default()
            },
        )
        .await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();
        assert_eq!(f.controller.status(), PlayerStatus::Paused);
        let playing = f.controller.with_engine(|e| e.is_playing()).unwrap();
        assert!(!playing);
    }

    #[tokio::test]
    async fn test_single_event_is_no_data() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 1)).unwrap();
        let mut f = fixture(session, settings(50)).await;

        let err = f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap_err();
        assert!(matches!(err, SyncError::InsufficientData { .. }));
        assert_eq!(f.controller.status(), PlayerStatus::NoData);
        assert!(f.controller.meta().is_none());
        assert_eq!(
            drain(&mut f.rx).last(),
            Some(&PlaybackEvent::Status(PlayerStatus::NoData))
        );
    }

    #[tokio::test]
    async fn test_fetch_failure_is_error() {
        let session = MemorySession::new()
            .with_event_chunks(&slices(2, 2))
            .unwrap()
            .failing_chunks();
        let mut f = fixture(session, settings(50)).await;

        let err = f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap_err();
        assert!(matches!(err, SyncError::DataFetch(_)));
        assert_eq!(f.controller.status(), PlayerStatus::Error);
        assert!(drain(&mut f.rx)
            .iter()
            .any(|e| matches!(e, PlaybackEvent::Failed(_))));

        // terminal until reset
        assert!(f.controller.resume().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_keeps_position() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 11)).unwrap();
        let f = fixture(session, settings(50)).await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();

        tokio::time::advance(Duration::from_millis(1_200)).await;
        f.controller.pause().unwrap();
        assert_eq!(f.controller.status(), PlayerStatus::Paused);
        assert_eq!(f.controller.resume_point(), 1_200);
        assert_eq!(f.controller.position(), Some(1_200));

        tokio::time::advance(Duration::from_millis(5_000)).await;
        assert_eq!(f.controller.toggle().unwrap(), PlayerStatus::Playing);
        tokio::time::advance(Duration::from_millis(300)).await;
        assert_eq!(f.controller.poll_once(), Some(1_500));
    }

    #[tokio::test]
    async fn test_seek_clamps_and_plays() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 6)).unwrap();
        let f = fixture(
            session,
            PlaybackSettings {
                autoplay: false,
                ..PlaybackSettings::default()
            },
        )
        .await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();

        assert_eq!(f.controller.seek_playback(99_000).unwrap(), 5_000);
        assert_eq!(f.controller.status(), PlayerStatus::Playing);
        assert_eq!(f.controller.seek_playback(-10).unwrap(), 0);
        assert_eq!(f.controller.resume_point(), 0);
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Play(i64),
        Pause,
        Add(i64),
    }

    /// Engine fake that records every call it receives.
    struct RecordingEngine {
        calls: Arc<Mutex<Vec<Call>>>,
        at: i64,
        last: i64,
    }

    impl ReplayEngine for RecordingEngine {
        fn play(&mut self, at_ms: i64) {
            self.at = at_ms;
            self.calls.lock().push(Call::Play(at_ms));
        }

        fn pause(&mut self) {
            self.calls.lock().push(Call::Pause);
        }

        fn current_time(&self) -> i64 {
            self.at
        }

        fn add_event(&mut self, event: RecordedEvent) {
            self.last = event.timestamp;
            self.calls.lock().push(Call::Add(event.timestamp));
        }

        fn meta(&self) -> EngineMeta {
            EngineMeta { total_time: self.last }
        }
    }

    #[tokio::test]
    async fn test_seek_pauses_then_plays_engine() {
        let source = MemorySource::new();
        source.insert("s1", MemorySession::new().with_event_chunks(&slices(1, 4)).unwrap());
        let cancel = CancellationToken::new();
        let cursor = EventStreamCursor::new("s1", Arc::new(source), cancel.clone());
        cursor.load_meta().await.unwrap();
        let (controller, _rx) = PlaybackController::new(settings(50), cancel);

        let calls = Arc::new(Mutex::new(Vec::new()));
        let log = calls.clone();
        let factory = move |initial: Vec<RecordedEvent>| RecordingEngine {
            calls: log.clone(),
            at: 0,
            last: initial.last().map(|e| e.timestamp).unwrap_or(0),
        };
        controller.start(&cursor, &factory).await.unwrap();
        assert_eq!(calls.lock().as_slice(), &[Call::Play(0)]);

        calls.lock().clear();
        controller.seek_playback(2_500).unwrap();
        assert_eq!(calls.lock().as_slice(), &[Call::Pause, Call::Play(2_500)]);

        calls.lock().clear();
        controller.pause().unwrap();
        controller.resume().unwrap();
        assert_eq!(calls.lock().as_slice(), &[Call::Pause, Call::Play(2_500)]);
    }

    #[tokio::test]
    async fn test_seek_requires_aligned_clock() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 6)).unwrap();
        let f = fixture(session, settings(50)).await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();

        let mut clock = ClockAligner::new();
        clock.set_recording_epoch(0);
        assert!(matches!(f.controller.seek(10, &clock), Err(SyncError::NotReady(_))));

        clock.observe_earliest_tick(Some(100_000));
        assert_eq!(f.controller.seek(102_000, &clock).unwrap(), 2_000);
    }

    #[tokio::test]
    async fn test_seek_before_engine_is_rejected() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 2)).unwrap();
        let f = fixture(session, settings(50)).await;
        assert!(matches!(f.controller.seek_playback(10), Err(SyncError::NotReady(_))));
        assert!(f.controller.restart().is_err());
    }

    #[tokio::test]
    async fn test_restart_from_paused() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 6)).unwrap();
        let f = fixture(session, settings(50)).await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();
        f.controller.seek_playback(3_000).unwrap();
        f.controller.pause().unwrap();

        f.controller.restart().unwrap();
        assert_eq!(f.controller.status(), PlayerStatus::Playing);
        assert_eq!(f.controller.position(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feeder_streams_remaining_chunks() {
        let session = MemorySession::new().with_event_chunks(&slices(10, 3)).unwrap();
        let mut f = fixture(
            session,
            PlaybackSettings {
                pull_limit: 2,
                feed_batch_size: 4,
                ..PlaybackSettings::default()
            },
        )
        .await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();

        let feeder = f.controller.spawn_feeder(f.cursor.clone());
        feeder.await.unwrap();

        let total = f.controller.with_engine(|e| e.events().len()).unwrap();
        assert_eq!(total, 30);
        assert_eq!(f.controller.meta().unwrap().total_time, 29_000);
        assert!(f.cursor.is_exhausted());
        assert_eq!(drain(&mut f.rx).last(), Some(&PlaybackEvent::StreamFinished));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_publishes_positions() {
        let session = MemorySession::new().with_event_chunks(&slices(1, 11)).unwrap();
        let mut f = fixture(session, settings(50)).await;
        f.controller.start(&f.cursor, &HeadlessEngine::new).await.unwrap();
        drain(&mut f.rx);

        let poller = f.controller.spawn_poller();
        tokio::time::sleep(Duration::from_millis(450)).await;
        let positions: Vec<i64> = drain(&mut f.rx)
            .into_iter()
            .filter_map(|e| match e {
                PlaybackEvent::Position(p) => Some(p),
                _ => None,
            })
            .collect();
        assert!(positions.len() >= 2);
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        f.controller.abort();
        poller.await.unwrap();
        assert_eq!(f.controller.status(), PlayerStatus::Idle);
        assert!(drain(&mut f.rx).is_empty());
    }
}
