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

//! Session orchestration
//!
//! [`SessionSync`] owns everything derived for the session on screen: the
//! timeline index, the clock mapping, the playback position, the visible
//! ticks and the request traces. Each input has one entry point that
//! updates the state and explicitly recomputes what depends on it.
//!
//! Switching sessions cancels the previous session's token first, so any
//! response still in flight for it is discarded instead of applied.

use crate::controller::{PlaybackController, PlaybackEvent, PlaybackSettings, PlaybackSnapshot};
use crate::cursor::{CursorProgress, EventStreamCursor};
use crate::engine::EngineFactory;
use replaysync_client::SessionSource;
use replaysync_core::{ClockAligner, PlayerStatus, Result, SyncConfig, SyncError, TimelineTick};
use replaysync_index::{TimelineIndex, WindowFilter};
use replaysync_trace::{TraceCatalog, TraceFilter, TraceForest};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Derived display state of one session.
#[derive(Debug, Clone)]
pub struct SessionView {
    clock: ClockAligner,
    index: TimelineIndex,
    window: WindowFilter,
    status: PlayerStatus,
    position: Option<i64>,
    visible: Vec<TimelineTick>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self::new(WindowFilter::default())
    }
}

impl SessionView {
    pub fn new(window: WindowFilter) -> Self {
        Self {
            clock: ClockAligner::new(),
            index: TimelineIndex::default(),
            window,
            status: PlayerStatus::Idle,
            position: None,
            visible: Vec::new(),
        }
    }

    pub fn clock(&self) -> &ClockAligner {
        &self.clock
    }

    pub fn index(&self) -> &TimelineIndex {
        &self.index
    }

    pub fn window(&self) -> &WindowFilter {
        &self.window
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    /// Playback position in ms.
    pub fn position(&self) -> Option<i64> {
        self.position
    }

    /// Playback position mapped to server time.
    pub fn server_time(&self) -> Option<i64> {
        self.position.and_then(|p| self.clock.to_server_time(p))
    }

    /// Ticks currently on display.
    pub fn visible(&self) -> &[TimelineTick] {
        &self.visible
    }

    /// Replace the backend records. Returns whether the clock offset moved.
    ///
    /// The playback position is kept as is; only its server-time mapping
    /// changes.
    pub fn apply_backend(&mut self, index: TimelineIndex) -> bool {
        let moved = self.clock.observe_earliest_tick(index.earliest());
        self.index = index;
        self.recompute_visible();
        moved
    }

    pub fn apply_recording_epoch(&mut self, first_event_timestamp: Option<i64>) {
        if let Some(ts) = first_event_timestamp {
            if self.clock.set_recording_epoch(ts) {
                self.recompute_visible();
            }
        }
    }

    pub fn apply_position(&mut self, position: Option<i64>) {
        if self.position == position {
            return;
        }
        self.position = position;
        self.recompute_visible();
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.window.set_show_all(show_all);
        self.recompute_visible();
    }

    /// Fold one message from the playback driver into the view.
    pub fn apply(&mut self, event: &PlaybackEvent) {
        match event {
            PlaybackEvent::Status(status) => self.status = *status,
            PlaybackEvent::Position(position) => self.apply_position(Some(*position)),
            PlaybackEvent::StreamFinished | PlaybackEvent::Failed(_) => {}
        }
    }

    fn recompute_visible(&mut self) {
        self.visible = self
            .window
            .select_at_playback(&self.index, &self.clock, self.position)
            .into_iter()
            .cloned()
            .collect();
    }
}

struct ActiveSession<F: EngineFactory> {
    session_id: String,
    cancel: CancellationToken,
    cursor: Arc<EventStreamCursor>,
    controller: Arc<PlaybackController<F::Engine>>,
    events: mpsc::UnboundedReceiver<PlaybackEvent>,
    tasks: Vec<JoinHandle<()>>,
}

impl<F: EngineFactory> ActiveSession<F> {
    fn stale(&self) -> SyncError {
        SyncError::Stale(self.session_id.clone())
    }

    fn teardown(self) {
        self.cancel.cancel();
        self.controller.abort();
        for task in self.tasks {
            task.abort();
        }
        debug!(session = %self.session_id, "Session torn down");
    }
}

/// Keeps the recording, the backend timeline and the traces of the
/// selected session in sync.
pub struct SessionSync<F: EngineFactory> {
    config: SyncConfig,
    source: Arc<dyn SessionSource>,
    factory: F,
    trace_filter: TraceFilter,
    view: SessionView,
    traces: TraceCatalog,
    active: Option<ActiveSession<F>>,
}

impl<F: EngineFactory> SessionSync<F> {
    /// Out-of-range timing values are clamped to the nearest usable value.
    pub fn new(config: SyncConfig, source: Arc<dyn SessionSource>, factory: F) -> Self {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Sync configuration out of range; clamping");
        }
        let trace_filter = TraceFilter::from_config(&config.trace);
        let view = SessionView::new(WindowFilter::new(config.window_half_width_ms));
        Self {
            config,
            source,
            factory,
            trace_filter,
            view,
            traces: TraceCatalog::default(),
            active: None,
        }
    }

    pub fn view(&self) -> &SessionView {
        &self.view
    }

    pub fn visible_ticks(&self) -> &[TimelineTick] {
        self.view.visible()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.session_id.as_str())
    }

    pub fn status(&self) -> PlayerStatus {
        self.view.status()
    }

    pub fn traces(&self) -> &TraceCatalog {
        &self.traces
    }

    pub fn trace_filter(&self) -> &TraceFilter {
        &self.trace_filter
    }

    /// Token that aborts the active session from another task.
    pub fn abort_handle(&self) -> Option<CancellationToken> {
        self.active.as_ref().map(|a| a.cancel.clone())
    }

    pub fn stream_progress(&self) -> Option<CursorProgress> {
        self.active.as_ref().map(|a| a.cursor.progress())
    }

    pub fn playback(&self) -> Option<PlaybackSnapshot> {
        self.active.as_ref().map(|a| a.controller.snapshot())
    }

    fn active(&self) -> Result<&ActiveSession<F>> {
        self.active
            .as_ref()
            .ok_or_else(|| SyncError::NotReady("no session selected".into()))
    }

    /// Select a session: load its timeline, start playback and fetch traces.
    ///
    /// A session that recorded too little to play still opens with status
    /// `no-data`, so its backend timeline stays browsable. Fetch failures
    /// put the session in `error` and are returned.
    #[tracing::instrument(skip(self))]
    pub async fn open(&mut self, session_id: &str) -> Result<PlayerStatus> {
        self.close();

        let cancel = CancellationToken::new();
        let cursor = Arc::new(EventStreamCursor::new(
            session_id,
            Arc::clone(&self.source),
            cancel.child_token(),
        ));
        let (controller, events) =
            PlaybackController::new(PlaybackSettings::from(&self.config), cancel.child_token());
        let controller = Arc::new(controller);
        self.active = Some(ActiveSession {
            session_id: session_id.to_string(),
            cancel,
            cursor: Arc::clone(&cursor),
            controller: Arc::clone(&controller),
            events,
            tasks: Vec::new(),
        });
        info!(session = session_id, "Opening session");

        let full = match cursor.load_meta().await {
            Ok(full) => full,
            Err(e) if e.is_stale() => return Err(e),
            Err(e) => {
                controller.fail(&e);
                self.pump();
                return Err(e);
            }
        };
        let index = TimelineIndex::from_values(&full.actions);
        debug!(
            session = session_id,
            ticks = index.len(),
            dropped = index.dropped(),
            "Backend timeline indexed"
        );
        self.view.apply_backend(index);

        match controller.start(&cursor, &self.factory).await {
            Ok(_) => {}
            Err(SyncError::InsufficientData { .. }) => {}
            Err(e) => {
                self.pump();
                return Err(e);
            }
        }
        self.view.apply_recording_epoch(cursor.first_timestamp());

        if controller.status().has_engine() {
            let poller = controller.spawn_poller();
            let feeder = controller.spawn_feeder(Arc::clone(&cursor));
            if let Some(active) = self.active.as_mut() {
                active.tasks.extend([poller, feeder]);
            }
        }

        if let Err(e) = self.load_traces().await {
            if e.is_stale() {
                return Err(e);
            }
            warn!(session = session_id, error = %e, "Traces unavailable");
        }

        self.pump();
        Ok(self.view.status())
    }

    /// Drop the active session and every result still pending for it.
    pub fn close(&mut self) {
        if let Some(active) = self.active.take() {
            info!(session = %active.session_id, "Closing session");
            active.teardown();
        }
        let window = WindowFilter::new(self.config.window_half_width_ms)
            .with_show_all(self.view.window().show_all());
        self.view = SessionView::new(window);
        self.traces = TraceCatalog::default();
    }

    /// Tear down and open the same session again.
    pub async fn reload(&mut self) -> Result<PlayerStatus> {
        let session_id = self.active()?.session_id.clone();
        self.open(&session_id).await
    }

    /// Re-fetch the backend records of the active session.
    ///
    /// Returns whether the clock offset changed.
    pub async fn refresh_backend(&mut self) -> Result<bool> {
        let (session_id, cancel, stale) = {
            let active = self.active()?;
            (active.session_id.clone(), active.cancel.clone(), active.stale())
        };
        let full = tokio::select! {
            _ = cancel.cancelled() => None,
            full = self.source.load_session(&session_id) => Some(full?),
        };
        let Some(full) = full.filter(|_| !cancel.is_cancelled()) else {
            warn!(session = %session_id, "Discarding backend refresh for aborted session");
            return Err(stale);
        };
        let moved = self.view.apply_backend(TimelineIndex::from_values(&full.actions));
        debug!(session = %session_id, ticks = self.view.index().len(), moved, "Backend timeline refreshed");
        Ok(moved)
    }

    /// Fetch and index the request traces of the active session.
    pub async fn load_traces(&mut self) -> Result<usize> {
        let (session_id, cancel, stale) = {
            let active = self.active()?;
            (active.session_id.clone(), active.cancel.clone(), active.stale())
        };
        let response = tokio::select! {
            _ = cancel.cancelled() => None,
            response = self.source.fetch_traces(&session_id) => Some(response?),
        };
        let Some(response) = response.filter(|_| !cancel.is_cancelled()) else {
            warn!(session = %session_id, "Discarding traces for aborted session");
            return Err(stale);
        };
        self.traces = TraceCatalog::from_response(&response, &self.config.trace);
        debug!(session = %session_id, requests = self.traces.len(), "Traces indexed");
        Ok(self.traces.len())
    }

    /// Apply every message the playback driver has sent so far.
    pub fn pump(&mut self) -> usize {
        let Some(active) = self.active.as_mut() else {
            return 0;
        };
        let mut applied = 0;
        while let Ok(event) = active.events.try_recv() {
            self.view.apply(&event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next message from the playback driver and apply it.
    ///
    /// Returns `None` once the session is closed or the driver is gone.
    pub async fn next_event(&mut self) -> Option<PlaybackEvent> {
        let active = self.active.as_mut()?;
        let event = tokio::select! {
            _ = active.cancel.cancelled() => None,
            event = active.events.recv() => event,
        }?;
        self.view.apply(&event);
        Some(event)
    }

    /// Seek to a server time. Returns the playback target.
    pub fn seek(&mut self, server_ms: i64) -> Result<i64> {
        let target = self.active()?.controller.seek(server_ms, self.view.clock())?;
        self.pump();
        self.view.apply_position(Some(target));
        Ok(target)
    }

    /// Seek to the start of a timeline tick.
    pub fn seek_to_tick(&mut self, tick: &TimelineTick) -> Result<i64> {
        self.seek(tick.start())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.active()?.controller.pause()?;
        self.pump();
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.active()?.controller.resume()?;
        self.pump();
        Ok(())
    }

    pub fn toggle(&mut self) -> Result<PlayerStatus> {
        let status = self.active()?.controller.toggle()?;
        self.pump();
        Ok(status)
    }

    pub fn restart(&mut self) -> Result<()> {
        self.active()?.controller.restart()?;
        self.pump();
        Ok(())
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.view.set_show_all(show_all);
    }

    /// Call tree of one request with the configured filters applied.
    pub fn trace_tree(&self, request_rid: &str) -> Option<TraceForest> {
        let forest = self.traces.build_tree(request_rid)?;
        Some(self.trace_filter.apply(&forest))
    }

    /// Call tree of the request behind a timeline tick.
    pub fn trace_for_tick(&self, tick: &TimelineTick) -> Option<TraceForest> {
        let entry = self.traces.for_tick(tick)?;
        Some(self.trace_filter.apply(&entry.build()))
    }

    pub fn set_trace_filter(&mut self, filter: TraceFilter) {
        self.trace_filter = filter;
    }
}

impl<F: EngineFactory> Drop for SessionSync<F> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.teardown();
        }
    }
}
