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

//! Incremental reader for a session's recorded event stream
//!
//! The stream is stored as numbered chunks. The cursor keeps a watermark
//! (the next sequence number it has not seen yet), requests chunks strictly
//! after it, decodes them and buffers the events for the playback driver.
//!
//! Only one pull may be in flight at a time; a second call made while a
//! pull is outstanding returns [`PullOutcome::Busy`] without a request.
//! Once the session is aborted every pending result is discarded as stale.

use parking_lot::Mutex;
use replaysync_client::{SessionFull, SessionSource, StreamRange};
use replaysync_core::{decode_chunk, RecordedEvent, Result, SyncError};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle of a stream cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorState {
    Idle,
    Loading,
    Streaming,
    Done,
    Error,
}

/// Result of a single [`EventStreamCursor::pull_more`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    /// The server returned a page; `chunks` counts the ones not seen before
    Appended { chunks: usize, events: usize },
    /// The stream is exhausted; no request was made or the server had nothing
    Done,
    /// Another pull is in flight
    Busy,
}

/// Snapshot of stream progress, for reporting.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CursorProgress {
    pub state: CursorState,
    pub declared: Option<StreamRange>,
    pub watermark: u64,
    pub chunks: usize,
    pub streamed_events: usize,
    pub buffered: usize,
    pub decode_failures: usize,
}

#[derive(Debug)]
struct CursorInner {
    state: CursorState,
    declared: Option<StreamRange>,
    watermark: u64,
    buffer: VecDeque<RecordedEvent>,
    first_timestamp: Option<i64>,
    chunks: usize,
    streamed_events: usize,
    decode_failures: usize,
    /// Consecutive non-empty pages holding only chunks below the watermark
    stale_pages: u32,
}

impl Default for CursorInner {
    fn default() -> Self {
        Self {
            state: CursorState::Idle,
            declared: None,
            watermark: 0,
            buffer: VecDeque::new(),
            first_timestamp: None,
            chunks: 0,
            streamed_events: 0,
            decode_failures: 0,
            stale_pages: 0,
        }
    }
}

/// Pages of already-seen chunks tolerated in a row before the stream is
/// treated as exhausted.
const MAX_STALE_PAGES: u32 = 3;

/// Clears the in-flight flag when a pull finishes, however it finishes.
struct PullGuard<'a>(&'a AtomicBool);

impl Drop for PullGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Cursor over one session's recorded event stream.
pub struct EventStreamCursor {
    session_id: String,
    source: Arc<dyn SessionSource>,
    inner: Mutex<CursorInner>,
    pulling: AtomicBool,
    cancel: CancellationToken,
}

impl EventStreamCursor {
    pub fn new(session_id: impl Into<String>, source: Arc<dyn SessionSource>, cancel: CancellationToken) -> Self {
        Self {
            session_id: session_id.into(),
            source,
            inner: Mutex::new(CursorInner::default()),
            pulling: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn state(&self) -> CursorState {
        self.inner.lock().state
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Discard every pending and future result of this cursor.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    fn stale(&self) -> SyncError {
        SyncError::Stale(self.session_id.clone())
    }

    /// Drop a response that resolved after the session was aborted.
    fn discard(&self) -> SyncError {
        warn!(session = %self.session_id, "Discarding response for aborted session");
        self.stale()
    }

    /// Fetch the session and its declared stream range.
    ///
    /// The full session body is returned so the caller can index the
    /// backend records from the same response.
    #[tracing::instrument(level = "debug", skip(self), fields(session = %self.session_id))]
    pub async fn load_meta(&self) -> Result<SessionFull> {
        {
            let mut inner = self.inner.lock();
            if inner.state != CursorState::Idle {
                return Err(SyncError::NotReady(format!(
                    "stream metadata already loaded for session {}",
                    self.session_id
                )));
            }
            inner.state = CursorState::Loading;
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(self.discard()),
            result = self.source.load_session(&self.session_id) => result,
        };
        if self.cancel.is_cancelled() {
            return Err(self.discard());
        }

        let mut inner = self.inner.lock();
        let full = match result {
            Ok(full) => full,
            Err(e) => {
                inner.state = CursorState::Error;
                return Err(e);
            }
        };

        inner.declared = full.rrweb;
        match full.rrweb {
            Some(range) if range.declared_len() != Some(0) => {
                inner.watermark = range.first_seq.unwrap_or(0);
                inner.state = CursorState::Streaming;
            }
            _ => {
                debug!(session = %self.session_id, "Session has no recorded stream");
                inner.state = CursorState::Done;
            }
        }
        debug!(
            session = %self.session_id,
            declared = ?full.rrweb,
            actions = full.actions.len(),
            "Stream metadata loaded"
        );
        Ok(full)
    }

    /// Request up to `limit` chunks after the watermark and buffer their events.
    pub async fn pull_more(&self, limit: usize) -> Result<PullOutcome> {
        if self.cancel.is_cancelled() {
            return Err(self.stale());
        }
        let after_seq = {
            let inner = self.inner.lock();
            match inner.state {
                CursorState::Done => return Ok(PullOutcome::Done),
                CursorState::Streaming => inner.watermark as i64 - 1,
                CursorState::Error => {
                    return Err(SyncError::DataFetch(format!(
                        "stream for session {} failed earlier",
                        self.session_id
                    )))
                }
                CursorState::Idle | CursorState::Loading => {
                    return Err(SyncError::NotReady(format!(
                        "stream metadata not loaded for session {}",
                        self.session_id
                    )))
                }
            }
        };

        if self
            .pulling
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(PullOutcome::Busy);
        }
        let _guard = PullGuard(&self.pulling);

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(self.discard()),
            result = self.source.fetch_chunks(&self.session_id, after_seq, limit) => result,
        };
        if self.cancel.is_cancelled() {
            return Err(self.discard());
        }

        let mut inner = self.inner.lock();
        let mut chunks = match result {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(session = %self.session_id, error = %e, "Chunk fetch failed");
                inner.state = CursorState::Error;
                return Err(e);
            }
        };

        if chunks.is_empty() {
            debug!(session = %self.session_id, watermark = inner.watermark, "Stream exhausted");
            inner.state = CursorState::Done;
            return Ok(PullOutcome::Done);
        }

        let fetched = chunks.len();
        chunks.sort_by_key(|c| c.seq);
        let watermark = inner.watermark;
        chunks.retain(|c| c.seq >= watermark);
        if chunks.is_empty() {
            inner.stale_pages += 1;
            if inner.stale_pages >= MAX_STALE_PAGES {
                warn!(
                    session = %self.session_id,
                    watermark,
                    "Server keeps returning chunks already consumed; ending stream"
                );
                inner.state = CursorState::Done;
                return Ok(PullOutcome::Done);
            }
            warn!(session = %self.session_id, fetched, watermark, "Page held only chunks already consumed");
            return Ok(PullOutcome::Appended { chunks: 0, events: 0 });
        }
        inner.stale_pages = 0;

        let mut appended = 0;
        for chunk in &chunks {
            match decode_chunk(chunk) {
                Ok(events) => {
                    if inner.first_timestamp.is_none() {
                        inner.first_timestamp = events.first().map(|e| e.timestamp);
                    }
                    appended += events.len();
                    inner.buffer.extend(events);
                }
                Err(e) => {
                    warn!(session = %self.session_id, error = %e, "Dropping undecodable chunk");
                    inner.decode_failures += 1;
                }
            }
            inner.watermark = inner.watermark.max(chunk.seq + 1);
        }
        inner.chunks += chunks.len();
        inner.streamed_events += appended;

        debug!(
            session = %self.session_id,
            chunks = chunks.len(),
            events = appended,
            watermark = inner.watermark,
            "Pulled chunks"
        );
        Ok(PullOutcome::Appended {
            chunks: chunks.len(),
            events: appended,
        })
    }

    /// Pull until at least `min_events` are buffered or the stream ends,
    /// then hand the whole buffer over as the engine's initial batch.
    pub async fn bootstrap(&self, min_events: usize, limit: usize) -> Result<Vec<RecordedEvent>> {
        loop {
            if self.buffered() >= min_events {
                break;
            }
            match self.pull_more(limit).await? {
                PullOutcome::Done => break,
                PullOutcome::Appended { .. } => {}
                PullOutcome::Busy => tokio::time::sleep(Duration::from_millis(10)).await,
            }
        }

        let available = self.buffered();
        if available < min_events {
            return Err(SyncError::InsufficientData {
                available,
                required: min_events,
            });
        }
        Ok(self.take_events(available))
    }

    /// Remove up to `max` buffered events, oldest first.
    pub fn take_events(&self, max: usize) -> Vec<RecordedEvent> {
        let mut inner = self.inner.lock();
        let n = max.min(inner.buffer.len());
        inner.buffer.drain(..n).collect()
    }

    pub fn buffered(&self) -> usize {
        self.inner.lock().buffer.len()
    }

    /// Timestamp of the first event ever decoded from this stream.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.inner.lock().first_timestamp
    }

    pub fn is_done(&self) -> bool {
        self.inner.lock().state == CursorState::Done
    }

    /// Done and nothing left to hand out.
    pub fn is_exhausted(&self) -> bool {
        let inner = self.inner.lock();
        inner.state == CursorState::Done && inner.buffer.is_empty()
    }

    pub fn progress(&self) -> CursorProgress {
        let inner = self.inner.lock();
        CursorProgress {
            state: inner.state,
            declared: inner.declared,
            watermark: inner.watermark,
            chunks: inner.chunks,
            streamed_events: inner.streamed_events,
            buffered: inner.buffer.len(),
            decode_failures: inner.decode_failures,
        }
    }
}
