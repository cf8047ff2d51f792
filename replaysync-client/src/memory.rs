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

//! In-memory [`SessionSource`] for fixtures and offline inspection.

use crate::source::SessionSource;
use crate::types::{SessionFull, StreamRange};
use async_trait::async_trait;
use parking_lot::RwLock;
use replaysync_core::{Chunk, RecordedEvent, Result, SyncError};
use replaysync_trace::TracesResponse;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Stored data of one session.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    pub actions: Vec<Value>,
    pub chunks: Vec<Chunk>,
    pub traces: TracesResponse,
    /// Fail every chunk fetch with a data fetch error
    pub fail_chunks: bool,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actions(mut self, actions: Vec<Value>) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_chunks(mut self, chunks: Vec<Chunk>) -> Self {
        self.chunks = chunks;
        self.chunks.sort_by_key(|c| c.seq);
        self
    }

    /// Encode one chunk per event slice, numbered from zero.
    pub fn with_event_chunks(self, slices: &[Vec<RecordedEvent>]) -> Result<Self> {
        let chunks = slices
            .iter()
            .enumerate()
            .map(|(seq, events)| Chunk::encode(seq as u64, events))
            .collect::<Result<Vec<_>>>()?;
        Ok(self.with_chunks(chunks))
    }

    pub fn with_traces(mut self, traces: TracesResponse) -> Self {
        self.traces = traces;
        self
    }

    pub fn failing_chunks(mut self) -> Self {
        self.fail_chunks = true;
        self
    }

    fn range(&self) -> Option<StreamRange> {
        let first = self.chunks.first()?.seq;
        let last = self.chunks.last()?.seq;
        Some(StreamRange::new(first, last))
    }
}

/// Session data held in memory.
#[derive(Default)]
pub struct MemorySource {
    sessions: RwLock<HashMap<String, MemorySession>>,
    latency: Option<Duration>,
    chunk_requests: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, to exercise overlapping requests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, session_id: impl Into<String>, session: MemorySession) {
        self.sessions.write().insert(session_id.into(), session);
    }

    /// Number of chunk fetches served so far.
    pub fn chunk_requests(&self) -> usize {
        self.chunk_requests.load(Ordering::SeqCst)
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn session(&self, session_id: &str) -> Result<MemorySession> {
        self.sessions
            .read()
            .get(session_id)
            .cloned()
            .ok_or_else(|| SyncError::DataFetch(format!("API error (404): session {} not found", session_id)))
    }
}

#[async_trait]
impl SessionSource for MemorySource {
    async fn load_session(&self, session_id: &str) -> Result<SessionFull> {
        self.delay().await;
        let session = self.session(session_id)?;
        Ok(SessionFull {
            rrweb: session.range(),
            actions: session.actions,
        })
    }

    async fn fetch_chunks(&self, session_id: &str, after_seq: i64, limit: usize) -> Result<Vec<Chunk>> {
        self.chunk_requests.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        let session = self.session(session_id)?;
        if session.fail_chunks {
            return Err(SyncError::DataFetch("API error (500): chunk store unavailable".into()));
        }
        Ok(session
            .chunks
            .into_iter()
            .filter(|c| c.seq as i64 > after_seq)
            .take(limit)
            .collect())
    }

    async fn fetch_traces(&self, session_id: &str) -> Result<TracesResponse> {
        self.delay().await;
        Ok(self.session(session_id)?.traces)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_chunks_after_seq() {
        let source = MemorySource::new();
        let session = MemorySession::new()
            .with_event_chunks(&[
                vec![RecordedEvent::new(0, 4, json!({}))],
                vec![RecordedEvent::new(1, 2, json!({}))],
                vec![RecordedEvent::new(2, 3, json!({}))],
            ])
            .unwrap();
        source.insert("s", session);

        let full = source.load_session("s").await.unwrap();
        assert_eq!(full.rrweb, Some(StreamRange::new(0, 2)));

        let first = source.fetch_chunks("s", -1, 2).await.unwrap();
        assert_eq!(first.iter().map(|c| c.seq).collect::<Vec<_>>(), vec![0, 1]);
        let rest = source.fetch_chunks("s", 1, 2).await.unwrap();
        assert_eq!(rest.iter().map(|c| c.seq).collect::<Vec<_>>(), vec![2]);
        assert!(source.fetch_chunks("s", 2, 2).await.unwrap().is_empty());
        assert_eq!(source.chunk_requests(), 3);
    }

    #[tokio::test]
    async fn test_unknown_session_and_failures() {
        let source = MemorySource::new();
        assert!(matches!(
            source.load_session("missing").await,
            Err(SyncError::DataFetch(_))
        ));

        source.insert("broken", MemorySession::new().failing_chunks());
        assert!(source.fetch_chunks("broken", -1, 10).await.is_err());
        assert!(source.load_session("broken").await.unwrap().rrweb.is_none());
    }
}
