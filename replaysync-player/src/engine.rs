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

//! Replay engine contract
//!
//! The engine that renders recorded events is external. The playback
//! driver only needs to start it at a position, pause it, read its clock,
//! append events while it runs and ask how long the recording is.

use replaysync_core::RecordedEvent;
use serde::Serialize;
use tokio::time::Instant;

/// Recording metadata reported by an engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineMeta {
    /// Length of the recording loaded so far, in ms of playback time
    pub total_time: i64,
}

/// Operations the playback driver issues against a replay engine.
pub trait ReplayEngine: Send + 'static {
    /// Start (or continue) playing from `at_ms`.
    fn play(&mut self, at_ms: i64);

    fn pause(&mut self);

    /// Current playback position in ms.
    fn current_time(&self) -> i64;

    /// Append one recorded event to the running engine.
    fn add_event(&mut self, event: RecordedEvent);

    fn meta(&self) -> EngineMeta;
}

/// Builds an engine from the bootstrap batch of recorded events.
pub trait EngineFactory: Send + Sync + 'static {
    type Engine: ReplayEngine;

    fn create(&self, initial: Vec<RecordedEvent>) -> Self::Engine;
}

impl<F, E> EngineFactory for F
where
    F: Fn(Vec<RecordedEvent>) -> E + Send + Sync + 'static,
    E: ReplayEngine,
{
    type Engine = E;

    fn create(&self, initial: Vec<RecordedEvent>) -> E {
        self(initial)
    }
}

/// Engine that keeps time without rendering anything.
///
/// Used by the CLI to drive a session without a display, and by tests.
/// Time is read from the tokio clock so paused-time tests are exact.
#[derive(Debug)]
pub struct HeadlessEngine {
    events: Vec<RecordedEvent>,
    first_timestamp: Option<i64>,
    last_timestamp: Option<i64>,
    anchor: Option<(Instant, i64)>,
    paused_at: i64,
}

impl HeadlessEngine {
    pub fn new(initial: Vec<RecordedEvent>) -> Self {
        let mut engine = Self {
            events: Vec::with_capacity(initial.len()),
            first_timestamp: None,
            last_timestamp: None,
            anchor: None,
            paused_at: 0,
        };
        for event in initial {
            engine.add_event(event);
        }
        engine
    }

    /// Events received so far, initial batch included.
    pub fn events(&self) -> &[RecordedEvent] {
        &self.events
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    fn clamp(&self, t: i64) -> i64 {
        t.clamp(0, self.meta().total_time)
    }
}

impl ReplayEngine for HeadlessEngine {
    fn play(&mut self, at_ms: i64) {
        let at = self.clamp(at_ms);
        self.anchor = Some((Instant::now(), at));
        self.paused_at = at;
    }

    fn pause(&mut self) {
        self.paused_at = self.current_time();
        self.anchor = None;
    }

    fn current_time(&self) -> i64 {
        match self.anchor {
            Some((started, at)) => {
                let elapsed = started.elapsed().as_millis() as i64;
                self.clamp(at.saturating_add(elapsed))
            }
            None => self.paused_at,
        }
    }

    fn add_event(&mut self, event: RecordedEvent) {
        let ts = event.timestamp;
        self.first_timestamp = Some(self.first_timestamp.map_or(ts, |first| first.min(ts)));
        self.last_timestamp = Some(self.last_timestamp.map_or(ts, |last| last.max(ts)));
        self.events.push(event);
    }

    fn meta(&self) -> EngineMeta {
        let total_time = match (self.first_timestamp, self.last_timestamp) {
            (Some(first), Some(last)) => last.saturating_sub(first),
            _ => 0,
        };
        EngineMeta { total_time }
    }
}
