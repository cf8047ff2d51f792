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

//! Selection of backend records "in context" of the playback cursor.

use crate::timeline::TimelineIndex;
use replaysync_core::{ClockAligner, TimelineTick, DEFAULT_WINDOW_HALF_WIDTH_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFilter {
    half_width_ms: i64,
    show_all: bool,
}

impl Default for WindowFilter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_HALF_WIDTH_MS)
    }
}

impl WindowFilter {
    pub fn new(half_width_ms: i64) -> Self {
        Self {
            half_width_ms: half_width_ms.max(0),
            show_all: false,
        }
    }

    pub fn with_show_all(mut self, show_all: bool) -> Self {
        self.show_all = show_all;
        self
    }

    pub fn set_show_all(&mut self, show_all: bool) {
        self.show_all = show_all;
    }

    pub fn show_all(&self) -> bool {
        self.show_all
    }

    pub fn half_width_ms(&self) -> i64 {
        self.half_width_ms
    }

    /// Whether `now` lies in `[start - W, end + W]`, bounds inclusive.
    pub fn contains(&self, tick: &TimelineTick, now: i64) -> bool {
        tick.start().saturating_sub(self.half_width_ms) <= now
            && now <= tick.end().saturating_add(self.half_width_ms)
    }

    /// Ticks to display at absolute server time `now`.
    ///
    /// With no aligned time there is nothing to show in contextual mode.
    /// Cost is linear in the number of ticks.
    pub fn select<'a>(&self, index: &'a TimelineIndex, now: Option<i64>) -> Vec<&'a TimelineTick> {
        if self.show_all {
            return index.ticks().iter().collect();
        }
        let Some(now) = now else {
            return Vec::new();
        };
        index
            .ticks()
            .iter()
            .filter(|tick| self.contains(tick, now))
            .collect()
    }

    /// Ticks to display at a playback position.
    pub fn select_at_playback<'a>(
        &self,
        index: &'a TimelineIndex,
        clock: &ClockAligner,
        playback_ms: Option<i64>,
    ) -> Vec<&'a TimelineTick> {
        let now = playback_ms.and_then(|p| clock.to_server_time(p));
        self.select(index, now)
    }
}
