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

//! Display filters over a built call forest.
//!
//! Filters are pure: they return a new forest and never touch the source.
//! [`TraceFilter`] always collapses vendor leaves before applying the
//! duration floor, so a short application frame whose only descendants are
//! vendor leaves is judged on its own duration.

use crate::builder::{rebuild, TraceForest};
use replaysync_core::TraceConfig;

/// Keep frames lasting at least `threshold`, plus every ancestor of a kept
/// frame.
pub fn duration_floor(forest: &TraceForest, threshold: f64) -> TraceForest {
    TraceForest::new(rebuild(&forest.roots, |frame, children| {
        frame.duration() >= threshold || !children.is_empty()
    }))
}

/// Drop vendor frames left without children; vendor frames that still have
/// children stay as pass-through nodes.
pub fn collapse_vendor(forest: &TraceForest, marker: &str) -> TraceForest {
    TraceForest::new(rebuild(&forest.roots, |frame, children| {
        !children.is_empty() || !frame.is_vendor(marker)
    }))
}

/// The fixed display pipeline: vendor collapse, then duration floor.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceFilter {
    pub collapse_vendor: bool,
    pub vendor_marker: String,
    /// Disabled when not positive
    pub duration_floor_ms: f64,
}

impl Default for TraceFilter {
    fn default() -> Self {
        Self::from_config(&TraceConfig::default())
    }
}

impl TraceFilter {
    pub fn from_config(config: &TraceConfig) -> Self {
        Self {
            collapse_vendor: config.collapse_vendor,
            vendor_marker: config.vendor_marker.clone(),
            duration_floor_ms: config.duration_floor_ms,
        }
    }

    pub fn is_identity(&self) -> bool {
        !self.collapse_vendor && self.duration_floor_ms <= 0.0
    }

    pub fn apply(&self, forest: &TraceForest) -> TraceForest {
        let mut out = if self.collapse_vendor {
            collapse_vendor(forest, &self.vendor_marker)
        } else {
            forest.clone()
        };
        if self.duration_floor_ms > 0.0 {
            out = duration_floor(&out, self.duration_floor_ms);
        }
        out
    }
}
