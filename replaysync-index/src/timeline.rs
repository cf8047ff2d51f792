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

//! Sorted, grouped view of one backend log snapshot.
//!
//! The index is rebuilt from scratch on every refresh of the backend log;
//! it is never mutated incrementally.

use crate::normalize::normalize;
use replaysync_core::{RawRecord, TickKind, TimelineTick};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// Identity of an action group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum GroupKey {
    Action(String),
    /// Synthetic group of one record without an action id, keyed by its
    /// position in the sorted timeline
    Singleton(usize),
}

/// Records sharing an action id, ordered by kind precedence then time.
#[derive(Debug, Clone, Serialize)]
pub struct ActionGroup {
    pub key: GroupKey,
    pub ticks: Vec<TimelineTick>,
}

impl ActionGroup {
    pub fn start(&self) -> Option<i64> {
        self.ticks.iter().map(TimelineTick::start).min()
    }

    pub fn end(&self) -> Option<i64> {
        self.ticks.iter().map(TimelineTick::end).max()
    }

    /// Kind of the first record under precedence ordering.
    pub fn lead_kind(&self) -> Option<TickKind> {
        self.ticks.first().map(|t| t.kind)
    }

    pub fn is_singleton(&self) -> bool {
        matches!(self.key, GroupKey::Singleton(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct TimelineIndex {
    ticks: Vec<TimelineTick>,
    groups: Vec<ActionGroup>,
    dropped: usize,
}

impl TimelineIndex {
    /// Build from raw JSON records as returned by the session endpoint.
    pub fn from_values(values: &[Value]) -> Self {
        Self::build(&RawRecord::read_all(values))
    }

    /// Normalize, sort and group raw records.
    pub fn build(records: &[RawRecord]) -> Self {
        let mut dropped = 0;
        let ticks: Vec<TimelineTick> = records
            .iter()
            .filter_map(|record| {
                let tick = normalize(record);
                if tick.is_none() {
                    dropped += 1;
                    tracing::warn!(kind = %record.kind, "Dropping backend record without timestamp");
                }
                tick
            })
            .collect();

        let mut index = Self::from_ticks(ticks);
        index.dropped = dropped;
        index
    }

    /// Build from already-normalized ticks.
    pub fn from_ticks(mut ticks: Vec<TimelineTick>) -> Self {
        sort_ticks(&mut ticks);
        let groups = group_ticks(&ticks);
        tracing::debug!(ticks = ticks.len(), groups = groups.len(), "Timeline index built");
        Self {
            ticks,
            groups,
            dropped: 0,
        }
    }

    pub fn ticks(&self) -> &[TimelineTick] {
        &self.ticks
    }

    pub fn groups(&self) -> &[ActionGroup] {
        &self.groups
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Records rejected during normalization.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Server time of the earliest tick, the anchor for clock alignment.
    pub fn earliest(&self) -> Option<i64> {
        self.ticks.iter().map(TimelineTick::start).min()
    }

    /// Server time of the latest tick end.
    pub fn latest(&self) -> Option<i64> {
        self.ticks.iter().map(TimelineTick::end).max()
    }

    pub fn find_request(&self, rid: &str) -> Option<&TimelineTick> {
        self.ticks
            .iter()
            .find(|t| t.kind == TickKind::Request && t.request_rid.as_deref() == Some(rid))
    }
}

/// Stable sort by start, then by ascending duration.
pub fn sort_ticks(ticks: &mut [TimelineTick]) {
    ticks.sort_by(|a, b| {
        a.start()
            .cmp(&b.start())
            .then_with(|| a.duration().cmp(&b.duration()))
    });
}

/// Bucket sorted ticks by action id. Groups appear in order of their
/// earliest member.
fn group_ticks(sorted: &[TimelineTick]) -> Vec<ActionGroup> {
    let mut groups: Vec<ActionGroup> = Vec::new();
    let mut by_action: HashMap<&str, usize> = HashMap::new();

    for (position, tick) in sorted.iter().enumerate() {
        match tick.action_id.as_deref() {
            Some(action_id) => {
                let slot = *by_action.entry(action_id).or_insert_with(|| {
                    groups.push(ActionGroup {
                        key: GroupKey::Action(action_id.to_string()),
                        ticks: Vec::new(),
                    });
                    groups.len() - 1
                });
                groups[slot].ticks.push(tick.clone());
            }
            None => groups.push(ActionGroup {
                key: GroupKey::Singleton(position),
                ticks: vec![tick.clone()],
            }),
        }
    }

    for group in &mut groups {
        group.ticks.sort_by(|a, b| {
            a.kind
                .cmp(&b.kind)
                .then_with(|| a.start().cmp(&b.start()))
                .then_with(|| a.end().cmp(&b.end()))
        });
    }
    groups
}
