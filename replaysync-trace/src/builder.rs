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

//! Call tree reconstruction from flat enter/exit events.
//!
//! An explicit LIFO stack tracks open frames. An exit closes the nearest open
//! frame (from the top) whose function name and depth both match, removing
//! only that entry; frames above it stay open. Unmatched exits are ignored.
//! Frames still open at the end are closed at the largest timestamp seen
//! anywhere in the input and flagged as never closed.

use crate::event::{Phase, TraceEvent};
use serde::{Serialize, Serializer};
use std::fmt;

/// A reconstructed call, owned by its parent.
///
/// Traces nest arbitrarily deep when exits never match; no walk over
/// frames recurses.
pub struct Frame {
    /// Creation order within the trace
    pub id: usize,
    pub function_name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub depth: u32,
    pub start: f64,
    pub end: f64,
    /// False when the frame was force-closed at trace end
    pub closed: bool,
    pub children: Vec<Frame>,
}

impl Frame {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_vendor(&self, marker: &str) -> bool {
        !marker.is_empty() && self.file.as_deref().is_some_and(|f| f.contains(marker))
    }

    /// Pre-order walk over this frame and its descendants.
    pub fn iter(&self) -> Frames<'_> {
        Frames { stack: vec![self] }
    }

    /// Copy of this frame's own fields with the given children.
    pub(crate) fn with_children(&self, children: Vec<Frame>) -> Frame {
        Frame {
            id: self.id,
            function_name: self.function_name.clone(),
            file: self.file.clone(),
            line: self.line,
            depth: self.depth,
            start: self.start,
            end: self.end,
            closed: self.closed,
            children,
        }
    }

    fn same_fields(&self, other: &Frame) -> bool {
        self.id == other.id
            && self.function_name == other.function_name
            && self.file == other.file
            && self.line == other.line
            && self.depth == other.depth
            && self.start == other.start
            && self.end == other.end
            && self.closed == other.closed
    }
}

impl Clone for Frame {
    fn clone(&self) -> Self {
        rebuild(std::slice::from_ref(self), |_, _| true)
            .pop()
            .unwrap_or_else(|| self.with_children(Vec::new()))
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        let mut pending = vec![(self, other)];
        while let Some((a, b)) = pending.pop() {
            if !a.same_fields(b) || a.children.len() != b.children.len() {
                return false;
            }
            pending.extend(a.children.iter().zip(&b.children));
        }
        true
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut frame) = pending.pop() {
            pending.append(&mut frame.children);
        }
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(records(std::slice::from_ref(self))).finish()
    }
}

/// Pre-order iterator over frames.
pub struct Frames<'a> {
    stack: Vec<&'a Frame>,
}

impl<'a> Iterator for Frames<'a> {
    type Item = &'a Frame;

    fn next(&mut self) -> Option<Self::Item> {
        let frame = self.stack.pop()?;
        self.stack.extend(frame.children.iter().rev());
        Some(frame)
    }
}

/// One frame with a parent link instead of nested children.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameRecord {
    pub id: usize,
    pub parent: Option<usize>,
    pub function_name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub depth: u32,
    pub start: f64,
    pub end: f64,
    pub closed: bool,
}

/// Flatten frames in pre-order.
fn records(roots: &[Frame]) -> Vec<FrameRecord> {
    let mut out = Vec::new();
    let mut stack: Vec<(&Frame, Option<usize>)> = roots.iter().rev().map(|root| (root, None)).collect();
    while let Some((frame, parent)) = stack.pop() {
        out.push(FrameRecord {
            id: frame.id,
            parent,
            function_name: frame.function_name.clone(),
            file: frame.file.clone(),
            line: frame.line,
            depth: frame.depth,
            start: frame.start,
            end: frame.end,
            closed: frame.closed,
        });
        stack.extend(frame.children.iter().rev().map(|child| (child, Some(frame.id))));
    }
    out
}

struct Level<'a> {
    frame: &'a Frame,
    next: usize,
    children: Vec<Frame>,
}

/// Copy a forest bottom-up, keeping a frame when `keep` accepts it given
/// its already rebuilt children.
pub(crate) fn rebuild<F>(roots: &[Frame], mut keep: F) -> Vec<Frame>
where
    F: FnMut(&Frame, &[Frame]) -> bool,
{
    let mut out = Vec::new();
    for root in roots {
        let mut stack = vec![Level {
            frame: root,
            next: 0,
            children: Vec::new(),
        }];
        while let Some(top) = stack.last_mut() {
            let frame = top.frame;
            if let Some(child) = frame.children.get(top.next) {
                top.next += 1;
                stack.push(Level {
                    frame: child,
                    next: 0,
                    children: Vec::new(),
                });
                continue;
            }
            let Some(done) = stack.pop() else { break };
            if !keep(done.frame, &done.children) {
                continue;
            }
            let kept = done.frame.with_children(done.children);
            match stack.last_mut() {
                Some(parent) => parent.children.push(kept),
                None => out.push(kept),
            }
        }
    }
    out
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceStats {
    pub frames: usize,
    pub roots: usize,
    pub max_depth: u32,
    pub never_closed: usize,
    pub start: Option<f64>,
    pub end: Option<f64>,
}

/// The call forest of one trace. Immutable once built; filters return new
/// forests.
///
/// Serializes as a flat pre-order list of [`FrameRecord`]s.
#[derive(Clone, Default, PartialEq)]
pub struct TraceForest {
    pub roots: Vec<Frame>,
}

impl TraceForest {
    pub fn new(roots: Vec<Frame>) -> Self {
        Self { roots }
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn frames(&self) -> impl Iterator<Item = &Frame> {
        self.roots.iter().flat_map(Frame::iter)
    }

    pub fn len(&self) -> usize {
        self.frames().count()
    }

    /// The deepest frame whose `[start, end]` contains `t`.
    ///
    /// Among equally deep candidates the first in pre-order wins.
    pub fn active_frame(&self, t: f64) -> Option<&Frame> {
        let mut best: Option<&Frame> = None;
        for frame in self.frames().filter(|f| f.contains(t)) {
            if best.map_or(true, |b| frame.depth > b.depth) {
                best = Some(frame);
            }
        }
        best
    }

    pub fn records(&self) -> Vec<FrameRecord> {
        records(&self.roots)
    }

    pub fn find(&self, id: usize) -> Option<&Frame> {
        self.frames().find(|f| f.id == id)
    }

    pub fn stats(&self) -> TraceStats {
        let mut stats = TraceStats {
            roots: self.roots.len(),
            ..TraceStats::default()
        };
        for frame in self.frames() {
            stats.frames += 1;
            stats.max_depth = stats.max_depth.max(frame.depth);
            if !frame.closed {
                stats.never_closed += 1;
            }
            stats.start = Some(stats.start.map_or(frame.start, |s: f64| s.min(frame.start)));
            stats.end = Some(stats.end.map_or(frame.end, |e: f64| e.max(frame.end)));
        }
        stats
    }
}

impl fmt::Debug for TraceForest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.records()).finish()
    }
}

impl Serialize for TraceForest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.records().serialize(serializer)
    }
}

struct OpenFrame {
    function_name: String,
    file: Option<String>,
    line: Option<u32>,
    depth: u32,
    start: f64,
    end: Option<f64>,
    children: Vec<usize>,
}

/// Rebuild the call forest from an ordered event sequence.
pub fn build_forest(events: &[TraceEvent]) -> TraceForest {
    let mut arena: Vec<OpenFrame> = Vec::with_capacity(events.len() / 2 + 1);
    let mut roots: Vec<usize> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    let mut max_timestamp: Option<f64> = None;
    let mut ignored_exits = 0usize;

    for event in events {
        max_timestamp = Some(max_timestamp.map_or(event.timestamp, |m| m.max(event.timestamp)));

        match event.phase {
            Phase::Enter => {
                let id = arena.len();
                arena.push(OpenFrame {
                    function_name: event.function_name.clone(),
                    file: event.file.clone(),
                    line: event.line,
                    depth: event.depth,
                    start: event.timestamp,
                    end: None,
                    children: Vec::new(),
                });
                match stack.last() {
                    Some(&parent) => arena[parent].children.push(id),
                    None => roots.push(id),
                }
                stack.push(id);
            }
            Phase::Exit => {
                let matched = stack.iter().rposition(|&id| {
                    let open = &arena[id];
                    open.end.is_none()
                        && open.depth == event.depth
                        && open.function_name == event.function_name
                });
                match matched {
                    Some(position) => {
                        let id = stack.remove(position);
                        arena[id].end = Some(event.timestamp);
                    }
                    None => ignored_exits += 1,
                }
            }
        }
    }

    if ignored_exits > 0 || !stack.is_empty() {
        tracing::debug!(
            ignored_exits,
            left_open = stack.len(),
            "Trace pairing mismatches tolerated"
        );
    }

    let close_at = max_timestamp.unwrap_or_default();
    TraceForest {
        roots: materialize(&arena, &roots, close_at),
    }
}

/// Turn arena entries into owned frames, children before parents.
fn materialize(arena: &[OpenFrame], roots: &[usize], close_at: f64) -> Vec<Frame> {
    let frame = |id: usize, children: Vec<Frame>| {
        let open = &arena[id];
        Frame {
            id,
            function_name: open.function_name.clone(),
            file: open.file.clone(),
            line: open.line,
            depth: open.depth,
            start: open.start,
            end: open.end.unwrap_or(close_at),
            closed: open.end.is_some(),
            children,
        }
    };

    let mut out = Vec::with_capacity(roots.len());
    for &root in roots {
        // (arena id, next child index, finished children)
        let mut stack: Vec<(usize, usize, Vec<Frame>)> = vec![(root, 0, Vec::new())];
        while let Some(top) = stack.last_mut() {
            let (id, next) = (top.0, top.1);
            if let Some(&child) = arena[id].children.get(next) {
                top.1 += 1;
                stack.push((child, 0, Vec::new()));
                continue;
            }
            let Some((id, _, children)) = stack.pop() else { break };
            let built = frame(id, children);
            match stack.last_mut() {
                Some(parent) => parent.2.push(built),
                None => out.push(built),
            }
        }
    }
    out
}
