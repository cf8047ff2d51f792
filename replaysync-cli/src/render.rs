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

//! Plain-text output.

use replaysync_core::TimelineTick;
use replaysync_index::TimelineIndex;
use replaysync_player::{CursorProgress, SessionView};
use replaysync_trace::{Frame, RequestTraceEntry, TraceForest};
use std::fmt::Write;

fn tick_line(out: &mut String, tick: &TimelineTick) {
    let end = match tick.end_server {
        Some(end) => end.to_string(),
        None => "-".to_string(),
    };
    let _ = write!(out, "{:>15} {:>15}  {:<8}", tick.start_server, end, tick.kind.as_str());
    if let Some(action) = &tick.action_id {
        let _ = write!(out, " action={}", action);
    }
    if let Some(rid) = &tick.request_rid {
        let _ = write!(out, " rid={}", rid);
    }
    out.push('\n');
}

pub fn timeline(index: &TimelineIndex, ticks: &[&TimelineTick], now: Option<i64>, half_width_ms: i64) -> String {
    let mut out = String::new();
    match now {
        Some(now) => {
            let _ = writeln!(
                out,
                "{} of {} ticks within {} ms of {}",
                ticks.len(),
                index.len(),
                half_width_ms,
                now
            );
        }
        None => {
            let _ = writeln!(out, "{} ticks in {} groups", index.len(), index.groups().len());
        }
    }
    if index.dropped() > 0 {
        let _ = writeln!(out, "{} records without a time were skipped", index.dropped());
    }
    for tick in ticks {
        tick_line(&mut out, tick);
    }
    out
}

/// Deeper frames are printed at this indent with their level spelled out.
const MAX_INDENT: usize = 32;

fn frame_lines(out: &mut String, roots: &[Frame], active: Option<usize>) {
    let mut stack: Vec<(&Frame, usize)> = roots.iter().rev().map(|root| (root, 0)).collect();
    while let Some((frame, indent)) = stack.pop() {
        let marker = if Some(frame.id) == active { "*" } else { " " };
        let _ = write!(out, "{}{}", marker, "  ".repeat(indent.min(MAX_INDENT)));
        if indent > MAX_INDENT {
            let _ = write!(out, "[{}] ", indent);
        }
        let _ = write!(out, "{} {:.3} ms", frame.function_name, frame.duration());
        if let Some(file) = &frame.file {
            let _ = write!(out, "  {}", file);
            if let Some(line) = frame.line {
                let _ = write!(out, ":{}", line);
            }
        }
        if !frame.closed {
            out.push_str("  (never returned)");
        }
        out.push('\n');
        stack.extend(frame.children.iter().rev().map(|child| (child, indent + 1)));
    }
}

pub fn trace(entry: &RequestTraceEntry, forest: &TraceForest, active: Option<usize>) -> String {
    let mut out = String::new();
    let stats = forest.stats();
    let _ = writeln!(
        out,
        "{} [{}]: {} frames, {} roots, depth {}",
        entry.request_rid.as_deref().unwrap_or("?"),
        entry.group_key,
        stats.frames,
        stats.roots,
        stats.max_depth
    );
    if entry.failed_batches > 0 {
        let _ = writeln!(out, "{} trace batches could not be decoded", entry.failed_batches);
    }
    frame_lines(&mut out, &forest.roots, active);
    out
}

pub fn stream(session: &str, progress: &CursorProgress, duration: Option<i64>) -> String {
    let mut out = String::new();
    let declared = progress
        .declared
        .and_then(|range| range.declared_len())
        .map(|n| n.to_string())
        .unwrap_or_else(|| "?".to_string());
    let _ = writeln!(
        out,
        "{}: {} of {} chunks, {} events, {} undecodable",
        session, progress.chunks, declared, progress.streamed_events, progress.decode_failures
    );
    if let Some(duration) = duration {
        let _ = writeln!(out, "recording spans {} ms", duration);
    }
    out
}

pub fn position(view: &SessionView) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "t={} server={}",
        view.position().unwrap_or(0),
        view.server_time().map_or_else(|| "?".to_string(), |t| t.to_string())
    );
    let kinds: Vec<&str> = view.visible().iter().map(|t| t.kind.as_str()).collect();
    if !kinds.is_empty() {
        let _ = write!(out, "  [{}]", kinds.join(", "));
    }
    out
}
