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

//! Trace payload decoding.
//!
//! Forms are tried in order and the first that parses wins:
//! a JSON array, a JSON object carrying an `events` or `data` array,
//! newline-delimited JSON objects, then base64 wrapping either of the
//! JSON or newline-delimited forms.

use crate::error::TraceDecodeError;
use crate::event::TraceEvent;
use replaysync_core::event::decode_base64_text;
use serde_json::Value;

/// Decode a trace payload already parsed as JSON.
pub fn decode_trace_value(value: &Value) -> Result<Vec<TraceEvent>, TraceDecodeError> {
    let items = match value {
        Value::String(text) => return decode_trace_text(text),
        other => json_items(other)
            .ok_or_else(|| TraceDecodeError::Unrecognized("no events array".into()))?,
    };
    Ok(events_from_items(&items))
}

/// Decode a trace payload from text.
pub fn decode_trace_text(text: &str) -> Result<Vec<TraceEvent>, TraceDecodeError> {
    if let Some(items) = plain_items(text) {
        return Ok(events_from_items(&items));
    }

    if let Ok(bytes) = decode_base64_text(text) {
        if let Ok(inner) = String::from_utf8(bytes) {
            if let Some(items) = plain_items(&inner) {
                return Ok(events_from_items(&items));
            }
        }
    }

    Err(TraceDecodeError::Unrecognized(preview(text)))
}

/// JSON or newline-delimited JSON, without base64.
fn plain_items(text: &str) -> Option<Vec<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if let Some(items) = json_items(&value) {
            return Some(items);
        }
        // A quoted string holding an encoded payload.
        if let Value::String(inner) = value {
            if let Ok(bytes) = decode_base64_text(&inner) {
                if let Ok(inner) = String::from_utf8(bytes) {
                    return plain_items(&inner);
                }
            }
        }
    }

    ndjson_items(trimmed)
}

fn json_items(value: &Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items.clone()),
        Value::Object(object) => ["events", "data"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_array))
            .cloned(),
        _ => None,
    }
}

fn ndjson_items(text: &str) -> Option<Vec<Value>> {
    let mut items = Vec::new();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<Value>(line) {
            Ok(value @ Value::Object(_)) => items.push(value),
            _ => return None,
        }
    }
    (!items.is_empty()).then_some(items)
}

fn events_from_items(items: &[Value]) -> Vec<TraceEvent> {
    let mut events = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for item in items {
        match TraceEvent::from_value(item) {
            Ok(event) => events.push(event),
            Err(e) => {
                dropped += 1;
                tracing::debug!("Dropping trace event: {}", e);
            }
        }
    }
    if dropped > 0 {
        tracing::warn!(dropped, kept = events.len(), "Dropped malformed trace events");
    }
    events
}

fn preview(text: &str) -> String {
    let mut head: String = text.chars().take(40).collect();
    if text.chars().count() > 40 {
        head.push_str("...");
    }
    head
}
