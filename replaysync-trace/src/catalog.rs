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

//! Per-request traces from the session traces endpoint.

use crate::builder::{build_forest, TraceForest};
use crate::decode::decode_trace_value;
use crate::event::TraceEvent;
use replaysync_core::{TimelineTick, TraceConfig};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Body of `GET /v1/sessions/{id}/traces`
///
/// Malformed groups, traces and batches are dropped one by one; the rest of
/// the body is kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TracesResponse {
    #[serde(default, deserialize_with = "lenient_list")]
    pub items: Vec<TraceGroup>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceGroup {
    #[serde(default)]
    pub key: Value,
    #[serde(default, deserialize_with = "lenient_list")]
    pub traces: Vec<RequestTrace>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestTrace {
    #[serde(rename = "requestRid", alias = "rid", default, deserialize_with = "rid_field")]
    pub request_rid: Option<String>,
    #[serde(default)]
    pub request: Value,
    #[serde(default, deserialize_with = "lenient_list")]
    pub batches: Vec<TraceBatch>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceBatch {
    #[serde(default)]
    pub trace: Value,
}

/// Flattened events of one request, ready for tree construction.
#[derive(Debug, Clone)]
pub struct RequestTraceEntry {
    pub group_key: String,
    pub request_rid: Option<String>,
    pub request: Value,
    pub events: Vec<TraceEvent>,
    /// Batches no decoding form accepted
    pub failed_batches: usize,
}

impl RequestTraceEntry {
    pub fn build(&self) -> TraceForest {
        build_forest(&self.events)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TraceCatalog {
    entries: Vec<RequestTraceEntry>,
    by_rid: HashMap<String, usize>,
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl TraceCatalog {
    /// Flatten every request's batches in order, dropping internal wrapper
    /// frames before any tree is built.
    pub fn from_response(response: &TracesResponse, config: &TraceConfig) -> Self {
        let mut catalog = TraceCatalog::default();

        for group in &response.items {
            let group_key = key_string(&group.key);
            for trace in &group.traces {
                let entry = flatten_request(&group_key, trace, config);
                if let Some(rid) = &entry.request_rid {
                    if catalog.by_rid.contains_key(rid) {
                        tracing::warn!(rid = %rid, "Duplicate request trace; keeping the first");
                    } else {
                        catalog.by_rid.insert(rid.clone(), catalog.entries.len());
                    }
                }
                catalog.entries.push(entry);
            }
        }

        tracing::debug!(requests = catalog.entries.len(), "Trace catalog built");
        catalog
    }

    pub fn entries(&self) -> &[RequestTraceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| e.request_rid.as_deref())
    }

    pub fn get(&self, rid: &str) -> Option<&RequestTraceEntry> {
        self.by_rid.get(rid).map(|&i| &self.entries[i])
    }

    /// Trace of the request behind a timeline tick.
    pub fn for_tick(&self, tick: &TimelineTick) -> Option<&RequestTraceEntry> {
        tick.request_rid.as_deref().and_then(|rid| self.get(rid))
    }

    pub fn build_tree(&self, rid: &str) -> Option<TraceForest> {
        self.get(rid).map(RequestTraceEntry::build)
    }
}

/// Numeric rids are read as their decimal text, like backend records.
fn rid_field<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            tracing::warn!(found = %other, "Expected a list of trace items; ignoring");
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<T>(item) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!("Dropping malformed trace item: {}", e);
                None
            }
        })
        .collect())
}

fn flatten_request(group_key: &str, trace: &RequestTrace, config: &TraceConfig) -> RequestTraceEntry {
    let mut events = Vec::new();
    let mut failed_batches = 0;

    for (position, batch) in trace.batches.iter().enumerate() {
        match decode_trace_value(&batch.trace) {
            Ok(decoded) => {
                if let Some(total) = batch.trace.get("total").and_then(Value::as_u64) {
                    if total as usize != decoded.len() {
                        tracing::debug!(
                            batch = position,
                            declared = total,
                            decoded = decoded.len(),
                            "Trace batch size differs from declared total"
                        );
                    }
                }
                events.extend(
                    decoded
                        .into_iter()
                        .filter(|e| !config.is_internal_wrapper(&e.function_name)),
                );
            }
            Err(e) => {
                failed_batches += 1;
                tracing::warn!(
                    rid = ?trace.request_rid,
                    batch = position,
                    "Dropping trace batch: {}",
                    e
                );
            }
        }
    }

    RequestTraceEntry {
        group_key: group_key.to_string(),
        request_rid: trace.request_rid.clone(),
        request: trace.request.clone(),
        events,
        failed_batches,
    }
}
