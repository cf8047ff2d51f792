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

//! Backend telemetry records and their canonical timeline form.

use crate::error::{Result, SyncError};
use crate::time::millis_field;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const START_KEYS: &[&str] = &["startServer", "start_server", "start", "startedAt"];
const END_KEYS: &[&str] = &["endServer", "end_server", "end", "endedAt"];
const POINT_KEYS: &[&str] = &["ts", "timestamp", "time", "at", "createdAt"];
const DURATION_KEYS: &[&str] = &["durationMs", "duration_ms", "duration"];

/// Kind of backend record, ordered by display precedence within a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TickKind {
    Action,
    Request,
    Db,
    Email,
}

impl TickKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "action" => Some(TickKind::Action),
            "request" | "http" => Some(TickKind::Request),
            "db" | "query" | "sql" => Some(TickKind::Db),
            "email" | "mail" => Some(TickKind::Email),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TickKind::Action => "action",
            TickKind::Request => "request",
            TickKind::Db => "db",
            TickKind::Email => "email",
        }
    }
}

impl std::fmt::Display for TickKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backend record placed on the canonical server-time timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineTick {
    pub kind: TickKind,
    pub start_server: i64,
    /// `None` marks an instant
    pub end_server: Option<i64>,
    pub action_id: Option<String>,
    /// Request id joining a request tick to its call trace
    pub request_rid: Option<String>,
    pub payload: Value,
}

impl TimelineTick {
    pub fn instant(kind: TickKind, at: i64) -> Self {
        Self {
            kind,
            start_server: at,
            end_server: None,
            action_id: None,
            request_rid: None,
            payload: Value::Null,
        }
    }

    pub fn spanning(kind: TickKind, start: i64, end: i64) -> Self {
        Self {
            end_server: Some(end),
            ..Self::instant(kind, start)
        }
    }

    pub fn with_action_id(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_request_rid(mut self, rid: impl Into<String>) -> Self {
        self.request_rid = Some(rid.into());
        self
    }

    pub fn start(&self) -> i64 {
        self.start_server
    }

    pub fn end(&self) -> i64 {
        self.end_server.unwrap_or(self.start_server)
    }

    pub fn duration(&self) -> i64 {
        self.end().saturating_sub(self.start())
    }

    pub fn is_instant(&self) -> bool {
        self.end_server.is_none()
    }
}

/// A backend record as received, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub kind: TickKind,
    pub start: Option<i64>,
    pub end: Option<i64>,
    /// Single timestamp for records without an explicit window
    pub point: Option<i64>,
    pub duration_ms: Option<i64>,
    pub action_id: Option<String>,
    pub request_rid: Option<String>,
    pub payload: Value,
}

fn string_field(object: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| object.get(*k)).find_map(|v| match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

impl RawRecord {
    /// Read one record. `default_kind` applies when the record names none.
    pub fn from_value(value: &Value, default_kind: TickKind) -> Result<Self> {
        if !value.is_object() {
            return Err(SyncError::Decode("backend record is not an object".into()));
        }

        let kind = string_field(value, &["kind", "type"])
            .and_then(|k| TickKind::parse(&k))
            .unwrap_or(default_kind);

        let mut action_id = string_field(value, &["actionId", "action_id"]);
        if action_id.is_none() && kind == TickKind::Action {
            action_id = string_field(value, &["id"]);
        }

        Ok(Self {
            kind,
            start: millis_field(value, START_KEYS),
            end: millis_field(value, END_KEYS),
            point: millis_field(value, POINT_KEYS),
            duration_ms: millis_field(value, DURATION_KEYS),
            action_id,
            request_rid: string_field(value, &["rid", "requestRid", "request_id"]),
            payload: value.clone(),
        })
    }

    /// Read a backend log, expanding records nested under an action.
    ///
    /// Nested `requests`, `queries`/`db` and `emails` arrays become records
    /// of their own and inherit the parent's action id. Malformed records are
    /// dropped.
    pub fn read_all(values: &[Value]) -> Vec<RawRecord> {
        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match RawRecord::from_value(value, TickKind::Action) {
                Ok(record) => {
                    let parent_group = record.action_id.clone();
                    records.push(record);
                    for (key, kind) in [
                        ("requests", TickKind::Request),
                        ("queries", TickKind::Db),
                        ("db", TickKind::Db),
                        ("emails", TickKind::Email),
                    ] {
                        let Some(Value::Array(children)) = value.get(key) else {
                            continue;
                        };
                        for child in children {
                            match RawRecord::from_value(child, kind) {
                                Ok(mut nested) => {
                                    if nested.action_id.is_none() {
                                        nested.action_id = parent_group.clone();
                                    }
                                    records.push(nested);
                                }
                                Err(e) => tracing::warn!("Dropping nested {} record: {}", kind, e),
                            }
                        }
                    }
                }
                Err(e) => tracing::warn!("Dropping backend record: {}", e),
            }
        }
        records
    }
}
