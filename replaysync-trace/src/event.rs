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

//! Flat enter/exit instrumentation events.

use crate::error::TraceDecodeError;
use replaysync_core::time::parse_millis_f64;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Enter,
    Exit,
}

impl Phase {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "B" => return Some(Phase::Enter),
            "E" => return Some(Phase::Exit),
            _ => {}
        }
        match raw.trim().to_ascii_lowercase().as_str() {
            "enter" | "entry" | "call" | "begin" | "start" => Some(Phase::Enter),
            "exit" | "return" | "leave" | "end" => Some(Phase::Exit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEvent {
    pub timestamp: f64,
    pub phase: Phase,
    pub function_name: String,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub depth: u32,
}

fn first<'a>(object: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| object.get(*k).filter(|v| !v.is_null()))
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TraceEvent {
    pub fn enter(function_name: impl Into<String>, depth: u32, timestamp: f64) -> Self {
        Self {
            timestamp,
            phase: Phase::Enter,
            function_name: function_name.into(),
            file: None,
            line: None,
            depth,
        }
    }

    pub fn exit(function_name: impl Into<String>, depth: u32, timestamp: f64) -> Self {
        Self {
            phase: Phase::Exit,
            ..Self::enter(function_name, depth, timestamp)
        }
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Read one event from the loosely typed shapes tracers emit.
    pub fn from_value(value: &Value) -> Result<Self, TraceDecodeError> {
        if !value.is_object() {
            return Err(TraceDecodeError::InvalidEvent("not an object".into()));
        }

        let timestamp = first(value, &["timestamp", "ts", "t", "time"])
            .and_then(parse_millis_f64)
            .ok_or_else(|| TraceDecodeError::InvalidEvent("missing timestamp".into()))?;
        let phase = first(value, &["phase", "type", "ph", "event"])
            .and_then(Value::as_str)
            .and_then(Phase::parse)
            .ok_or_else(|| TraceDecodeError::InvalidEvent("missing phase".into()))?;
        let function_name = first(value, &["functionName", "function", "fn", "name"])
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| TraceDecodeError::InvalidEvent("missing function name".into()))?
            .to_string();

        Ok(Self {
            timestamp,
            phase,
            function_name,
            file: first(value, &["file", "filename", "path"])
                .and_then(Value::as_str)
                .map(str::to_string),
            line: first(value, &["line", "lineno"]).and_then(as_u32),
            depth: first(value, &["depth", "level"]).and_then(as_u32).unwrap_or(0),
        })
    }
}
