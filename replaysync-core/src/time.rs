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

//! Timestamp parsing for loosely typed JSON records.
//!
//! Backend and recording payloads disagree on timestamp encoding: integer
//! milliseconds, fractional milliseconds, numeric strings and RFC 3339
//! strings all occur.

use chrono::DateTime;
use serde_json::Value;

/// Parse a timestamp value into fractional milliseconds.
pub fn parse_millis_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            if let Ok(v) = s.parse::<f64>() {
                return v.is_finite().then_some(v);
            }
            DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_micros() as f64 / 1000.0)
        }
        _ => None,
    }
}

/// Parse a timestamp value into whole milliseconds.
///
/// Values outside the `i64` range are rejected rather than saturated.
pub fn parse_millis(value: &Value) -> Option<i64> {
    parse_millis_f64(value)
        .map(f64::round)
        .filter(|v| *v >= i64::MIN as f64 && *v < i64::MAX as f64)
        .map(|v| v as i64)
}

/// First field among `keys` present on `object` that parses as a timestamp.
pub fn millis_field(object: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter()
        .filter_map(|k| object.get(*k))
        .find_map(parse_millis)
}
