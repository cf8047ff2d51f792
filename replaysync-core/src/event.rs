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

//! Recorded interaction events and the chunk wire format.

use crate::error::{Result, SyncError};
use crate::time::parse_millis;
use base64::engine::general_purpose;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One event of the recorded interaction stream.
///
/// Serializes back to the `{type, data, timestamp}` shape the replay engine
/// consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Recording-clock milliseconds
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub kind: Value,
    #[serde(rename = "data", default)]
    pub payload: Value,
}

impl RecordedEvent {
    pub fn new(timestamp: i64, kind: impl Into<Value>, payload: Value) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            payload,
        }
    }

    /// Build an event from a loosely typed JSON object.
    ///
    /// Only the timestamp is mandatory; a missing type or payload becomes null.
    pub fn from_value(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| SyncError::Decode("recorded event is not an object".into()))?;
        let timestamp = object
            .get("timestamp")
            .and_then(parse_millis)
            .ok_or_else(|| SyncError::Decode("recorded event has no timestamp".into()))?;

        Ok(Self {
            timestamp,
            kind: object.get("type").cloned().unwrap_or(Value::Null),
            payload: object.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

/// A sequenced, base64-encoded slice of the recorded stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(alias = "sequenceNumber")]
    pub seq: u64,
    #[serde(rename = "base64", alias = "encodedPayload")]
    pub encoded_payload: String,
}

impl Chunk {
    pub fn new(seq: u64, encoded_payload: impl Into<String>) -> Self {
        Self {
            seq,
            encoded_payload: encoded_payload.into(),
        }
    }

    /// Encode a list of events the way the recording backend does.
    pub fn encode(seq: u64, events: &[RecordedEvent]) -> Result<Self> {
        let json = serde_json::to_vec(events)?;
        Ok(Self::new(seq, general_purpose::STANDARD.encode(json)))
    }
}

/// Strip surrounding quotes and all embedded whitespace from base64 text.
fn clean_base64(raw: &str) -> String {
    let trimmed = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            trimmed
                .strip_prefix(*q)
                .and_then(|rest| rest.strip_suffix(*q))
        })
        .unwrap_or(trimmed);
    unquoted.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Decode base64 text, tolerating missing padding.
pub fn decode_base64_text(raw: &str) -> Result<Vec<u8>> {
    let cleaned = clean_base64(raw);
    if cleaned.is_empty() {
        return Err(SyncError::Decode("empty base64 payload".into()));
    }
    general_purpose::STANDARD
        .decode(cleaned.as_bytes())
        .or_else(|_| general_purpose::STANDARD_NO_PAD.decode(cleaned.as_bytes()))
        .map_err(SyncError::from)
}

/// Decode a chunk payload into its ordered events.
///
/// The payload is base64 of UTF-8 JSON: either an array of events or an
/// object carrying an `events` array. Individual events that fail to decode
/// are dropped; a payload that is not decodable at all is an error.
pub fn decode_chunk_payload(encoded: &str) -> Result<Vec<RecordedEvent>> {
    let bytes = decode_base64_text(encoded)?;
    let text = String::from_utf8(bytes).map_err(|e| SyncError::Decode(e.to_string()))?;
    let value: Value = serde_json::from_str(&text)?;

    let items = match &value {
        Value::Array(items) => items,
        Value::Object(object) => match object.get("events") {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(SyncError::Decode(
                    "chunk object has no events array".into(),
                ))
            }
        },
        _ => return Err(SyncError::Decode("chunk payload is not a list".into())),
    };

    let mut events = Vec::with_capacity(items.len());
    for item in items {
        match RecordedEvent::from_value(item) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Dropping recorded event: {}", e),
        }
    }
    Ok(events)
}

/// Decode a chunk, tagging errors with its sequence number.
pub fn decode_chunk(chunk: &Chunk) -> Result<Vec<RecordedEvent>> {
    decode_chunk_payload(&chunk.encoded_payload)
        .map_err(|e| SyncError::Decode(format!("chunk {}: {}", chunk.seq, e)))
}
