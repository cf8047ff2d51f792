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

//! Wire types of the session data API.

use replaysync_core::Chunk;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `GET /v1/sessions/{id}/full?includeRrweb=1`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFull {
    /// Raw backend records
    #[serde(default)]
    pub actions: Vec<Value>,
    /// Declared range of the recorded stream, absent when nothing was recorded
    #[serde(default)]
    pub rrweb: Option<StreamRange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRange {
    #[serde(default)]
    pub first_seq: Option<u64>,
    #[serde(default)]
    pub last_seq: Option<u64>,
}

impl StreamRange {
    pub fn new(first_seq: u64, last_seq: u64) -> Self {
        Self {
            first_seq: Some(first_seq),
            last_seq: Some(last_seq),
        }
    }

    /// Declared number of chunks, when both bounds are known.
    pub fn declared_len(&self) -> Option<u64> {
        match (self.first_seq, self.last_seq) {
            (Some(first), Some(last)) if last >= first => Some(last - first + 1),
            (Some(_), Some(_)) => Some(0),
            _ => None,
        }
    }
}

/// Body of `GET /v1/sessions/{id}/rrweb`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkPage {
    #[serde(default)]
    pub items: Vec<Value>,
}

impl ChunkPage {
    /// Chunks of the page; malformed items are dropped.
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<Chunk>(item) {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    tracing::warn!("Dropping malformed chunk item: {}", e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_full_shapes() {
        let full: SessionFull = serde_json::from_value(json!({
            "actions": [{"kind": "action", "ts": 1}],
            "rrweb": {"firstSeq": 3, "lastSeq": 12}
        }))
        .unwrap();
        assert_eq!(full.actions.len(), 1);
        assert_eq!(full.rrweb.unwrap().declared_len(), Some(10));

        let bare: SessionFull = serde_json::from_value(json!({})).unwrap();
        assert!(bare.actions.is_empty());
        assert!(bare.rrweb.is_none());
    }

    #[test]
    fn test_page_drops_malformed_items() {
        let page: ChunkPage = serde_json::from_value(json!({
            "items": [
                {"seq": 0, "base64": "W10="},
                {"seq": "one"},
                {"seq": 1, "base64": "W10="}
            ]
        }))
        .unwrap();
        let seqs: Vec<u64> = page.into_chunks().iter().map(|c| c.seq).collect();
        assert_eq!(seqs, vec![0, 1]);
    }
}
