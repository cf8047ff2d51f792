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

use crate::types::SessionFull;
use async_trait::async_trait;
use replaysync_core::{Chunk, Result};
use replaysync_trace::TracesResponse;

/// Source of session data.
///
/// Failures surface as `SyncError::DataFetch`; malformed individual items
/// are dropped by the implementation.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Backend log and declared recording range.
    async fn load_session(&self, session_id: &str) -> Result<SessionFull>;

    /// Up to `limit` chunks with `seq > after_seq`, in sequence order.
    async fn fetch_chunks(&self, session_id: &str, after_seq: i64, limit: usize) -> Result<Vec<Chunk>>;

    /// Per-request call traces.
    async fn fetch_traces(&self, session_id: &str) -> Result<TracesResponse>;
}
