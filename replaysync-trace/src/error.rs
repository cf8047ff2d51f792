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

use replaysync_core::SyncError;
use thiserror::Error;

/// Trace payload decoding errors
#[derive(Debug, Error)]
pub enum TraceDecodeError {
    /// No supported encoding accepted the payload
    #[error("Unrecognized trace payload: {0}")]
    Unrecognized(String),

    /// A single event is missing required fields
    #[error("Invalid trace event: {0}")]
    InvalidEvent(String),
}

impl From<TraceDecodeError> for SyncError {
    fn from(e: TraceDecodeError) -> Self {
        SyncError::Decode(e.to_string())
    }
}
