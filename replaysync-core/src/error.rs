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

//! Error taxonomy for session synchronization

use thiserror::Error;

/// Result type for synchronization operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors surfaced by the synchronizer core.
///
/// Only `DataFetch` is a failure of the session as a whole. `Decode` is
/// raised per item and the item is dropped by the caller, `InsufficientData`
/// maps to the `no-data` status and `Stale` results are discarded silently.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network failure or non-success response
    #[error("Data fetch failed: {0}")]
    DataFetch(String),

    /// Malformed base64/JSON for a single chunk or trace item
    #[error("Decode error: {0}")]
    Decode(String),

    /// Fewer recorded events than needed to establish a playback frame
    #[error("Insufficient data: {available} recorded events, need {required}")]
    InsufficientData { available: usize, required: usize },

    /// A response resolved after its owning session was torn down
    #[error("Stale response for session {0}")]
    Stale(String),

    /// Operation issued before the data it needs is available
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Operation requires a state the player is not in
    #[error(transparent)]
    InvalidTransition(#[from] crate::status::InvalidTransition),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether the error ends the session until an explicit reload.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SyncError::DataFetch(_) | SyncError::InsufficientData { .. }
        )
    }

    /// Whether the error must be dropped without touching any state.
    pub fn is_stale(&self) -> bool {
        matches!(self, SyncError::Stale(_))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Decode(e.to_string())
    }
}

impl From<base64::DecodeError> for SyncError {
    fn from(e: base64::DecodeError) -> Self {
        SyncError::Decode(e.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}
