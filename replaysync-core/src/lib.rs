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

//! Replaysync Core
//!
//! Data model shared by the stream synchronizer and the trace viewer:
//! recorded interaction events, backend telemetry records, the clock
//! mapping between them, and the player status machine.

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod status;
pub mod tick;
pub mod time;

pub use clock::ClockAligner;
pub use config::{SyncConfig, TraceConfig, DEFAULT_WINDOW_HALF_WIDTH_MS};
pub use error::{Result, SyncError};
pub use event::{decode_chunk, decode_chunk_payload, Chunk, RecordedEvent};
pub use status::{InvalidTransition, PlayerEvent, PlayerStatus};
pub use tick::{RawRecord, TickKind, TimelineTick};
pub use time::parse_millis;
