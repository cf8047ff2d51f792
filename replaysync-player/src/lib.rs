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

//! Replaysync Player
//!
//! Streams a session's recorded events into a replay engine and keeps the
//! backend timeline and request traces aligned with the playback position.
//!
//! - [`EventStreamCursor`] pulls numbered chunks incrementally
//! - [`PlaybackController`] drives the engine and the player status machine
//! - [`SessionSync`] owns the derived state of the selected session
//!
//! ```rust,no_run
//! use replaysync_client::{ClientConfig, HttpSource};
//! use replaysync_core::SyncConfig;
//! use replaysync_player::{HeadlessEngine, SessionSync};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::default();
//! let source = Arc::new(HttpSource::new(ClientConfig::from(&config))?);
//! let mut sync = SessionSync::new(config, source, HeadlessEngine::new);
//!
//! sync.open("session-1").await?;
//! if let Some(tick) = sync.view().index().ticks().get(1).cloned() {
//!     sync.seek_to_tick(&tick)?;
//! }
//! println!("{} ticks in view", sync.visible_ticks().len());
//! # Ok(())
//! # }
//! ```

mod controller;
mod cursor;
mod engine;
mod session;
pub mod viewport;

pub use controller::{PlaybackController, PlaybackEvent, PlaybackSettings, PlaybackSnapshot};
pub use cursor::{CursorProgress, CursorState, EventStreamCursor, PullOutcome};
pub use engine::{EngineFactory, EngineMeta, HeadlessEngine, ReplayEngine};
pub use session::{SessionSync, SessionView};
pub use viewport::{fit_scale, Size};
