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

//! # Replaysync client
//!
//! Access to the three session data endpoints consumed by the synchronizer:
//!
//! - `GET /v1/sessions/{id}/full?includeRrweb=1`
//! - `GET /v1/sessions/{id}/rrweb?afterSeq=N&limit=M`
//! - `GET /v1/sessions/{id}/traces`
//!
//! ```no_run
//! use replaysync_client::{ClientConfig, HttpSource, SessionSource};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let source = HttpSource::new(ClientConfig::new("http://localhost:8080"))?;
//! let session = source.load_session("s-42").await?;
//! let chunks = source.fetch_chunks("s-42", -1, 50).await?;
//! println!("{} actions, {} chunks", session.actions.len(), chunks.len());
//! # Ok(())
//! # }
//! ```

mod http;
mod memory;
mod source;
mod types;

pub use http::{ClientConfig, ClientError, HttpSource};
pub use memory::{MemorySession, MemorySource};
pub use source::SessionSource;
pub use types::{ChunkPage, SessionFull, StreamRange};
pub use replaysync_trace::TracesResponse;
