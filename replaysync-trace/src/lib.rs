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

//! Call-trace reconstruction
//!
//! Rebuilds nested call frames from flat enter/exit instrumentation events,
//! with non-destructive display filters and active-frame lookup.

pub mod builder;
pub mod catalog;
pub mod decode;
pub mod error;
pub mod event;
pub mod filter;

pub use builder::{build_forest, Frame, FrameRecord, Frames, TraceForest, TraceStats};
pub use catalog::{RequestTrace, RequestTraceEntry, TraceBatch, TraceCatalog, TraceGroup, TracesResponse};
pub use decode::{decode_trace_text, decode_trace_value};
pub use error::TraceDecodeError;
pub use event::{Phase, TraceEvent};
pub use filter::{collapse_vendor, duration_floor, TraceFilter};
