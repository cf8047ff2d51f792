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

//! Normalization of raw backend records into time windows.

use replaysync_core::{RawRecord, TimelineTick};

/// Place a raw record on the timeline.
///
/// 1. Explicit start and/or end win; a missing side copies the present one.
/// 2. Otherwise a positive duration hint makes the single timestamp the
///    end of the window.
/// 3. Otherwise the record is an instant.
///
/// Records with no usable timestamp at all are rejected.
pub fn normalize(record: &RawRecord) -> Option<TimelineTick> {
    let (start, end) = match (record.start, record.end) {
        (Some(start), Some(end)) => (start, Some(end.max(start))),
        (Some(start), None) => (start, None),
        (None, Some(end)) => (end, None),
        (None, None) => {
            let point = record.point?;
            match record.duration_ms {
                Some(duration) if duration > 0 => match point.checked_sub(duration) {
                    Some(start) => (start, Some(point)),
                    None => (point, None),
                },
                _ => (point, None),
            }
        }
    };

    Some(TimelineTick {
        kind: record.kind,
        start_server: start,
        end_server: end,
        action_id: record.action_id.clone(),
        request_rid: record.request_rid.clone(),
        payload: record.payload.clone(),
    })
}
