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

//! Mapping between recording time, backend (server) time and playback time.
//!
//! `playback = server - offset - recording_epoch` where
//! `offset = earliest_tick - recording_epoch`. Conversions are undefined
//! (`None`) until both the epoch and at least one backend tick are known.
//! Callers must treat `None` as "cannot display yet", never as zero.
//! Results that do not fit in an `i64` are `None` as well.

/// Clock offset state for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClockAligner {
    recording_epoch: Option<i64>,
    earliest_tick: Option<i64>,
}

impl ClockAligner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the timestamp of the first streamed event.
    ///
    /// Only the first call has an effect. Returns whether the epoch was set.
    pub fn set_recording_epoch(&mut self, first_event_timestamp: i64) -> bool {
        if self.recording_epoch.is_some() {
            return false;
        }
        tracing::debug!(epoch = first_event_timestamp, "Recording epoch established");
        self.recording_epoch = Some(first_event_timestamp);
        true
    }

    /// Update the earliest known backend tick time.
    ///
    /// Returns whether the offset changed. Only the conversion changes;
    /// the current playback position is left to the caller.
    pub fn observe_earliest_tick(&mut self, earliest: Option<i64>) -> bool {
        if earliest == self.earliest_tick {
            return false;
        }
        tracing::debug!(
            previous = ?self.earliest_tick,
            earliest = ?earliest,
            "Clock offset recomputed"
        );
        self.earliest_tick = earliest;
        true
    }

    pub fn recording_epoch(&self) -> Option<i64> {
        self.recording_epoch
    }

    pub fn earliest_tick(&self) -> Option<i64> {
        self.earliest_tick
    }

    pub fn offset(&self) -> Option<i64> {
        self.earliest_tick?.checked_sub(self.recording_epoch?)
    }

    pub fn is_aligned(&self) -> bool {
        self.offset().is_some()
    }

    /// Server time to playback time, unclamped.
    pub fn to_playback_time(&self, server_ms: i64) -> Option<i64> {
        server_ms.checked_sub(self.offset()?)?.checked_sub(self.recording_epoch?)
    }

    /// Playback time to server time. Exact inverse of [`Self::to_playback_time`].
    pub fn to_server_time(&self, playback_ms: i64) -> Option<i64> {
        playback_ms.checked_add(self.offset()?)?.checked_add(self.recording_epoch?)
    }

    /// Playback time suitable for a seek: clamped to zero from below.
    pub fn seek_target(&self, server_ms: i64) -> Option<i64> {
        self.to_playback_time(server_ms).map(|t| t.max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn aligned(epoch: i64, earliest: i64) -> ClockAligner {
        let mut clock = ClockAligner::new();
        clock.set_recording_epoch(epoch);
        clock.observe_earliest_tick(Some(earliest));
        clock
    }

    #[test]
    fn test_undefined_before_epoch() {
        let mut clock = ClockAligner::new();
        clock.observe_earliest_tick(Some(5_000));
        assert_eq!(clock.to_playback_time(6_000), None);
        assert_eq!(clock.to_server_time(0), None);
        assert_eq!(clock.seek_target(6_000), None);
        assert!(!clock.is_aligned());
    }

    #[test]
    fn test_undefined_without_ticks() {
        let mut clock = ClockAligner::new();
        clock.set_recording_epoch(1_000);
        assert_eq!(clock.offset(), None);
        assert_eq!(clock.to_server_time(10), None);
    }

    #[test]
    fn test_epoch_set_once() {
        let mut clock = ClockAligner::new();
        assert!(clock.set_recording_epoch(1_000));
        assert!(!clock.set_recording_epoch(2_000));
        assert_eq!(clock.recording_epoch(), Some(1_000));
    }

    #[test]
    fn test_conversions() {
        let clock = aligned(1_000, 50_000);
        assert_eq!(clock.offset(), Some(49_000));
        assert_eq!(clock.to_playback_time(50_000), Some(0));
        assert_eq!(clock.to_playback_time(52_500), Some(2_500));
        assert_eq!(clock.to_server_time(2_500), Some(52_500));
        assert_eq!(clock.to_playback_time(49_000), Some(-1_000));
        assert_eq!(clock.seek_target(49_000), Some(0));
    }

    #[test]
    fn test_late_backend_data_recomputes_offset() {
        let mut clock = aligned(1_000, 50_000);
        assert!(!clock.observe_earliest_tick(Some(50_000)));
        assert!(clock.observe_earliest_tick(Some(48_000)));
        assert_eq!(clock.offset(), Some(47_000));
        assert_eq!(clock.to_playback_time(50_000), Some(2_000));
    }

    #[test]
    fn test_overflow_is_undefined() {
        let clock = aligned(i64::MIN, i64::MAX);
        assert_eq!(clock.offset(), None);
        assert!(!clock.is_aligned());
        assert_eq!(clock.to_playback_time(0), None);

        let clock = aligned(-1, i64::MAX - 1);
        assert_eq!(clock.offset(), Some(i64::MAX));
        assert_eq!(clock.to_server_time(1), None);
        assert_eq!(clock.to_playback_time(-10), None);
        assert_eq!(clock.seek_target(i64::MIN), None);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            epoch in -1_000_000_000i64..1_000_000_000,
            earliest in -1_000_000_000i64..1_000_000_000,
            x in -1_000_000_000i64..1_000_000_000,
        ) {
            let clock = aligned(epoch, earliest);
            let server = clock.to_server_time(x).unwrap();
            prop_assert_eq!(clock.to_playback_time(server), Some(x));
        }
    }
}
