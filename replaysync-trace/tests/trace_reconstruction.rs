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

//! Integration tests for call-trace reconstruction

use proptest::prelude::*;
use replaysync_trace::{
    build_forest, decode_trace_text, duration_floor, Phase, TraceEvent, TraceFilter,
};

/// Well-formed nested pair yields one root with one child
#[test]
fn test_enter_exit_pairs_nest() {
    let text = r#"[
        {"timestamp": 0,  "phase": "enter", "functionName": "f", "depth": 0},
        {"timestamp": 5,  "phase": "enter", "functionName": "g", "depth": 1},
        {"timestamp": 10, "phase": "exit",  "functionName": "g", "depth": 1},
        {"timestamp": 20, "phase": "exit",  "functionName": "f", "depth": 0}
    ]"#;
    let forest = build_forest(&decode_trace_text(text).unwrap());

    assert_eq!(forest.roots.len(), 1);
    let f = &forest.roots[0];
    assert_eq!((f.start, f.end), (0.0, 20.0));
    assert_eq!(f.children.len(), 1);
    assert_eq!((f.children[0].start, f.children[0].end), (5.0, 10.0));
}

/// An exit for a function never entered produces no frame
#[test]
fn test_unmatched_exit_closes_at_trace_end() {
    let forest = build_forest(&[TraceEvent::enter("f", 0, 0.0), TraceEvent::exit("h", 0, 5.0)]);

    assert_eq!(forest.len(), 1);
    assert_eq!(forest.roots[0].function_name, "f");
    assert_eq!(forest.roots[0].end, 5.0);
    assert_eq!(forest.stats().never_closed, 1);
}

/// Duration floor drops a short leaf but keeps a long root
#[test]
fn test_duration_floor_threshold() {
    let forest = build_forest(&[
        TraceEvent::enter("root", 0, 0.0),
        TraceEvent::enter("child", 1, 50.0),
        TraceEvent::exit("child", 1, 55.0),
        TraceEvent::exit("root", 0, 200.0),
    ]);

    let filtered = duration_floor(&forest, 100.0);
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered.roots[0].function_name, "root");

    let via_pipeline = TraceFilter {
        duration_floor_ms: 100.0,
        ..TraceFilter::default()
    }
    .apply(&forest);
    assert_eq!(via_pipeline, filtered);
}

fn arbitrary_events() -> impl Strategy<Value = Vec<TraceEvent>> {
    let names = prop_oneof![Just("a"), Just("b"), Just("c")];
    proptest::collection::vec((any::<bool>(), names, 0u32..4, 0u32..1_000), 0..60).prop_map(
        |raw| {
            raw.into_iter()
                .map(|(is_enter, name, depth, t)| {
                    if is_enter {
                        TraceEvent::enter(name, depth, t as f64)
                    } else {
                        TraceEvent::exit(name, depth, t as f64)
                    }
                })
                .collect()
        },
    )
}

proptest! {
    /// Every enter produces exactly one frame and every frame ends up closed
    #[test]
    fn prop_one_frame_per_enter(events in arbitrary_events()) {
        let forest = build_forest(&events);
        let enters = events.iter().filter(|e| e.phase == Phase::Enter).count();
        prop_assert_eq!(forest.len(), enters);

        let max_ts = events.iter().map(|e| e.timestamp).fold(f64::MIN, f64::max);
        for frame in forest.frames() {
            prop_assert!(frame.end.is_finite());
            if !frame.closed {
                prop_assert_eq!(frame.end, max_ts);
            }
        }
    }

    /// Filters never mutate their input and never invent frames
    #[test]
    fn prop_filters_only_remove(events in arbitrary_events(), threshold in 0.0f64..500.0) {
        let forest = build_forest(&events);
        let before = forest.clone();
        let filtered = duration_floor(&forest, threshold);

        prop_assert_eq!(&forest, &before);
        prop_assert!(filtered.len() <= forest.len());
        for frame in filtered.frames() {
            prop_assert!(forest.find(frame.id).is_some());
        }
    }
}
