//! Property-based tests for the overlay engine using proptest.

use key_overlay::event::{Frame, KeyEvent, Normalized, Normalizer, Transition, WireFormat};
use key_overlay::overlay::history::KeyHistory;
use key_overlay::overlay::rate::{rate_for, RateWindow};
use key_overlay::overlay::{Overlay, OverlaySettings};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::time::Duration;

use test_helpers::*;

// --- Test Constants ---
const KEYS: [&str; 6] = ["A", "B", "C", "D", "Z", "X"];
const MAX_EVENTS: usize = 200;
const EXTENT: f64 = 1000.0;

fn arb_snapshot() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(KEYS.to_vec(), 0..=KEYS.len()).prop_shuffle()
}

/// Sorted timestamps (µs) with gaps up to 400ms.
fn arb_timestamps() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..400_000, 0..MAX_EVENTS).prop_map(|gaps| {
        let mut now = 0;
        gaps.into_iter()
            .map(|gap| {
                now += gap;
                now
            })
            .collect()
    })
}

fn events(normalized: Normalized) -> Vec<KeyEvent> {
    match normalized {
        Normalized::Events(events) => events,
        Normalized::Reset => panic!("unexpected reset"),
    }
}

// --- Properties ---

proptest! {
    /// Press count equals the number of downs, whatever the ups in between.
    #[test]
    fn prop_press_count_equals_downs(transitions in prop::collection::vec(any::<bool>(), 0..MAX_EVENTS)) {
        let mut overlay = Overlay::new(OverlaySettings::default());
        let mut renderer = RecordingRenderer::new();
        for (i, down) in transitions.iter().enumerate() {
            let event = if *down { KeyEvent::down("Z") } else { KeyEvent::up("Z") };
            overlay.apply_event(event, i as u64 * MS, &mut renderer);
        }
        let downs = transitions.iter().filter(|d| **d).count() as u64;
        let count = overlay.registry().get("Z").map_or(0, |k| k.press_count);
        prop_assert_eq!(count, downs);
    }

    /// Snapshot diffs produce exactly the set differences.
    #[test]
    fn prop_snapshot_diff_is_set_difference(s0 in arb_snapshot(), s1 in arb_snapshot()) {
        let mut normalizer = Normalizer::new(WireFormat::Snapshot);
        normalizer.normalize(Frame::Text(&snapshot(&s0))).unwrap();
        let produced = events(normalizer.normalize(Frame::Text(&snapshot(&s1))).unwrap());

        let before: BTreeSet<&str> = s0.iter().copied().collect();
        let after: BTreeSet<&str> = s1.iter().copied().collect();
        let downs: BTreeSet<&str> = produced
            .iter()
            .filter(|e| e.transition == Transition::Down)
            .map(|e| e.key.as_str())
            .collect();
        let ups: BTreeSet<&str> = produced
            .iter()
            .filter(|e| e.transition == Transition::Up)
            .map(|e| e.key.as_str())
            .collect();

        prop_assert_eq!(&downs, &after.difference(&before).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(&ups, &before.difference(&after).copied().collect::<BTreeSet<_>>());
        prop_assert_eq!(produced.len(), downs.len() + ups.len());
    }

    /// A held interval keeps its trailing edge at 0 while the leading edge grows.
    #[test]
    fn prop_held_interval_pinned(distances in prop::collection::vec(0.0f64..100.0, 1..100)) {
        let mut history = KeyHistory::default();
        history.on_down(None);
        let mut last_start = 0.0;
        for d in distances {
            history.advance_detached(d, EXTENT);
            let interval = history.back().unwrap();
            prop_assert_eq!(interval.end, 0.0);
            prop_assert!(interval.start >= last_start);
            last_start = interval.start;
        }
    }

    /// After release the trailing edge only moves forward and the visible
    /// part shrinks to nothing at a constant tick rate.
    #[test]
    fn prop_released_interval_scrolls_away(
        held_ticks in 0usize..50,
        // whole pixels keep the float sums exact
        distance in (1u32..50).prop_map(f64::from),
    ) {
        let mut history = KeyHistory::default();
        history.on_down(None);
        for _ in 0..held_ticks {
            history.advance_detached(distance, f64::INFINITY);
        }
        history.on_up();

        let mut last_end = history.back().unwrap().end;
        let mut last_visible = history.back().unwrap().visible_length(EXTENT);
        let mut steps = 0;
        while last_visible > 0.0 {
            history.advance_detached(distance, f64::INFINITY);
            let interval = history.back().unwrap();
            prop_assert!(interval.end >= last_end);
            let visible = interval.visible_length(EXTENT);
            prop_assert!(visible <= last_visible);
            last_end = interval.end;
            last_visible = visible;
            steps += 1;
            prop_assert!(steps < 10_000, "interval never left the surface");
        }
    }

    /// Ticking evicts exactly the timestamps older than the window.
    #[test]
    fn prop_rate_window_eviction(stamps in arb_timestamps(), extra in 0u64..2_000_000) {
        let window = Duration::from_secs(1);
        let mut rate = RateWindow::new(window, 4.0);
        for ts in &stamps {
            rate.on_event(*ts);
        }
        let now = stamps.last().copied().unwrap_or(0) + extra;
        rate.tick(now);
        let kept = stamps.iter().filter(|ts| now - **ts <= 1_000_000).count();
        prop_assert_eq!(rate.len(), kept);
        prop_assert_eq!(rate.current(), rate_for(kept, window, 4.0));
    }

    /// Repeating a tick with an unchanged value emits nothing.
    #[test]
    fn prop_rate_emits_only_changes(stamps in arb_timestamps()) {
        let mut rate = RateWindow::new(Duration::from_secs(1), 4.0);
        let mut last = 0;
        for ts in stamps {
            rate.on_event(ts);
            match rate.tick(ts) {
                Some(value) => {
                    prop_assert_ne!(value, last);
                    last = value;
                }
                None => prop_assert_eq!(rate.current(), last),
            }
            prop_assert_eq!(rate.tick(ts), None);
        }
    }
}

#[test]
fn reset_emits_zero_even_when_already_zero() {
    let mut overlay = Overlay::new(OverlaySettings::default());
    let mut renderer = RecordingRenderer::new();
    overlay.apply_event(KeyEvent::down("Z"), 0, &mut renderer);
    overlay.apply(Normalized::Reset, MS, &mut renderer);
    overlay.apply(Normalized::Reset, 2 * MS, &mut renderer);
    assert_eq!(renderer.rates, [0, 0]);
    assert_eq!(overlay.registry().get("Z").unwrap().press_count, 0);
}

#[test]
fn snapshot_stream_end_to_end() {
    let mut overlay = Overlay::new(OverlaySettings {
        rate_window: Some(Duration::from_secs(1)),
        history_pixels_per_second: 1000.0,
        ..OverlaySettings::default()
    });
    let mut normalizer = Normalizer::new(WireFormat::Snapshot);
    let mut renderer = RecordingRenderer::new();

    let mut seen = Vec::new();
    let frames: [&[&str]; 4] = [&["A"], &["A", "B"], &["B"], &[]];
    for (i, frame) in frames.into_iter().enumerate() {
        let text = snapshot(frame);
        let produced = events(normalizer.normalize(Frame::Text(&text)).unwrap());
        for e in &produced {
            seen.push((e.key.clone(), e.transition));
        }
        overlay.apply(Normalized::Events(produced), i as u64 * 10 * MS, &mut renderer);
    }

    assert_eq!(
        seen,
        [
            ("A".to_string(), Transition::Down),
            ("B".to_string(), Transition::Down),
            ("A".to_string(), Transition::Up),
            ("B".to_string(), Transition::Up),
        ]
    );
    let ids: Vec<&str> = overlay.registry().iter().map(|k| k.id.as_str()).collect();
    assert_eq!(ids, ["A", "B"]);
    assert!(overlay.registry().iter().all(|k| k.press_count == 1 && !k.held));
}
