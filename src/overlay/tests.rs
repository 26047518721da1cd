//! Unit tests for the Overlay engine.

use super::*;
use crate::event::WireFormat;
use crate::render::{SegmentHandle, SlotHandle, Surface};

// --- Test Helpers ---

const MS: u64 = 1_000;

/// Renderer that records counters, rate emissions and live segments.
#[derive(Default)]
struct Recorder {
    slots: Vec<String>,
    next_segment: u64,
    offsets: HashMap<SegmentHandle, f64>,
    removed: Vec<SegmentHandle>,
    counters: Vec<(SlotHandle, u64)>,
    rates: Vec<u32>,
    held: Vec<(SlotHandle, bool)>,
    surface: Surface,
}

impl Recorder {
    fn with_extent(extent: f64) -> Self {
        Self {
            surface: Surface::new(extent),
            ..Self::default()
        }
    }
}

impl Renderer for Recorder {
    fn create_visual_slot(&mut self, _key: &str, label: &str) -> SlotHandle {
        self.slots.push(label.to_string());
        SlotHandle(self.slots.len() as u32 - 1)
    }

    fn create_segment(&mut self, _slot: SlotHandle) -> SegmentHandle {
        let seg = SegmentHandle(self.next_segment);
        self.next_segment += 1;
        self.offsets.insert(seg, 0.0);
        seg
    }

    fn set_segment_geometry(&mut self, segment: SegmentHandle, _length: f64, offset: f64) {
        self.offsets.insert(segment, offset);
    }

    fn remove_segment(&mut self, segment: SegmentHandle) {
        self.offsets.remove(&segment);
        self.removed.push(segment);
    }

    fn is_still_visible(&self, segment: SegmentHandle) -> bool {
        self.offsets
            .get(&segment)
            .is_some_and(|o| self.surface.contains(*o))
    }

    fn set_held(&mut self, slot: SlotHandle, held: bool) {
        self.held.push((slot, held));
    }

    fn update_counter(&mut self, slot: SlotHandle, value: u64) {
        self.counters.push((slot, value));
    }

    fn update_rate_display(&mut self, value: u32) {
        self.rates.push(value);
    }
}

fn overlay() -> Overlay {
    Overlay::new(OverlaySettings::default())
}

fn down(o: &mut Overlay, r: &mut Recorder, key: &str, at_ms: u64) -> Option<Applied> {
    o.apply_event(KeyEvent::down(key), at_ms * MS, r)
}

fn up(o: &mut Overlay, r: &mut Recorder, key: &str, at_ms: u64) -> Option<Applied> {
    o.apply_event(KeyEvent::up(key), at_ms * MS, r)
}

fn interval(o: &Overlay, key: &str) -> (f64, f64, bool) {
    let i = o.registry().get(key).unwrap().history.back().unwrap();
    (i.start, i.end, i.pressed)
}

// --- Registry / counters ---

#[test]
fn down_registers_and_counts() {
    let mut o = overlay();
    let mut r = Recorder::default();
    let applied = down(&mut o, &mut r, "Z", 0).unwrap();
    assert_eq!(applied.press_count, 1);
    assert_eq!(r.slots, ["Z"]);
    assert_eq!(r.counters, [(SlotHandle(0), 1)]);
    assert!(o.registry().get("Z").unwrap().held);
}

#[test]
fn up_for_unknown_key_is_silent() {
    let mut o = overlay();
    let mut r = Recorder::default();
    assert!(up(&mut o, &mut r, "Q", 0).is_none());
    assert!(o.registry().is_empty());
    assert!(r.slots.is_empty());
}

#[test]
fn labels_override_slot_text() {
    let mut settings = OverlaySettings::default();
    settings.labels.insert("I".into(), "Z".into());
    let mut o = Overlay::new(settings);
    let mut r = Recorder::default();
    down(&mut o, &mut r, "I", 0);
    down(&mut o, &mut r, "P", 0);
    assert_eq!(r.slots, ["Z", "P"]);
    assert!(o.registry().contains("I"));
}

#[test]
fn counter_animation_off_still_counts() {
    let settings = OverlaySettings {
        counter_animation: false,
        ..OverlaySettings::default()
    };
    let mut o = Overlay::new(settings);
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    up(&mut o, &mut r, "Z", 10);
    down(&mut o, &mut r, "Z", 20);
    assert!(r.counters.is_empty());
    assert_eq!(o.registry().get("Z").unwrap().press_count, 2);
}

#[test]
fn release_reports_hold_duration() {
    let mut o = overlay();
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 100);
    let applied = up(&mut o, &mut r, "Z", 180).unwrap();
    assert_eq!(applied.held_for_us, Some(80 * MS));
    // second release carries no duration
    assert_eq!(up(&mut o, &mut r, "Z", 200).unwrap().held_for_us, None);
    assert_eq!(r.held, [(SlotHandle(0), true), (SlotHandle(0), false), (SlotHandle(0), false)]);
}

#[test]
fn slot_index_kept_from_first_down() {
    let mut o = overlay();
    let mut r = Recorder::default();
    o.apply_event(KeyEvent::down("X").with_slot(1), 0, &mut r);
    o.apply_event(KeyEvent::down("Z").with_slot(0), 0, &mut r);
    o.apply_event(KeyEvent::down("X").with_slot(7), 0, &mut r);
    let order: Vec<&str> = o
        .registry()
        .display_order()
        .iter()
        .map(|k| k.id.as_str())
        .collect();
    assert_eq!(order, ["Z", "X"]);
}

// --- History ---

#[test]
fn held_bar_grows_then_scrolls() {
    let mut o = overlay();
    let mut r = Recorder::default();
    o.tick(0, &mut r);
    down(&mut o, &mut r, "Z", 0);
    o.tick(100 * MS, &mut r);
    assert_eq!(interval(&o, "Z"), (100.0, 0.0, true));
    up(&mut o, &mut r, "Z", 100);
    o.tick(150 * MS, &mut r);
    assert_eq!(interval(&o, "Z"), (150.0, 50.0, false));
}

#[test]
fn first_tick_only_sets_reference() {
    let mut o = overlay();
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    o.tick(500 * MS, &mut r);
    assert_eq!(interval(&o, "Z").0, 0.0);
    o.tick(510 * MS, &mut r);
    assert_eq!(interval(&o, "Z").0, 10.0);
}

#[test]
fn intervals_pruned_when_off_surface() {
    let mut o = overlay();
    let mut r = Recorder::with_extent(100.0);
    o.tick(0, &mut r);
    down(&mut o, &mut r, "Z", 0);
    up(&mut o, &mut r, "Z", 0);
    down(&mut o, &mut r, "X", 0);
    o.tick(99 * MS, &mut r);
    assert_eq!(o.live_intervals(), 2);
    o.tick(100 * MS, &mut r);
    // Z's released bar reached the edge; X is still held at the anchor.
    assert_eq!(o.live_intervals(), 1);
    assert_eq!(r.removed, [SegmentHandle(0)]);
    assert!(o.registry().get("Z").unwrap().history.is_empty());
}

#[test]
fn pruning_middle_interval_keeps_neighbours() {
    let mut o = overlay();
    let mut r = Recorder::with_extent(100.0);
    o.tick(0, &mut r);
    down(&mut o, &mut r, "Z", 0);
    up(&mut o, &mut r, "Z", 0);
    o.tick(60 * MS, &mut r);
    down(&mut o, &mut r, "Z", 60);
    up(&mut o, &mut r, "Z", 60);
    o.tick(120 * MS, &mut r);
    // first interval at offset 120 is gone, second at 60 survives
    let offsets: Vec<f64> = o
        .registry()
        .get("Z")
        .unwrap()
        .history
        .iter()
        .map(|i| i.offset())
        .collect();
    assert_eq!(offsets, [60.0]);
    assert_eq!(r.removed, [SegmentHandle(0)]);
}

#[test]
fn repeated_down_releases_dangling_interval() {
    let mut o = overlay();
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    down(&mut o, &mut r, "Z", 5);
    let pressed: Vec<bool> = o
        .registry()
        .get("Z")
        .unwrap()
        .history
        .iter()
        .map(|i| i.pressed)
        .collect();
    assert_eq!(pressed, [false, true]);
    assert_eq!(o.registry().get("Z").unwrap().press_count, 2);
}

#[test]
fn history_disabled_creates_no_segments() {
    let settings = OverlaySettings {
        show_history: false,
        ..OverlaySettings::default()
    };
    let mut o = Overlay::new(settings);
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    o.tick(0, &mut r);
    o.tick(10 * MS, &mut r);
    assert_eq!(o.live_intervals(), 0);
    assert_eq!(r.next_segment, 0);
}

#[test]
fn pause_freezes_geometry() {
    let mut o = overlay();
    let mut r = Recorder::default();
    o.tick(0, &mut r);
    down(&mut o, &mut r, "Z", 0);
    o.tick(10 * MS, &mut r);
    o.pause();
    o.tick(500 * MS, &mut r);
    assert_eq!(interval(&o, "Z").0, 10.0);
    o.resume(500 * MS);
    assert!(!o.is_paused());
    o.tick(520 * MS, &mut r);
    assert_eq!(interval(&o, "Z").0, 30.0);
}

// --- Rate ---

#[test]
fn downs_feed_rate_window() {
    let mut o = overlay();
    let mut r = Recorder::default();
    for t in [0, 100, 200, 300, 400, 500, 600, 700] {
        down(&mut o, &mut r, "Z", t);
        up(&mut o, &mut r, "Z", t + 20);
    }
    o.tick(800 * MS, &mut r);
    assert_eq!(r.rates, [120]);
    o.tick(810 * MS, &mut r);
    assert_eq!(r.rates, [120]);
    assert_eq!(o.rate().unwrap().len(), 8);
}

#[test]
fn rate_disabled() {
    let settings = OverlaySettings {
        rate_window: None,
        ..OverlaySettings::default()
    };
    let mut o = Overlay::new(settings);
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    o.tick(10 * MS, &mut r);
    o.reset(&mut r);
    assert!(r.rates.is_empty());
    assert!(o.rate().is_none());
}

// --- Reset ---

#[test]
fn reset_zeroes_counters_and_forces_rate() {
    let mut o = overlay();
    let mut r = Recorder::default();
    down(&mut o, &mut r, "Z", 0);
    down(&mut o, &mut r, "X", 0);
    r.counters.clear();
    o.reset(&mut r);
    assert!(o.registry().iter().all(|k| k.press_count == 0));
    assert_eq!(r.counters, [(SlotHandle(0), 0), (SlotHandle(1), 0)]);
    assert_eq!(r.rates, [0]);
    // the display already shows 0; reset still emits
    o.reset(&mut r);
    assert_eq!(r.rates, [0, 0]);
    // history is untouched by reset
    assert_eq!(o.live_intervals(), 2);
}

// --- Frames ---

#[test]
fn snapshot_stream_end_to_end() {
    let mut o = overlay();
    let mut r = Recorder::default();
    let mut n = Normalizer::new(WireFormat::Snapshot);

    let mut seen = Vec::new();
    for (i, frame) in [r#"["A"]"#, r#"["A","B"]"#, r#"["B"]"#, "[]"].iter().enumerate() {
        let outcome = o
            .handle_frame(&mut n, Frame::Text(frame), i as u64 * 10 * MS, &mut r)
            .unwrap();
        let FrameOutcome::Applied(applied) = outcome else {
            panic!("unexpected reset");
        };
        seen.extend(applied.into_iter().map(|a| (a.key, a.transition)));
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
    let counts: Vec<(&str, u64)> = o
        .registry()
        .iter()
        .map(|k| (k.id.as_str(), k.press_count))
        .collect();
    assert_eq!(counts, [("A", 1), ("B", 1)]);
}

#[test]
fn bad_frame_leaves_state_untouched() {
    let mut o = overlay();
    let mut r = Recorder::default();
    let mut n = Normalizer::new(WireFormat::Transition);
    o.handle_frame(&mut n, Frame::Text(r#"["Z", true]"#), 0, &mut r)
        .unwrap();
    assert!(o
        .handle_frame(&mut n, Frame::Text(r#"["Z", "yes"]"#), 0, &mut r)
        .is_err());
    assert!(o
        .handle_frame(&mut n, Frame::Binary(b"\x00"), 0, &mut r)
        .is_err());
    assert_eq!(o.registry().len(), 1);
    assert_eq!(o.registry().get("Z").unwrap().press_count, 1);
    assert_eq!(
        o.handle_frame(&mut n, Frame::Text("reset"), 0, &mut r).unwrap(),
        FrameOutcome::Reset
    );
}
