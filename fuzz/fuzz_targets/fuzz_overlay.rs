#![no_main]

use arbitrary::Arbitrary;
use key_overlay::event::{KeyEvent, Normalized};
use key_overlay::overlay::{Overlay, OverlaySettings};
use key_overlay::render::{Renderer, SegmentHandle, SlotHandle, Surface};
use libfuzzer_sys::fuzz_target;
use std::collections::HashMap;
use std::time::Duration;

const MAX_OPS: usize = 1000;

#[derive(Debug, Arbitrary)]
enum Op {
    Down(u8),
    Up(u8),
    Reset,
    Tick(u16),
    Pause,
    Resume,
}

#[derive(Default)]
struct Sink {
    slots: u32,
    next: u64,
    offsets: HashMap<SegmentHandle, f64>,
    surface: Surface,
}

impl Renderer for Sink {
    fn create_visual_slot(&mut self, _key: &str, _label: &str) -> SlotHandle {
        self.slots += 1;
        SlotHandle(self.slots - 1)
    }
    fn create_segment(&mut self, _slot: SlotHandle) -> SegmentHandle {
        self.next += 1;
        self.offsets.insert(SegmentHandle(self.next), 0.0);
        SegmentHandle(self.next)
    }
    fn set_segment_geometry(&mut self, segment: SegmentHandle, length: f64, offset: f64) {
        assert!(length >= 0.0 && offset >= 0.0);
        self.offsets.insert(segment, offset);
    }
    fn remove_segment(&mut self, segment: SegmentHandle) {
        assert!(self.offsets.remove(&segment).is_some(), "segment removed twice");
    }
    fn is_still_visible(&self, segment: SegmentHandle) -> bool {
        self.offsets.get(&segment).is_some_and(|o| self.surface.contains(*o))
    }
    fn set_held(&mut self, _slot: SlotHandle, _held: bool) {}
    fn update_counter(&mut self, _slot: SlotHandle, _value: u64) {}
    fn update_rate_display(&mut self, _value: u32) {}
}

fuzz_target!(|ops: Vec<Op>| {
    let mut overlay = Overlay::new(OverlaySettings {
        rate_window: Some(Duration::from_millis(500)),
        ..OverlaySettings::default()
    });
    let mut sink = Sink::default();
    let mut now = 0u64;
    let mut downs: HashMap<String, u64> = HashMap::new();

    for op in ops.into_iter().take(MAX_OPS) {
        match op {
            Op::Down(k) => {
                let key = format!("k{}", k % 8);
                *downs.entry(key.clone()).or_default() += 1;
                overlay.apply_event(KeyEvent::down(key), now, &mut sink);
            }
            Op::Up(k) => {
                overlay.apply_event(KeyEvent::up(format!("k{}", k % 8)), now, &mut sink);
            }
            Op::Reset => {
                overlay.apply(Normalized::Reset, now, &mut sink);
                downs.values_mut().for_each(|d| *d = 0);
            }
            Op::Tick(ms) => {
                now += u64::from(ms) * 1_000;
                overlay.tick(now, &mut sink);
            }
            Op::Pause => overlay.pause(),
            Op::Resume => overlay.resume(now),
        }
    }

    for (key, count) in downs {
        assert_eq!(overlay.registry().get(&key).map(|k| k.press_count), Some(count));
    }
    assert_eq!(overlay.live_intervals(), sink.offsets.len());
});
