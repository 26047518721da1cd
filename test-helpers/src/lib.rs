//! Common helper functions for tests and benchmarks.
use clap::Parser;
use key_overlay::cli::Args;
use key_overlay::config::Config;
use key_overlay::event::Transition;
use key_overlay::logger::{EventInfo, ParseErrorInfo};
use key_overlay::render::{Renderer, SegmentHandle, SlotHandle, Surface};
use std::collections::HashMap;

// --- Constants ---
pub const MS: u64 = 1_000;
pub const SECOND: u64 = 1_000_000;

// --- Frame Helpers ---

/// Transition-format frame text: `["key", down]` or `["key", down, index]`.
pub fn transition(key: &str, down: bool, index: Option<u32>) -> String {
    match index {
        Some(i) => serde_json::json!([key, down, i]).to_string(),
        None => serde_json::json!([key, down]).to_string(),
    }
}

/// Snapshot-format frame text listing the held keys.
pub fn snapshot(keys: &[&str]) -> String {
    serde_json::json!(keys).to_string()
}

// --- Recording Renderer ---

/// Renderer that keeps every call it receives for later assertions.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    /// `(key, label)` per slot, in creation order.
    pub slots: Vec<(String, String)>,
    pub counters: Vec<(SlotHandle, u64)>,
    pub rates: Vec<u32>,
    pub held: Vec<(SlotHandle, bool)>,
    pub removed: Vec<SegmentHandle>,
    /// Live segments and their last `(length, offset)`.
    pub geometry: HashMap<SegmentHandle, (f64, f64)>,
    pub surface: Surface,
    next_segment: u64,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_extent(extent: f64) -> Self {
        Self {
            surface: Surface::new(extent),
            ..Self::default()
        }
    }

    pub fn slot_of(&self, key: &str) -> Option<SlotHandle> {
        self.slots
            .iter()
            .position(|(k, _)| k == key)
            .map(|i| SlotHandle(i as u32))
    }

    /// Last counter value pushed for `key`.
    pub fn counter(&self, key: &str) -> Option<u64> {
        let slot = self.slot_of(key)?;
        self.counters
            .iter()
            .rev()
            .find(|(s, _)| *s == slot)
            .map(|(_, v)| *v)
    }

    pub fn last_rate(&self) -> Option<u32> {
        self.rates.last().copied()
    }

    pub fn live_segments(&self) -> usize {
        self.geometry.len()
    }
}

impl Renderer for RecordingRenderer {
    fn create_visual_slot(&mut self, key: &str, label: &str) -> SlotHandle {
        self.slots.push((key.to_string(), label.to_string()));
        SlotHandle(self.slots.len() as u32 - 1)
    }

    fn create_segment(&mut self, _slot: SlotHandle) -> SegmentHandle {
        let segment = SegmentHandle(self.next_segment);
        self.next_segment += 1;
        self.geometry.insert(segment, (0.0, 0.0));
        segment
    }

    fn set_segment_geometry(&mut self, segment: SegmentHandle, length: f64, offset: f64) {
        self.geometry.insert(segment, (length, offset));
    }

    fn remove_segment(&mut self, segment: SegmentHandle) {
        self.geometry.remove(&segment);
        self.removed.push(segment);
    }

    fn is_still_visible(&self, segment: SegmentHandle) -> bool {
        self.geometry
            .get(&segment)
            .is_some_and(|(_, offset)| self.surface.contains(*offset))
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

// --- EventInfo Creation Helpers ---

pub fn down_info(key: &str, press_count: u64, event_us: u64) -> EventInfo {
    EventInfo {
        key: key.to_string(),
        transition: Transition::Down,
        press_count,
        event_us,
        held_for_us: None,
    }
}

pub fn up_info(key: &str, press_count: u64, event_us: u64, held_for_us: u64) -> EventInfo {
    EventInfo {
        key: key.to_string(),
        transition: Transition::Up,
        press_count,
        event_us,
        held_for_us: Some(held_for_us),
    }
}

pub fn parse_error_info(at_us: u64, usage_error: bool) -> ParseErrorInfo {
    ParseErrorInfo {
        at_us,
        usage_error,
        message: "bad frame".to_string(),
    }
}

// --- Config Creation Helper ---

/// Config resolved from command-line style arguments, `--stdin` implied.
pub fn config_from(extra: &[&str]) -> Config {
    let mut argv = vec!["key-overlay", "--stdin"];
    argv.extend_from_slice(extra);
    let args = Args::try_parse_from(argv).expect("test arguments should parse");
    Config::try_from(&args).expect("test arguments should be valid")
}
