//! Rendering collaborators.
//!
//! The engine never draws anything itself; it calls out to a [`Renderer`]
//! with key slots, history segment geometry, counters and the rate value.
//! Two renderers ship with the binary: newline-delimited JSON for piping
//! into a real overlay, and a one-line terminal status view.

use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

/// Handle for one key's visual slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SlotHandle(pub u32);

/// Handle for one history segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SegmentHandle(pub u64);

pub trait Renderer {
    /// Creates the visual slot for a key seen for the first time.
    fn create_visual_slot(&mut self, key: &str, label: &str) -> SlotHandle;

    /// Creates an empty history segment inside a key's slot.
    fn create_segment(&mut self, slot: SlotHandle) -> SegmentHandle;

    fn set_segment_geometry(&mut self, segment: SegmentHandle, length: f64, offset: f64);

    fn remove_segment(&mut self, segment: SegmentHandle);

    /// Whether the segment's last geometry still intersects the render surface.
    fn is_still_visible(&self, segment: SegmentHandle) -> bool;

    /// Toggles the held fill of a key slot.
    fn set_held(&mut self, slot: SlotHandle, held: bool);

    fn update_counter(&mut self, slot: SlotHandle, value: u64);

    fn update_rate_display(&mut self, value: u32);

    /// Called by the driver after every handler invocation.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Extent of the render surface along the scroll axis.
///
/// A segment anchored at the key box scrolls away from it by `offset`; it is
/// visible for as long as that offset has not reached the far edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub extent: f64,
}

impl Surface {
    pub fn new(extent: f64) -> Self {
        Self { extent }
    }

    #[inline]
    pub fn contains(&self, offset: f64) -> bool {
        offset < self.extent
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

/// Geometry bookkeeping shared by the bundled renderers.
#[derive(Debug, Default)]
struct SegmentTable {
    next_slot: u32,
    next_segment: u64,
    /// segment -> (owning slot, offset)
    segments: HashMap<SegmentHandle, (SlotHandle, f64)>,
}

impl SegmentTable {
    fn new_slot(&mut self) -> SlotHandle {
        let slot = SlotHandle(self.next_slot);
        self.next_slot += 1;
        slot
    }

    fn new_segment(&mut self, slot: SlotHandle) -> SegmentHandle {
        let segment = SegmentHandle(self.next_segment);
        self.next_segment += 1;
        self.segments.insert(segment, (slot, 0.0));
        segment
    }

    fn set_offset(&mut self, segment: SegmentHandle, offset: f64) {
        if let Some(entry) = self.segments.get_mut(&segment) {
            entry.1 = offset;
        }
    }

    fn visible(&self, surface: &Surface, segment: SegmentHandle) -> bool {
        self.segments
            .get(&segment)
            .is_some_and(|(_, offset)| surface.contains(*offset))
    }

    fn live_in(&self, slot: SlotHandle) -> usize {
        self.segments.values().filter(|(s, _)| *s == slot).count()
    }
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
enum Record<'a> {
    Slot {
        slot: SlotHandle,
        key: &'a str,
        label: &'a str,
    },
    Segment {
        segment: SegmentHandle,
        slot: SlotHandle,
    },
    Geometry {
        segment: SegmentHandle,
        length: f64,
        offset: f64,
    },
    Remove {
        segment: SegmentHandle,
    },
    Held {
        slot: SlotHandle,
        held: bool,
    },
    Counter {
        slot: SlotHandle,
        value: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        animate_ms: Option<u64>,
    },
    Rate {
        value: u32,
    },
}

/// Writes one JSON object per renderer call, newline delimited.
pub struct JsonRenderer<W: Write> {
    out: W,
    surface: Surface,
    table: SegmentTable,
    geometry: bool,
    counter_speed: Option<Duration>,
    error: Option<io::Error>,
}

impl<W: Write> JsonRenderer<W> {
    pub fn new(out: W, surface: Surface) -> Self {
        Self {
            out,
            surface,
            table: SegmentTable::default(),
            geometry: true,
            counter_speed: None,
            error: None,
        }
    }

    /// Suppresses the per-tick geometry records.
    pub fn without_geometry(mut self) -> Self {
        self.geometry = false;
        self
    }

    /// Tags counter records with an animation duration for the consumer.
    pub fn with_counter_speed(mut self, speed: Duration) -> Self {
        self.counter_speed = Some(speed);
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, record: &Record<'_>) {
        if self.error.is_some() {
            return;
        }
        let result = serde_json::to_writer(&mut self.out, record)
            .map_err(io::Error::from)
            .and_then(|()| self.out.write_all(b"\n"));
        if let Err(e) = result {
            self.error = Some(e);
        }
    }
}

impl<W: Write> Renderer for JsonRenderer<W> {
    fn create_visual_slot(&mut self, key: &str, label: &str) -> SlotHandle {
        let slot = self.table.new_slot();
        self.emit(&Record::Slot { slot, key, label });
        slot
    }

    fn create_segment(&mut self, slot: SlotHandle) -> SegmentHandle {
        let segment = self.table.new_segment(slot);
        self.emit(&Record::Segment { segment, slot });
        segment
    }

    fn set_segment_geometry(&mut self, segment: SegmentHandle, length: f64, offset: f64) {
        self.table.set_offset(segment, offset);
        if self.geometry {
            self.emit(&Record::Geometry {
                segment,
                length,
                offset,
            });
        }
    }

    fn remove_segment(&mut self, segment: SegmentHandle) {
        self.table.segments.remove(&segment);
        self.emit(&Record::Remove { segment });
    }

    fn is_still_visible(&self, segment: SegmentHandle) -> bool {
        self.table.visible(&self.surface, segment)
    }

    fn set_held(&mut self, slot: SlotHandle, held: bool) {
        self.emit(&Record::Held { slot, held });
    }

    fn update_counter(&mut self, slot: SlotHandle, value: u64) {
        let animate_ms = self
            .counter_speed
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
        self.emit(&Record::Counter {
            slot,
            value,
            animate_ms,
        });
    }

    fn update_rate_display(&mut self, value: u32) {
        self.emit(&Record::Rate { value });
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()
    }
}

struct TextSlot {
    label: String,
    counter: u64,
    held: bool,
}

/// Redraws a single status line whenever something visible changed.
pub struct TextRenderer<W: Write> {
    out: W,
    surface: Surface,
    table: SegmentTable,
    slots: Vec<TextSlot>,
    rate: Option<u32>,
    dirty: bool,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(out: W, surface: Surface) -> Self {
        Self {
            out,
            surface,
            table: SegmentTable::default(),
            slots: Vec::new(),
            rate: None,
            dirty: false,
        }
    }

    /// Current status line, without the carriage return.
    pub fn status_line(&self) -> String {
        let mut line = String::new();
        for (i, slot) in self.slots.iter().enumerate() {
            if !line.is_empty() {
                line.push_str("  ");
            }
            let marker = if slot.held { '*' } else { ' ' };
            let live = self.table.live_in(SlotHandle(i as u32));
            line.push_str(&format!("{}{marker}{} ({live})", slot.label, slot.counter));
        }
        if let Some(rate) = self.rate {
            if !line.is_empty() {
                line.push_str("  |  ");
            }
            line.push_str(&format!("{rate} bpm"));
        }
        line
    }

    fn slot_mut(&mut self, slot: SlotHandle) -> Option<&mut TextSlot> {
        self.slots.get_mut(slot.0 as usize)
    }
}

impl<W: Write> Renderer for TextRenderer<W> {
    fn create_visual_slot(&mut self, _key: &str, label: &str) -> SlotHandle {
        let slot = self.table.new_slot();
        self.slots.push(TextSlot {
            label: label.to_string(),
            counter: 0,
            held: false,
        });
        self.dirty = true;
        slot
    }

    fn create_segment(&mut self, slot: SlotHandle) -> SegmentHandle {
        self.dirty = true;
        self.table.new_segment(slot)
    }

    fn set_segment_geometry(&mut self, segment: SegmentHandle, _length: f64, offset: f64) {
        self.table.set_offset(segment, offset);
    }

    fn remove_segment(&mut self, segment: SegmentHandle) {
        self.table.segments.remove(&segment);
        self.dirty = true;
    }

    fn is_still_visible(&self, segment: SegmentHandle) -> bool {
        self.table.visible(&self.surface, segment)
    }

    fn set_held(&mut self, slot: SlotHandle, held: bool) {
        if let Some(s) = self.slot_mut(slot) {
            s.held = held;
        }
        self.dirty = true;
    }

    fn update_counter(&mut self, slot: SlotHandle, value: u64) {
        if let Some(s) = self.slot_mut(slot) {
            s.counter = value;
        }
        self.dirty = true;
    }

    fn update_rate_display(&mut self, value: u32) {
        self.rate = Some(value);
        self.dirty = true;
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        let line = self.status_line();
        // Clear to end of line so a shorter status does not leave residue.
        write!(self.out, "\r{line}\x1b[K")?;
        self.out.flush()
    }
}
