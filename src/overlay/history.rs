//! Scrolling press history for one key.
//!
//! Each press opens an interval whose leading edge (`start`) advances with
//! wall-clock time for as long as the interval lives. While the key is held
//! the trailing edge (`end`) stays pinned at zero, so the bar grows; after
//! release the trailing edge advances at the same speed and the bar scrolls
//! away from the key box until the renderer reports it off-surface.

use crate::render::{Renderer, SegmentHandle, SlotHandle};
use std::collections::VecDeque;

/// One press-to-release-and-scroll cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryInterval {
    pub start: f64,
    pub end: f64,
    /// Cleared exactly once, on release. Never set again.
    pub pressed: bool,
    pub segment: Option<SegmentHandle>,
}

impl HistoryInterval {
    fn new(segment: Option<SegmentHandle>) -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            pressed: true,
            segment,
        }
    }

    /// Length of the bar. A negative extent renders as empty.
    #[inline]
    pub fn length(&self) -> f64 {
        (self.start - self.end).max(0.0)
    }

    /// Distance of the bar's trailing edge from the anchor.
    #[inline]
    pub fn offset(&self) -> f64 {
        self.end
    }

    /// Part of `[end, start]` that still lies inside `[0, extent]`.
    pub fn visible_length(&self, extent: f64) -> f64 {
        let top = self.start.min(extent);
        let bottom = self.end.min(extent);
        (top - bottom).max(0.0)
    }

    /// Moves both edges by `distance`.
    fn advance(&mut self, distance: f64) {
        self.start += distance;
        if self.pressed {
            self.end = 0.0;
        } else {
            self.end += distance;
        }
    }
}

/// Oldest-to-newest intervals: popped from the back on release, pruned from
/// anywhere on tick.
#[derive(Debug, Clone, Default)]
pub struct KeyHistory {
    intervals: VecDeque<HistoryInterval>,
}

impl KeyHistory {
    /// Opens a new pressed interval.
    pub fn on_down(&mut self, segment: Option<SegmentHandle>) {
        self.intervals.push_back(HistoryInterval::new(segment));
    }

    /// Releases the newest interval. Returns `false` when there was none.
    pub fn on_up(&mut self) -> bool {
        match self.intervals.back_mut() {
            Some(interval) => {
                interval.pressed = false;
                true
            }
            None => false,
        }
    }

    /// Whether the newest interval is still pressed.
    pub fn is_open(&self) -> bool {
        self.intervals.back().is_some_and(|i| i.pressed)
    }

    /// Advances every interval by `distance`, pushes the new geometry to the
    /// renderer and drops intervals the renderer no longer shows.
    ///
    /// Returns the number of intervals removed.
    pub fn tick<R: Renderer + ?Sized>(&mut self, distance: f64, renderer: &mut R) -> usize {
        let before = self.intervals.len();
        self.intervals.retain_mut(|interval| {
            interval.advance(distance);
            let Some(segment) = interval.segment else {
                return true;
            };
            renderer.set_segment_geometry(segment, interval.length(), interval.offset());
            if renderer.is_still_visible(segment) {
                true
            } else {
                renderer.remove_segment(segment);
                false
            }
        });
        before - self.intervals.len()
    }

    /// Advances intervals without a renderer. Released intervals past
    /// `extent` are dropped.
    pub fn advance_detached(&mut self, distance: f64, extent: f64) -> usize {
        let before = self.intervals.len();
        self.intervals.retain_mut(|interval| {
            interval.advance(distance);
            interval.pressed || interval.offset() < extent
        });
        before - self.intervals.len()
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryInterval> {
        self.intervals.iter()
    }

    pub fn back(&self) -> Option<&HistoryInterval> {
        self.intervals.back()
    }

    /// Segment handles still owned by this history.
    pub fn segments(&self) -> impl Iterator<Item = SegmentHandle> + '_ {
        self.intervals.iter().filter_map(|i| i.segment)
    }
}

/// Opens a segment for a new interval when the key has a slot.
pub(crate) fn open_segment<R: Renderer + ?Sized>(
    renderer: &mut R,
    slot: Option<SlotHandle>,
) -> Option<SegmentHandle> {
    slot.map(|slot| renderer.create_segment(slot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_interval_grows_with_pinned_end() {
        let mut h = KeyHistory::default();
        h.on_down(None);
        for _ in 0..10 {
            h.advance_detached(5.0, 1000.0);
            assert_eq!(h.back().unwrap().end, 0.0);
        }
        assert_eq!(h.back().unwrap().start, 50.0);
        assert_eq!(h.back().unwrap().length(), 50.0);
    }

    #[test]
    fn released_interval_keeps_length_and_scrolls() {
        let mut h = KeyHistory::default();
        h.on_down(None);
        h.advance_detached(30.0, 1000.0);
        assert!(h.on_up());
        h.advance_detached(10.0, 1000.0);
        let i = h.back().unwrap();
        assert_eq!((i.start, i.end), (40.0, 10.0));
        assert_eq!(i.length(), 30.0);
        assert_eq!(i.offset(), 10.0);
    }

    #[test]
    fn up_without_down_is_noop() {
        let mut h = KeyHistory::default();
        assert!(!h.on_up());
        assert!(h.is_empty());
    }

    #[test]
    fn up_releases_only_newest() {
        let mut h = KeyHistory::default();
        h.on_down(None);
        h.on_down(None);
        h.on_up();
        let pressed: Vec<bool> = h.iter().map(|i| i.pressed).collect();
        assert_eq!(pressed, [true, false]);
    }

    #[test]
    fn visible_length_clips_to_extent() {
        let i = HistoryInterval {
            start: 120.0,
            end: 90.0,
            pressed: false,
            segment: None,
        };
        assert_eq!(i.visible_length(100.0), 10.0);
        assert_eq!(i.visible_length(200.0), 30.0);
        let gone = HistoryInterval { end: 101.0, ..i };
        assert_eq!(gone.visible_length(100.0), 0.0);
    }

    #[test]
    fn negative_extent_renders_empty() {
        let i = HistoryInterval {
            start: 1.0,
            end: 2.0,
            pressed: false,
            segment: None,
        };
        assert_eq!(i.length(), 0.0);
    }

    #[test]
    fn detached_prune_keeps_held() {
        let mut h = KeyHistory::default();
        h.on_down(None);
        h.on_up();
        h.on_down(None);
        assert_eq!(h.advance_detached(150.0, 100.0), 1);
        assert_eq!(h.len(), 1);
        assert!(h.is_open());
    }
}
