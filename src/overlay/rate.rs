//! Sliding-window input rate.

use crate::util::duration_us;
use std::collections::VecDeque;
use std::time::Duration;

/// Events that make up one beat. Presses are counted as sixteenth notes, so
/// four presses are one beat.
pub const DEFAULT_EVENTS_PER_BEAT: f64 = 4.0;

/// Beats per minute for `count` events seen over `window`, rounded up.
///
/// A zero-width window or a non-positive divisor reports 0.
pub fn rate_for(count: usize, window: Duration, events_per_beat: f64) -> u32 {
    let secs = window.as_secs_f64();
    if secs <= 0.0 || events_per_beat <= 0.0 {
        return 0;
    }
    let per_minute = ((count as f64 / secs) / events_per_beat) * 60.0;
    // `as` saturates for out-of-range floats.
    per_minute.ceil() as u32
}

/// Timestamps (µs) of recent events plus the last value pushed to the display.
#[derive(Debug, Clone)]
pub struct RateWindow {
    timestamps: VecDeque<u64>,
    window: Duration,
    events_per_beat: f64,
    last_emitted: u32,
}

impl RateWindow {
    #[must_use]
    pub fn new(window: Duration, events_per_beat: f64) -> Self {
        Self {
            timestamps: VecDeque::new(),
            window,
            events_per_beat,
            last_emitted: 0,
        }
    }

    pub fn on_event(&mut self, ts_us: u64) {
        self.timestamps.push_back(ts_us);
    }

    /// Evicts timestamps older than the window and recomputes the rate.
    ///
    /// Returns `Some(rate)` only when the value differs from the last one
    /// emitted.
    pub fn tick(&mut self, now_us: u64) -> Option<u32> {
        let window_us = duration_us(self.window);
        while let Some(&oldest) = self.timestamps.front() {
            if now_us.saturating_sub(oldest) > window_us {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }

        let rate = rate_for(self.timestamps.len(), self.window, self.events_per_beat);
        if rate == self.last_emitted {
            return None;
        }
        self.last_emitted = rate;
        Some(rate)
    }

    /// Forgets every timestamp. The returned 0 must be emitted even if the
    /// display already shows 0.
    pub fn reset(&mut self) -> u32 {
        self.timestamps.clear();
        self.last_emitted = 0;
        0
    }

    /// Last value handed to the display.
    pub fn current(&self) -> u32 {
        self.last_emitted
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}
