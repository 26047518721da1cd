// The overlay engine: key registry, press history and rate window, driven by
// normalized stream signals and a periodic tick. Everything here runs on one
// thread; the caller owns the clock and the renderer.

pub mod history;
pub mod rate;
pub mod registry;

#[cfg(test)]
mod tests;

use crate::event::{Frame, KeyEvent, Normalized, Normalizer, ParseError, Transition};
use crate::render::Renderer;
use history::open_segment;
use rate::{RateWindow, DEFAULT_EVENTS_PER_BEAT};
use registry::KeyRegistry;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, trace};

/// Static engine configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub show_history: bool,
    pub history_pixels_per_second: f64,
    /// `None` disables the rate estimator.
    pub rate_window: Option<Duration>,
    pub events_per_beat: f64,
    /// When off, counters are still kept but not pushed to the renderer.
    pub counter_animation: bool,
    /// Key identifier -> label shown in its slot.
    pub labels: HashMap<String, String>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            show_history: true,
            history_pixels_per_second: 1000.0,
            rate_window: Some(Duration::from_secs(1)),
            events_per_beat: DEFAULT_EVENTS_PER_BEAT,
            counter_animation: true,
            labels: HashMap::new(),
        }
    }
}

/// A transition that changed engine state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    pub key: String,
    pub transition: Transition,
    pub press_count: u64,
    /// On release: how long the key was held.
    pub held_for_us: Option<u64>,
}

/// Outcome of one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Reset,
    Applied(Vec<Applied>),
}

#[derive(Debug)]
pub struct Overlay {
    settings: OverlaySettings,
    registry: KeyRegistry,
    rate: Option<RateWindow>,
    last_tick_us: Option<u64>,
    paused: bool,
}

impl Overlay {
    #[must_use]
    pub fn new(settings: OverlaySettings) -> Self {
        let rate = settings
            .rate_window
            .map(|window| RateWindow::new(window, settings.events_per_beat));
        Self {
            settings,
            registry: KeyRegistry::new(),
            rate,
            last_tick_us: None,
            paused: false,
        }
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn registry(&self) -> &KeyRegistry {
        &self.registry
    }

    pub fn rate(&self) -> Option<&RateWindow> {
        self.rate.as_ref()
    }

    /// Decodes a frame and applies it. Parse errors leave the state untouched.
    pub fn handle_frame<R: Renderer + ?Sized>(
        &mut self,
        normalizer: &mut Normalizer,
        frame: Frame<'_>,
        now_us: u64,
        renderer: &mut R,
    ) -> Result<FrameOutcome, ParseError> {
        let normalized = normalizer.normalize(frame)?;
        Ok(self.apply(normalized, now_us, renderer))
    }

    pub fn apply<R: Renderer + ?Sized>(
        &mut self,
        normalized: Normalized,
        now_us: u64,
        renderer: &mut R,
    ) -> FrameOutcome {
        match normalized {
            Normalized::Reset => {
                self.reset(renderer);
                FrameOutcome::Reset
            }
            Normalized::Events(events) => FrameOutcome::Applied(
                events
                    .into_iter()
                    .filter_map(|ev| self.apply_event(ev, now_us, renderer))
                    .collect(),
            ),
        }
    }

    /// Applies one transition. Returns `None` for an Up on a key never seen.
    pub fn apply_event<R: Renderer + ?Sized>(
        &mut self,
        event: KeyEvent,
        now_us: u64,
        renderer: &mut R,
    ) -> Option<Applied> {
        match event.transition {
            Transition::Down => Some(self.on_down(event, now_us, renderer)),
            Transition::Up => self.on_up(&event.key, now_us, renderer),
        }
    }

    fn on_down<R: Renderer + ?Sized>(
        &mut self,
        event: KeyEvent,
        now_us: u64,
        renderer: &mut R,
    ) -> Applied {
        let key = self.registry.resolve(&event.key);
        if key.slot.is_none() {
            if key.slot_index.is_none() {
                key.slot_index = event.slot;
            }
            let label = self
                .settings
                .labels
                .get(&key.id)
                .map_or(key.id.as_str(), String::as_str);
            key.slot = Some(renderer.create_visual_slot(&key.id, label));
            debug!(key = %key.id, slot = ?event.slot, "registered key");
        }

        key.press_count += 1;
        key.held = true;
        key.pressed_at_us = Some(now_us);

        if let Some(slot) = key.slot {
            if self.settings.counter_animation {
                renderer.update_counter(slot, key.press_count);
            }
            renderer.set_held(slot, true);
        }

        if self.settings.show_history {
            // A repeated Down without its Up would otherwise pin the dangling
            // interval to the key box forever.
            if key.history.is_open() {
                key.history.on_up();
            }
            let segment = open_segment(renderer, key.slot);
            key.history.on_down(segment);
        }

        if let Some(rate) = self.rate.as_mut() {
            rate.on_event(now_us);
        }

        Applied {
            key: event.key,
            transition: Transition::Down,
            press_count: key.press_count,
            held_for_us: None,
        }
    }

    fn on_up<R: Renderer + ?Sized>(
        &mut self,
        id: &str,
        now_us: u64,
        renderer: &mut R,
    ) -> Option<Applied> {
        let Some(key) = self.registry.get_mut(id) else {
            trace!(key = id, "release for unknown key ignored");
            return None;
        };

        let held_for_us = if key.held {
            key.pressed_at_us
                .take()
                .map(|at| now_us.saturating_sub(at))
        } else {
            None
        };
        key.held = false;
        key.history.on_up();

        if let Some(slot) = key.slot {
            renderer.set_held(slot, false);
        }

        Some(Applied {
            key: key.id.clone(),
            transition: Transition::Up,
            press_count: key.press_count,
            held_for_us,
        })
    }

    /// Zeroes every counter and forces a rate display of 0.
    pub fn reset<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        self.registry.reset();
        for key in self.registry.iter() {
            if let Some(slot) = key.slot {
                renderer.update_counter(slot, 0);
            }
        }
        if let Some(rate) = self.rate.as_mut() {
            renderer.update_rate_display(rate.reset());
        }
        debug!(keys = self.registry.len(), "counters reset");
    }

    /// Advances history geometry and recomputes the rate.
    ///
    /// The first tick (and the first after [`resume`](Self::resume)) only
    /// records the reference instant. Does nothing while paused.
    pub fn tick<R: Renderer + ?Sized>(&mut self, now_us: u64, renderer: &mut R) {
        if self.paused {
            return;
        }
        let elapsed_us = match self.last_tick_us.replace(now_us) {
            Some(last) => now_us.saturating_sub(last),
            None => 0,
        };

        if self.settings.show_history && elapsed_us > 0 {
            let distance =
                self.settings.history_pixels_per_second * (elapsed_us as f64 / 1_000_000.0);
            let mut pruned = 0;
            for key in self.registry.iter_mut() {
                pruned += key.history.tick(distance, renderer);
            }
            if pruned > 0 {
                trace!(pruned, "history intervals left the surface");
            }
        }

        if let Some(rate) = self.rate.as_mut() {
            if let Some(value) = rate.tick(now_us) {
                renderer.update_rate_display(value);
            }
        }
    }

    /// Freezes geometry and rate at their last computed state.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Restarts ticking. Time spent paused is not replayed.
    pub fn resume(&mut self, now_us: u64) {
        self.paused = false;
        self.last_tick_us = Some(now_us);
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Live history intervals across all keys.
    pub fn live_intervals(&self) -> usize {
        self.registry.iter().map(|k| k.history.len()).sum()
    }
}
