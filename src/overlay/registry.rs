//! Per-key state, created lazily and never removed.

use super::history::KeyHistory;
use crate::render::SlotHandle;
use std::collections::HashMap;

/// Everything the overlay remembers about one key identifier.
#[derive(Debug, Clone, Default)]
pub struct KeyState {
    pub id: String,
    pub press_count: u64,
    pub held: bool,
    /// Display position announced by the stream, if it sent one.
    pub slot_index: Option<u32>,
    /// Timestamp (µs) of the Down that started the current hold.
    pub pressed_at_us: Option<u64>,
    pub history: KeyHistory,
    /// Renderer slot, assigned the first time the key is drawn.
    pub slot: Option<SlotHandle>,
}

impl KeyState {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }
}

/// Insertion-ordered map from key identifier to [`KeyState`].
#[derive(Debug, Default)]
pub struct KeyRegistry {
    keys: Vec<KeyState>,
    index: HashMap<String, usize>,
}

impl KeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the state for `id`, registering a zeroed entry on first sight.
    pub fn resolve(&mut self, id: &str) -> &mut KeyState {
        let pos = match self.index.get(id) {
            Some(&pos) => pos,
            None => {
                let pos = self.keys.len();
                self.keys.push(KeyState::new(id));
                self.index.insert(id.to_string(), pos);
                pos
            }
        };
        &mut self.keys[pos]
    }

    pub fn get(&self, id: &str) -> Option<&KeyState> {
        self.index.get(id).map(|&pos| &self.keys[pos])
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut KeyState> {
        match self.index.get(id) {
            Some(&pos) => Some(&mut self.keys[pos]),
            None => None,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Keys in the order they were first seen.
    pub fn iter(&self) -> impl Iterator<Item = &KeyState> {
        self.keys.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut KeyState> {
        self.keys.iter_mut()
    }

    /// Keys ordered by their announced slot index; keys without one follow,
    /// and ties keep registration order.
    pub fn display_order(&self) -> Vec<&KeyState> {
        let mut ordered: Vec<&KeyState> = self.keys.iter().collect();
        ordered.sort_by_key(|k| k.slot_index.unwrap_or(u32::MAX));
        ordered
    }

    /// Zeroes every press counter. Identity, order and history are kept.
    pub fn reset(&mut self) {
        for key in &mut self.keys {
            key.press_count = 0;
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
