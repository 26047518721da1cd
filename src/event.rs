//! Wire message decoding.
//!
//! Turns one inbound stream frame into zero or more key transitions, or a
//! reset signal. Two encodings exist across deployments: explicit
//! `[key, isDown, slot?]` transitions, and snapshots of the currently held
//! keys that are diffed against the previous snapshot.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Literal payload that resets every counter.
pub const RESET_TOKEN: &str = "reset";

/// A raw frame as delivered by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// Direction of a key transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    Down,
    Up,
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::Down => f.write_str("down"),
            Transition::Up => f.write_str("up"),
        }
    }
}

/// A single key transition produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: String,
    pub transition: Transition,
    /// Display position sent by the explicit-transition encoding, if any.
    pub slot: Option<u32>,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transition: Transition::Down,
            slot: None,
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            transition: Transition::Up,
            slot: None,
        }
    }

    pub fn with_slot(mut self, slot: u32) -> Self {
        self.slot = Some(slot);
        self
    }
}

/// Result of normalizing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Reset,
    Events(Vec<KeyEvent>),
}

/// Encoding the stream is expected to use. Chosen at deployment time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum WireFormat {
    /// `["Z", true, 0]` or `["Z", false]`: one transition per frame.
    #[default]
    Transition,
    /// `["Z", "X"]`: the full set of held keys, diffed against the last frame.
    Snapshot,
    /// Classify every frame by its shape.
    Auto,
}

/// Errors raised while decoding a frame.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The transport handed over something that is not text.
    #[error("frame is not text ({len} bytes of binary data)")]
    NotText { len: usize },
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected frame shape: expected {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: String,
    },
}

impl ParseError {
    /// Usage errors point at a client bug rather than a bad frame.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, ParseError::NotText { .. })
    }

    fn shape(expected: &'static str, found: &Value) -> Self {
        let mut found = found.to_string();
        if found.len() > 64 {
            let mut cut = 64;
            while !found.is_char_boundary(cut) {
                cut -= 1;
            }
            found.truncate(cut);
            found.push('…');
        }
        ParseError::Shape { expected, found }
    }
}

/// Stateful frame decoder. Owns the last snapshot seen in snapshot mode.
#[derive(Debug, Default)]
pub struct Normalizer {
    format: WireFormat,
    last_snapshot: Vec<String>,
}

impl Normalizer {
    #[must_use]
    pub fn new(format: WireFormat) -> Self {
        Self {
            format,
            last_snapshot: Vec::new(),
        }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Keys held according to the most recent snapshot.
    pub fn last_snapshot(&self) -> &[String] {
        &self.last_snapshot
    }

    /// Decodes one frame.
    ///
    /// The reset token is recognized before any JSON decoding. A frame that
    /// fails to decode leaves the remembered snapshot untouched.
    pub fn normalize(&mut self, frame: Frame<'_>) -> Result<Normalized, ParseError> {
        let text = match frame {
            Frame::Text(text) => text,
            Frame::Binary(bytes) => return Err(ParseError::NotText { len: bytes.len() }),
        };

        if text == RESET_TOKEN {
            return Ok(Normalized::Reset);
        }

        let value: Value = serde_json::from_str(text)?;
        let items = match &value {
            Value::Array(items) => items,
            other => return Err(ParseError::shape("a JSON array", other)),
        };

        let format = match self.format {
            WireFormat::Auto => classify(items),
            format => format,
        };

        match format {
            WireFormat::Snapshot => {
                let snapshot = decode_snapshot(items)?;
                Ok(Normalized::Events(self.diff(snapshot)))
            }
            _ => decode_transition(items).map(|ev| Normalized::Events(vec![ev])),
        }
    }

    /// Replaces the remembered snapshot and returns the transitions between them.
    fn diff(&mut self, current: Vec<String>) -> Vec<KeyEvent> {
        let mut events: Vec<KeyEvent> = current
            .iter()
            .filter(|key| !self.last_snapshot.contains(key))
            .map(|key| KeyEvent::down(key.as_str()))
            .collect();
        events.extend(
            self.last_snapshot
                .iter()
                .filter(|key| !current.contains(key))
                .map(|key| KeyEvent::up(key.as_str())),
        );
        self.last_snapshot = current;
        events
    }
}

fn classify(items: &[Value]) -> WireFormat {
    match items.get(1) {
        Some(Value::Bool(_)) => WireFormat::Transition,
        _ => WireFormat::Snapshot,
    }
}

fn decode_transition(items: &[Value]) -> Result<KeyEvent, ParseError> {
    const EXPECTED: &str = "[key, isDown] or [key, isDown, index]";

    let found = || Value::Array(items.to_vec());
    let (key, down, index) = match items {
        [key, down] => (key, down, None),
        [key, down, index] => (key, down, Some(index)),
        _ => return Err(ParseError::shape(EXPECTED, &found())),
    };

    let (Value::String(key), Value::Bool(down)) = (key, down) else {
        return Err(ParseError::shape(EXPECTED, &found()));
    };

    let slot = match index {
        None => None,
        Some(index) => match index.as_u64().and_then(|i| u32::try_from(i).ok()) {
            Some(slot) => Some(slot),
            None => return Err(ParseError::shape("a non-negative key index", index)),
        },
    };

    let transition = if *down {
        Transition::Down
    } else {
        Transition::Up
    };
    Ok(KeyEvent {
        key: key.clone(),
        transition,
        slot,
    })
}

fn decode_snapshot(items: &[Value]) -> Result<Vec<String>, ParseError> {
    let mut keys: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        let Value::String(key) = item else {
            return Err(ParseError::shape("an array of key strings", item));
        };
        if !keys.contains(key) {
            keys.push(key.clone());
        }
    }
    Ok(keys)
}
