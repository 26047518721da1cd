use crate::cli::{Args, RendererKind};
use crate::event::WireFormat;
use crate::overlay::OverlaySettings;
use crate::stats::Meta;
use crate::util::duration_us;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("rate window must be greater than zero")]
    ZeroWindow,
    #[error("tick period must be greater than zero")]
    ZeroTick,
    #[error("events per beat must be a positive number, got {0}")]
    EventsPerBeat(f64),
    #[error("{name} must be a non-negative number, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("label override {0:?} is not of the form KEY=LABEL")]
    Label(String),
}

/// Where frames come from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceKind {
    WebSocket(String),
    Stdin,
}

/// Resolved runtime configuration.
#[derive(Clone, Debug)]
pub struct Config {
    pub source: SourceKind,
    pub format: WireFormat,
    pub show_history: bool,
    pub history_pixels_per_second: f64,
    pub history_extent: f64,
    pub rate_window: Option<Duration>,
    pub events_per_beat: f64,
    pub counter_animation: bool,
    pub counter_speed: Duration,
    pub tick: Duration,
    pub labels: HashMap<String, String>,
    pub renderer: RendererKind,
    pub geometry: bool,
    pub strict: bool,
    pub log_all_events: bool,
    pub log_interval: Duration,
    pub stats_json: bool,
    pub verbose: bool,
    pub log_filter: String,
    pub log_json: bool,
}

impl TryFrom<&Args> for Config {
    type Error = ConfigError;

    fn try_from(a: &Args) -> Result<Self, ConfigError> {
        if !a.no_rate && a.window.is_zero() {
            return Err(ConfigError::ZeroWindow);
        }
        if a.tick.is_zero() {
            return Err(ConfigError::ZeroTick);
        }
        if !(a.events_per_beat > 0.0 && a.events_per_beat.is_finite()) {
            return Err(ConfigError::EventsPerBeat(a.events_per_beat));
        }
        for (name, value) in [("history-pps", a.history_pps), ("history-extent", a.history_extent)] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(ConfigError::Negative { name, value });
            }
        }

        let labels = a
            .labels
            .iter()
            .map(|raw| parse_label(raw))
            .collect::<Result<HashMap<_, _>, _>>()?;

        let log_filter = a.log_filter.clone().unwrap_or_else(|| {
            std::env::var("RUST_LOG").unwrap_or_else(|_| {
                if a.verbose {
                    "key_overlay=debug".to_string()
                } else {
                    "key_overlay=info".to_string()
                }
            })
        });

        Ok(Self {
            source: if a.stdin {
                SourceKind::Stdin
            } else {
                SourceKind::WebSocket(a.connect.clone())
            },
            format: a.format,
            show_history: !a.no_history,
            history_pixels_per_second: a.history_pps,
            history_extent: a.history_extent,
            rate_window: (!a.no_rate).then_some(a.window),
            events_per_beat: a.events_per_beat,
            counter_animation: !a.no_counter_animation,
            counter_speed: a.counter_speed,
            tick: a.tick,
            labels,
            renderer: a.renderer,
            geometry: !a.no_geometry,
            strict: a.strict,
            log_all_events: a.log_all_events,
            log_interval: a.log_interval,
            stats_json: a.stats_json,
            verbose: a.verbose,
            log_filter,
            log_json: a.log_json,
        })
    }
}

fn parse_label(raw: &str) -> Result<(String, String), ConfigError> {
    match raw.split_once('=') {
        Some((key, label)) if !key.is_empty() => Ok((key.to_string(), label.to_string())),
        _ => Err(ConfigError::Label(raw.to_string())),
    }
}

impl Config {
    pub fn overlay_settings(&self) -> OverlaySettings {
        OverlaySettings {
            show_history: self.show_history,
            history_pixels_per_second: self.history_pixels_per_second,
            rate_window: self.rate_window,
            events_per_beat: self.events_per_beat,
            counter_animation: self.counter_animation,
            labels: self.labels.clone(),
        }
    }

    pub fn stats_meta(&self) -> Meta {
        Meta {
            format: format!("{:?}", self.format).to_lowercase(),
            rate_window_us: self.rate_window.map(duration_us),
            events_per_beat: self.events_per_beat,
            history_pixels_per_second: self.history_pixels_per_second,
            log_all_events: self.log_all_events,
            log_interval_us: duration_us(self.log_interval),
        }
    }
}
