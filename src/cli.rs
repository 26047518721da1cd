use crate::event::WireFormat;
use clap::{Parser, ValueEnum};
use std::time::Duration;

/// Keypress overlay: reads key transitions from a stream connection and renders
/// per-key counters, scrolling press history and a live input rate.
#[derive(Parser, Debug, Clone)]
#[command(name = "key-overlay", author, version, about, long_about = None)]
pub struct Args {
    /// WebSocket URL of the key stream.
    #[arg(long, value_name = "URL", default_value = "ws://127.0.0.1:7685/ws", conflicts_with = "stdin")]
    pub connect: String,

    /// Read frames from stdin (one per line) instead of connecting.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stdin: bool,

    /// Encoding used by the stream.
    #[arg(long, value_enum, default_value_t = WireFormat::Transition)]
    pub format: WireFormat,

    /// Do not draw press history bars.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_history: bool,

    /// Scroll speed of history bars, in pixels per second.
    #[arg(long, default_value_t = 1000.0, value_name = "PX")]
    pub history_pps: f64,

    /// Distance (pixels) a released bar scrolls before it is removed.
    #[arg(long, default_value_t = 1000.0, value_name = "PX")]
    pub history_extent: f64,

    /// Width of the sliding window used for the rate estimate (e.g. "1s", "1500ms").
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
    pub window: Duration,

    /// Presses that make up one beat in the rate estimate.
    #[arg(long, default_value_t = 4.0, value_name = "N")]
    pub events_per_beat: f64,

    /// Disable the rate estimator.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_rate: bool,

    /// Keep counting presses but do not push counter updates to the renderer.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_counter_animation: bool,

    /// Counter animation speed handed to the renderer.
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    pub counter_speed: Duration,

    /// Tick period driving history geometry and rate updates.
    #[arg(long, default_value = "16ms", value_parser = humantime::parse_duration)]
    pub tick: Duration,

    /// Label shown for a key, as KEY=LABEL. May be repeated.
    #[arg(long = "label", value_name = "KEY=LABEL")]
    pub labels: Vec<String>,

    /// Output renderer (written to stdout).
    #[arg(long, value_enum, default_value_t = RendererKind::Text)]
    pub renderer: RendererKind,

    /// Omit per-tick geometry records from the JSON renderer.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub no_geometry: bool,

    /// Exit on the first rejected frame instead of dropping it.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub strict: bool,

    /// Log every applied key event (and rate change).
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub log_all_events: bool,

    /// Dump statistics to stderr periodically (e.g. "60s", "5m"). "0s" disables.
    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    pub log_interval: Duration,

    /// Output statistics as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub stats_json: bool,

    /// Enable verbose logging (DEBUG level and log targets).
    #[arg(short, long, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Log filter directives. Overrides RUST_LOG and --verbose.
    #[arg(long, value_name = "FILTER")]
    pub log_filter: Option<String>,

    /// Emit log lines as JSON.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RendererKind {
    /// One-line terminal status view.
    Text,
    /// Newline-delimited JSON, one record per renderer call.
    Json,
}

/// Parses command line arguments using clap.
pub fn parse_args() -> Args {
    Args::parse()
}
