//! Session statistics, owned by the logger thread.

use crate::event::Transition;
use crate::logger::{EventInfo, ParseErrorInfo};
use crate::util::{format_duration_us, format_us};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};

/// Metadata included in statistics output.
#[derive(Debug, Clone, Serialize)]
pub struct Meta {
    pub format: String,
    pub rate_window_us: Option<u64>,
    pub events_per_beat: f64,
    pub history_pixels_per_second: f64,
    pub log_all_events: bool,
    pub log_interval_us: u64,
}

/// Aggregated statistics for one key identifier.
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyStats {
    pub presses: u64,
    pub releases: u64,
    /// Hold durations (µs) of completed presses.
    pub hold_timings_us: Vec<u64>,
}

impl KeyStats {
    /// `(min, avg, max)` hold time, if any press completed.
    pub fn hold_summary(&self) -> Option<(u64, u64, u64)> {
        let timings = &self.hold_timings_us;
        let min = *timings.iter().min()?;
        let max = *timings.iter().max()?;
        let sum: u64 = timings.iter().sum();
        Some((min, sum / timings.len() as u64, max))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct StatsCollector {
    pub frames_received: u64,
    pub frames_rejected: u64,
    /// Rejected frames that were not text at all.
    pub usage_errors: u64,
    pub resets: u64,
    pub key_downs: u64,
    pub key_ups: u64,
    pub rate_updates: u64,
    pub peak_rate: u32,
    pub per_key_stats: BTreeMap<String, KeyStats>,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self) {
        self.frames_received += 1;
    }

    pub fn record_event_info(&mut self, info: &EventInfo) {
        let stats = self.per_key_stats.entry(info.key.clone()).or_default();
        match info.transition {
            Transition::Down => {
                self.key_downs += 1;
                stats.presses += 1;
            }
            Transition::Up => {
                self.key_ups += 1;
                stats.releases += 1;
                if let Some(held) = info.held_for_us {
                    stats.hold_timings_us.push(held);
                }
            }
        }
    }

    pub fn record_parse_error(&mut self, info: &ParseErrorInfo) {
        self.frames_rejected += 1;
        if info.usage_error {
            self.usage_errors += 1;
        }
    }

    pub fn record_reset(&mut self) {
        self.resets += 1;
    }

    pub fn record_rate(&mut self, rate: u32) {
        self.rate_updates += 1;
        self.peak_rate = self.peak_rate.max(rate);
    }

    /// Human-readable report.
    pub fn print_stats(&self, meta: &Meta, runtime_us: Option<u64>, w: &mut impl Write) -> io::Result<()> {
        writeln!(w, "--- key-overlay status ---")?;
        writeln!(w, "Wire format:            {}", meta.format)?;
        match meta.rate_window_us {
            Some(window) => writeln!(
                w,
                "Rate window:            {} ({} events per beat)",
                format_us(window),
                meta.events_per_beat
            )?,
            None => writeln!(w, "Rate window:            Disabled")?,
        }
        writeln!(
            w,
            "History speed:          {} px/s",
            meta.history_pixels_per_second
        )?;
        writeln!(
            w,
            "Periodic log interval:  {}",
            if meta.log_interval_us > 0 {
                format!("Every {}", format_duration_us(meta.log_interval_us))
            } else {
                "Disabled".to_string()
            }
        )?;
        if let Some(runtime) = runtime_us {
            writeln!(w, "Runtime:                {}", format_duration_us(runtime))?;
        }

        writeln!(w, "\n--- Overall Statistics ---")?;
        writeln!(w, "Frames received:  {}", self.frames_received)?;
        writeln!(
            w,
            "Frames rejected:  {} ({} not text)",
            self.frames_rejected, self.usage_errors
        )?;
        writeln!(w, "Resets:           {}", self.resets)?;
        writeln!(w, "Key downs:        {}", self.key_downs)?;
        writeln!(w, "Key ups:          {}", self.key_ups)?;
        writeln!(w, "Peak rate:        {} bpm", self.peak_rate)?;

        if self.per_key_stats.is_empty() {
            writeln!(w, "\n--- No key events recorded ---")?;
        } else {
            writeln!(w, "\n--- Per Key ---")?;
            writeln!(w, "Format: Key: Presses (Hold Time: Min / Avg / Max)")?;
            for (key, stats) in &self.per_key_stats {
                write!(w, "  {key}: {}", stats.presses)?;
                match stats.hold_summary() {
                    Some((min, avg, max)) => writeln!(
                        w,
                        " (Hold Time: {} / {} / {})",
                        format_us(min),
                        format_us(avg),
                        format_us(max)
                    )?,
                    None => writeln!(w, " (No completed holds)")?,
                }
            }
        }
        writeln!(w, "----------------------------------------------------------")
    }

    /// JSON report, pretty printed.
    pub fn print_stats_json(&self, meta: &Meta, runtime_us: Option<u64>, mut w: impl Write) -> io::Result<()> {
        #[derive(Serialize)]
        struct Output<'a> {
            meta: &'a Meta,
            runtime_us: Option<u64>,
            stats: &'a StatsCollector,
        }

        let output = Output {
            meta,
            runtime_us,
            stats: self,
        };
        serde_json::to_writer_pretty(&mut w, &output)?;
        writeln!(w)
    }
}
