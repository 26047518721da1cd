// This module defines the Logger thread, which handles logging events
// and accumulating/reporting statistics based on messages received
// from the engine thread.

use crate::config::Config;
use crate::event::Transition;
use crate::stats::{Meta, StatsCollector};
use crate::util::format_us;
use chrono::Local;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Represents a message sent from the engine thread to the logger thread.
#[derive(Debug)]
pub enum LogMessage {
    /// A frame arrived, whatever its content.
    Frame,
    Event(EventInfo),
    ParseError(ParseErrorInfo),
    Reset { at_us: u64 },
    Rate { value: u32, at_us: u64 },
}

/// One applied key transition.
#[derive(Debug, Clone)]
pub struct EventInfo {
    pub key: String,
    pub transition: Transition,
    pub press_count: u64,
    /// Engine clock timestamp (µs).
    pub event_us: u64,
    /// Hold duration, on release.
    pub held_for_us: Option<u64>,
}

/// A frame the normalizer rejected.
#[derive(Debug, Clone)]
pub struct ParseErrorInfo {
    pub at_us: u64,
    pub usage_error: bool,
    pub message: String,
}

/// Manages the state and execution loop for the logger thread.
pub struct Logger {
    receiver: Receiver<LogMessage>,
    logger_running: Arc<AtomicBool>,
    log_all_events: bool,
    log_interval: Duration,
    stats_json: bool,
    meta: Meta,

    /// Totals for the entire run.
    cumulative_stats: StatsCollector,
    /// Totals since the last periodic dump.
    interval_stats: StatsCollector,

    last_dump_time: Instant,
    /// Timestamp of the first event seen, for relative timestamps.
    first_event_us: Option<u64>,
}

impl Logger {
    pub fn new(receiver: Receiver<LogMessage>, logger_running: Arc<AtomicBool>, cfg: &Config) -> Self {
        let log_interval = if cfg.log_interval.is_zero() {
            Duration::MAX // Effectively disabled
        } else {
            cfg.log_interval
        };

        Logger {
            receiver,
            logger_running,
            log_all_events: cfg.log_all_events,
            log_interval,
            stats_json: cfg.stats_json,
            meta: cfg.stats_meta(),
            cumulative_stats: StatsCollector::new(),
            interval_stats: StatsCollector::new(),
            last_dump_time: Instant::now(),
            first_event_us: None,
        }
    }

    /// Receives messages until the sender disconnects or the running flag is
    /// cleared, dumping interval statistics on schedule.
    ///
    /// Returns the cumulative statistics.
    pub fn run(&mut self) -> StatsCollector {
        let check_interval = Duration::from_millis(100);

        loop {
            if !self.logger_running.load(Ordering::SeqCst) {
                debug!("logger received shutdown signal, draining channel");
                self.drain();
                break;
            }

            if self.log_interval != Duration::MAX && self.last_dump_time.elapsed() >= self.log_interval {
                self.dump_periodic_stats();
                self.last_dump_time = Instant::now();
            }

            match self.receiver.recv_timeout(check_interval) {
                Ok(msg) => self.process_message(msg),
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("logger channel disconnected, draining channel");
                    self.drain();
                    break;
                }
            }
        }

        std::mem::take(&mut self.cumulative_stats)
    }

    fn drain(&mut self) {
        while let Ok(msg) = self.receiver.try_recv() {
            self.process_message(msg);
        }
    }

    /// Updates statistics and performs logging if enabled.
    pub fn process_message(&mut self, msg: LogMessage) {
        match msg {
            LogMessage::Frame => {
                self.cumulative_stats.record_frame();
                self.interval_stats.record_frame();
            }
            LogMessage::Event(data) => {
                self.cumulative_stats.record_event_info(&data);
                self.interval_stats.record_event_info(&data);
                if self.first_event_us.is_none() {
                    self.first_event_us = Some(data.event_us);
                }
                if self.log_all_events {
                    self.log_event_detailed(&data);
                }
            }
            LogMessage::ParseError(data) => {
                self.cumulative_stats.record_parse_error(&data);
                self.interval_stats.record_parse_error(&data);
                warn!(
                    at = %format_relative_us(self.relative(data.at_us)),
                    usage_error = data.usage_error,
                    "dropped frame: {}",
                    data.message
                );
            }
            LogMessage::Reset { at_us } => {
                self.cumulative_stats.record_reset();
                self.interval_stats.record_reset();
                info!(at = %format_relative_us(self.relative(at_us)), "counters reset");
            }
            LogMessage::Rate { value, at_us } => {
                self.cumulative_stats.record_rate(value);
                self.interval_stats.record_rate(value);
                if self.log_all_events {
                    info!(at = %format_relative_us(self.relative(at_us)), bpm = value, "rate");
                }
            }
        }
    }

    /// Cumulative statistics gathered so far.
    pub fn stats(&self) -> &StatsCollector {
        &self.cumulative_stats
    }

    fn relative(&self, at_us: u64) -> u64 {
        at_us.saturating_sub(self.first_event_us.unwrap_or(at_us))
    }

    /// Dumps the current interval statistics to stderr and starts a new interval.
    fn dump_periodic_stats(&mut self) {
        eprintln!(
            "\n--- Periodic Stats Dump (Wallclock: {}) ---",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
        );

        let stderr = io::stderr();
        let mut out = stderr.lock();
        let result = if self.stats_json {
            self.interval_stats.print_stats_json(&self.meta, None, &mut out)
        } else {
            self.interval_stats.print_stats(&self.meta, None, &mut out)
        };
        if let Err(e) = result {
            warn!(error = %e, "failed to write periodic stats");
        }

        self.interval_stats = StatsCollector::new();
    }

    fn log_event_detailed(&self, data: &EventInfo) {
        let relative = format_relative_us(self.relative(data.event_us));
        match data.held_for_us {
            Some(held) => info!(
                at = %relative,
                key = %data.key,
                transition = %data.transition,
                count = data.press_count,
                held = %format_us(held),
                "key event"
            ),
            None => info!(
                at = %relative,
                key = %data.key,
                transition = %data.transition,
                count = data.press_count,
                "key event"
            ),
        }
    }
}

/// Formats relative timestamps consistently for logging.
fn format_relative_us(relative_us: u64) -> String {
    let s = if relative_us < 1_000 {
        format!("+{} µs", relative_us)
    } else if relative_us < 1_000_000 {
        format!("+{:.1} ms", relative_us as f64 / 1000.0)
    } else {
        format!("+{:.3} s", relative_us as f64 / 1_000_000.0)
    };
    format!("{:<10}", s)
}
