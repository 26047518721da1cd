// Main application entry point.
// Orchestrates configuration, the source/logger/signal threads, the engine
// loop and final stats reporting.

use anyhow::{anyhow, Context};
use crossbeam_channel::{bounded, select, tick, unbounded, Sender, TrySendError};
use key_overlay::cli::{self, RendererKind};
use key_overlay::config::Config;
use key_overlay::event::Normalizer;
use key_overlay::logger::{EventInfo, LogMessage, Logger, ParseErrorInfo};
use key_overlay::overlay::rate::RateWindow;
use key_overlay::overlay::{FrameOutcome, Overlay};
use key_overlay::render::{JsonRenderer, Renderer, Surface, TextRenderer};
use key_overlay::source::{self, Inbound};
use key_overlay::{telemetry, util};
use signal_hook::consts::signal::*;
use signal_hook::iterator::Signals;
use std::io;
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const EXIT_STARTUP: i32 = 2;
const EXIT_STRICT: i32 = 3;
const EXIT_OUTPUT: i32 = 4;

const FRAME_QUEUE: usize = 1024;
const LOG_QUEUE: usize = 1024;

/// Holds the engine thread's side of the logger channel and tracks drop
/// warnings so a slow logger cannot stall rendering.
struct MainState {
    log_sender: Sender<LogMessage>,
    warned_about_dropping: bool,
    currently_dropping: bool,
    dropped: u64,
}

impl MainState {
    fn new(log_sender: Sender<LogMessage>) -> Self {
        Self {
            log_sender,
            warned_about_dropping: false,
            currently_dropping: false,
            dropped: 0,
        }
    }

    fn send(&mut self, msg: LogMessage) {
        match self.log_sender.try_send(msg) {
            Ok(()) => {
                if self.currently_dropping {
                    info!(dropped = self.dropped, "logger channel recovered");
                    self.currently_dropping = false;
                }
            }
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                if !self.warned_about_dropping {
                    warn!("logger channel full, dropping log messages");
                    self.warned_about_dropping = true;
                }
                self.currently_dropping = true;
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

fn main() {
    let args = cli::parse_args();
    let cfg = match Config::try_from(&args) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: {e}");
            exit(EXIT_STARTUP);
        }
    };
    telemetry::init_tracing(&cfg);

    match run(&cfg) {
        Ok(code) => exit(code),
        Err(e) => {
            error!("{e:#}");
            exit(EXIT_STARTUP);
        }
    }
}

fn make_renderer(cfg: &Config) -> Box<dyn Renderer> {
    let out = io::stdout().lock();
    let surface = Surface::new(cfg.history_extent);
    match cfg.renderer {
        RendererKind::Json => {
            let renderer = JsonRenderer::new(out, surface).with_counter_speed(cfg.counter_speed);
            if cfg.geometry {
                Box::new(renderer)
            } else {
                Box::new(renderer.without_geometry())
            }
        }
        RendererKind::Text => Box::new(TextRenderer::new(out, surface)),
    }
}

fn current_rate(overlay: &Overlay) -> Option<u32> {
    overlay.rate().map(RateWindow::current)
}

/// Runs until the source closes, a signal arrives or a fatal error occurs.
/// Returns the process exit code.
fn run(cfg: &Config) -> anyhow::Result<i32> {
    let started = Instant::now();
    let now_us = || util::duration_us(started.elapsed());

    let (frame_tx, frame_rx) = bounded::<Inbound>(FRAME_QUEUE);
    source::spawn(&cfg.source, frame_tx).context("failed to open key stream")?;

    let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGUSR1])
        .context("failed to install signal handlers")?;
    let signals_handle = signals.handle();
    let (sig_tx, sig_rx) = unbounded();
    // Held so the signal channel never reports disconnection to the loop.
    let _sig_tx = sig_tx.clone();
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            for sig in signals.forever() {
                if sig_tx.send(sig).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn signal thread")?;

    let logger_running = Arc::new(AtomicBool::new(true));
    let (log_tx, log_rx) = bounded(LOG_QUEUE);
    let logger_handle = {
        let running = Arc::clone(&logger_running);
        let logger_cfg = cfg.clone();
        thread::Builder::new()
            .name("logger".into())
            .spawn(move || Logger::new(log_rx, running, &logger_cfg).run())
            .context("failed to spawn logger thread")?
    };

    let mut state = MainState::new(log_tx);
    let mut renderer = make_renderer(cfg);
    let mut overlay = Overlay::new(cfg.overlay_settings());
    let mut normalizer = Normalizer::new(cfg.format);
    let ticker = tick(cfg.tick);

    let exit_code = 'engine: loop {
        select! {
            recv(frame_rx) -> msg => match msg {
                Ok(Inbound::Frame(payload)) => {
                    let at_us = now_us();
                    state.send(LogMessage::Frame);
                    match overlay.handle_frame(&mut normalizer, payload.as_frame(), at_us, renderer.as_mut()) {
                        Ok(FrameOutcome::Reset) => state.send(LogMessage::Reset { at_us }),
                        Ok(FrameOutcome::Applied(applied)) => {
                            for a in applied {
                                state.send(LogMessage::Event(EventInfo {
                                    key: a.key,
                                    transition: a.transition,
                                    press_count: a.press_count,
                                    event_us: at_us,
                                    held_for_us: a.held_for_us,
                                }));
                            }
                        }
                        Err(e) => {
                            state.send(LogMessage::ParseError(ParseErrorInfo {
                                at_us,
                                usage_error: e.is_usage_error(),
                                message: e.to_string(),
                            }));
                            if cfg.strict {
                                error!(error = %e, "rejected frame in strict mode");
                                break 'engine EXIT_STRICT;
                            }
                        }
                    }
                    if let Err(e) = renderer.flush() {
                        error!(error = %e, "renderer output failed");
                        break 'engine EXIT_OUTPUT;
                    }
                }
                Ok(Inbound::Closed(reason)) => {
                    info!(%reason, "key stream ended");
                    overlay.tick(now_us(), renderer.as_mut());
                    let _ = renderer.flush();
                    break 'engine 0;
                }
                Err(_) => {
                    debug!("source thread exited");
                    break 'engine 0;
                }
            },
            recv(ticker) -> _ => {
                let at_us = now_us();
                let before = current_rate(&overlay);
                overlay.tick(at_us, renderer.as_mut());
                if let Some(value) = current_rate(&overlay).filter(|v| Some(*v) != before) {
                    state.send(LogMessage::Rate { value, at_us });
                }
                if let Err(e) = renderer.flush() {
                    error!(error = %e, "renderer output failed");
                    break 'engine EXIT_OUTPUT;
                }
            },
            recv(sig_rx) -> sig => match sig {
                Ok(SIGUSR1) => {
                    if overlay.is_paused() {
                        overlay.resume(now_us());
                        info!("resumed");
                    } else {
                        overlay.pause();
                        info!("paused");
                    }
                }
                Ok(sig) => {
                    info!(signal = sig, "received signal, shutting down");
                    break 'engine 128 + sig;
                }
                Err(_) => {}
            },
        }
    };

    signals_handle.close();
    logger_running.store(false, Ordering::SeqCst);
    drop(state);
    let stats = logger_handle
        .join()
        .map_err(|_| anyhow!("logger thread panicked"))?;

    drop(renderer);
    if cfg.renderer == RendererKind::Text {
        // The status line has no trailing newline.
        println!();
    }

    let meta = cfg.stats_meta();
    let runtime = Some(now_us());
    let stderr = io::stderr();
    let mut out = stderr.lock();
    let printed = if cfg.stats_json {
        stats.print_stats_json(&meta, runtime, &mut out)
    } else {
        stats.print_stats(&meta, runtime, &mut out)
    };
    if let Err(e) = printed {
        warn!(error = %e, "failed to write final stats");
    }

    Ok(exit_code)
}
