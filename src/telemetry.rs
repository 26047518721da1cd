//! Tracing initialization.

use crate::config::{Config, SourceKind};
use crate::util;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global tracing subscriber: a stderr fmt layer filtered by
/// `cfg.log_filter`, plain or JSON.
pub fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_new(&cfg.log_filter).unwrap_or_else(|e| {
        eprintln!("Warning: Invalid log filter '{}': {e}", cfg.log_filter);
        EnvFilter::new("key_overlay=info")
    });

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(cfg.verbose)
        .with_level(true);
    let fmt_layer = if cfg.log_json {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        build_ts = option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        "key-overlay starting"
    );

    let source = match &cfg.source {
        SourceKind::WebSocket(url) => url.as_str(),
        SourceKind::Stdin => "<stdin>",
    };
    info!(
        source,
        format = ?cfg.format,
        history = cfg.show_history,
        history_pps = cfg.history_pixels_per_second,
        window = %cfg.rate_window.map_or_else(|| "disabled".to_string(), util::format_duration),
        events_per_beat = cfg.events_per_beat,
        tick = %util::format_duration(cfg.tick),
        renderer = ?cfg.renderer,
        strict = cfg.strict,
        log_all = cfg.log_all_events,
        log_interval = %util::format_duration(cfg.log_interval),
        log_filter = %cfg.log_filter,
        "configuration loaded"
    );
}
