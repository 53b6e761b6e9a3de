//! Diagnostic logging setup (§4.A `--verbose`/`--debug`/`--log`/`--log-file`).
//!
//! Verbose sets the default filter to `info`, debug to `debug` (debug
//! implies verbose); `RUST_LOG` always overrides both when present. When
//! `--log`/`--log-file` is given, errors are additionally appended to a
//! rolling file using the span-annotated formatter in [`crate::log_format`].

use crate::log_format::TextWithSpanIds;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn default_filter(verbose: bool, debug: bool) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    EnvFilter::new(level)
}

/// Initializes the global tracing subscriber. Returns a guard that must be
/// held for the process lifetime when a log file is active, so the
/// non-blocking writer's background thread keeps flushing.
pub fn init(verbose: bool, debug: bool, log_file: Option<&str>) -> LoggingGuard {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(default_filter(verbose, debug));

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok();
            match file {
                Some(file) => {
                    let (writer, guard) = tracing_appender::non_blocking(file);
                    let layer = tracing_subscriber::fmt::layer()
                        .event_format(TextWithSpanIds::new())
                        .with_writer(writer)
                        .with_filter(EnvFilter::new("error"));
                    (Some(layer), Some(guard))
                }
                None => (None, None),
            }
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    LoggingGuard { _file_guard: guard }
}
