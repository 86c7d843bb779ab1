//! Logging setup: stdout always, gateway.log when writable

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

const LOG_FILE: &str = "gateway.log";

/// Install the global subscriber: a compact stdout layer, plus a plain
/// layer appending to `gateway.log` when that file can be opened. Levels
/// come from `RUST_LOG`, defaulting to `info`.
///
/// An unwritable log file downgrades to stdout-only; the relay itself
/// must not depend on local disk. The non-blocking writer's flush guard
/// is leaked on purpose so the file stays open for the process lifetime.
pub fn init() {
    let level =
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .ok()
        .map(|file| {
            let (writer, guard) = tracing_appender::non_blocking(file);
            std::mem::forget(guard);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(level())
        });

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_filter(level()))
        .with(file_layer)
        .init();
}
