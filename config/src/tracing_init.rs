//! Tracing subscriber for binaries.
//!
//! - **RUST_LOG**: filter directives; falls back to the caller's default.
//! - **LOG_FILE**: when set, logs are appended to this file (no ANSI) through a
//!   non-blocking writer; otherwise they go to stderr so stdout stays clean.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Keeps the file writer flushing; drop it at process exit.
pub struct TracingGuard {
    _appender: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Installs the global subscriber. Errors when one is already installed.
pub fn init_tracing(default_filter: &str) -> Result<TracingGuard, Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    match std::env::var("LOG_FILE") {
        Ok(path) if !path.trim().is_empty() => {
            let path = Path::new(&path);
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path.file_name().ok_or("LOG_FILE has no file name")?;
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
            tracing::info!(path = %path.display(), "logging to file");
            Ok(TracingGuard {
                _appender: Some(guard),
            })
        }
        _ => {
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
            Ok(TracingGuard { _appender: None })
        }
    }
}
