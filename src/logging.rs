//! Logging setup for lehrbot
//!
//! Console output always goes to stdout. When `logging.file` is set, the same
//! events are also written to a daily-rotated file through a non-blocking
//! writer; keep the returned [`LogGuard`] alive for the program lifetime.

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{Error, Result};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Dependency targets capped regardless of the configured level
const QUIET_TARGETS: &[&str] = &["hyper=warn", "h2=warn", "tower_http=warn", "reqwest=warn"];

/// Keeps the background file writer alive
pub struct LogGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Map a configured level name to a tracing directive
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        _ => "info",
    }
}

/// Filter directives: `rust_log` wins, otherwise the configured level with
/// noisy dependencies capped
pub fn filter_directives(level: &str, rust_log: Option<String>) -> String {
    rust_log.filter(|v| !v.trim().is_empty()).unwrap_or_else(|| {
        let mut parts = vec![level_directive(level).to_string()];
        parts.extend(QUIET_TARGETS.iter().map(|t| t.to_string()));
        parts.join(",")
    })
}

/// Build the env filter: `RUST_LOG` wins, otherwise the configured level
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::builder().parse_lossy(filter_directives(level, std::env::var("RUST_LOG").ok()))
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> Result<LogGuard> {
    let json = config.format == LogFormat::Json;

    let console = if json {
        fmt::layer()
            .json()
            .with_current_span(false)
            .with_target(true)
            .with_writer(std::io::stdout)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_writer(std::io::stdout)
            .boxed()
    };

    let mut file_guard = None;
    let file_layer = match &config.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            std::fs::create_dir_all(&dir)?;

            let file_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("lehrbot.log")
                .to_string();

            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(file_name)
                .max_log_files(config.max_files.max(1))
                .build(&dir)
                .map_err(|e| Error::Config(format!("cannot open log file: {}", e)))?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            file_guard = Some(guard);

            let layer = if json {
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed()
            } else {
                fmt::layer().with_ansi(false).with_writer(writer).boxed()
            };
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(build_filter(&config.level))
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {}", e)))?;

    info!(
        level = %config.level,
        format = ?config.format,
        file = ?config.file,
        "Logging configured"
    );

    Ok(LogGuard {
        _file_guard: file_guard,
    })
}
