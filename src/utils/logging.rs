use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::{Mutex, Once};

use tracing::Level;
use tracing_subscriber::{filter::LevelFilter, fmt::format::FmtSpan, EnvFilter};

static INIT: Once = Once::new();

/// Logging configuration options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level when `RUST_LOG` is not set
    pub level: Level,
    /// Whether to include source code locations
    pub source_location: bool,
    /// Whether to log span close events (with their timings)
    pub log_spans: bool,
    /// Whether to include thread ids
    pub thread_ids: bool,
    /// Output file path (None for stdout)
    pub file_path: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            source_location: false,
            log_spans: false,
            thread_ids: true,
            file_path: None,
        }
    }
}

impl LogConfig {
    /// Defaults adjusted by `LOG_LEVEL` and `LOG_FILE`
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = std::env::var("LOG_LEVEL").ok().and_then(|v| parse_level(&v)) {
            config.level = level;
        }
        if let Ok(path) = std::env::var("LOG_FILE") {
            if !path.trim().is_empty() {
                config.file_path = Some(PathBuf::from(path));
            }
        }
        config
    }
}

fn parse_level(value: &str) -> Option<Level> {
    value.trim().parse().ok()
}

/// Initialize the global subscriber. Only the first call has any effect.
pub fn setup_logging(config: LogConfig) -> Result<(), String> {
    let mut result = Ok(());

    INIT.call_once(|| {
        result = setup_logging_internal(&config);
    });

    result
}

fn setup_logging_internal(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.level).into())
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(config.thread_ids)
        .with_file(config.source_location)
        .with_line_number(config.source_location)
        .with_span_events(if config.log_spans {
            FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    let installed = match &config.file_path {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))?;
            subscriber
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => subscriber.try_init(),
    };

    installed.map_err(|e| format!("Failed to set global subscriber: {}", e))
}
