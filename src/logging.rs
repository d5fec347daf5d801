use crate::errors::{AppError, AppResult};
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const LOG_FILE_PREFIX: &str = "tracker.log";

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StderrFormat {
    #[default]
    Off,
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub default_directive: String,
    pub stderr: StderrFormat,
}

impl LogConfig {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            default_directive: "info".to_string(),
            stderr: StderrFormat::Off,
        }
    }

    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.default_directive = match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
        .to_string();
        self
    }

    pub fn with_stderr(mut self, stderr: StderrFormat) -> Self {
        self.stderr = stderr;
        self
    }
}

pub fn init_tracing(config: &LogConfig) -> AppResult<()> {
    fs::create_dir_all(&config.log_dir).map_err(|error| AppError::Io(error.to_string()))?;
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = LOG_GUARD.set(guard);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive.as_str()));
    let file_layer = fmt::layer().json().with_writer(non_blocking);
    let stderr_layer = match config.stderr {
        StderrFormat::Off => None,
        StderrFormat::Compact => Some(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .boxed(),
        ),
        StderrFormat::Json => Some(fmt::layer().json().with_writer(std::io::stderr).boxed()),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|error| AppError::Internal(error.to_string()))
}
