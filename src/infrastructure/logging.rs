use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Where and how verbosely the app logs. There is deliberately no
/// settings file; flip `file_logging` here when debugging a device in
/// the field.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub file_logging: bool,
    pub log_dir: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: "logs".to_string(),
        }
    }
}

pub struct LoggingGuard {
    // We need to keep this guard alive for logs to be flushed
    _guards: Vec<WorkerGuard>,
}

pub fn init(config: &LogConfig) -> anyhow::Result<LoggingGuard> {
    let mut guards = Vec::new();

    let level_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let console_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    let file_layer = if config.file_logging {
        let file_appender = tracing_appender::rolling::daily(&config.log_dir, "pokeball-plus.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        guards.push(guard);
        Some(
            fmt::layer()
                .with_writer(non_blocking)
                // File logs shouldn't have ANSI colors
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(level_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized successfully");

    Ok(LoggingGuard { _guards: guards })
}
