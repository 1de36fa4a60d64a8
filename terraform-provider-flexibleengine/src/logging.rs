//! Logging configuration
//!
//! stdout carries the plugin protocol, so console logs go to stderr. A JSON
//! log file can be added for debugging runs driven by Terraform.

use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_NAME: &str = "terraform-provider-flexibleengine.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Directory or file path for the JSON log
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_path: None,
        }
    }
}

/// Split a log path into (directory, file name). Existing directories get the
/// default file name.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    if path.is_dir() {
        return (path.to_path_buf(), LOG_FILE_NAME.to_string());
    }
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| LOG_FILE_NAME.to_string());
    (dir, file)
}

impl LoggingConfig {
    /// Install the global subscriber. Keep the returned guard alive until
    /// exit so buffered file output is flushed.
    pub fn init(&self) -> anyhow::Result<Option<WorkerGuard>> {
        let env_filter =
            EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&self.level))?;

        let console_layer = fmt::layer()
            .with_target(true)
            .with_ansi(false)
            .with_writer(io::stderr);

        let guard = match &self.file_path {
            Some(path) => {
                let (dir, file) = split_log_path(path);
                let (writer, guard) = non_blocking(rolling::never(dir, file));

                let file_layer = fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .json()
                    .with_writer(writer);

                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()?;
                Some(guard)
            }
            None => {
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(console_layer)
                    .try_init()?;
                None
            }
        };

        tracing::debug!(level = %self.level, file = ?self.file_path, "logging initialized");
        Ok(guard)
    }
}
