use std::path::{Path, PathBuf};

use color_eyre::{eyre::eyre, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log file: `$XDG_DATA_HOME/bizdesk/bizdesk.log`.
pub fn default_log_path() -> Option<PathBuf> {
  dirs::data_dir().map(|dir| dir.join("bizdesk").join("bizdesk.log"))
}

fn level_for(verbosity: u8) -> &'static str {
  match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  }
}

/// Send tracing output to a log file so it never mixes with command output.
///
/// `RUST_LOG` takes precedence over `verbosity`. Keep the returned guard
/// alive for the life of the program or buffered lines are lost.
pub fn init(verbosity: u8, log_file: &Path) -> Result<WorkerGuard> {
  let filter = EnvFilter::try_from_default_env()
    .unwrap_or_else(|_| EnvFilter::new(format!("bizdesk={}", level_for(verbosity))));

  let dir = log_file.parent().unwrap_or(Path::new("."));
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;
  let file_name = log_file
    .file_name()
    .ok_or_else(|| eyre!("Invalid log file path: {}", log_file.display()))?;

  let file_appender = tracing_appender::rolling::never(dir, file_name);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  tracing_subscriber::registry()
    .with(filter)
    .with(
      fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
