use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes logging with console output and a daily-rotated JSON file under
/// `log_dir`. Keep the returned guard alive until exit so buffered lines are
/// flushed.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("names_sync=info"));

    if let Err(e) = fs::create_dir_all(log_dir) {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stdout))
            .init();
        tracing::warn!("Logging to console only, cannot create {}: {}", log_dir.display(), e);
        return None;
    }

    let file_appender = tracing_appender::rolling::daily(log_dir, "names-sync.log");
    let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(console_layer)
        .init();

    Some(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Installs the global subscriber, so keep this the only test that does.
    #[test]
    fn file_logging_creates_the_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested").join("logs");

        let guard = init_logging(&log_dir);

        assert!(guard.is_some());
        assert!(log_dir.is_dir());
        tracing::info!("logging initialized");
    }
}
