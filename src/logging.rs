//! Log setup: one append-only file per deployment user, stderr as fallback.

use crate::config::AppConfig;
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

fn filter(cfg: &AppConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cfg.is_devel() { "debug" } else { "info" })
    })
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are ignored.
pub(crate) fn init(cfg: &AppConfig) {
    let path = cfg.log_file();
    let file = std::fs::create_dir_all(&cfg.log_dir)
        .and_then(|_| OpenOptions::new().create(true).append(true).open(&path));

    match file {
        Ok(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(cfg))
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .try_init();
        }
        Err(e) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter(cfg))
                .with_writer(std::io::stderr)
                .try_init();
            tracing::warn!(path = %path.display(), "cannot open log file, logging to stderr: {e}");
        }
    }
}
