use std::fs::OpenOptions;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::constants::{ENV_LOG_FILE, ENV_LOG_FILTER};

/// Install the global subscriber. `PROJDECK_LOG` overrides `default_filter`;
/// `PROJDECK_LOG_FILE` adds a debug-level file sink.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_env(ENV_LOG_FILTER)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    let registry = tracing_subscriber::registry().with(stderr_layer);

    let file = std::env::var(ENV_LOG_FILE).ok().and_then(|log_path| {
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some((log_path, file)),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", log_path, e);
                None
            }
        }
    });

    if let Some((log_path, file)) = file {
        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(true)
            .with_filter(tracing_subscriber::filter::LevelFilter::DEBUG);

        // try_init: a second call (tests, embedding apps) must not panic
        let _ = registry.with(file_layer).try_init();
        eprintln!("File logging enabled: {}", log_path);
    } else {
        let _ = registry.try_init();
    }
}
