use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;

/// Install the global subscriber; RUST_LOG wins over `config.log_level`
pub fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);

    // try_init: a second call (tests, embedded use) keeps the first subscriber
    if config.log_json {
        let layer = fmt::layer().json().with_target(true).with_writer(std::io::stderr);
        let _ = registry.with(layer).try_init();
    } else {
        let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);
        let _ = registry.with(layer).try_init();
    }
}
