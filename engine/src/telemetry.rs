//! Logging setup
//!
//! Installs the `tracing-subscriber` registry. Filter priority is
//! `RUST_LOG` > configured level > `info`. Debug builds log pretty text to
//! stderr, release builds log JSON.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive applied when `RUST_LOG` is unset
fn default_directive(log_level: &str) -> String {
    let level = match log_level.trim() {
        "" => "info",
        level => level,
    };
    format!("warn,troupe_engine={},troupe={}", level, level)
}

/// Install the subscriber for `log_level`.
///
/// Only the first call in a process takes effect; later calls are ignored.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

/// Subscriber used before the config is loaded
pub fn init_telemetry() {
    init_telemetry_with_level("info");
}
