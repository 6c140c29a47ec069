//! Structured logging bootstrap.
//!
//! One `tracing-subscriber` registry for the whole process, configured from
//! the environment:
//!
//! - `RUST_LOG` selects the filter (defaults to `info`).
//! - `FLEETLINK_LOG_FORMAT=json` switches to newline-delimited JSON for log
//!   aggregators; anything else gets the compact console formatter.
//!
//! ```no_run
//! fleetlink_runtime::telemetry::init_tracing();
//! ```

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise the global `tracing` subscriber.
///
/// Idempotent: a second call (tests, embedding) is a no-op rather than a
/// panic.
pub fn init_tracing() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    let use_json = std::env::var("FLEETLINK_LOG_FORMAT").as_deref() == Ok("json");

    let result = if use_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().compact())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialised");
    }
}
