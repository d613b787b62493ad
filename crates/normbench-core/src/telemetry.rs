//! Log output for the `normbench` binary.
//!
//! Harness lifecycle events (`run.started`, `row.failed`, ...) from [`crate::obs`]
//! and the counter flush from [`crate::metrics`] go through the subscriber
//! installed here. Everything is written to stderr; stdout is reserved for
//! command output such as `normbench compare --format json`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the process subscriber.
///
/// `RUST_LOG` wins when set, so `RUST_LOG=normbench_core::harness=debug`
/// shows per-row scoring; otherwise `level` applies to every crate. With
/// `json`, each event is one JSON object per line, which keeps run ids and
/// failure stages as fields.
///
/// Only the first call installs anything; test binaries may call it freely.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .json()
                    // the enclosing run span carries run_id
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}
