//! Tracing setup for the `huddle` binary.
//!
//! Logs always go to stderr; stdout is reserved for JSON results.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

/// Install the global subscriber. Only the first call in a process has effect.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(json: bool, level: Level) {
    let base = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let layer: Box<dyn Layer<Registry> + Send + Sync> = if json {
        base.json().boxed()
    } else {
        base.boxed()
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter_for(std::env::var("RUST_LOG").ok().as_deref(), level))
        .try_init()
        .ok();
}

fn filter_for(rust_log: Option<&str>, level: Level) -> EnvFilter {
    rust_log
        .and_then(|directives| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}
