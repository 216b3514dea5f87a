//! Structured logging bootstrap.
//!
//! Every binary in the workspace calls [`init`] once at startup. Output is
//! JSON lines by default (for ingestion by a log pipeline) or pretty ANSI
//! text when `MOLTIS_LOG_FORMAT=pretty` is set, useful for local runs.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    fn from_env() -> Self {
        match std::env::var("MOLTIS_LOG_FORMAT").as_deref() {
            Ok("pretty") => Self::Pretty,
            _ => Self::Json,
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// `default_filter` is used when `RUST_LOG` is unset, e.g. `"info,moltis_gateway=debug"`.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => {
            let layer = fmt::layer().json().with_target(true).with_current_span(true);
            registry.with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().pretty().with_target(true);
            registry.with(layer).init();
        }
    }
}

/// Initialize a subscriber suitable for `#[test]` functions; safe to call
/// more than once per process (later calls are no-ops).
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
