//! Structured logging initialization. This engine has no distributed trace
//! collector to ship spans to, so only the `tracing-subscriber` half of a
//! full tracing pipeline is needed here (the OTLP exporter drop is noted
//! in DESIGN.md).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs a global `tracing` subscriber: an `EnvFilter` seeded from
/// `log_level` (overridable via `RUST_LOG`) plus a pretty stdout layer.
pub fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let stdout_layer = tracing_subscriber::fmt::layer().pretty();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .init();
}
