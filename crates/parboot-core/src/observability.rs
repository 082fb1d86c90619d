//! Observability: tracing init.
//!
//! Uses config::ObservabilityConfig for PARBOOT_QUIET, PARBOOT_LOG_LEVEL and
//! PARBOOT_LOG_JSON. Logs always go to stderr so the bundled application owns
//! stdout.

use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

/// Tracing initialization mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TracingMode {
    /// Use PARBOOT_LOG_LEVEL / PARBOOT_QUIET from env.
    Default,
    /// `PAR_DEBUG` is set: log the bootstrap at debug level.
    Debug,
}

/// Filter directive for the given mode. `parboot` prefixes every workspace crate target.
pub fn filter_directive(mode: TracingMode, cfg: &ObservabilityConfig) -> String {
    match mode {
        TracingMode::Debug => "parboot=debug".to_string(),
        TracingMode::Default if cfg.quiet => "parboot=error".to_string(),
        TracingMode::Default => cfg.log_level.clone(),
    }
}

/// Initialize tracing. Call once at process startup; later calls are no-ops.
pub fn init_tracing(mode: TracingMode) {
    let cfg = ObservabilityConfig::from_env();
    let level = filter_directive(mode, cfg);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}
