//! Configuration structs loaded from the environment.

use super::env_keys::observability as obv_keys;
use super::loader::{env_bool, env_or};

/// Logging configuration: quiet, log_level, log_json.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| Self {
            quiet: env_bool(obv_keys::PARBOOT_QUIET, &[], false),
            log_level: env_or(obv_keys::PARBOOT_LOG_LEVEL, &[], || {
                "parboot=warn".to_string()
            }),
            log_json: env_bool(obv_keys::PARBOOT_LOG_JSON, &[], false),
        })
    }
}
