//! Environment variable key constants.
//!
//! The `PAR_*` keys are the bootstrap wire format: they are the only state that
//! crosses the re-exec boundary besides the argument vector.

/// Process-scoped namespace keys, cleared by `Namespace::reset`.
pub mod namespace {
    pub const INITIALIZED: &str = "PAR_INITIALIZED";
    /// Staging directory (absolute path).
    pub const TEMP: &str = "PAR_TEMP";
    pub const CLEAN: &str = "PAR_CLEAN";
    pub const DEBUG: &str = "PAR_DEBUG";
    pub const CACHE: &str = "PAR_CACHE";
    pub const PROGNAME: &str = "PAR_PROGNAME";
    /// Set in children started by the spawn-and-wait handoff.
    pub const SPAWNED: &str = "PAR_SPAWNED";
    /// Number of synthetic marker arguments injected before re-exec.
    pub const ARGC: &str = "PAR_ARGC";
    /// `PAR_ARGV_0` echoes the invoked name; `PAR_ARGV_1..=PAR_ARGC` hold markers.
    pub const ARGV_PREFIX: &str = "PAR_ARGV_";

    /// Fixed keys (marker slots excluded; they are indexed).
    pub const ALL: &[&str] = &[
        INITIALIZED,
        TEMP,
        CLEAN,
        DEBUG,
        CACHE,
        PROGNAME,
        SPAWNED,
        ARGC,
    ];

    pub fn argv_key(index: usize) -> String {
        format!("{ARGV_PREFIX}{index}")
    }
}

/// Overrides an embedding context can pre-seed; read only during `init()`.
pub mod global {
    pub const DEBUG: &str = "PAR_GLOBAL_DEBUG";
    pub const TEMP: &str = "PAR_GLOBAL_TEMP";
    pub const CLEAN: &str = "PAR_GLOBAL_CLEAN";
}

/// Logging
pub mod observability {
    pub const PARBOOT_LOG_LEVEL: &str = "PARBOOT_LOG_LEVEL";
    pub const PARBOOT_LOG_JSON: &str = "PARBOOT_LOG_JSON";
    pub const PARBOOT_QUIET: &str = "PARBOOT_QUIET";
}

/// Platform search paths touched around the handoff.
pub mod platform {
    pub const PATH: &str = "PATH";

    #[cfg(target_os = "macos")]
    pub const LIBRARY_PATH: &str = "DYLD_LIBRARY_PATH";
    #[cfg(windows)]
    pub const LIBRARY_PATH: &str = "PATH";
    #[cfg(not(any(target_os = "macos", windows)))]
    pub const LIBRARY_PATH: &str = "LD_LIBRARY_PATH";
}

/// Used to name the per-user staging root.
pub mod user {
    pub const USER: &str = "USER";
    pub const USER_ALIASES: &[&str] = &["USERNAME", "LOGNAME"];
}
