//! Fatal bootstrap errors and their process exit codes.

use thiserror::Error;

/// Errors that abort the launch. Degradations (locator fallback, laundering
/// mismatch) are absorbed where they happen and never reach this type.
#[derive(Debug, Error)]
pub enum BootError {
    /// Required environment state is missing or invalid.
    #[error("{0}")]
    Config(String),

    /// Creating or populating the staging directory failed.
    #[error("staging failed: {0:#}")]
    Staging(anyhow::Error),

    /// The staging directory could not be created (other than "already exists").
    #[error("creation of private temporary subdirectory {path} failed: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Replacing or spawning the re-exec image failed.
    #[error("execution of {program} failed: {source}")]
    Handoff {
        program: String,
        source: std::io::Error,
    },

    /// The embedded runtime could not be started.
    #[error("runtime launch failed: {0:#}")]
    RuntimeLaunch(anyhow::Error),
}

impl BootError {
    pub const EXIT_CONFIG: i32 = 2;
    pub const EXIT_STAGING: i32 = 3;
    pub const EXIT_CREATE_DIR: i32 = 4;
    pub const EXIT_HANDOFF: i32 = 5;
    pub const EXIT_RUNTIME_LAUNCH: i32 = 6;

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => Self::EXIT_CONFIG,
            Self::Staging(_) => Self::EXIT_STAGING,
            Self::CreateDir { .. } => Self::EXIT_CREATE_DIR,
            Self::Handoff { .. } => Self::EXIT_HANDOFF,
            Self::RuntimeLaunch(_) => Self::EXIT_RUNTIME_LAUNCH,
        }
    }
}
