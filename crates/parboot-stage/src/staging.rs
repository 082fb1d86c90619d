//! Staging directory lifecycle: root location, create-if-absent, scoped cleanup.

use parboot_core::config::{env_keys::user, env_optional};
use parboot_core::BootError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Per-user parent of all staging directories: `<temp>/par-<user>`.
pub fn staging_root() -> PathBuf {
    let user =
        env_optional(user::USER, user::USER_ALIASES).unwrap_or_else(|| "SYSTEM".to_string());
    std::env::temp_dir().join(format!("par-{}", sanitize_user(&user)))
}

/// Usernames with characters outside `[A-Za-z0-9_-]` are hex encoded.
pub fn sanitize_user(user: &str) -> String {
    if !user.is_empty()
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        user.to_string()
    } else {
        hex::encode(user.as_bytes())
    }
}

/// Create `dir` (owner-only on Unix) unless it already exists.
pub fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

/// Create `dir` if absent. "Already exists" is success; anything else is fatal.
pub fn ensure_dir(dir: &Path) -> Result<(), BootError> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o755);
    }
    match builder.create(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(source) => Err(BootError::CreateDir {
            path: dir.display().to_string(),
            source,
        }),
    }
}

/// Owns a staging directory for the rest of the run and removes it on drop
/// when `clean` is set. Removal is best effort: a directory already gone
/// (e.g. deleted by a spawned child) is fine.
#[derive(Debug)]
pub struct StagingGuard {
    path: PathBuf,
    clean: bool,
}

impl StagingGuard {
    pub fn new(path: impl Into<PathBuf>, clean: bool) -> Self {
        Self {
            path: path.into(),
            clean,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_clean(&self) -> bool {
        self.clean
    }
}

impl Drop for StagingGuard {
    fn drop(&mut self) {
        if !self.clean {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(dir = %self.path.display(), "staging directory removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(dir = %self.path.display(), "cleanup failed: {}", e),
        }
    }
}
