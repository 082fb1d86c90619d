//! Staging directory provisioner: pick a unique directory and extract the
//! payload into it.
//!
//! Implement [`Provisioner`] to stage payloads from somewhere other than the
//! launcher executable; the bootstrap only sees the trait.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use crate::payload::{is_populated, PayloadSource};
use crate::staging::{create_private_dir, staging_root};

/// Hex digits of the payload digest used in cache directory names.
const CACHE_KEY_LEN: usize = 40;

/// Result of a successful `create_and_extract`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDir {
    pub path: PathBuf,
    /// Set when a content-addressed cache directory was used.
    pub cache_key: Option<String>,
}

/// Extension point for staging the bundled payload.
pub trait Provisioner {
    /// Create a private staging directory and populate it.
    ///
    /// `clean` directories are unique per process and deleted after the run;
    /// otherwise a directory may be reused across runs.
    fn create_and_extract(&self, argv: &[OsString], clean: bool) -> Result<StagedDir>;

    /// Populate an existing directory unless it already holds a payload.
    /// Returns whether anything was extracted.
    fn populate(&self, dir: &Path) -> Result<bool>;
}

/// Default provisioner: payload carried by (or next to) the launcher binary.
#[derive(Debug, Clone)]
pub struct ArchiveProvisioner {
    exe: Option<PathBuf>,
    root: PathBuf,
}

impl Default for ArchiveProvisioner {
    fn default() -> Self {
        Self {
            exe: None,
            root: staging_root(),
        }
    }
}

impl ArchiveProvisioner {
    pub fn new(exe: Option<PathBuf>, root: PathBuf) -> Self {
        Self { exe, root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Executable carrying the payload: explicit, then the running image,
    /// then `argv[0]`.
    fn executable(&self, argv: &[OsString]) -> Result<PathBuf> {
        if let Some(exe) = &self.exe {
            return Ok(exe.clone());
        }
        match std::env::current_exe() {
            Ok(exe) => Ok(exe),
            Err(e) => argv
                .first()
                .map(PathBuf::from)
                .with_context(|| format!("Cannot determine launcher path: {}", e)),
        }
    }

    fn source(&self, argv: &[OsString]) -> Result<PayloadSource> {
        let exe = self.executable(argv)?;
        PayloadSource::locate(&exe)
    }

    fn unique_name(prefix: &str) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("{}-{}-{}", prefix, std::process::id(), &id[..8])
    }

    fn extract_fresh(&self, source: &PayloadSource) -> Result<PathBuf> {
        let dir = self.root.join(Self::unique_name("temp"));
        fs::create_dir(&dir).with_context(|| format!("Create {}", dir.display()))?;
        if let Err(e) = source.extract_to(&dir) {
            let _ = fs::remove_dir_all(&dir);
            return Err(e);
        }
        Ok(dir)
    }

    /// Extract next to the cache directory, then rename into place. Losing the
    /// rename race to another process that populated the same key is success.
    fn extract_cached(&self, source: &PayloadSource, key: &str) -> Result<PathBuf> {
        let dir = self.root.join(format!("cache-{}", key));
        if is_populated(&dir) {
            tracing::debug!(dir = %dir.display(), "reusing cached staging directory");
            return Ok(dir);
        }

        let scratch = self.root.join(Self::unique_name("tmp"));
        fs::create_dir(&scratch).with_context(|| format!("Create {}", scratch.display()))?;
        if let Err(e) = source.extract_to(&scratch) {
            let _ = fs::remove_dir_all(&scratch);
            return Err(e);
        }

        match fs::rename(&scratch, &dir) {
            Ok(()) => Ok(dir),
            Err(_) if is_populated(&dir) => {
                tracing::debug!(dir = %dir.display(), "cache populated concurrently");
                let _ = fs::remove_dir_all(&scratch);
                Ok(dir)
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&scratch);
                Err(e).with_context(|| format!("Move staged payload to {}", dir.display()))
            }
        }
    }
}

impl Provisioner for ArchiveProvisioner {
    fn create_and_extract(&self, argv: &[OsString], clean: bool) -> Result<StagedDir> {
        let source = self.source(argv)?;
        create_private_dir(&self.root)
            .with_context(|| format!("Create staging root {}", self.root.display()))?;

        if clean {
            let path = self.extract_fresh(&source)?;
            return Ok(StagedDir {
                path,
                cache_key: None,
            });
        }

        let digest = source.digest()?;
        let key = digest[..CACHE_KEY_LEN.min(digest.len())].to_string();
        let path = self.extract_cached(&source, &key)?;
        Ok(StagedDir {
            path,
            cache_key: Some(key),
        })
    }

    fn populate(&self, dir: &Path) -> Result<bool> {
        if is_populated(dir) {
            return Ok(false);
        }
        let source = self.source(&[])?;
        source.extract_to(dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::tests::packed_launcher;

    fn provisioner(root: &Path) -> ArchiveProvisioner {
        let packed = packed_launcher(root);
        ArchiveProvisioner::new(Some(packed), root.join("stage-root"))
    }

    #[test]
    fn test_clean_dirs_are_unique_per_call() {
        let tmp = tempfile::tempdir().unwrap();
        let p = provisioner(tmp.path());

        let a = p.create_and_extract(&[], true).unwrap();
        let b = p.create_and_extract(&[], true).unwrap();
        assert_ne!(a.path, b.path);
        assert!(a.cache_key.is_none());
        assert!(is_populated(&a.path));
        assert!(a.path.starts_with(p.root()));
        let name = a.path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(&format!("temp-{}-", std::process::id())));
    }

    #[test]
    fn test_cache_dir_is_reused() {
        let tmp = tempfile::tempdir().unwrap();
        let p = provisioner(tmp.path());

        let a = p.create_and_extract(&[], false).unwrap();
        let marker = a.path.join("user-file");
        fs::write(&marker, b"kept").unwrap();

        let b = p.create_and_extract(&[], false).unwrap();
        assert_eq!(a, b);
        assert!(marker.is_file(), "cached directory must not be re-extracted");
        let key = a.cache_key.unwrap();
        assert_eq!(key.len(), CACHE_KEY_LEN);
        assert!(a.path.ends_with(format!("cache-{}", key)));
    }

    #[test]
    fn test_populate_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let p = provisioner(tmp.path());
        let dir = tmp.path().join("global");
        fs::create_dir_all(&dir).unwrap();

        assert!(p.populate(&dir).unwrap());
        assert!(!p.populate(&dir).unwrap());
        assert!(dir.join("parboot.json").is_file());
    }

    #[test]
    fn test_missing_payload_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let exe = tmp.path().join("bare");
        fs::write(&exe, b"no payload here, just bytes").unwrap();
        let p = ArchiveProvisioner::new(Some(exe), tmp.path().join("root"));
        assert!(p.create_and_extract(&[], true).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_staging_root_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().unwrap();
        let p = provisioner(tmp.path());
        p.create_and_extract(&[], true).unwrap();
        let mode = fs::metadata(p.root()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
    }
}
