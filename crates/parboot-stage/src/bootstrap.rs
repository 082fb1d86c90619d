//! Bootstrap controller: stage the payload, re-exec, run.
//!
//! ```text
//! UNSTAGED ─▶ STAGING ─▶ RE-EXECUTING ─▶ (new process) RUNNING
//!     │                                          ▲
//!     └── PAR_TEMP already known ────────────────┘
//! ```
//!
//! A first invocation has no staging directory: it provisions one, records it
//! in the namespace and hands off to a fresh image of itself with marker
//! arguments. That re-entered process finds `PAR_INITIALIZED=1` and `PAR_TEMP`,
//! launders its argv and runs the embedded runtime.

use parboot_core::config::{
    env_keys::platform, env_raw, EnvOverlay, GlobalOverrides, InitOutcome, Namespace,
};
use parboot_core::locator::find_program;
use parboot_core::BootError;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::handoff::Handoff;
use crate::launder::{inject, launder, staging_markers};
use crate::provisioner::Provisioner;
use crate::runtime::{prepend_search_path, EmbeddedRuntime};
use crate::staging::{ensure_dir, StagingGuard};

/// Controller states, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unstaged,
    Staging,
    ReExecuting,
    Running,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Unstaged => "UNSTAGED",
            Phase::Staging => "STAGING",
            Phase::ReExecuting => "RE-EXECUTING",
            Phase::Running => "RUNNING",
            Phase::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Everything the controller reads from the process, captured once at start.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub argv: Vec<OsString>,
    pub search_path: String,
    /// Current value of the platform dynamic library search variable.
    pub library_path: Option<String>,
    pub namespace: Namespace,
    pub overrides: GlobalOverrides,
}

impl LaunchContext {
    pub fn from_env() -> Self {
        let mut argv: Vec<OsString> = std::env::args_os().collect();
        if argv.is_empty() {
            argv.push(
                std::env::current_exe()
                    .map(PathBuf::into_os_string)
                    .unwrap_or_else(|_| OsString::from("parboot")),
            );
        }
        Self {
            argv,
            search_path: env_raw(platform::PATH).unwrap_or_default(),
            library_path: env_raw(platform::LIBRARY_PATH),
            namespace: Namespace::from_env(),
            overrides: GlobalOverrides::from_env(),
        }
    }
}

/// Orchestrates one launch. Collaborators are borrowed so tests can observe them.
pub struct Bootstrap<'a> {
    provisioner: &'a dyn Provisioner,
    handoff: &'a dyn Handoff,
    runtime: &'a dyn EmbeddedRuntime,
}

impl<'a> Bootstrap<'a> {
    pub fn new(
        provisioner: &'a dyn Provisioner,
        handoff: &'a dyn Handoff,
        runtime: &'a dyn EmbeddedRuntime,
    ) -> Self {
        Self {
            provisioner,
            handoff,
            runtime,
        }
    }

    /// Run to completion and return the exit status to propagate.
    pub fn run(&self, ctx: LaunchContext) -> Result<i32, BootError> {
        let result = self.drive(ctx);
        if let Err(e) = &result {
            transition(Phase::Failed);
            tracing::debug!(code = e.exit_code(), "bootstrap failed: {}", e);
        }
        result
    }

    fn drive(&self, ctx: LaunchContext) -> Result<i32, BootError> {
        let LaunchContext {
            argv,
            search_path,
            library_path,
            mut namespace,
            overrides,
        } = ctx;

        let outcome = namespace.init(&overrides);
        tracing::debug!(?outcome, staging = ?namespace.staging_dir, "namespace initialized");

        match namespace.staging_dir.clone() {
            None => {
                transition(Phase::Unstaged);
                self.stage_and_reexec(namespace, argv, &search_path, library_path.as_deref())
            }
            Some(dir) => {
                self.run_staged(namespace, argv, &dir, outcome, library_path.as_deref())
            }
        }
    }

    fn stage_and_reexec(
        &self,
        mut ns: Namespace,
        argv: Vec<OsString>,
        search_path: &str,
        library_path: Option<&str>,
    ) -> Result<i32, BootError> {
        transition(Phase::Staging);
        let clean = ns.is_clean();
        let staged = self
            .provisioner
            .create_and_extract(&argv, clean)
            .map_err(BootError::Staging)?;
        let guard = StagingGuard::new(&staged.path, clean);
        let dir = staged
            .path
            .to_str()
            .ok_or_else(|| {
                BootError::Staging(anyhow::anyhow!(
                    "staging path {} is not valid UTF-8",
                    staged.path.display()
                ))
            })?
            .to_string();
        tracing::debug!(dir = %dir, cache = ?staged.cache_key, "staging directory ready");
        ns.staging_dir = Some(dir.clone());
        ns.cache = staged.cache_key;

        transition(Phase::ReExecuting);
        let invoked = argv
            .first()
            .map(|a| a.to_string_lossy().into_owned())
            .unwrap_or_default();
        let program = find_program(&mut ns, &invoked, search_path);
        let markers = staging_markers(&dir);
        ns.record_markers(&invoked, &markers);
        let next_argv = inject(&argv, &markers);

        let mut env = ns.to_overlay();
        env.extend(&library_overlay(guard.path(), library_path).map_err(BootError::Staging)?);

        tracing::debug!(program = %program, strategy = self.handoff.name(), "handing off");
        let status = self
            .handoff
            .handoff(Path::new(&program), &next_argv, &env)
            .map_err(|source| BootError::Handoff {
                program: program.clone(),
                source,
            })?;
        drop(guard);
        Ok(status)
    }

    fn run_staged(
        &self,
        mut ns: Namespace,
        argv: Vec<OsString>,
        dir: &str,
        outcome: InitOutcome,
        library_path: Option<&str>,
    ) -> Result<i32, BootError> {
        let path = PathBuf::from(dir);
        ensure_dir(&path)?;
        if !path.is_dir() {
            return Err(BootError::Config(format!(
                "PAR_TEMP is required: {} is not a directory",
                dir
            )));
        }

        // A directory pre-seeded through PAR_GLOBAL_TEMP may still be empty.
        // A re-entered process never extracts.
        if outcome == InitOutcome::Fresh {
            let extracted = self
                .provisioner
                .populate(&path)
                .map_err(BootError::Staging)?;
            tracing::debug!(extracted, dir, "pre-seeded staging directory checked");
        }

        transition(Phase::Running);
        let guard = StagingGuard::new(&path, ns.is_clean());

        let argv = launder(argv, ns.markers.as_deref());
        ns.clear_markers();
        let mut env = ns.to_overlay();
        // Without a re-exec nothing else has put the staging dir on the
        // library path yet.
        if outcome == InitOutcome::Fresh {
            let lib = library_overlay(guard.path(), library_path).map_err(BootError::Staging)?;
            env.extend(&lib);
        }

        tracing::debug!(
            runtime = self.runtime.name(),
            clean = guard.is_clean(),
            "starting application"
        );
        let status = self
            .runtime
            .run(guard.path(), &argv, &env)
            .map_err(BootError::RuntimeLaunch)?;
        tracing::debug!(status, "application finished");
        drop(guard);
        Ok(status)
    }
}

fn transition(phase: Phase) {
    tracing::debug!(phase = %phase, "bootstrap phase");
}

/// Puts the staging directory first on the dynamic library search path of
/// the re-exec'd image.
fn library_overlay(dir: &Path, current: Option<&str>) -> anyhow::Result<EnvOverlay> {
    let mut overlay = EnvOverlay::new();
    overlay.set(platform::LIBRARY_PATH, prepend_search_path(dir, current)?);
    Ok(overlay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::StagedDir;
    use std::cell::{Cell, RefCell};

    struct NoProvisioner;

    impl Provisioner for NoProvisioner {
        fn create_and_extract(&self, _: &[OsString], _: bool) -> anyhow::Result<StagedDir> {
            anyhow::bail!("disk full")
        }
        fn populate(&self, _: &Path) -> anyhow::Result<bool> {
            anyhow::bail!("disk full")
        }
    }

    struct DirProvisioner {
        dir: PathBuf,
        populated: Cell<usize>,
    }

    impl Provisioner for DirProvisioner {
        fn create_and_extract(&self, _: &[OsString], _: bool) -> anyhow::Result<StagedDir> {
            std::fs::create_dir_all(&self.dir)?;
            Ok(StagedDir {
                path: self.dir.clone(),
                cache_key: None,
            })
        }
        fn populate(&self, _: &Path) -> anyhow::Result<bool> {
            self.populated.set(self.populated.get() + 1);
            Ok(true)
        }
    }

    struct FailingHandoff;

    impl Handoff for FailingHandoff {
        fn name(&self) -> &str {
            "failing"
        }
        fn handoff(&self, _: &Path, _: &[OsString], _: &EnvOverlay) -> std::io::Result<i32> {
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"))
        }
    }

    #[derive(Default)]
    struct RecordingRuntime {
        argv: RefCell<Vec<OsString>>,
        env: RefCell<EnvOverlay>,
    }

    impl EmbeddedRuntime for RecordingRuntime {
        fn name(&self) -> &str {
            "recording"
        }
        fn run(&self, _: &Path, argv: &[OsString], env: &EnvOverlay) -> anyhow::Result<i32> {
            *self.argv.borrow_mut() = argv.to_vec();
            *self.env.borrow_mut() = env.clone();
            Ok(42)
        }
    }

    fn ctx(argv: &[&str], ns: Namespace, overrides: GlobalOverrides) -> LaunchContext {
        LaunchContext {
            argv: argv.iter().map(OsString::from).collect(),
            search_path: String::new(),
            library_path: None,
            namespace: ns,
            overrides,
        }
    }

    #[test]
    fn test_staging_failure_is_fatal() {
        let rt = RecordingRuntime::default();
        let boot = Bootstrap::new(&NoProvisioner, &FailingHandoff, &rt);
        let err = boot
            .run(ctx(&["app"], Namespace::default(), GlobalOverrides::default()))
            .unwrap_err();
        assert_eq!(err.exit_code(), BootError::EXIT_STAGING);
    }

    #[test]
    fn test_handoff_failure_has_its_own_code_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("stage");
        let prov = DirProvisioner {
            dir: dir.clone(),
            populated: Cell::new(0),
        };
        let rt = RecordingRuntime::default();
        let boot = Bootstrap::new(&prov, &FailingHandoff, &rt);
        let overrides = GlobalOverrides {
            clean: Some("1".into()),
            ..GlobalOverrides::default()
        };
        let err = boot
            .run(ctx(&["app"], Namespace::default(), overrides))
            .unwrap_err();
        assert_eq!(err.exit_code(), BootError::EXIT_HANDOFF);
        assert!(!dir.exists(), "clean staging dir must be removed on failure");
    }

    #[test]
    fn test_global_temp_skips_reexec_and_populates() {
        let tmp = tempfile::tempdir().unwrap();
        let shared = tmp.path().join("shared");
        let prov = DirProvisioner {
            dir: tmp.path().join("unused"),
            populated: Cell::new(0),
        };
        let rt = RecordingRuntime::default();
        let boot = Bootstrap::new(&prov, &FailingHandoff, &rt);
        let overrides = GlobalOverrides {
            temp: Some(shared.to_string_lossy().to_string()),
            clean: Some("1".into()),
            ..GlobalOverrides::default()
        };

        let code = boot
            .run(ctx(&["app", "a"], Namespace::default(), overrides))
            .unwrap();
        assert_eq!(code, 42);
        assert!(shared.is_dir(), "shared dir is created and kept");
        assert_eq!(prov.populated.get(), 1);
        assert_eq!(*rt.argv.borrow(), vec![OsString::from("app"), OsString::from("a")]);
        assert_eq!(
            rt.env.borrow().get(platform::LIBRARY_PATH),
            Some(Some(shared.to_string_lossy().as_ref()))
        );
    }

    #[test]
    fn test_reentered_process_does_not_populate() {
        let tmp = tempfile::tempdir().unwrap();
        let stage = tmp.path().join("stage");
        std::fs::create_dir_all(&stage).unwrap();
        let prov = DirProvisioner {
            dir: tmp.path().join("unused"),
            populated: Cell::new(0),
        };
        let rt = RecordingRuntime::default();
        let boot = Bootstrap::new(&prov, &FailingHandoff, &rt);

        let mut ns = Namespace::default();
        ns.initialized = Some("1".into());
        ns.staging_dir = Some(stage.to_string_lossy().to_string());
        ns.record_markers("app", &staging_markers(&stage.to_string_lossy()));

        let stage_str = stage.to_string_lossy().to_string();
        let argv = ["app", "--par-staging", stage_str.as_str(), "--flag"];
        let code = boot.run(ctx(&argv, ns, GlobalOverrides::default())).unwrap();
        assert_eq!(code, 42);
        assert_eq!(prov.populated.get(), 0);
        assert_eq!(
            *rt.argv.borrow(),
            vec![OsString::from("app"), OsString::from("--flag")]
        );
        assert_eq!(rt.env.borrow().get("PAR_ARGC"), Some(None));
        assert_eq!(rt.env.borrow().get(platform::LIBRARY_PATH), None);
    }

    #[test]
    fn test_staging_path_that_is_a_file_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let rt = RecordingRuntime::default();
        let boot = Bootstrap::new(&NoProvisioner, &FailingHandoff, &rt);

        let mut ns = Namespace::default();
        ns.initialized = Some("1".into());
        ns.staging_dir = Some(file.to_string_lossy().to_string());
        let err = boot
            .run(ctx(&["app"], ns, GlobalOverrides::default()))
            .unwrap_err();
        assert_eq!(err.exit_code(), BootError::EXIT_CONFIG);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::ReExecuting.to_string(), "RE-EXECUTING");
        assert_eq!(Phase::Unstaged.to_string(), "UNSTAGED");
    }
}
