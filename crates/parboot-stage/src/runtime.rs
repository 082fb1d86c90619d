//! Embedded runtime adapter.
//!
//! The bootstrap treats the script runtime as a black box: it is handed a
//! program path, an argument vector and an environment, and returns an exit
//! status. [`InterpreterRuntime`] runs the interpreter named by the payload
//! manifest with `<staging>/lib` on its module search path.

use anyhow::{Context, Result};
use parboot_core::config::{env_raw, EnvOverlay};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::handoff::exit_code;
use crate::payload::{Manifest, LIB_DIR};

/// Extension point for the runtime that executes the staged application.
pub trait EmbeddedRuntime {
    /// Runtime name for logging.
    fn name(&self) -> &str;

    /// Run the application staged in `staging_dir`. `argv[0]` is the name the
    /// user invoked; the rest are the application's arguments.
    fn run(&self, staging_dir: &Path, argv: &[OsString], env: &EnvOverlay) -> Result<i32>;
}

/// Runs `<interpreter> [interpreter_args] <staging>/<entry> argv[1..]`.
#[derive(Debug, Clone, Default)]
pub struct InterpreterRuntime {
    /// Replaces the manifest's interpreter when set.
    pub interpreter_override: Option<PathBuf>,
}

impl InterpreterRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interpreter(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            interpreter_override: Some(interpreter.into()),
        }
    }

    /// Bundled interpreter if the manifest names a file inside the staging
    /// directory, otherwise the bare name for a PATH lookup.
    pub fn resolve_interpreter(&self, staging_dir: &Path, manifest: &Manifest) -> PathBuf {
        if let Some(p) = &self.interpreter_override {
            return p.clone();
        }
        let bundled = staging_dir.join(&manifest.interpreter);
        if bundled.is_file() {
            bundled
        } else {
            PathBuf::from(&manifest.interpreter)
        }
    }

    /// Launch `program` under `interpreter`.
    pub fn launch(
        &self,
        interpreter: &Path,
        interpreter_args: &[String],
        program: &Path,
        argv: &[OsString],
        env: &EnvOverlay,
    ) -> Result<i32> {
        let mut cmd = Command::new(interpreter);
        cmd.args(interpreter_args)
            .arg(program)
            .args(argv.iter().skip(1));
        env.apply_to(&mut cmd);

        tracing::debug!(
            interpreter = %interpreter.display(),
            program = %program.display(),
            "starting embedded runtime"
        );
        let status = cmd
            .status()
            .with_context(|| format!("Start interpreter {}", interpreter.display()))?;
        Ok(exit_code(status))
    }
}

impl EmbeddedRuntime for InterpreterRuntime {
    fn name(&self) -> &str {
        "interpreter"
    }

    fn run(&self, staging_dir: &Path, argv: &[OsString], env: &EnvOverlay) -> Result<i32> {
        let manifest = Manifest::load(staging_dir)?;
        let interpreter = self.resolve_interpreter(staging_dir, &manifest);
        let program = staging_dir.join(&manifest.entry);

        let mut env = env.clone();
        if let Some(var) = &manifest.lib_var {
            let lib = staging_dir.join(LIB_DIR);
            env.set(var.as_str(), prepend_search_path(&lib, env_raw(var).as_deref())?);
        }

        self.launch(
            &interpreter,
            &manifest.interpreter_args,
            &program,
            argv,
            &env,
        )
    }
}

/// `dir` followed by `existing` (if any), joined with the platform list separator.
pub fn prepend_search_path(dir: &Path, existing: Option<&str>) -> Result<String> {
    let mut parts: Vec<PathBuf> = vec![dir.to_path_buf()];
    if let Some(existing) = existing.filter(|s| !s.is_empty()) {
        parts.extend(std::env::split_paths(OsStr::new(existing)));
    }
    let joined = std::env::join_paths(parts).context("Build search path")?;
    joined
        .into_string()
        .map_err(|_| anyhow::anyhow!("search path is not valid UTF-8"))
}
