//! Handoff: run the re-exec image with the staged environment.
//!
//! - Unix: [`ExecHandoff`] replaces the current process; it only returns on error.
//! - Elsewhere: [`SpawnHandoff`] starts a child, waits, and returns its status.

use parboot_core::config::{env_keys::namespace as keys, EnvOverlay};
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::{Command, ExitStatus};

/// Extension point for handing control to the next process image.
pub trait Handoff {
    /// Strategy name for logging.
    fn name(&self) -> &str;

    /// Start `program` with `argv` (argv[0] included) and the current
    /// environment amended by `env`. Returns the exit status to propagate.
    fn handoff(&self, program: &Path, argv: &[OsString], env: &EnvOverlay) -> io::Result<i32>;
}

/// Replace the current process image (`execvp` semantics).
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecHandoff;

#[cfg(unix)]
impl Handoff for ExecHandoff {
    fn name(&self) -> &str {
        "exec"
    }

    fn handoff(&self, program: &Path, argv: &[OsString], env: &EnvOverlay) -> io::Result<i32> {
        use std::os::unix::process::CommandExt;

        let mut cmd = command(program, argv, env);
        if let Some(arg0) = argv.first() {
            cmd.arg0(arg0);
        }
        tracing::debug!(program = %program.display(), "replacing process image");
        // `exec` only returns on failure.
        Err(cmd.exec())
    }
}

/// Spawn a child and wait for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnHandoff;

impl Handoff for SpawnHandoff {
    fn name(&self) -> &str {
        "spawn"
    }

    fn handoff(&self, program: &Path, argv: &[OsString], env: &EnvOverlay) -> io::Result<i32> {
        let mut cmd = command(program, argv, env);
        cmd.env(keys::SPAWNED, "1");
        tracing::debug!(program = %program.display(), "spawning child and waiting");
        let status = cmd.status()?;
        Ok(exit_code(status))
    }
}

fn command(program: &Path, argv: &[OsString], env: &EnvOverlay) -> Command {
    let mut cmd = Command::new(program);
    cmd.args(argv.iter().skip(1));
    env.apply_to(&mut cmd);
    cmd
}

/// Handoff strategy for the build target.
pub fn platform_handoff() -> Box<dyn Handoff> {
    #[cfg(unix)]
    return Box::new(ExecHandoff);
    #[cfg(not(unix))]
    return Box::new(SpawnHandoff);
}

/// Exit status as an integer; death by signal maps to `128 + signal` on Unix.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(sig) = status.signal() {
            return 128 + sig;
        }
    }
    -1
}
