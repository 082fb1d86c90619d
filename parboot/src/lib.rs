//! parboot library: shared by the `parboot` launcher and `parboot-pack`.

pub mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::PackCli;
use parboot_core::config::is_truthy;
use parboot_core::observability::{init_tracing, TracingMode};
use parboot_stage::payload::{build_payload, sidecar_path, write_self_extracting, Manifest};
use parboot_stage::{
    platform_handoff, ArchiveProvisioner, Bootstrap, InterpreterRuntime, LaunchContext,
};
use std::path::{Path, PathBuf};

/// Launcher entry point. Returns the process exit status.
pub fn run_launcher() -> i32 {
    let ctx = LaunchContext::from_env();
    init_tracing(tracing_mode(&ctx));

    let provisioner = ArchiveProvisioner::default();
    let handoff = platform_handoff();
    let runtime = InterpreterRuntime::new();

    match Bootstrap::new(&provisioner, handoff.as_ref(), &runtime).run(ctx) {
        Ok(status) => status,
        Err(e) => {
            eprintln!("parboot: {}", e);
            e.exit_code()
        }
    }
}

/// `PAR_DEBUG` of an already initialized namespace wins; a first invocation
/// looks at `PAR_GLOBAL_DEBUG`, which `init()` is about to copy in.
fn tracing_mode(ctx: &LaunchContext) -> TracingMode {
    let debug = if ctx.namespace.is_initialized() {
        ctx.namespace.is_debug()
    } else {
        is_truthy(ctx.overrides.debug.as_deref())
    };
    if debug {
        TracingMode::Debug
    } else {
        TracingMode::Default
    }
}

/// Run the packer CLI.
pub fn run_pack_cli() -> Result<()> {
    init_tracing(TracingMode::Default);
    let cli = PackCli::parse();
    let output = pack(&cli)?;
    println!("{}", output.display());
    Ok(())
}

/// Build the executable described by `cli` and return the path written.
pub fn pack(cli: &PackCli) -> Result<PathBuf> {
    let launcher = match &cli.launcher {
        Some(p) => p.clone(),
        None => default_launcher()?,
    };
    if !launcher.is_file() {
        anyhow::bail!("launcher {} not found", launcher.display());
    }
    if !cli.app_dir.is_dir() {
        anyhow::bail!("application directory {} not found", cli.app_dir.display());
    }

    let manifest = Manifest {
        entry: cli.entry.clone(),
        interpreter: cli.interpreter.clone(),
        lib_var: cli.lib_var.clone(),
        interpreter_args: cli.interpreter_args.clone(),
    };
    let payload = build_payload(&cli.app_dir, &manifest)?;
    tracing::debug!(
        app_dir = %cli.app_dir.display(),
        bytes = payload.len(),
        "payload built"
    );

    if cli.sidecar {
        write_sidecar(&launcher, &payload, &cli.output)?;
    } else {
        write_self_extracting(&launcher, &payload, &cli.output)?;
    }
    Ok(cli.output.clone())
}

fn write_sidecar(launcher: &Path, payload: &[u8], output: &Path) -> Result<()> {
    std::fs::copy(launcher, output)
        .with_context(|| format!("Copy {} to {}", launcher.display(), output.display()))?;
    let sidecar = sidecar_path(output);
    std::fs::write(&sidecar, payload).with_context(|| format!("Write {}", sidecar.display()))?;
    Ok(())
}

/// `parboot` next to the running `parboot-pack`.
fn default_launcher() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("Cannot locate parboot-pack")?;
    let dir = exe.parent().context("parboot-pack has no parent directory")?;
    Ok(dir.join(format!("parboot{}", std::env::consts::EXE_SUFFIX)))
}
