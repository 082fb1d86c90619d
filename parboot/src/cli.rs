use clap::Parser;
use std::path::PathBuf;

/// parboot-pack - build a self-extracting executable from an application directory
#[derive(Parser, Debug, Clone)]
#[command(name = "parboot-pack")]
#[command(author, version, about, long_about = None)]
pub struct PackCli {
    /// Launcher stub to prepend (default: the `parboot` binary next to this one)
    #[arg(long, value_name = "PATH", env = "PARBOOT_LAUNCHER")]
    pub launcher: Option<PathBuf>,

    /// Directory whose contents become the staged application
    #[arg(long, value_name = "DIR")]
    pub app_dir: PathBuf,

    /// Entry script, relative to the application directory
    #[arg(long, value_name = "REL_PATH")]
    pub entry: String,

    /// Interpreter: a path inside the application directory or a name on PATH
    #[arg(long, value_name = "NAME")]
    pub interpreter: String,

    /// Module search path variable that gets `<staging>/lib` prepended (e.g. PERL5LIB)
    #[arg(long, value_name = "NAME")]
    pub lib_var: Option<String>,

    /// Extra interpreter argument placed before the entry script (repeatable)
    #[arg(long = "interpreter-arg", value_name = "ARG")]
    pub interpreter_args: Vec<String>,

    /// Write the payload as `<output>.par` next to a copy of the launcher
    #[arg(long, default_value = "false")]
    pub sidecar: bool,

    /// Output executable
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,
}
