//! Program locator: resolve the invoked name to the real executable on disk.
//!
//! Mirrors a shell's PATH search with one twist: the staging directory is
//! never a candidate, so a copy of the launcher left there by an earlier run
//! cannot shadow the real binary.

use crate::config::Namespace;
use crate::path_util::{has_separator, join_bounded, strip_trailing_separators};

/// Separator between entries of a search path.
#[cfg(windows)]
pub const LIST_SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const LIST_SEPARATOR: char = ':';

/// Resolve `invoked` against `search_path` and record the result in
/// `ns.progname`.
///
/// Never fails: a name with a separator is returned as is, and when no
/// candidate matches (or a candidate path would be too long) the unresolved
/// name is returned for the OS exec search to handle.
pub fn find_program(ns: &mut Namespace, invoked: &str, search_path: &str) -> String {
    let resolved = resolve(ns.staging_dir.as_deref(), invoked, search_path);
    ns.progname = Some(resolved.clone());
    resolved
}

fn resolve(staging_dir: Option<&str>, invoked: &str, search_path: &str) -> String {
    if has_separator(invoked) {
        return invoked.to_string();
    }

    let staging = staging_dir.map(strip_trailing_separators);

    for entry in search_path.split(LIST_SEPARATOR) {
        let dir = if entry.is_empty() { "." } else { entry };

        if staging.is_some_and(|s| s == strip_trailing_separators(dir)) {
            tracing::debug!(dir, "skipping staging directory in search path");
            continue;
        }

        let candidate = match join_bounded(dir, invoked) {
            Ok(c) => c,
            Err(_) => {
                tracing::debug!(dir, invoked, "candidate path too long, using invoked name");
                return invoked.to_string();
            }
        };

        if is_executable_file(&candidate) {
            tracing::debug!(program = %candidate, "resolved program");
            return candidate;
        }
    }

    tracing::debug!(invoked, "program not found in search path");
    invoked.to_string()
}

/// Regular file the current user may execute.
#[cfg(unix)]
pub fn is_executable_file(path: &str) -> bool {
    use nix::unistd::{access, AccessFlags};

    match std::fs::metadata(path) {
        Ok(meta) if meta.is_file() => access(path, AccessFlags::X_OK).is_ok(),
        _ => false,
    }
}

/// Regular file; Windows has no execute bit.
#[cfg(not(unix))]
pub fn is_executable_file(path: &str) -> bool {
    std::fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}
