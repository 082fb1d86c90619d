//! String-level path helpers: basename, dirname, trailing separator handling.
//!
//! These work on `&str` with the platform separator set (`/` on Unix, `\` and
//! `/` on Windows) and never touch the filesystem. They return slices of the
//! input (or static strings), so callers' strings are never modified.
//!
//! Trailing separator convention: a trailing separator does not start an empty
//! final component. `basename("/usr/lib/")` is `"lib"`, the same as
//! `basename("/usr/lib")`.

use std::path::{is_separator, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};

/// Upper bound for any path this crate builds. Matches Linux `PATH_MAX`.
pub const MAX_PATH_LEN: usize = 4096;

/// A computed path would not fit in `MAX_PATH_LEN` bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("path exceeds {} bytes", MAX_PATH_LEN)]
pub struct PathTooLong;

fn is_sep(b: u8) -> bool {
    b.is_ascii() && is_separator(b as char)
}

/// Strip trailing separators. A path made only of separators keeps one
/// (`"///"` becomes `"/"`); the empty string stays empty.
pub fn strip_trailing_separators(path: &str) -> &str {
    let bytes = path.as_bytes();
    let mut end = bytes.len();
    while end > 1 && is_sep(bytes[end - 1]) {
        end -= 1;
    }
    &path[..end]
}

/// Final component of `path`.
///
/// - no separator: the whole input
/// - `""`: `""`
/// - only separators: the root separator
pub fn basename(path: &str) -> &str {
    let trimmed = strip_trailing_separators(path);
    if trimmed.len() == 1 && is_sep(trimmed.as_bytes()[0]) {
        return MAIN_SEPARATOR_STR;
    }
    match trimmed.bytes().rposition(is_sep) {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

/// Everything before the final component of `path`.
///
/// - `""` or no separator: `"."`
/// - the root separator (or a component directly under it): the root separator
/// - a result longer than `MAX_PATH_LEN - 1` bytes: `Err(PathTooLong)`
pub fn dirname(path: &str) -> Result<&str, PathTooLong> {
    let bytes = path.as_bytes();
    if bytes.is_empty() {
        return Ok(".");
    }

    let mut end = bytes.len() - 1;
    while end > 0 && is_sep(bytes[end]) {
        end -= 1;
    }
    while end > 0 && !is_sep(bytes[end]) {
        end -= 1;
    }

    if end == 0 {
        return Ok(if is_sep(bytes[0]) { MAIN_SEPARATOR_STR } else { "." });
    }

    // Collapse the separator run between the directory and the final component.
    loop {
        end -= 1;
        if end == 0 || !is_sep(bytes[end]) {
            break;
        }
    }

    if end + 2 > MAX_PATH_LEN {
        return Err(PathTooLong);
    }
    Ok(&path[..=end])
}

/// `dirname` for an optional input; absent behaves like `""`.
pub fn dirname_opt(path: Option<&str>) -> Result<&str, PathTooLong> {
    dirname(path.unwrap_or(""))
}

/// Join `dir` and `name` with one separator, checked against `MAX_PATH_LEN`.
/// `dir` is stripped of trailing separators first; an empty `dir` means `"."`.
pub fn join_bounded(dir: &str, name: &str) -> Result<String, PathTooLong> {
    let dir = if dir.is_empty() { "." } else { strip_trailing_separators(dir) };
    let root_only = dir.len() == 1 && is_sep(dir.as_bytes()[0]);
    let sep_len = usize::from(!root_only);
    if dir.len() + sep_len + name.len() >= MAX_PATH_LEN {
        return Err(PathTooLong);
    }
    let mut out = String::with_capacity(dir.len() + sep_len + name.len());
    out.push_str(dir);
    if !root_only {
        out.push(MAIN_SEPARATOR);
    }
    out.push_str(name);
    Ok(out)
}

/// True when `name` contains any path separator.
pub fn has_separator(name: &str) -> bool {
    name.bytes().any(is_sep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basename_plain_paths() {
        assert_eq!(basename("/usr/lib/perl"), "perl");
        assert_eq!(basename("prog"), "prog");
        assert_eq!(basename(""), "");
    }

    #[cfg(unix)]
    #[test]
    fn test_basename_trailing_separator_is_ignored() {
        assert_eq!(basename("/usr/lib/"), "lib");
        assert_eq!(basename("/usr/lib//"), "lib");
        assert_eq!(basename("/"), "/");
        assert_eq!(basename("///"), "/");
    }

    #[cfg(unix)]
    #[test]
    fn test_dirname_posix_cases() {
        assert_eq!(dirname("/usr/lib"), Ok("/usr"));
        assert_eq!(dirname("/usr/lib/"), Ok("/usr"));
        assert_eq!(dirname("a//b"), Ok("a"));
        assert_eq!(dirname("/usr"), Ok("/"));
        assert_eq!(dirname("/"), Ok("/"));
        assert_eq!(dirname("//"), Ok("/"));
        assert_eq!(dirname("usr/"), Ok("."));
    }

    #[test]
    fn test_dirname_degenerate_inputs() {
        assert_eq!(dirname(""), Ok("."));
        assert_eq!(dirname_opt(None), Ok("."));
        assert_eq!(dirname("prog"), Ok("."));
    }

    #[cfg(unix)]
    #[test]
    fn test_dirname_reaches_fixed_point() {
        for p in ["/a/b/c", "a/b/c", "/", "prog", ""] {
            let mut cur = p.to_string();
            for _ in 0..5 {
                cur = dirname(&cur).unwrap().to_string();
            }
            let again = dirname(&cur).unwrap();
            assert_eq!(again, cur, "dirname not stable for {p:?}");
            assert!(cur == "/" || cur == ".");
        }
    }

    #[test]
    fn test_dirname_too_long_is_reported() {
        let long = format!("{}/x", "d".repeat(MAX_PATH_LEN));
        assert_eq!(dirname(&long), Err(PathTooLong));
    }

    #[test]
    fn test_no_separator_invariants() {
        for p in ["prog", "perl5.36", "a-b_c"] {
            assert_eq!(basename(p), p);
            assert_eq!(dirname(p), Ok("."));
            assert!(!has_separator(p));
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_join_bounded() {
        assert_eq!(join_bounded("/usr/bin/", "perl").unwrap(), "/usr/bin/perl");
        assert_eq!(join_bounded("/", "perl").unwrap(), "/perl");
        assert_eq!(join_bounded("", "perl").unwrap(), "./perl");
        assert!(join_bounded(&"d".repeat(MAX_PATH_LEN), "perl").is_err());
    }

    #[test]
    fn test_strip_trailing_separators_keeps_input_intact() {
        let original = String::from("/tmp/par/");
        let stripped = strip_trailing_separators(&original);
        assert_eq!(stripped, "/tmp/par");
        assert_eq!(original, "/tmp/par/");
        assert_eq!(strip_trailing_separators(""), "");
    }
}
