//! Environment variable loading helpers.
//!
//! All reads of the real process environment go through here so the rest of
//! the crate works on captured values.

use std::env;

/// Raw value of `key`. Present-but-empty stays `Some("")`; non-UTF-8 counts as absent.
pub fn env_raw(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Read from the primary variable or its aliases; empty values count as unset.
pub fn env_optional(primary: &str, aliases: &[&str]) -> Option<String> {
    env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()))
        .and_then(|s| {
            let s = s.trim().to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        })
}

/// Read from the primary variable or its aliases, falling back to `default`.
pub fn env_or<F>(primary: &str, aliases: &[&str], default: F) -> String
where
    F: FnOnce() -> String,
{
    env_optional(primary, aliases).unwrap_or_else(default)
}

/// Parse a boolean variable: 0/false/no/off are false, anything else true.
pub fn env_bool(primary: &str, aliases: &[&str], default: bool) -> bool {
    let v = env::var(primary)
        .ok()
        .or_else(|| aliases.iter().find_map(|a| env::var(a).ok()));
    match v.as_deref() {
        Some(s) => !matches!(
            s.trim().to_lowercase().as_str(),
            "0" | "false" | "no" | "off"
        ),
        None => default,
    }
}

/// `PAR_*` truthiness: absent, empty, or exactly `"0"` is false.
pub fn is_truthy(value: Option<&str>) -> bool {
    !matches!(value, None | Some("") | Some("0"))
}

// ─── Centralized env::set_var / remove_var ──────────────────────────────────
//
// Callers must run these before any threads are started.

/// Set a single environment variable.
#[allow(unsafe_code)]
pub fn set_env_var(key: &str, value: &str) {
    unsafe { env::set_var(key, value) };
}

/// Remove a single environment variable.
#[allow(unsafe_code)]
pub fn remove_env_var(key: &str) {
    unsafe { env::remove_var(key) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_truthy() {
        assert!(!is_truthy(None));
        assert!(!is_truthy(Some("")));
        assert!(!is_truthy(Some("0")));
        assert!(is_truthy(Some("1")));
        assert!(is_truthy(Some("yes")));
    }

    #[test]
    fn test_env_raw_distinguishes_empty_from_absent() {
        set_env_var("PARBOOT_TEST_LOADER_EMPTY", "");
        assert_eq!(env_raw("PARBOOT_TEST_LOADER_EMPTY").as_deref(), Some(""));
        assert_eq!(env_optional("PARBOOT_TEST_LOADER_EMPTY", &[]), None);
        remove_env_var("PARBOOT_TEST_LOADER_EMPTY");
        assert_eq!(env_raw("PARBOOT_TEST_LOADER_EMPTY"), None);
    }
}
