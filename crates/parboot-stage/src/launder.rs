//! Argument laundering across the re-exec boundary.
//!
//! Before re-exec the bootstrap inserts marker arguments right after `argv[0]`
//! and echoes them through `PAR_ARGC` / `PAR_ARGV_n`. The re-entered process
//! strips them again so the application sees the user's argument vector.

use std::ffi::OsString;

/// First marker argument; the staging directory follows it.
pub const STAGING_FLAG: &str = "--par-staging";

/// Markers recorded for a re-exec into `staging_dir`.
pub fn staging_markers(staging_dir: &str) -> Vec<String> {
    vec![STAGING_FLAG.to_string(), staging_dir.to_string()]
}

/// `argv[0]`, then `markers`, then the rest of `argv`.
pub fn inject(argv: &[OsString], markers: &[String]) -> Vec<OsString> {
    let mut out = Vec::with_capacity(argv.len() + markers.len());
    out.extend(argv.first().cloned());
    out.extend(markers.iter().map(OsString::from));
    out.extend(argv.iter().skip(1).cloned());
    out
}

/// Remove `markers` from position 1 of `argv` if and only if they match
/// position for position. On mismatch the vector is returned untouched.
pub fn launder(argv: Vec<OsString>, markers: Option<&[String]>) -> Vec<OsString> {
    let markers = match markers {
        Some(m) if !m.is_empty() => m,
        _ => return argv,
    };

    let matches = argv.len() > markers.len()
        && argv[1..=markers.len()]
            .iter()
            .zip(markers)
            .all(|(arg, marker)| arg.as_os_str() == marker.as_str());

    if !matches {
        tracing::warn!(
            expected = markers.len(),
            "bootstrap arguments not found where expected, leaving argv untouched"
        );
        return argv;
    }

    let mut argv = argv;
    argv.drain(1..=markers.len());
    argv
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(args: &[&str]) -> Vec<OsString> {
        args.iter().map(OsString::from).collect()
    }

    #[test]
    fn test_inject_then_launder_recovers_original() {
        let original = os(&["prog", "--flag", "x"]);
        let markers = vec!["--staging".to_string(), "/tmp/xyz".to_string()];
        let injected = inject(&original, &markers);
        assert_eq!(injected, os(&["prog", "--staging", "/tmp/xyz", "--flag", "x"]));
        assert_eq!(launder(injected, Some(markers.as_slice())), original);
    }

    #[test]
    fn test_altered_prefix_is_left_alone() {
        let markers = vec!["--staging".to_string(), "/tmp/xyz".to_string()];
        let altered = os(&["prog", "--staging", "/tmp/other", "--flag"]);
        assert_eq!(launder(altered.clone(), Some(markers.as_slice())), altered);
    }

    #[test]
    fn test_missing_prefix_is_left_alone() {
        let markers = staging_markers("/tmp/xyz");
        let plain = os(&["prog", "--flag", "x"]);
        assert_eq!(launder(plain.clone(), Some(markers.as_slice())), plain);

        let short = os(&["prog", STAGING_FLAG]);
        assert_eq!(launder(short.clone(), Some(markers.as_slice())), short);
    }

    #[test]
    fn test_no_markers_recorded() {
        let argv = os(&["prog", "--par-staging", "/tmp/xyz"]);
        assert_eq!(launder(argv.clone(), None), argv);
        assert_eq!(launder(argv.clone(), Some(&[][..])), argv);
    }

    #[test]
    fn test_user_args_equal_to_markers_survive() {
        let markers = staging_markers("/tmp/xyz");
        let original = os(&["prog", STAGING_FLAG, "/tmp/xyz"]);
        let laundered = launder(inject(&original, &markers), Some(markers.as_slice()));
        assert_eq!(laundered, original);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_user_args_are_preserved() {
        use std::os::unix::ffi::OsStringExt;
        let raw = OsString::from_vec(vec![0x66, 0xff, 0x6f]);
        let original = vec![OsString::from("prog"), raw];
        let markers = staging_markers("/tmp/xyz");
        assert_eq!(launder(inject(&original, &markers), Some(markers.as_slice())), original);
    }
}
