//! The `PAR_*` environment namespace as an explicit struct.
//!
//! The namespace is captured from the environment once at process start,
//! mutated in memory by the bootstrap, and turned back into an [`EnvOverlay`]
//! when a child process or the re-exec'd image needs to see it.

use std::cell::OnceCell;
use std::process::Command;

use super::env_keys::{global, namespace as keys};
use super::loader::{self, is_truthy};

/// Value stored in `PAR_INITIALIZED` once `init()` has completed.
pub const INITIALIZED_TRUE: &str = "1";

/// Clean default baked in at build time (`PARBOOT_DEFAULT_CLEAN=1 cargo build`).
pub const BUILTIN_DEFAULT_CLEAN: Option<&str> = option_env!("PARBOOT_DEFAULT_CLEAN");

/// Upper bound on `PAR_ARGV_n` slots read back; `PAR_ARGC` itself is untrusted.
pub const MAX_MARKERS: usize = 64;

/// Ordered set/unset instructions for an environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverlay {
    entries: Vec<(String, Option<String>)>,
}

impl EnvOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.push(key.into(), Some(value.into()));
    }

    pub fn unset(&mut self, key: impl Into<String>) {
        self.push(key.into(), None);
    }

    fn push(&mut self, key: String, value: Option<String>) {
        self.entries.retain(|(k, _)| *k != key);
        self.entries.push((key, value));
    }

    /// Value the overlay assigns to `key`: `None` if untouched,
    /// `Some(None)` if unset, `Some(Some(v))` if set.
    pub fn get(&self, key: &str) -> Option<Option<&str>> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn extend(&mut self, other: &EnvOverlay) {
        for (k, v) in other.iter() {
            self.push(k.to_string(), v.map(str::to_string));
        }
    }

    /// Apply on top of the environment a `Command` inherits.
    pub fn apply_to(&self, cmd: &mut Command) {
        for (k, v) in self.iter() {
            match v {
                Some(v) => cmd.env(k, v),
                None => cmd.env_remove(k),
            };
        }
    }
}

/// Global overrides, consulted only by [`Namespace::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalOverrides {
    pub debug: Option<String>,
    pub temp: Option<String>,
    pub clean: Option<String>,
    /// Fallback for `PAR_CLEAN` when neither `temp` nor `clean` is given.
    pub builtin_clean: Option<String>,
}

impl GlobalOverrides {
    pub fn from_env() -> Self {
        Self::from_lookup(loader::env_raw)
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            debug: get(global::DEBUG),
            temp: get(global::TEMP),
            clean: get(global::CLEAN),
            builtin_clean: BUILTIN_DEFAULT_CLEAN.map(str::to_string),
        }
    }
}

/// Whether `init()` did any work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// `PAR_INITIALIZED` was already true; nothing was touched.
    AlreadyInitialized,
    /// Namespace was reset and seeded from the overrides.
    Fresh,
}

/// In-memory copy of the `PAR_*` keys. `None` means "not present",
/// distinct from `Some("")`.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    pub initialized: Option<String>,
    pub staging_dir: Option<String>,
    pub clean: Option<String>,
    pub debug: Option<String>,
    pub cache: Option<String>,
    pub progname: Option<String>,
    pub spawned: Option<String>,
    /// Echo of the invoked program name (`PAR_ARGV_0`).
    pub argv0: Option<String>,
    /// Synthetic marker arguments; `None` when `PAR_ARGC` is absent.
    pub markers: Option<Vec<String>>,
    /// Highest `PAR_ARGV_n` slot seen at capture, so export can clear it.
    captured_marker_slots: usize,
    clean_flag: OnceCell<bool>,
}

impl Namespace {
    /// Capture from the real process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(loader::env_raw)
    }

    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let argc = get(keys::ARGC);
        let count = argc
            .as_deref()
            .and_then(|s| s.trim().parse::<usize>().ok());
        let markers = match (argc.as_ref(), count) {
            (Some(_), Some(n)) => {
                let mut values = Vec::new();
                for i in 1..=n.min(MAX_MARKERS) {
                    match get(&keys::argv_key(i)) {
                        Some(v) => values.push(v),
                        None => break,
                    }
                }
                Some(values)
            }
            // Unparseable count: keep it present but with nothing to match.
            (Some(_), None) => Some(Vec::new()),
            (None, _) => None,
        };
        let captured_marker_slots = markers.as_ref().map_or(0, Vec::len);

        Self {
            initialized: get(keys::INITIALIZED),
            staging_dir: get(keys::TEMP),
            clean: get(keys::CLEAN),
            debug: get(keys::DEBUG),
            cache: get(keys::CACHE),
            progname: get(keys::PROGNAME),
            spawned: get(keys::SPAWNED),
            argv0: get(&keys::argv_key(0)),
            captured_marker_slots,
            markers,
            clean_flag: OnceCell::new(),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.as_deref() == Some(INITIALIZED_TRUE)
    }

    /// Clear every namespace key.
    pub fn reset(&mut self) {
        self.initialized = None;
        self.staging_dir = None;
        self.clean = None;
        self.debug = None;
        self.cache = None;
        self.progname = None;
        self.spawned = None;
        self.argv0 = None;
        self.markers = None;
    }

    /// Idempotent initialization.
    ///
    /// When `PAR_INITIALIZED` is already `"1"` nothing changes: a re-exec'd
    /// child must keep the staging directory its parent recorded. Otherwise the
    /// namespace is reset and seeded: global debug first, then the global
    /// staging dir, or (only when that is absent) the global clean flag, or
    /// the built-in clean default.
    pub fn init(&mut self, overrides: &GlobalOverrides) -> InitOutcome {
        if self.is_initialized() {
            return InitOutcome::AlreadyInitialized;
        }

        self.reset();

        if let Some(debug) = &overrides.debug {
            self.debug = Some(debug.clone());
        }

        if let Some(temp) = &overrides.temp {
            self.staging_dir = Some(temp.clone());
        } else if let Some(clean) = &overrides.clean {
            self.clean = Some(clean.clone());
        } else if let Some(clean) = &overrides.builtin_clean {
            self.clean = Some(clean.clone());
        }

        self.initialized = Some(INITIALIZED_TRUE.to_string());
        InitOutcome::Fresh
    }

    /// `PAR_CLEAN` as a boolean. Read once; later changes to `clean` are not seen.
    pub fn is_clean(&self) -> bool {
        *self
            .clean_flag
            .get_or_init(|| is_truthy(self.clean.as_deref()))
    }

    pub fn is_debug(&self) -> bool {
        is_truthy(self.debug.as_deref())
    }

    pub fn record_markers(&mut self, argv0: &str, markers: &[String]) {
        self.argv0 = Some(argv0.to_string());
        self.markers = Some(markers.to_vec());
    }

    /// Drop the marker echo once it has been consumed.
    pub fn clear_markers(&mut self) {
        self.markers = None;
    }

    /// Set/unset instructions that reproduce this namespace in a child.
    pub fn to_overlay(&self) -> EnvOverlay {
        let mut overlay = EnvOverlay::new();
        let argv0_key = keys::argv_key(0);
        let fields: [(&str, &Option<String>); 8] = [
            (keys::INITIALIZED, &self.initialized),
            (keys::TEMP, &self.staging_dir),
            (keys::CLEAN, &self.clean),
            (keys::DEBUG, &self.debug),
            (keys::CACHE, &self.cache),
            (keys::PROGNAME, &self.progname),
            (keys::SPAWNED, &self.spawned),
            (argv0_key.as_str(), &self.argv0),
        ];
        for (key, value) in fields {
            match value {
                Some(v) => overlay.set(key, v.as_str()),
                None => overlay.unset(key),
            }
        }

        let live = self.markers.as_ref().map_or(0, Vec::len);
        match &self.markers {
            Some(markers) => {
                overlay.set(keys::ARGC, markers.len().to_string());
                for (i, m) in markers.iter().enumerate() {
                    overlay.set(keys::argv_key(i + 1), m.as_str());
                }
            }
            None => overlay.unset(keys::ARGC),
        }
        for i in live + 1..=self.captured_marker_slots {
            overlay.unset(keys::argv_key(i));
        }
        overlay
    }
}
