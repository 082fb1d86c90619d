//! Payload format: a gzip'd tar archive carried by the launcher.
//!
//! The archive is either appended to the launcher executable and followed by
//! a 16-byte trailer (`u64` little-endian length, then `PARBOOT\0`), or stored
//! next to it as `<exe>.par`. It contains a `parboot.json` manifest, the entry
//! script and a `lib/` runtime-library subtree.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const TRAILER_MAGIC: &[u8; 8] = b"PARBOOT\0";
pub const TRAILER_LEN: u64 = 16;
pub const MANIFEST_FILE: &str = "parboot.json";
pub const SIDECAR_EXTENSION: &str = ".par";
/// Written last; a directory without it was never fully populated.
pub const EXTRACTED_MARKER: &str = ".parboot-extracted";
/// Relative path of the runtime-library subtree inside a staging directory.
pub const LIB_DIR: &str = "lib";

/// Describes how to run the bundled application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Entry script, relative to the staging directory.
    pub entry: String,
    /// Interpreter: a path inside the staging directory, or a name looked up on PATH.
    pub interpreter: String,
    /// Module search path variable that gets `<staging>/lib` prepended (e.g. `PERL5LIB`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_var: Option<String>,
    /// Arguments placed before the entry script.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interpreter_args: Vec<String>,
}

impl Manifest {
    pub fn load(staging_dir: &Path) -> Result<Self> {
        let path = staging_dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Read manifest {}", path.display()))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .with_context(|| format!("Parse manifest {}", path.display()))?;
        if manifest.entry.trim().is_empty() {
            anyhow::bail!("manifest {} has an empty entry", path.display());
        }
        Ok(manifest)
    }
}

/// Where the payload bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadSource {
    pub path: PathBuf,
    pub offset: u64,
    pub len: u64,
}

impl PayloadSource {
    /// Find the payload for `exe`: embedded trailer first, then `<exe>.par`.
    pub fn locate(exe: &Path) -> Result<Self> {
        if let Some(found) = Self::embedded(exe)? {
            return Ok(found);
        }
        let sidecar = sidecar_path(exe);
        if sidecar.is_file() {
            let len = fs::metadata(&sidecar)
                .with_context(|| format!("Stat {}", sidecar.display()))?
                .len();
            return Ok(Self {
                path: sidecar,
                offset: 0,
                len,
            });
        }
        anyhow::bail!(
            "no payload found in {} or {}",
            exe.display(),
            sidecar.display()
        )
    }

    /// Payload appended to `exe`, if its trailer is present and consistent.
    pub fn embedded(exe: &Path) -> Result<Option<Self>> {
        let mut file = File::open(exe).with_context(|| format!("Open {}", exe.display()))?;
        let total = file.metadata()?.len();
        if total < TRAILER_LEN {
            return Ok(None);
        }
        file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let mut trailer = [0u8; TRAILER_LEN as usize];
        file.read_exact(&mut trailer)?;
        if &trailer[8..] != TRAILER_MAGIC {
            return Ok(None);
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&trailer[..8]);
        let len = u64::from_le_bytes(len_bytes);
        if len == 0 || len > total - TRAILER_LEN {
            tracing::warn!(exe = %exe.display(), len, "ignoring inconsistent payload trailer");
            return Ok(None);
        }
        Ok(Some(Self {
            path: exe.to_path_buf(),
            offset: total - TRAILER_LEN - len,
            len,
        }))
    }

    fn reader(&self) -> Result<std::io::Take<File>> {
        let mut file =
            File::open(&self.path).with_context(|| format!("Open {}", self.path.display()))?;
        file.seek(SeekFrom::Start(self.offset))?;
        Ok(file.take(self.len))
    }

    /// SHA-256 of the payload bytes, hex encoded.
    pub fn digest(&self) -> Result<String> {
        let mut reader = self.reader()?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buf).context("Read payload")?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    /// Unpack into `dir` (which must exist) and write the completion marker.
    pub fn extract_to(&self, dir: &Path) -> Result<()> {
        let mut archive = tar::Archive::new(GzDecoder::new(self.reader()?));
        archive.set_preserve_permissions(true);
        archive
            .unpack(dir)
            .with_context(|| format!("Extract payload into {}", dir.display()))?;
        fs::write(dir.join(EXTRACTED_MARKER), b"")
            .with_context(|| format!("Mark {} as extracted", dir.display()))?;
        tracing::debug!(dir = %dir.display(), bytes = self.len, "payload extracted");
        Ok(())
    }
}

pub fn sidecar_path(exe: &Path) -> PathBuf {
    let mut s = exe.as_os_str().to_owned();
    s.push(SIDECAR_EXTENSION);
    PathBuf::from(s)
}

pub fn is_populated(dir: &Path) -> bool {
    dir.join(EXTRACTED_MARKER).is_file()
}

/// Build a payload archive from `app_dir` plus `manifest`.
pub fn build_payload(app_dir: &Path, manifest: &Manifest) -> Result<Vec<u8>> {
    if !app_dir.join(&manifest.entry).is_file() {
        anyhow::bail!(
            "entry {} not found under {}",
            manifest.entry,
            app_dir.display()
        );
    }

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder.follow_symlinks(false);
    builder
        .append_dir_all(".", app_dir)
        .with_context(|| format!("Archive {}", app_dir.display()))?;

    let json = serde_json::to_vec_pretty(manifest).context("Serialize manifest")?;
    let mut header = tar::Header::new_gnu();
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, MANIFEST_FILE, json.as_slice())
        .context("Archive manifest")?;

    let encoder = builder.into_inner().context("Finish tar stream")?;
    encoder.finish().context("Finish gzip stream")
}

/// Write `launcher` + `payload` + trailer to `output` and mark it executable.
///
/// A launcher that already carries a payload is trimmed back to the bare stub.
pub fn write_self_extracting(launcher: &Path, payload: &[u8], output: &Path) -> Result<()> {
    let mut stub = fs::read(launcher).with_context(|| format!("Read {}", launcher.display()))?;
    if let Some(existing) = PayloadSource::embedded(launcher)? {
        stub.truncate(existing.offset as usize);
    }

    let mut out = File::create(output).with_context(|| format!("Create {}", output.display()))?;
    out.write_all(&stub)?;
    out.write_all(payload)?;
    out.write_all(&(payload.len() as u64).to_le_bytes())?;
    out.write_all(TRAILER_MAGIC)?;
    out.flush()?;
    drop(out);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(output, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod {}", output.display()))?;
    }
    Ok(())
}
