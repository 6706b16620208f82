//! Safe archive extraction
//!
//! **Guarantees:**
//! - Space precondition checked before anything is created
//! - Every entry name validated before the first byte is written, so a
//!   traversal attempt leaves nothing behind
//! - Files are only ever created under the destination directory
//! - OS metadata entries (`__MACOSX/`, `.DS_Store`, `Thumbs.db`, `desktop.ini`,
//!   AppleDouble `._*`), directory entries, and symlink entries are dropped

use crate::error::ProcessError;
use crate::utils::disk_space::{required_space, SpaceProbe};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use zip::ZipArchive;

/// Safe extractor errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Not enough free space on the scratch filesystem
    #[error("Insufficient space: {available} bytes available, {required} required")]
    LowSpace { required: u64, available: u64 },

    /// Entry would resolve outside the destination
    #[error("Unsafe entry path: {0}")]
    Traversal(String),

    /// Archive cannot be read as a ZIP, or an entry fails to decompress
    #[error("Corrupt archive: {0}")]
    Corrupt(String),

    /// Writing an extracted file failed
    #[error("Write failed for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<ExtractError> for ProcessError {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::LowSpace {
                required,
                available,
            } => ProcessError::LowSpace {
                required,
                available,
            },
            ExtractError::Traversal(entry) => ProcessError::Traversal { entry },
            ExtractError::Corrupt(message) => ProcessError::CorruptArchive(message),
            ExtractError::Write { path, source } => {
                ProcessError::ExtractFailed(format!("{}: {}", path.display(), source))
            }
        }
    }
}

/// Extraction statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractReport {
    pub files_written: usize,
    pub junk_skipped: usize,
    pub bytes_written: u64,
}

/// Validating ZIP extractor with a free-space precondition
#[derive(Clone)]
pub struct SafeExtractor {
    probe: Arc<dyn SpaceProbe>,
    min_free_bytes: u64,
}

impl SafeExtractor {
    pub fn new(probe: Arc<dyn SpaceProbe>, min_free_bytes: u64) -> Self {
        Self {
            probe,
            min_free_bytes,
        }
    }

    /// Require `max(2 × archive_size, floor)` bytes free where `scratch_root` lives
    pub fn check_space(&self, archive_size: u64, scratch_root: &Path) -> Result<(), ExtractError> {
        let required = required_space(archive_size, self.min_free_bytes);
        let available = self
            .probe
            .available(scratch_root)
            .map_err(|e| ExtractError::Write {
                path: scratch_root.to_path_buf(),
                source: e,
            })?;

        if available < required {
            return Err(ExtractError::LowSpace {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Extract `archive` into `dest` (created if missing)
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractReport, ExtractError> {
        let file = File::open(archive)
            .map_err(|e| ExtractError::Corrupt(format!("open {}: {}", archive.display(), e)))?;
        let mut zip = ZipArchive::new(file).map_err(|e| ExtractError::Corrupt(e.to_string()))?;

        let plan = plan_entries(&mut zip)?;

        fs::create_dir_all(dest).map_err(|e| ExtractError::Write {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut report = ExtractReport {
            junk_skipped: plan.iter().filter(|p| p.is_none()).count(),
            ..Default::default()
        };

        for (index, relative) in plan.into_iter().enumerate() {
            let Some(relative) = relative else {
                continue;
            };
            let target = dest.join(&relative);
            let bytes = extract_entry(&mut zip, index, &target)?;
            if let Some(bytes) = bytes {
                report.files_written += 1;
                report.bytes_written += bytes;
            }
        }

        tracing::debug!(
            archive = %archive.display(),
            files = report.files_written,
            junk = report.junk_skipped,
            bytes = report.bytes_written,
            "Archive extracted"
        );
        Ok(report)
    }
}

/// Validate the whole central directory; `None` marks an entry to drop
fn plan_entries(zip: &mut ZipArchive<File>) -> Result<Vec<Option<PathBuf>>, ExtractError> {
    let mut plan = Vec::with_capacity(zip.len());

    for index in 0..zip.len() {
        let entry = zip
            .by_index_raw(index)
            .map_err(|e| ExtractError::Corrupt(e.to_string()))?;
        let name = entry.name().to_string();

        let relative = validate_entry_name(&name)?;
        if entry.enclosed_name().is_none() {
            return Err(ExtractError::Traversal(name));
        }

        let is_symlink = entry
            .unix_mode()
            .map(|mode| mode & 0o170000 == 0o120000)
            .unwrap_or(false);

        if entry.is_dir() || is_symlink || is_junk(&relative) {
            if is_symlink {
                tracing::warn!(entry = %name, "Dropping symlink entry");
            }
            plan.push(None);
        } else {
            plan.push(Some(relative));
        }
    }

    Ok(plan)
}

/// Reject absolute names and any `..` component; returns the normalized relative path
fn validate_entry_name(name: &str) -> Result<PathBuf, ExtractError> {
    let unified = name.replace('\\', "/");

    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(ExtractError::Traversal(name.to_string()));
    }

    let mut relative = PathBuf::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(ExtractError::Traversal(name.to_string())),
            other => relative.push(other),
        }
    }

    // Platform-specific components (prefixes, roots) would escape `dest.join`
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return Err(ExtractError::Traversal(name.to_string()));
    }

    Ok(relative)
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// OS metadata files that never belong in an album
pub fn is_junk(relative: &Path) -> bool {
    if relative
        .components()
        .any(|c| c.as_os_str() == "__MACOSX")
    {
        return true;
    }

    let Some(leaf) = relative.file_name().map(|n| n.to_string_lossy().to_string()) else {
        return true;
    };
    let lower = leaf.to_lowercase();

    lower == ".ds_store" || lower == "thumbs.db" || lower == "desktop.ini" || leaf.starts_with("._")
}

/// Returns `None` when a duplicate entry name was skipped
fn extract_entry(
    zip: &mut ZipArchive<File>,
    index: usize,
    target: &Path,
) -> Result<Option<u64>, ExtractError> {
    let write_err = |source: io::Error| ExtractError::Write {
        path: target.to_path_buf(),
        source,
    };

    let mut entry = zip
        .by_index(index)
        .map_err(|e| ExtractError::Corrupt(e.to_string()))?;

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let mut out = match OpenOptions::new().write(true).create_new(true).open(target) {
        Ok(out) => out,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            tracing::warn!(entry = %entry.name(), "Duplicate entry name, keeping the first");
            return Ok(None);
        }
        Err(e) => return Err(write_err(e)),
    };

    let mut buffer = vec![0u8; 256 * 1024];
    let mut written = 0u64;
    loop {
        let n = entry
            .read(&mut buffer)
            .map_err(|e| ExtractError::Corrupt(format!("{}: {}", entry.name(), e)))?;
        if n == 0 {
            break;
        }
        out.write_all(&buffer[..n]).map_err(write_err)?;
        written += n as u64;
    }
    out.flush().map_err(write_err)?;

    Ok(Some(written))
}
