//! Archive discovery
//!
//! Recursive `.zip` discovery under the archive root with magic-byte
//! verification. The scratch and processed roots are excluded when they live
//! inside the archive root, as are hidden directories and OS junk. Results are
//! sorted so every pass visits archives in the same order.
//!
//! Excluded roots are resolved on every scan, not at construction: they may
//! not exist yet when the scanner is built, and a relative root only compares
//! equal to walked entries once both are absolute.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// Archive scanner errors
#[derive(Debug, Error)]
pub enum ScanError {
    /// Specified path does not exist
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Path exists but is not a directory
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Cannot access file
    #[error("File access error {0}: {1}")]
    FileAccessError(PathBuf, String),
}

/// One discovered archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArchive {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// ZIP archive scanner
pub struct ArchiveScanner {
    ignore_names: Vec<String>,
    excluded_dirs: Vec<PathBuf>,
}

impl ArchiveScanner {
    /// Scanner that skips `excluded_dirs` (typically the scratch and processed roots)
    pub fn new(excluded_dirs: Vec<PathBuf>) -> Self {
        Self {
            ignore_names: vec![
                ".DS_Store".to_string(),
                "Thumbs.db".to_string(),
                "__MACOSX".to_string(),
            ],
            excluded_dirs,
        }
    }

    /// Find every ZIP archive under `root`, sorted by path
    pub fn scan(&self, root: &Path) -> Result<Vec<DiscoveredArchive>, ScanError> {
        if !root.exists() {
            return Err(ScanError::PathNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let excluded: Vec<PathBuf> = self.excluded_dirs.iter().map(|d| resolve_dir(d)).collect();
        let mut symlink_visited = HashSet::new();
        let mut archives = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.should_process_entry(e, &excluded, &mut symlink_visited));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "Error accessing entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !has_zip_extension(entry.path()) {
                continue;
            }

            match verify_zip_magic(entry.path()) {
                Ok(true) => {
                    let size_bytes = entry.metadata().map(|m| m.len()).unwrap_or(0);
                    archives.push(DiscoveredArchive {
                        path: entry.path().to_path_buf(),
                        size_bytes,
                    });
                }
                Ok(false) => {
                    tracing::warn!(path = %entry.path().display(), "Not a ZIP archive, ignoring");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Archive verification failed");
                }
            }
        }

        archives.sort_by(|a, b| a.path.cmp(&b.path));
        tracing::debug!(root = %root.display(), archives = archives.len(), "Archive scan complete");
        Ok(archives)
    }

    fn should_process_entry(
        &self,
        entry: &DirEntry,
        excluded: &[PathBuf],
        symlink_visited: &mut HashSet<PathBuf>,
    ) -> bool {
        let file_name = entry.file_name().to_string_lossy();

        if self.ignore_names.iter().any(|n| file_name == n.as_str()) {
            return false;
        }

        if entry.depth() > 0 && entry.file_type().is_dir() {
            if file_name.starts_with('.') {
                return false;
            }
            let resolved = resolve_dir(entry.path());
            if excluded.iter().any(|d| *d == resolved) {
                tracing::debug!(path = %entry.path().display(), "Skipping excluded directory");
                return false;
            }
        }

        if entry.path_is_symlink() {
            if let Ok(canonical) = entry.path().canonicalize() {
                if !symlink_visited.insert(canonical) {
                    tracing::warn!(path = %entry.path().display(), "Symlink loop detected");
                    return false;
                }
            }
        }

        true
    }
}

/// Canonical form of `path`, or its absolute form when it does not exist
fn resolve_dir(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn has_zip_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// Local file header or (empty archive) end-of-central-directory signature
fn verify_zip_magic(path: &Path) -> Result<bool, ScanError> {
    let mut file = File::open(path)
        .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

    let mut buffer = [0u8; 4];
    let bytes_read = file
        .read(&mut buffer)
        .map_err(|e| ScanError::FileAccessError(path.to_path_buf(), e.to_string()))?;

    Ok(bytes_read == 4
        && matches!(buffer, [b'P', b'K', 0x03, 0x04] | [b'P', b'K', 0x05, 0x06]))
}
