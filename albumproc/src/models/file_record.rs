//! Classified files of one album

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File category after classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    /// Archival audio (FLAC, WAV, AIFF, ...)
    AudioLossless,
    /// Distribution audio (MP3, Ogg, ...)
    AudioLossy,
    Image,
    Document,
    Other,
}

impl FileKind {
    pub fn is_audio(&self) -> bool {
        matches!(self, FileKind::AudioLossless | FileKind::AudioLossy)
    }
}

/// One file inside an album directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    /// Path relative to the album root
    pub path: PathBuf,

    pub kind: FileKind,

    /// SHA-256 hex of the content (images only, used for OCR dedup)
    pub content_hash: Option<String>,

    /// Duration in seconds (audio only, absent when unreadable)
    pub duration_seconds: Option<f64>,

    pub size_bytes: u64,
}

impl FileRecord {
    /// Filename without extension
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Lowercased extension, empty if none
    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    /// Display name (relative path with forward slashes)
    pub fn display_name(&self) -> String {
        self.path.to_string_lossy().replace('\\', "/")
    }
}

/// Stem of a path's file name
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}
