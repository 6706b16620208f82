//! Resolved pipeline configuration
//!
//! The binary's argument parser produces a [`ConfigOverrides`] (CLI and
//! environment tiers); [`PipelineConfig::resolve`] merges it with the TOML tier
//! and compiled defaults, then validates the result.

use crate::error::{ProcessError, ProcessResult};
use crate::models::archive::is_single_segment;
use albumproc_common::config::{resolve, LoggingConfig, TomlConfig};
use albumproc_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Resume marker written inside a completed album directory
pub const MARKER_FILE_NAME: &str = ".albumproc_done";

/// Compiled per-album summary document
pub const METADATA_FILE_NAME: &str = "album_metadata.md";

/// Success ledger
pub const REPORT_FILE_NAME: &str = "processing_report.jsonl";

/// Error ledger
pub const ERRORS_FILE_NAME: &str = "errors.jsonl";

/// Durable per-archive state store
pub const STATE_FILE_NAME: &str = "archive_state.jsonl";

/// Quarantine directory (under the processed root) for partial albums kept on failure
pub const FAILED_DIR_NAME: &str = ".failed";

/// Constant bitrate for ConvertAndTag output
pub const TARGET_BITRATE_KBPS: u32 = 320;

pub const DEFAULT_ARCHIVE_DIR: &str = "./@toprocess";
pub const DEFAULT_OCR_WORKERS: usize = 2;
pub const DEFAULT_OCR_LANG: &str = "eng";
pub const DEFAULT_MIN_FREE_BYTES: u64 = 1024 * 1024 * 1024;
pub const DEFAULT_MIN_TEXT_CHARS: usize = 32;
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_OCR_TIMEOUT_SECS: u64 = 300;

/// CLI / environment tier. `None` means "not given on this tier".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub archive_dir: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub processed_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub audio_workers: Option<usize>,
    pub ocr_workers: Option<usize>,
    pub ocr_enabled: Option<bool>,
    pub ocr_lang: Option<String>,
    pub cleanup_on_failure: Option<bool>,
    pub retry_failed: Option<bool>,
    pub min_free_bytes: Option<u64>,
    pub transcode_timeout_secs: Option<u64>,
    pub ocr_timeout_secs: Option<u64>,
}

/// Fully resolved settings for one run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub archive_dir: PathBuf,
    pub scratch_dir: PathBuf,
    pub processed_dir: PathBuf,
    pub state_dir: PathBuf,
    pub audio_workers: usize,
    pub ocr_workers: usize,
    pub ocr_enabled: bool,
    pub ocr_lang: String,
    pub cleanup_on_failure: bool,
    pub retry_failed: bool,
    pub min_free_bytes: u64,
    pub min_text_chars: usize,
    pub transcode_timeout: Duration,
    pub ocr_timeout: Duration,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Merge tiers (CLI/ENV > TOML > default) and validate
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let archive_dir = resolve(overrides.archive_dir, toml.archive_dir, || {
            PathBuf::from(DEFAULT_ARCHIVE_DIR)
        });
        validate_archive_dir(&archive_dir)?;

        let scratch_dir = resolve(overrides.scratch_dir, toml.scratch_dir, || {
            archive_dir.join(".tmp")
        });
        let processed_dir = resolve(overrides.processed_dir, toml.processed_dir, || {
            archive_dir.join("processed")
        });
        let state_dir = resolve(overrides.state_dir, toml.state_dir, || archive_dir.clone());

        let audio_workers = resolve(overrides.audio_workers, toml.audio_workers, default_audio_workers);
        let ocr_workers = resolve(overrides.ocr_workers, toml.ocr_workers, || DEFAULT_OCR_WORKERS);
        if audio_workers == 0 {
            return Err(Error::Config("audio_workers must be at least 1".to_string()));
        }
        if ocr_workers == 0 {
            return Err(Error::Config("ocr_workers must be at least 1".to_string()));
        }

        let ocr_lang = resolve(overrides.ocr_lang, toml.ocr_lang, || DEFAULT_OCR_LANG.to_string());
        if ocr_lang.trim().is_empty() {
            return Err(Error::Config("ocr_lang must not be empty".to_string()));
        }

        let transcode_timeout_secs = resolve(
            overrides.transcode_timeout_secs,
            toml.transcode_timeout_secs,
            || DEFAULT_TRANSCODE_TIMEOUT_SECS,
        );
        let ocr_timeout_secs = resolve(overrides.ocr_timeout_secs, toml.ocr_timeout_secs, || {
            DEFAULT_OCR_TIMEOUT_SECS
        });
        if transcode_timeout_secs == 0 || ocr_timeout_secs == 0 {
            return Err(Error::Config("tool timeouts must be at least 1 second".to_string()));
        }

        Ok(Self {
            archive_dir,
            scratch_dir,
            processed_dir,
            state_dir,
            audio_workers,
            ocr_workers,
            ocr_enabled: resolve(overrides.ocr_enabled, toml.ocr_enabled, || true),
            ocr_lang,
            cleanup_on_failure: resolve(
                overrides.cleanup_on_failure,
                toml.cleanup_on_failure,
                || true,
            ),
            retry_failed: resolve(overrides.retry_failed, toml.retry_failed, || false),
            min_free_bytes: resolve(overrides.min_free_bytes, toml.min_free_bytes, || {
                DEFAULT_MIN_FREE_BYTES
            }),
            min_text_chars: resolve(None, toml.min_text_chars, || DEFAULT_MIN_TEXT_CHARS),
            transcode_timeout: Duration::from_secs(transcode_timeout_secs),
            ocr_timeout: Duration::from_secs(ocr_timeout_secs),
            logging: toml.logging,
        })
    }

    /// Settings rooted at `archive_dir` with every other value at its default
    pub fn with_archive_dir(archive_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::resolve(
            ConfigOverrides {
                archive_dir: Some(archive_dir.into()),
                ..Default::default()
            },
            TomlConfig::default(),
        )
    }

    /// Destination of a promoted album
    pub fn album_destination(&self, album: &str) -> ProcessResult<PathBuf> {
        child_dir(&self.processed_dir, album)
    }

    /// Quarantine destination for a failed album kept for inspection
    pub fn failed_destination(&self, album: &str) -> ProcessResult<PathBuf> {
        child_dir(&self.processed_dir.join(FAILED_DIR_NAME), album)
    }

    /// Per-archive scratch directory
    pub fn scratch_destination(&self, album: &str) -> ProcessResult<PathBuf> {
        child_dir(&self.scratch_dir, album)
    }
}

/// `root/name`, refused unless `name` is a single normal path segment
///
/// Every per-album directory the pipeline removes or replaces is built through
/// here, so an archive name can never point a removal at a root.
fn child_dir(root: &Path, name: &str) -> ProcessResult<PathBuf> {
    if !is_single_segment(name) {
        return Err(ProcessError::Unexpected(format!(
            "album name {:?} is not a single path segment",
            name
        )));
    }
    Ok(root.join(name))
}

fn default_audio_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Refuse an empty archive root or the filesystem root
fn validate_archive_dir(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::Config("archive_dir must not be empty".to_string()));
    }
    if path.parent().is_none() && path.has_root() {
        return Err(Error::Config(format!(
            "Refusing to process the filesystem root: {}",
            path.display()
        )));
    }
    Ok(())
}
