//! Structured ledger entries
//!
//! Every entry is one self-contained JSON line; entries are never rewritten.

use crate::error::ErrorKind;
use crate::models::ArchiveState;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-album resolution of lossless/lossy audio pairs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioDecision {
    /// Every lossless file has a lossy counterpart: drop the lossless copies
    DeleteLossless,
    /// No lossy files at all: transcode, tag, then drop each lossless source
    ConvertAndTag,
    /// Nothing to resolve, or an ambiguous partial overlap left for review
    NoAction,
}

/// Audio Resolution Engine statistics for one album
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioStats {
    pub lossless_files: usize,
    pub lossy_files: usize,
    pub deleted_lossless: usize,
    pub converted: usize,
    pub skipped_exists: usize,
    pub errors: usize,
    /// Partial lossless/lossy overlap, left untouched
    pub manual_review: bool,
}

/// Text Enrichment Pipeline statistics for one album
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentStats {
    pub documents: usize,
    pub images: usize,
    pub embedded_text: usize,
    pub pages_ocred: usize,
    pub images_ocred: usize,
    pub ocr_cache_hits: usize,
    pub errors: usize,
}

/// Success outcome recorded in `processing_report.jsonl`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    /// Album processed in this run
    Ok,
    /// Resume marker found; only the original was cleaned up
    AlreadyProcessed,
}

/// One line of `processing_report.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub run_id: Uuid,
    pub album: String,
    pub archive: String,
    pub outcome: ReportOutcome,
    pub extracted: bool,
    pub flattened: bool,
    pub files: usize,
    pub decision: Option<AudioDecision>,
    pub audio: AudioStats,
    pub enrichment: EnrichmentStats,
    pub duration_s: f64,
    pub timestamp: String,
}

impl ReportEntry {
    /// Entry for an archive whose album was already complete
    pub fn already_processed(run_id: Uuid, album: &str, archive: &str) -> Self {
        Self {
            run_id,
            album: album.to_string(),
            archive: archive.to_string(),
            outcome: ReportOutcome::AlreadyProcessed,
            extracted: false,
            flattened: false,
            files: 0,
            decision: None,
            audio: AudioStats::default(),
            enrichment: EnrichmentStats::default(),
            duration_s: 0.0,
            timestamp: albumproc_common::time::now_rfc3339(),
        }
    }
}

/// One line of `errors.jsonl`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub run_id: Uuid,
    pub album: String,
    pub archive: String,
    pub kind: ErrorKind,
    pub message: String,
    /// File or unit inside the album, for per-file errors
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub file: Option<String>,
    pub timestamp: String,
}

impl ErrorEntry {
    pub fn new(run_id: Uuid, album: &str, archive: &str, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            run_id,
            album: album.to_string(),
            archive: archive.to_string(),
            kind,
            message: message.into(),
            file: None,
            timestamp: albumproc_common::time::now_rfc3339(),
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }
}

/// One line of `archive_state.jsonl`; the last line per archive wins
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub archive: String,
    pub album: String,
    pub state: ArchiveState,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_kind: Option<ErrorKind>,
    pub timestamp: String,
}
