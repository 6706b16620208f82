//! Error types for albumproc
//!
//! Errors below the archive level (one transcode, one OCR page) are absorbed
//! and recorded by the component that hit them. Only archive-level failures
//! surface as `ProcessError` and end an archive in the `Failed` state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Stable error classification written to `errors.jsonl`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Not enough free space to extract; retried on a later pass
    LowSpace,
    /// Archive entry would escape the extraction directory
    TraversalError,
    /// Archive could not be read as a ZIP
    CorruptArchive,
    /// I/O failure while writing extracted entries
    ExtractFailed,
    /// One lossless file failed to transcode or tag
    ConversionError,
    /// One page or image failed to OCR
    OcrError,
    /// A document's text layer and page structure were both unreadable
    DocumentUnreadable,
    /// Processing stopped by a termination signal
    Interrupted,
    /// The original archive could not be deleted after success
    DeleteFailed,
    /// Anything else
    UnexpectedError,
}

impl ErrorKind {
    /// Permanent failures are not retried by later invocations unless asked
    pub fn is_permanent(&self) -> bool {
        matches!(self, ErrorKind::TraversalError | ErrorKind::CorruptArchive)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::LowSpace => "low_space",
            ErrorKind::TraversalError => "traversal_error",
            ErrorKind::CorruptArchive => "corrupt_archive",
            ErrorKind::ExtractFailed => "extract_failed",
            ErrorKind::ConversionError => "conversion_error",
            ErrorKind::OcrError => "ocr_error",
            ErrorKind::DocumentUnreadable => "document_unreadable",
            ErrorKind::Interrupted => "interrupted",
            ErrorKind::DeleteFailed => "delete_failed",
            ErrorKind::UnexpectedError => "unexpected_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Archive-level processing error
#[derive(Debug, Error)]
pub enum ProcessError {
    /// Free space below the extraction requirement
    #[error("Low space: {available} bytes free < {required} bytes required")]
    LowSpace { required: u64, available: u64 },

    /// Entry path escapes the destination
    #[error("Unsafe path in archive: {entry}")]
    Traversal { entry: String },

    /// Invalid or unreadable archive
    #[error("Corrupt archive: {0}")]
    CorruptArchive(String),

    /// Writing extracted entries failed
    #[error("Extraction failed: {0}")]
    ExtractFailed(String),

    /// Termination signal received mid-archive
    #[error("Interrupted by termination signal")]
    Interrupted,

    /// Original archive could not be removed
    #[error("Delete original failed for {path}: {message}")]
    DeleteFailed { path: PathBuf, message: String },

    /// Catch-all
    #[error("Unexpected error: {0}")]
    Unexpected(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::LowSpace { .. } => ErrorKind::LowSpace,
            ProcessError::Traversal { .. } => ErrorKind::TraversalError,
            ProcessError::CorruptArchive(_) => ErrorKind::CorruptArchive,
            ProcessError::ExtractFailed(_) => ErrorKind::ExtractFailed,
            ProcessError::Interrupted => ErrorKind::Interrupted,
            ProcessError::DeleteFailed { .. } => ErrorKind::DeleteFailed,
            ProcessError::Unexpected(_) | ProcessError::Io(_) => ErrorKind::UnexpectedError,
        }
    }
}

/// Result type for archive-level processing
pub type ProcessResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = ProcessError::Traversal {
            entry: "../../outside.txt".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::TraversalError);
        assert!(err.to_string().contains("../../outside.txt"));

        let io = ProcessError::from(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(io.kind(), ErrorKind::UnexpectedError);
    }

    #[test]
    fn test_every_variant_has_a_kind() {
        let cases = [
            (ProcessError::LowSpace { required: 2, available: 1 }, ErrorKind::LowSpace),
            (ProcessError::CorruptArchive("bad".into()), ErrorKind::CorruptArchive),
            (ProcessError::ExtractFailed("disk".into()), ErrorKind::ExtractFailed),
            (ProcessError::Interrupted, ErrorKind::Interrupted),
            (
                ProcessError::DeleteFailed {
                    path: PathBuf::from("a.zip"),
                    message: "busy".into(),
                },
                ErrorKind::DeleteFailed,
            ),
            (ProcessError::Unexpected("x".into()), ErrorKind::UnexpectedError),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_permanent_kinds() {
        assert!(ErrorKind::TraversalError.is_permanent());
        assert!(ErrorKind::CorruptArchive.is_permanent());
        assert!(!ErrorKind::Interrupted.is_permanent());
        assert!(!ErrorKind::UnexpectedError.is_permanent());
        assert!(!ErrorKind::LowSpace.is_permanent());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::DocumentUnreadable).unwrap();
        assert_eq!(json, "\"document_unreadable\"");
        assert_eq!(ErrorKind::LowSpace.to_string(), "low_space");
    }
}
