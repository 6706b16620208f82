//! Text extracted from an album's documents and images

use serde::{Deserialize, Serialize};

/// Where a piece of text came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextProvenance {
    /// Text layer of a PDF or a plain-text document
    Embedded,
    /// OCR engine output
    Ocr,
    /// OCR output reused from an identical image seen earlier in the run
    OcrCached,
    /// OCR disabled or the unit could not be read
    Skipped,
}

impl TextProvenance {
    pub fn label(&self) -> &'static str {
        match self {
            TextProvenance::Embedded => "embedded",
            TextProvenance::Ocr => "ocr",
            TextProvenance::OcrCached => "ocr (cached)",
            TextProvenance::Skipped => "skipped",
        }
    }
}

/// Text for one document or image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// File name relative to the album root
    pub source: String,

    /// Extracted text, possibly empty
    pub text: String,

    pub provenance: TextProvenance,

    /// Position of the source in the album's sorted file list
    pub position: usize,

    /// Page count for documents, 1 for images
    pub pages: usize,
}

impl EnrichmentResult {
    /// Number of non-whitespace characters
    pub fn char_count(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}
