//! Embedded PDF text via lopdf

use super::{PdfTextExtractor, ToolError};
use std::path::Path;

/// Per-page text layer extraction
///
/// A page whose text cannot be decoded yields an empty string so the page
/// count stays correct for the OCR fallback.
pub struct LopdfTextExtractor;

impl LopdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LopdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfTextExtractor for LopdfTextExtractor {
    fn extract_pages(&self, pdf: &Path) -> Result<Vec<String>, ToolError> {
        let document = lopdf::Document::load(pdf).map_err(|e| ToolError::Pdf(e.to_string()))?;

        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
        let mut pages = Vec::with_capacity(page_numbers.len());

        for number in page_numbers {
            match document.extract_text(&[number]) {
                Ok(text) => pages.push(text),
                Err(e) => {
                    tracing::debug!(
                        pdf = %pdf.display(),
                        page = number,
                        error = %e,
                        "No decodable text layer on page"
                    );
                    pages.push(String::new());
                }
            }
        }

        Ok(pages)
    }
}
