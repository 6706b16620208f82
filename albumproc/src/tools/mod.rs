//! Capability interfaces for external tools
//!
//! The pipeline never shells out directly. It calls these narrow traits so
//! tests can substitute deterministic fakes:
//! - `Transcoder` (ffmpeg)
//! - `TagTransfer` (lofty)
//! - `OcrEngine` (tesseract)
//! - `Rasterizer` (pdftoppm)
//! - `PdfTextExtractor` (lopdf)
//!
//! All calls are blocking and run on worker threads.

pub mod ffmpeg;
pub mod pdf_text;
pub mod pdftoppm;
pub mod process;
pub mod tags;
pub mod tesseract;

pub use ffmpeg::FfmpegTranscoder;
pub use pdf_text::LopdfTextExtractor;
pub use pdftoppm::PdftoppmRasterizer;
pub use tags::LoftyTagTransfer;
pub use tesseract::TesseractOcr;

use crate::config::PipelineConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// External tool errors
#[derive(Debug, Error)]
pub enum ToolError {
    /// Required executable not found on PATH
    #[error("missing command `{0}` on PATH")]
    Missing(String),

    /// Non-zero exit status
    #[error("command failed: `{command}` (status: {status}){stderr_suffix}")]
    Failed {
        command: String,
        status: i32,
        stderr_suffix: String,
    },

    /// Killed after exceeding its time limit
    #[error("command timed out after {timeout_ms}ms: `{command}`")]
    TimedOut { command: String, timeout_ms: u64 },

    /// Tool exited cleanly but produced nothing usable
    #[error("unexpected tool output: {0}")]
    Output(String),

    /// Reading or writing tags failed
    #[error("tag transfer failed: {0}")]
    Tags(String),

    /// PDF could not be parsed
    #[error("PDF read failed: {0}")]
    Pdf(String),

    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    pub fn from_command_failure(command: String, status: i32, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let stderr_suffix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("; stderr: {}", trimmed)
        };
        Self::Failed {
            command,
            status,
            stderr_suffix,
        }
    }
}

/// Lossless → lossy transcoding
pub trait Transcoder: Send + Sync {
    /// Transcode `input` into `output` at a constant bitrate
    fn transcode(&self, input: &Path, output: &Path, bitrate_kbps: u32) -> Result<(), ToolError>;
}

/// Copy tags and embedded artwork between audio files
pub trait TagTransfer: Send + Sync {
    /// Returns the number of tag items and pictures written
    fn transfer(&self, source: &Path, target: &Path) -> Result<usize, ToolError>;
}

/// Image → text
pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &Path) -> Result<String, ToolError>;
}

/// PDF page → image
pub trait Rasterizer: Send + Sync {
    /// Render 1-based `page` of `pdf` into `out_dir`, returning the image path
    fn rasterize(&self, pdf: &Path, page: usize, out_dir: &Path) -> Result<PathBuf, ToolError>;
}

/// Embedded PDF text, one string per page in page order
pub trait PdfTextExtractor: Send + Sync {
    fn extract_pages(&self, pdf: &Path) -> Result<Vec<String>, ToolError>;
}

/// OCR engine and rasterizer, present only when OCR is enabled
#[derive(Clone)]
pub struct OcrTools {
    pub engine: Arc<dyn OcrEngine>,
    pub rasterizer: Arc<dyn Rasterizer>,
}

/// Every capability the pipeline needs
#[derive(Clone)]
pub struct ToolSet {
    pub transcoder: Arc<dyn Transcoder>,
    pub tags: Arc<dyn TagTransfer>,
    pub pdf_text: Arc<dyn PdfTextExtractor>,
    pub ocr: Option<OcrTools>,
}

impl ToolSet {
    /// Locate the real tools on PATH
    ///
    /// A missing transcoder, or a missing OCR engine/rasterizer while OCR is
    /// enabled, is fatal for the whole run.
    pub fn detect(config: &PipelineConfig) -> Result<Self, ToolError> {
        let ffmpeg = locate("ffmpeg")?;
        tracing::info!(path = %ffmpeg.display(), "Transcoder found");

        let ocr = if config.ocr_enabled {
            let tesseract = locate("tesseract")?;
            let pdftoppm = locate("pdftoppm")?;
            tracing::info!(
                tesseract = %tesseract.display(),
                pdftoppm = %pdftoppm.display(),
                lang = %config.ocr_lang,
                "OCR tools found"
            );
            Some(OcrTools {
                engine: Arc::new(TesseractOcr::new(
                    tesseract,
                    config.ocr_lang.clone(),
                    config.ocr_timeout,
                )),
                rasterizer: Arc::new(PdftoppmRasterizer::new(pdftoppm, config.ocr_timeout)),
            })
        } else {
            tracing::info!("OCR disabled");
            None
        };

        Ok(Self {
            transcoder: Arc::new(FfmpegTranscoder::new(ffmpeg, config.transcode_timeout)),
            tags: Arc::new(LoftyTagTransfer::new()),
            pdf_text: Arc::new(LopdfTextExtractor::new()),
            ocr,
        })
    }
}

fn locate(program: &str) -> Result<PathBuf, ToolError> {
    which::which(program).map_err(|_| ToolError::Missing(program.to_string()))
}
