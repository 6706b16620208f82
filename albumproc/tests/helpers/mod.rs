//! Shared fixtures for albumproc integration tests
//!
//! Fake tools stand in for ffmpeg, tesseract and pdftoppm so the pipeline can
//! be driven end to end without external binaries.

#![allow(dead_code)]

use albumproc::tools::{
    OcrEngine, OcrTools, PdfTextExtractor, Rasterizer, TagTransfer, ToolError, ToolSet,
    Transcoder,
};
use albumproc::utils::SpaceProbe;
use albumproc::{BatchController, ConfigOverrides, Ledger, PipelineConfig, RunContext};
use albumproc_common::config::TomlConfig;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub const GIB: u64 = 1024 * 1024 * 1024;

// ============================================================================
// Fake tools
// ============================================================================

/// Writes a small MP3 stand-in; fails for chosen stems
#[derive(Default)]
pub struct FakeTranscoder {
    pub calls: AtomicUsize,
    pub fail_stems: Vec<String>,
    /// Cancelled from inside the first transcode
    pub cancel_on_call: Option<CancellationToken>,
}

impl FakeTranscoder {
    pub fn failing(stems: &[&str]) -> Self {
        Self {
            fail_stems: stems.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            cancel_on_call: Some(token),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, input: &Path, output: &Path, bitrate_kbps: u32) -> Result<(), ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_call {
            token.cancel();
        }

        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        if self.fail_stems.contains(&stem) {
            return Err(ToolError::from_command_failure(
                format!("ffmpeg -i {}", input.display()),
                1,
                "Invalid data found when processing input",
            ));
        }

        fs::write(output, format!("mp3 {}k from {}", bitrate_kbps, stem))?;
        Ok(())
    }
}

/// Reports one copied tag item and touches nothing
#[derive(Default)]
pub struct FakeTags {
    pub calls: AtomicUsize,
}

impl TagTransfer for FakeTags {
    fn transfer(&self, _source: &Path, target: &Path) -> Result<usize, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !target.exists() {
            return Err(ToolError::Tags(format!("missing target {}", target.display())));
        }
        Ok(1)
    }
}

/// Returns `text of <file name>` and counts calls
#[derive(Default)]
pub struct FakeOcr {
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<String>>,
}

impl FakeOcr {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FakeOcr {
    fn recognize(&self, image: &Path) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let name = image
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.seen
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(name.clone());
        Ok(format!("text of {}", name))
    }
}

/// Writes `<pdf stem>-<page>.png` into the work directory
#[derive(Default)]
pub struct FakeRasterizer {
    pub calls: AtomicUsize,
}

impl Rasterizer for FakeRasterizer {
    fn rasterize(&self, pdf: &Path, page: usize, out_dir: &Path) -> Result<PathBuf, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let stem = pdf
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let image = out_dir.join(format!("{}-{}.png", stem, page));
        fs::write(&image, b"\x89PNG\r\n\x1a\n")?;
        Ok(image)
    }
}

/// Embedded page text keyed by PDF file name; unknown PDFs fail to parse
#[derive(Default)]
pub struct FakePdfText {
    pub pages: HashMap<String, Vec<String>>,
}

impl FakePdfText {
    pub fn with(mut self, name: &str, pages: &[&str]) -> Self {
        self.pages
            .insert(name.to_string(), pages.iter().map(|p| p.to_string()).collect());
        self
    }
}

impl PdfTextExtractor for FakePdfText {
    fn extract_pages(&self, pdf: &Path) -> Result<Vec<String>, ToolError> {
        let name = pdf
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        self.pages
            .get(&name)
            .cloned()
            .ok_or_else(|| ToolError::Pdf(format!("no xref table in {}", name)))
    }
}

/// Free space that can be changed mid-run
pub struct FakeSpace {
    pub available: AtomicU64,
    pub calls: AtomicUsize,
    /// After this many probes, report `later` instead
    pub switch_after: Option<(usize, u64)>,
}

impl FakeSpace {
    pub fn plenty() -> Self {
        Self::fixed(100 * GIB)
    }

    pub fn fixed(bytes: u64) -> Self {
        Self {
            available: AtomicU64::new(bytes),
            calls: AtomicUsize::new(0),
            switch_after: None,
        }
    }

    /// `initial` for the first `calls` probes, then `later`
    pub fn freeing_after(initial: u64, calls: usize, later: u64) -> Self {
        Self {
            available: AtomicU64::new(initial),
            calls: AtomicUsize::new(0),
            switch_after: Some((calls, later)),
        }
    }
}

impl SpaceProbe for FakeSpace {
    fn available(&self, _path: &Path) -> io::Result<u64> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((after, later)) = self.switch_after {
            if call > after {
                return Ok(later);
            }
        }
        Ok(self.available.load(Ordering::SeqCst))
    }
}

// ============================================================================
// Harness
// ============================================================================

/// Fakes shared between a harness and the assertions made on it
pub struct Fakes {
    pub transcoder: Arc<FakeTranscoder>,
    pub tags: Arc<FakeTags>,
    pub ocr: Arc<FakeOcr>,
    pub rasterizer: Arc<FakeRasterizer>,
    pub pdf_text: Arc<FakePdfText>,
    pub space: Arc<FakeSpace>,
    pub ocr_enabled: bool,
}

impl Default for Fakes {
    fn default() -> Self {
        Self {
            transcoder: Arc::new(FakeTranscoder::default()),
            tags: Arc::new(FakeTags::default()),
            ocr: Arc::new(FakeOcr::default()),
            rasterizer: Arc::new(FakeRasterizer::default()),
            pdf_text: Arc::new(FakePdfText::default()),
            space: Arc::new(FakeSpace::plenty()),
            ocr_enabled: true,
        }
    }
}

impl Fakes {
    pub fn tool_set(&self) -> ToolSet {
        let ocr = self.ocr_enabled.then(|| OcrTools {
            engine: self.ocr.clone(),
            rasterizer: self.rasterizer.clone(),
        });
        ToolSet {
            transcoder: self.transcoder.clone(),
            tags: self.tags.clone(),
            pdf_text: self.pdf_text.clone(),
            ocr,
        }
    }
}

/// Temporary archive root plus everything needed to run a batch over it
pub struct Harness {
    pub temp_dir: TempDir,
    pub overrides: ConfigOverrides,
}

impl Harness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let archive_dir = temp_dir.path().join("toprocess");
        fs::create_dir_all(&archive_dir).unwrap();

        let overrides = ConfigOverrides {
            archive_dir: Some(archive_dir),
            audio_workers: Some(2),
            ocr_workers: Some(2),
            min_free_bytes: Some(1024),
            ..Default::default()
        };

        Self {
            temp_dir,
            overrides,
        }
    }

    pub fn archive_dir(&self) -> PathBuf {
        self.temp_dir.path().join("toprocess")
    }

    pub fn processed_dir(&self) -> PathBuf {
        self.archive_dir().join("processed")
    }

    pub fn album(&self, name: &str) -> PathBuf {
        self.processed_dir().join(name)
    }

    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::resolve(self.overrides.clone(), TomlConfig::default()).unwrap()
    }

    /// Write `<archive_dir>/<name>.zip` from `(entry name, bytes)` pairs
    pub fn add_archive(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.archive_dir().join(format!("{}.zip", name));
        write_zip(&path, entries);
        path
    }

    pub fn context(&self, fakes: &Fakes, cancel: CancellationToken) -> RunContext {
        let config = self.config();
        let ledger = Arc::new(Ledger::open(&config.state_dir).unwrap());
        RunContext::new(config, ledger, fakes.tool_set(), fakes.space.clone(), cancel)
    }

    pub async fn run(&self, fakes: &Fakes) -> albumproc::RunSummary {
        self.run_with_cancel(fakes, CancellationToken::new()).await
    }

    pub async fn run_with_cancel(
        &self,
        fakes: &Fakes,
        cancel: CancellationToken,
    ) -> albumproc::RunSummary {
        let controller = BatchController::new(self.context(fakes, cancel));
        controller.run().await
    }

    /// Parsed lines of a ledger file under the archive root
    pub fn ledger_lines(&self, file_name: &str) -> Vec<serde_json::Value> {
        let path = self.archive_dir().join(file_name);
        let Ok(content) = fs::read_to_string(&path) else {
            return Vec::new();
        };
        content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    pub fn reports(&self) -> Vec<serde_json::Value> {
        self.ledger_lines(albumproc::config::REPORT_FILE_NAME)
    }

    pub fn errors(&self) -> Vec<serde_json::Value> {
        self.ledger_lines(albumproc::config::ERRORS_FILE_NAME)
    }

    /// Sorted file names directly inside `dir`
    pub fn list(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }
}

pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap();
}

/// In-memory ZIP, for archives nested inside other archives
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(*name, options).unwrap();
        zip.write_all(bytes).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Bytes that classify as FLAC by extension; content is irrelevant to the fakes
pub fn flac_bytes(tag: &str) -> Vec<u8> {
    let mut bytes = b"fLaC".to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    bytes
}
