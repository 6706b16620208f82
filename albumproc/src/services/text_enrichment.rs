//! Text enrichment pipeline
//!
//! **Phases:**
//! 1. Embedded text: plain-text documents are read directly; PDFs go through
//!    the text-layer extractor one page at a time
//! 2. OCR: PDFs whose embedded text is below `min_text_chars` are rasterized
//!    and OCR'd page by page; standalone images are grouped by content hash and
//!    each hash not already in the run's cache is OCR'd once. Pages and images
//!    share the bounded OCR pool.
//! 3. Assembly: one [`EnrichmentResult`] per document/image, in album order
//!
//! A failing page or image is recorded as `ocr_error` and contributes empty
//! text; the rest of the document and album continue.

use crate::context::{ArchiveScope, RunContext};
use crate::error::{ErrorKind, ProcessError, ProcessResult};
use crate::models::{EnrichmentResult, EnrichmentStats, FileKind, FileRecord, TextProvenance};
use crate::tools::{OcrTools, ToolError};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Enrichment output for one album
#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
    pub results: Vec<EnrichmentResult>,
    pub stats: EnrichmentStats,
}

/// Count of non-whitespace characters
pub fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// Join per-page text in page order, dropping empty pages
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .map(|p| p.as_ref().trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn is_plain_text(record: &FileRecord) -> bool {
    matches!(record.extension().as_str(), "txt" | "nfo" | "md")
}

/// One unit of OCR work
#[derive(Debug, Clone)]
enum OcrUnit {
    Page {
        position: usize,
        source: String,
        pdf: PathBuf,
        page: usize,
        out_dir: PathBuf,
    },
    Image {
        hash: String,
        source: String,
        path: PathBuf,
    },
}

#[derive(Debug)]
enum UnitOutcome {
    Text(String),
    Failed(String),
    NotStarted,
}

/// A PDF's embedded text and, when it fell back to OCR, its per-page OCR text
struct PdfState {
    source: String,
    embedded: Vec<String>,
    ocr_pages: Option<Vec<Option<String>>>,
    unreadable: bool,
}

/// Extract text from every document and image of an album
pub async fn enrich_album(
    ctx: &RunContext,
    scope: &ArchiveScope,
    album_dir: &Path,
    work_dir: &Path,
    records: &[FileRecord],
) -> ProcessResult<EnrichmentOutcome> {
    let mut stats = EnrichmentStats::default();
    let ocr = ctx.tools.ocr.clone();
    let min_text_chars = ctx.config.min_text_chars;

    // Phase 1: embedded text
    let mut plain: BTreeMap<usize, (String, String, bool)> = BTreeMap::new();
    let mut pdfs: BTreeMap<usize, PdfState> = BTreeMap::new();
    let mut images: BTreeMap<usize, (String, String)> = BTreeMap::new();

    for (position, record) in records.iter().enumerate() {
        let source = record.display_name();
        let path = album_dir.join(&record.path);

        match record.kind {
            FileKind::Document if is_plain_text(record) => {
                stats.documents += 1;
                match fs::read(&path) {
                    Ok(bytes) => {
                        stats.embedded_text += 1;
                        let text = String::from_utf8_lossy(&bytes).trim().to_string();
                        plain.insert(position, (source, text, true));
                    }
                    Err(e) => {
                        stats.errors += 1;
                        scope.record(ErrorKind::DocumentUnreadable, &source, e.to_string());
                        plain.insert(position, (source, String::new(), false));
                    }
                }
            }
            FileKind::Document => {
                stats.documents += 1;
                let extractor = ctx.tools.pdf_text.clone();
                let pdf_path = path.clone();
                let extracted = tokio::task::spawn_blocking(move || extractor.extract_pages(&pdf_path))
                    .await
                    .map_err(|e| ProcessError::Unexpected(format!("PDF worker failed: {}", e)))?;

                match extracted {
                    Ok(pages) => {
                        let needs_ocr = ocr.is_some()
                            && !pages.is_empty()
                            && meaningful_chars(&join_pages(&pages)) < min_text_chars;
                        if !needs_ocr {
                            stats.embedded_text += 1;
                        }
                        pdfs.insert(
                            position,
                            PdfState {
                                source,
                                ocr_pages: needs_ocr.then(|| vec![None; pages.len()]),
                                embedded: pages,
                                unreadable: false,
                            },
                        );
                    }
                    Err(e) => {
                        stats.errors += 1;
                        scope.record(ErrorKind::DocumentUnreadable, &source, e.to_string());
                        pdfs.insert(
                            position,
                            PdfState {
                                source,
                                embedded: Vec::new(),
                                ocr_pages: None,
                                unreadable: true,
                            },
                        );
                    }
                }
            }
            FileKind::Image => {
                stats.images += 1;
                let hash = record
                    .content_hash
                    .clone()
                    .unwrap_or_else(|| format!("path:{}", source));
                images.insert(position, (source, hash));
            }
            _ => {}
        }
    }

    // Phase 2: OCR units
    let mut units: Vec<OcrUnit> = Vec::new();
    for (position, state) in &pdfs {
        if let Some(pages) = &state.ocr_pages {
            tracing::debug!(
                document = %state.source,
                pages = pages.len(),
                "Embedded text too short, falling back to OCR"
            );
            for page in 1..=pages.len() {
                units.push(OcrUnit::Page {
                    position: *position,
                    source: state.source.clone(),
                    pdf: album_dir.join(&records[*position].path),
                    page,
                    out_dir: work_dir.join(format!("doc-{:04}", position)),
                });
            }
        }
    }

    let mut cached: HashMap<String, String> = HashMap::new();
    if ocr.is_some() {
        let mut queued: HashSet<String> = HashSet::new();
        for (position, (source, hash)) in &images {
            if cached.contains_key(hash) || queued.contains(hash) {
                continue;
            }
            if let Some(text) = ctx.ocr_cache.get(hash) {
                cached.insert(hash.clone(), text);
                continue;
            }
            queued.insert(hash.clone());
            units.push(OcrUnit::Image {
                hash: hash.clone(),
                source: source.clone(),
                path: album_dir.join(&records[*position].path),
            });
        }
    }

    let outcomes = match &ocr {
        Some(tools) if !units.is_empty() => run_ocr_units(ctx, tools, units).await,
        _ => Vec::new(),
    };

    let mut interrupted = false;
    let mut fresh: HashMap<String, Option<String>> = HashMap::new();
    for (unit, outcome) in outcomes {
        match (unit, outcome) {
            (_, UnitOutcome::NotStarted) => interrupted = true,
            (OcrUnit::Page { position, page, .. }, UnitOutcome::Text(text)) => {
                stats.pages_ocred += 1;
                if let Some(slot) = pdfs
                    .get_mut(&position)
                    .and_then(|s| s.ocr_pages.as_mut())
                    .and_then(|p| p.get_mut(page - 1))
                {
                    *slot = Some(text);
                }
            }
            (OcrUnit::Page { source, page, .. }, UnitOutcome::Failed(message)) => {
                stats.errors += 1;
                scope.record(
                    ErrorKind::OcrError,
                    &source,
                    format!("page {}: {}", page, message),
                );
            }
            (OcrUnit::Image { hash, .. }, UnitOutcome::Text(text)) => {
                stats.images_ocred += 1;
                ctx.ocr_cache.insert(hash.clone(), text.clone());
                fresh.insert(hash, Some(text));
            }
            (OcrUnit::Image { hash, source, .. }, UnitOutcome::Failed(message)) => {
                stats.errors += 1;
                scope.record(ErrorKind::OcrError, &source, message);
                fresh.insert(hash, None);
            }
        }
    }

    if let Err(e) = crate::utils::remove_dir_if_exists(work_dir) {
        tracing::warn!(work_dir = %work_dir.display(), error = %e, "Work directory not removed");
    }

    if interrupted {
        return Err(ProcessError::Interrupted);
    }

    // Phase 3: assembly in album order
    let mut results: Vec<EnrichmentResult> = Vec::new();

    for (position, (source, text, readable)) in plain {
        results.push(EnrichmentResult {
            source,
            text,
            provenance: if readable {
                TextProvenance::Embedded
            } else {
                TextProvenance::Skipped
            },
            position,
            pages: 1,
        });
    }

    for (position, state) in pdfs {
        let pages = state.embedded.len();
        let ocr_text = state
            .ocr_pages
            .as_ref()
            .filter(|p| p.iter().any(Option::is_some))
            .map(|p| join_pages(&p.iter().map(|t| t.clone().unwrap_or_default()).collect::<Vec<_>>()));

        let (text, provenance) = match ocr_text {
            Some(text) => (text, TextProvenance::Ocr),
            None if state.unreadable => (String::new(), TextProvenance::Skipped),
            None => (join_pages(&state.embedded), TextProvenance::Embedded),
        };

        results.push(EnrichmentResult {
            source: state.source,
            text,
            provenance,
            position,
            pages,
        });
    }

    let mut seen_fresh: HashSet<String> = HashSet::new();
    for (position, (source, hash)) in images {
        let (text, provenance) = match &ocr {
            None => (String::new(), TextProvenance::Skipped),
            Some(_) => {
                if let Some(text) = cached.get(&hash) {
                    stats.ocr_cache_hits += 1;
                    (text.clone(), TextProvenance::OcrCached)
                } else {
                    match fresh.get(&hash) {
                        Some(Some(text)) => {
                            if seen_fresh.insert(hash.clone()) {
                                (text.clone(), TextProvenance::Ocr)
                            } else {
                                stats.ocr_cache_hits += 1;
                                (text.clone(), TextProvenance::OcrCached)
                            }
                        }
                        _ => (String::new(), TextProvenance::Skipped),
                    }
                }
            }
        };

        results.push(EnrichmentResult {
            source,
            text,
            provenance,
            position,
            pages: 1,
        });
    }

    results.sort_by_key(|r| r.position);

    tracing::info!(
        album = %scope.album,
        documents = stats.documents,
        images = stats.images,
        pages_ocred = stats.pages_ocred,
        images_ocred = stats.images_ocred,
        cache_hits = stats.ocr_cache_hits,
        errors = stats.errors,
        "Enrichment finished"
    );

    Ok(EnrichmentOutcome { results, stats })
}

/// Run OCR units on the bounded OCR pool; results come back in completion order
async fn run_ocr_units(
    ctx: &RunContext,
    tools: &OcrTools,
    units: Vec<OcrUnit>,
) -> Vec<(OcrUnit, UnitOutcome)> {
    let workers = ctx.config.ocr_workers.max(1);

    stream::iter(units)
        .map(|unit| {
            let tools = tools.clone();
            let cancel = ctx.cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return (unit, UnitOutcome::NotStarted);
                }
                let job = unit.clone();
                let outcome = tokio::task::spawn_blocking(move || run_unit(&tools, &job))
                    .await
                    .map(|result| match result {
                        Ok(text) => UnitOutcome::Text(text),
                        Err(e) => UnitOutcome::Failed(e.to_string()),
                    })
                    .unwrap_or_else(|e| UnitOutcome::Failed(format!("worker panicked: {}", e)));
                (unit, outcome)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await
}

/// Blocking body of one OCR unit
fn run_unit(tools: &OcrTools, unit: &OcrUnit) -> Result<String, ToolError> {
    match unit {
        OcrUnit::Page {
            pdf, page, out_dir, ..
        } => {
            fs::create_dir_all(out_dir)?;
            let image = tools.rasterizer.rasterize(pdf, *page, out_dir)?;
            let text = tools.engine.recognize(&image);
            if let Err(e) = fs::remove_file(&image) {
                tracing::debug!(image = %image.display(), error = %e, "Page image not removed");
            }
            text
        }
        OcrUnit::Image { path, .. } => tools.engine.recognize(path),
    }
}
