//! Batch controller
//!
//! Drives the scan → process → cleanup loop across every archive under the
//! archive root.
//!
//! # Passes
//! Each pass scans the archive root and attempts every archive that has not
//! reached a terminal outcome in this run. An archive deferred for space
//! (`LowSpace`) is retried on the next pass; completing or failing an archive
//! counts as progress. Passes repeat until one makes no progress.
//!
//! # Per archive
//! resume check → space check → extract → flatten → classify →
//! {audio ‖ enrichment} → compile → promote → mark complete → delete original
//! (see `stages.rs`). Archives are processed strictly one at a time; the audio
//! and OCR pools parallelize work inside one archive.
//!
//! # Failure isolation
//! Nothing below this loop can abort the batch. Every archive-level error ends
//! that archive in `Failed`, is written to the error ledger, and the loop moves
//! on.

use crate::context::RunContext;
use crate::error::ErrorKind;
use crate::models::{ArchiveRecord, ArchiveState, ErrorEntry};
use crate::services::archive_scanner::ArchiveScanner;
use crate::services::safe_extractor::SafeExtractor;
use crate::utils::remove_dir_if_exists;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::time::Instant;

mod stages;
mod summary;

pub use stages::ArchiveOutcome;
pub use summary::RunSummary;

/// Archive waiting for free space
struct Deferred {
    record: ArchiveRecord,
    required: u64,
    available: u64,
}

/// Batch controller service
pub struct BatchController {
    ctx: RunContext,
    scanner: ArchiveScanner,
    extractor: SafeExtractor,
}

impl BatchController {
    pub fn new(ctx: RunContext) -> Self {
        let scanner = ArchiveScanner::new(vec![
            ctx.config.scratch_dir.clone(),
            ctx.config.processed_dir.clone(),
        ]);
        let extractor = SafeExtractor::new(ctx.space.clone(), ctx.config.min_free_bytes);

        Self {
            ctx,
            scanner,
            extractor,
        }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Run passes until one makes no progress, then summarize
    pub async fn run(&self) -> RunSummary {
        let start = Instant::now();
        let config = &self.ctx.config;
        let mut summary = RunSummary::new(self.ctx.run_id);

        tracing::info!(
            run_id = %self.ctx.run_id,
            archive_dir = %config.archive_dir.display(),
            processed_dir = %config.processed_dir.display(),
            scratch_dir = %config.scratch_dir.display(),
            audio_workers = config.audio_workers,
            ocr_workers = config.ocr_workers,
            ocr_enabled = config.ocr_enabled,
            "Batch run starting"
        );

        self.prepare_directories();

        let mut finished: HashSet<String> = HashSet::new();
        let mut deferred: BTreeMap<String, Deferred> = BTreeMap::new();

        loop {
            if self.ctx.cancel.is_cancelled() {
                break;
            }

            summary.passes += 1;
            let archives = match self.scanner.scan(&config.archive_dir) {
                Ok(archives) => archives,
                Err(e) => {
                    tracing::error!(
                        archive_dir = %config.archive_dir.display(),
                        error = %e,
                        "Archive scan failed"
                    );
                    break;
                }
            };

            tracing::info!(
                pass = summary.passes,
                archives = archives.len(),
                deferred = deferred.len(),
                "Pass starting"
            );

            let mut progress = false;

            for archive in archives {
                if self.ctx.cancel.is_cancelled() {
                    tracing::warn!("Termination requested, no further archives will be started");
                    break;
                }

                let record =
                    ArchiveRecord::discovered(&config.archive_dir, &archive.path, archive.size_bytes);
                if finished.contains(&record.archive_id) {
                    continue;
                }

                if !config.retry_failed && self.is_permanently_failed(&record.archive_id) {
                    tracing::info!(
                        archive = %record.archive_id,
                        "Skipping archive with a recorded permanent failure"
                    );
                    summary.skipped_permanent += 1;
                    finished.insert(record.archive_id);
                    continue;
                }

                let archive_id = record.archive_id.clone();
                match self.process_archive(record).await {
                    ArchiveOutcome::Completed {
                        already_complete,
                        deleted_original,
                    } => {
                        progress = true;
                        if already_complete {
                            summary.already_complete += 1;
                        } else {
                            summary.processed += 1;
                        }
                        if deleted_original {
                            summary.deleted_originals += 1;
                        }
                        deferred.remove(&archive_id);
                        finished.insert(archive_id);
                    }
                    ArchiveOutcome::Deferred {
                        record,
                        required,
                        available,
                    } => {
                        deferred.insert(
                            archive_id,
                            Deferred {
                                record,
                                required,
                                available,
                            },
                        );
                    }
                    ArchiveOutcome::Failed(_) => {
                        progress = true;
                        summary.failed += 1;
                        deferred.remove(&archive_id);
                        finished.insert(archive_id);
                    }
                }
            }

            if !progress || self.ctx.cancel.is_cancelled() {
                break;
            }
        }

        summary.deferred_space = deferred.len();
        for (_, waiting) in deferred {
            self.record_still_deferred(waiting);
        }

        summary.interrupted = self.ctx.cancel.is_cancelled();
        summary.elapsed_seconds = start.elapsed().as_secs_f64();
        summary.log();
        summary
    }

    /// Create the output roots and clear leftovers of an interrupted previous run
    fn prepare_directories(&self) {
        let config = &self.ctx.config;

        if let Err(e) = remove_dir_if_exists(&config.scratch_dir) {
            tracing::warn!(
                scratch_dir = %config.scratch_dir.display(),
                error = %e,
                "Could not clear scratch leftovers"
            );
        }
        for dir in [&config.scratch_dir, &config.processed_dir] {
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::error!(dir = %dir.display(), error = %e, "Could not create directory");
            }
        }
    }

    fn is_permanently_failed(&self, archive_id: &str) -> bool {
        self.ctx
            .ledger
            .last_state(archive_id)
            .map(|record| {
                record.state == ArchiveState::Failed
                    && record.error_kind.map(|k| k.is_permanent()).unwrap_or(false)
            })
            .unwrap_or(false)
    }

    /// One `low_space` error entry for an archive still waiting when the loop stops
    fn record_still_deferred(&self, waiting: Deferred) {
        let Deferred {
            record,
            required,
            available,
        } = waiting;

        tracing::warn!(
            archive = %record.archive_id,
            required = required,
            available = available,
            "Archive left unprocessed for lack of space"
        );

        let entry = ErrorEntry::new(
            self.ctx.run_id,
            &record.album_name,
            &record.archive_id,
            ErrorKind::LowSpace,
            format!(
                "Insufficient space: {} bytes available, {} required",
                available, required
            ),
        );
        if let Err(e) = self.ctx.ledger.append_error(&entry) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to append error entry");
        }
        if let Err(e) = self.ctx.ledger.record_state(
            &record.archive_id,
            &record.album_name,
            ArchiveState::LowSpace,
            Some(ErrorKind::LowSpace),
        ) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to persist state");
        }
    }
}
