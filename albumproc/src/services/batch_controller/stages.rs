//! Per-archive pipeline stages
//!
//! **Ordering guarantees:**
//! - The space check runs before anything is created for the archive
//! - The success report is appended before the original is deleted, so a
//!   deleted original always has a report and a marker behind it
//! - The scratch guard removes the archive's scratch directory on every exit
//!   path, success or failure

use super::BatchController;
use crate::config::METADATA_FILE_NAME;
use crate::error::{ErrorKind, ProcessError, ProcessResult};
use crate::models::{
    ArchiveRecord, ArchiveState, AudioDecision, AudioStats, EnrichmentStats, ErrorEntry,
    ReportEntry, ReportOutcome,
};
use crate::services::audio_resolver::resolve_audio;
use crate::services::classifier::classify_album;
use crate::services::flattener::{flatten, FlattenReport};
use crate::services::ledger::has_marker;
use crate::services::metadata_compiler::write_metadata;
use crate::services::safe_extractor::{ExtractError, ExtractReport};
use crate::services::text_enrichment::enrich_album;
use crate::utils::{move_dir, remove_dir_if_exists};
use albumproc_common::time::now_rfc3339;
use std::fs;
use std::path::{Path, PathBuf};

/// How one archive ended in this pass
#[derive(Debug)]
pub enum ArchiveOutcome {
    /// Album complete; `already_complete` when an earlier run did the work
    Completed {
        already_complete: bool,
        deleted_original: bool,
    },
    /// Not enough space yet; retried next pass
    Deferred {
        record: ArchiveRecord,
        required: u64,
        available: u64,
    },
    /// Terminal failure, original preserved
    Failed(ErrorKind),
}

/// What the stages produced for a successful archive
struct StageReport {
    extract: ExtractReport,
    flatten: FlattenReport,
    files: usize,
    decision: AudioDecision,
    audio: AudioStats,
    enrichment: EnrichmentStats,
}

/// Removes an archive's scratch directory when dropped
struct ScratchGuard {
    path: PathBuf,
}

impl ScratchGuard {
    fn create(path: PathBuf) -> ProcessResult<Self> {
        remove_dir_if_exists(&path)?;
        fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        if let Err(e) = remove_dir_if_exists(&self.path) {
            tracing::error!(scratch = %self.path.display(), error = %e, "Scratch cleanup failed");
        }
    }
}

impl BatchController {
    /// Process one archive to a terminal outcome (or defer it for space)
    pub(super) async fn process_archive(&self, mut record: ArchiveRecord) -> ArchiveOutcome {
        let config = &self.ctx.config;
        let album_dest = match config.album_destination(&record.album_name) {
            Ok(dest) => dest,
            Err(e) => return self.fail(&mut record, e, None),
        };

        if self.ctx.ledger.is_complete(&album_dest, &record.archive_id) {
            return self.finish_already_complete(record);
        }

        if let Err(e) = self
            .extractor
            .check_space(record.size_bytes, &config.scratch_dir)
        {
            return match e {
                ExtractError::LowSpace {
                    required,
                    available,
                } => {
                    record.transition_to(ArchiveState::LowSpace);
                    tracing::info!(
                        archive = %record.archive_id,
                        required = required,
                        available = available,
                        "Deferring archive until space frees up"
                    );
                    ArchiveOutcome::Deferred {
                        record,
                        required,
                        available,
                    }
                }
                other => self.fail(&mut record, other.into(), None),
            };
        }

        tracing::info!(
            archive = %record.archive_id,
            album = %record.album_name,
            size = %albumproc_common::human::format_bytes(record.size_bytes),
            "Processing archive"
        );

        let scratch = match config
            .scratch_destination(&record.album_name)
            .and_then(ScratchGuard::create)
        {
            Ok(scratch) => scratch,
            Err(e) => return self.fail(&mut record, e, None),
        };

        match self.run_stages(&mut record, &scratch).await {
            Ok(report) => self.finish_success(record, report),
            Err(e) => self.fail(&mut record, e, Some(&scratch)),
        }
    }

    fn check_cancelled(&self) -> ProcessResult<()> {
        if self.ctx.cancel.is_cancelled() {
            return Err(ProcessError::Interrupted);
        }
        Ok(())
    }

    async fn run_stages(
        &self,
        record: &mut ArchiveRecord,
        scratch: &ScratchGuard,
    ) -> ProcessResult<StageReport> {
        let extract_dir = scratch.path().join("extract");
        let album_dir = scratch.path().join("album");
        let work_dir = scratch.path().join("work");
        let scope = self.ctx.scope(&record.album_name, &record.archive_id);

        // Extract
        self.check_cancelled()?;
        let extractor = self.extractor.clone();
        let archive_path = record.path.clone();
        let dest = extract_dir.clone();
        let extract = tokio::task::spawn_blocking(move || extractor.extract(&archive_path, &dest))
            .await
            .map_err(|e| ProcessError::Unexpected(format!("extract worker failed: {}", e)))??;
        record.transition_to(ArchiveState::Extracted);

        // Flatten
        let (from, to) = (extract_dir.clone(), album_dir.clone());
        let flattened = tokio::task::spawn_blocking(move || flatten(&from, &to))
            .await
            .map_err(|e| ProcessError::Unexpected(format!("flatten worker failed: {}", e)))?
            .map_err(|e| ProcessError::ExtractFailed(format!("flatten: {}", e)))?;
        record.transition_to(ArchiveState::Flattened);

        // Classify
        self.check_cancelled()?;
        let dir = album_dir.clone();
        let files = tokio::task::spawn_blocking(move || classify_album(&dir))
            .await
            .map_err(|e| ProcessError::Unexpected(format!("classify worker failed: {}", e)))??;
        record.transition_to(ArchiveState::Classified);

        // Audio and enrichment run side by side on their own pools
        self.check_cancelled()?;
        let (audio, enrichment) = tokio::join!(
            resolve_audio(&self.ctx, &scope, &album_dir, &files),
            enrich_album(&self.ctx, &scope, &album_dir, &work_dir, &files),
        );
        let (decision, audio) = audio?;
        record.transition_to(ArchiveState::AudioResolved);
        let enrichment = enrichment?;
        record.transition_to(ArchiveState::Enriched);

        // Compile
        write_metadata(&album_dir, &record.album_name, &enrichment.results)?;
        tracing::debug!(
            album = %record.album_name,
            sources = enrichment.results.len(),
            "{} written",
            METADATA_FILE_NAME
        );
        record.transition_to(ArchiveState::Compiled);

        // Promote and mark
        let destination = self.choose_destination(&record.album_name)?;
        move_dir(&album_dir, &destination)?;
        self.ctx
            .ledger
            .mark_complete(&destination, &record.archive_id, &record.album_name)?;
        record.transition_to(ArchiveState::MarkedComplete);

        tracing::info!(
            archive = %record.archive_id,
            destination = %destination.display(),
            "Album promoted"
        );

        Ok(StageReport {
            extract,
            flatten: flattened,
            files: files.len(),
            decision,
            audio,
            enrichment: enrichment.stats,
        })
    }

    /// Free destination under the processed root
    ///
    /// An existing directory without a marker is the remnant of an interrupted
    /// promotion and is replaced. One with a marker belongs to another archive
    /// sharing this album name, so ` (N)` is appended instead.
    fn choose_destination(&self, album: &str) -> ProcessResult<PathBuf> {
        let config = &self.ctx.config;
        let mut candidate = config.album_destination(album)?;
        let mut counter = 2usize;

        loop {
            if !candidate.exists() {
                return Ok(candidate);
            }
            if !has_marker(&candidate) {
                tracing::warn!(
                    destination = %candidate.display(),
                    "Replacing incomplete album directory from an earlier run"
                );
                remove_dir_if_exists(&candidate)?;
                return Ok(candidate);
            }
            candidate = config.album_destination(&format!("{} ({})", album, counter))?;
            counter += 1;
        }
    }

    fn finish_success(&self, mut record: ArchiveRecord, report: StageReport) -> ArchiveOutcome {
        let entry = ReportEntry {
            run_id: self.ctx.run_id,
            album: record.album_name.clone(),
            archive: record.archive_id.clone(),
            outcome: ReportOutcome::Ok,
            extracted: report.extract.files_written > 0,
            flattened: report.flatten.from_subdirs > 0,
            files: report.files,
            decision: Some(report.decision),
            audio: report.audio,
            enrichment: report.enrichment,
            duration_s: record.elapsed_seconds(),
            timestamp: now_rfc3339(),
        };
        if let Err(e) = self.ctx.ledger.append_report(&entry) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to append report entry");
        }

        let deleted_original = self.delete_original(&mut record);

        tracing::info!(
            archive = %record.archive_id,
            album = %record.album_name,
            files = report.files,
            decision = ?report.decision,
            elapsed = %albumproc_common::human::format_elapsed(record.elapsed_seconds()),
            "Archive complete"
        );

        ArchiveOutcome::Completed {
            already_complete: false,
            deleted_original,
        }
    }

    fn finish_already_complete(&self, mut record: ArchiveRecord) -> ArchiveOutcome {
        tracing::info!(
            archive = %record.archive_id,
            album = %record.album_name,
            "Album already complete, removing original"
        );
        record.transition_to(ArchiveState::MarkedComplete);

        let entry =
            ReportEntry::already_processed(self.ctx.run_id, &record.album_name, &record.archive_id);
        if let Err(e) = self.ctx.ledger.append_report(&entry) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to append report entry");
        }

        let deleted_original = self.delete_original(&mut record);
        ArchiveOutcome::Completed {
            already_complete: true,
            deleted_original,
        }
    }

    /// Delete the original archive; a failure is recorded as `delete_failed`
    fn delete_original(&self, record: &mut ArchiveRecord) -> bool {
        match fs::remove_file(&record.path) {
            Ok(()) => {
                record.transition_to(ArchiveState::OriginalDeleted);
                if let Err(e) = self.ctx.ledger.record_state(
                    &record.archive_id,
                    &record.album_name,
                    ArchiveState::OriginalDeleted,
                    None,
                ) {
                    tracing::error!(archive = %record.archive_id, error = %e, "Failed to persist state");
                }
                true
            }
            Err(e) => {
                let err = ProcessError::DeleteFailed {
                    path: record.path.clone(),
                    message: e.to_string(),
                };
                tracing::error!(archive = %record.archive_id, error = %err, "Original not deleted");
                let entry = ErrorEntry::new(
                    self.ctx.run_id,
                    &record.album_name,
                    &record.archive_id,
                    err.kind(),
                    err.to_string(),
                );
                if let Err(e) = self.ctx.ledger.append_error(&entry) {
                    tracing::error!(archive = %record.archive_id, error = %e, "Failed to append error entry");
                }
                false
            }
        }
    }

    /// Record a terminal failure and apply the failure-cleanup policy
    fn fail(
        &self,
        record: &mut ArchiveRecord,
        err: ProcessError,
        scratch: Option<&ScratchGuard>,
    ) -> ArchiveOutcome {
        let kind = err.kind();
        let failed_in = record.state;
        record.fail(kind);

        tracing::error!(
            archive = %record.archive_id,
            album = %record.album_name,
            stage = ?failed_in,
            kind = %kind,
            error = %err,
            "Archive failed"
        );

        let entry = ErrorEntry::new(
            self.ctx.run_id,
            &record.album_name,
            &record.archive_id,
            kind,
            err.to_string(),
        );
        if let Err(e) = self.ctx.ledger.append_error(&entry) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to append error entry");
        }
        if let Err(e) = self.ctx.ledger.record_state(
            &record.archive_id,
            &record.album_name,
            ArchiveState::Failed,
            Some(kind),
        ) {
            tracing::error!(archive = %record.archive_id, error = %e, "Failed to persist state");
        }

        if !self.ctx.config.cleanup_on_failure {
            if let Some(scratch) = scratch {
                self.quarantine(record, scratch.path());
            }
        }

        ArchiveOutcome::Failed(kind)
    }

    /// Keep a failed album for inspection under `<processed>/.failed/<album>`
    fn quarantine(&self, record: &ArchiveRecord, scratch: &Path) {
        let album_dir = scratch.join("album");
        let source = if album_dir.exists() {
            album_dir
        } else {
            scratch.join("extract")
        };
        if !source.exists() {
            return;
        }

        let moved = self
            .ctx
            .config
            .failed_destination(&record.album_name)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))
            .and_then(|destination| {
                remove_dir_if_exists(&destination)?;
                move_dir(&source, &destination)?;
                Ok(destination)
            });
        match moved {
            Ok(destination) => tracing::warn!(
                archive = %record.archive_id,
                destination = %destination.display(),
                "Partial album kept for inspection"
            ),
            Err(e) => tracing::error!(
                archive = %record.archive_id,
                error = %e,
                "Could not keep partial album"
            ),
        }
    }
}
