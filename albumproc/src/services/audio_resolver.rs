//! Audio resolution engine
//!
//! **Decision** (once per album, from lossless and lossy stem sets):
//! - no lossless files → `NoAction`, nothing to resolve
//! - every lossless stem has a lossy twin → `DeleteLossless`
//! - no lossy files at all → `ConvertAndTag`
//! - partial overlap → `NoAction`, album flagged for manual review
//!
//! **ConvertAndTag** runs per file on the audio pool: transcode to
//! `<stem>.partial.mp3`, transfer tags and artwork, rename to `<stem>.mp3`,
//! then delete the lossless source. A failure at any step removes the partial
//! output and leaves that one source untouched.

use crate::config::TARGET_BITRATE_KBPS;
use crate::context::{ArchiveScope, RunContext};
use crate::error::{ErrorKind, ProcessError, ProcessResult};
use crate::models::{AudioDecision, AudioStats, FileKind, FileRecord};
use crate::tools::{TagTransfer, ToolError, Transcoder};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Decision plus whether the album needs a human look
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub decision: AudioDecision,
    pub manual_review: bool,
}

/// Pure decision over stem sets
pub fn decide(lossless: &BTreeSet<String>, lossy: &BTreeSet<String>) -> Resolution {
    let (decision, manual_review) = if lossless.is_empty() {
        (AudioDecision::NoAction, false)
    } else if lossless.is_subset(lossy) {
        (AudioDecision::DeleteLossless, false)
    } else if lossy.is_empty() {
        (AudioDecision::ConvertAndTag, false)
    } else {
        (AudioDecision::NoAction, true)
    };

    Resolution {
        decision,
        manual_review,
    }
}

/// Outcome of one ConvertAndTag unit
#[derive(Debug, Clone, PartialEq, Eq)]
enum ConvertOutcome {
    Converted,
    SkippedExists,
    /// Converted, but the lossless source could not be removed
    SourceKept(String),
    Failed(String),
    /// Cancelled before it started
    NotStarted,
}

/// Apply the audio decision to an album
pub async fn resolve_audio(
    ctx: &RunContext,
    scope: &ArchiveScope,
    album_dir: &Path,
    records: &[FileRecord],
) -> ProcessResult<(AudioDecision, AudioStats)> {
    let lossless: Vec<&FileRecord> = records
        .iter()
        .filter(|r| r.kind == FileKind::AudioLossless)
        .collect();
    let lossy: Vec<&FileRecord> = records
        .iter()
        .filter(|r| r.kind == FileKind::AudioLossy)
        .collect();

    let lossless_stems: BTreeSet<String> = lossless.iter().map(|r| r.stem()).collect();
    let lossy_stems: BTreeSet<String> = lossy.iter().map(|r| r.stem()).collect();
    let resolution = decide(&lossless_stems, &lossy_stems);

    let mut stats = AudioStats {
        lossless_files: lossless.len(),
        lossy_files: lossy.len(),
        manual_review: resolution.manual_review,
        ..Default::default()
    };

    tracing::info!(
        album = %scope.album,
        decision = ?resolution.decision,
        lossless = lossless.len(),
        lossy = lossy.len(),
        "Audio decision"
    );

    match resolution.decision {
        AudioDecision::NoAction => {
            if resolution.manual_review {
                tracing::warn!(
                    album = %scope.album,
                    "Partial lossless/lossy overlap, leaving audio for manual review"
                );
            }
        }
        AudioDecision::DeleteLossless => {
            for record in &lossless {
                match fs::remove_file(album_dir.join(&record.path)) {
                    Ok(()) => stats.deleted_lossless += 1,
                    Err(e) => {
                        stats.errors += 1;
                        scope.record(
                            ErrorKind::UnexpectedError,
                            &record.display_name(),
                            format!("delete lossless failed: {}", e),
                        );
                    }
                }
            }
        }
        AudioDecision::ConvertAndTag => {
            convert_all(ctx, scope, album_dir, &lossless, &mut stats).await?;
        }
    }

    Ok((resolution.decision, stats))
}

async fn convert_all(
    ctx: &RunContext,
    scope: &ArchiveScope,
    album_dir: &Path,
    lossless: &[&FileRecord],
    stats: &mut AudioStats,
) -> ProcessResult<()> {
    // Two lossless files sharing a stem would race for one target; the first wins
    let mut claimed = HashSet::new();
    let mut jobs: Vec<(String, PathBuf)> = Vec::new();
    for record in lossless {
        if claimed.insert(record.stem()) {
            jobs.push((record.display_name(), record.path.clone()));
        } else {
            tracing::info!(file = %record.display_name(), "Target stem already claimed, skipping");
            stats.skipped_exists += 1;
        }
    }

    let workers = ctx.config.audio_workers.max(1);
    let transcoder = ctx.tools.transcoder.clone();
    let tags = ctx.tools.tags.clone();
    let cancel = ctx.cancel.clone();

    let outcomes: Vec<(String, ConvertOutcome)> = stream::iter(jobs)
        .map(|(name, relative)| {
            let transcoder = transcoder.clone();
            let tags = tags.clone();
            let cancel = cancel.clone();
            let source = album_dir.join(&relative);
            async move {
                if cancel.is_cancelled() {
                    return (name, ConvertOutcome::NotStarted);
                }
                let outcome = tokio::task::spawn_blocking(move || {
                    convert_one(transcoder, tags, &source, TARGET_BITRATE_KBPS)
                })
                .await
                .unwrap_or_else(|e| ConvertOutcome::Failed(format!("worker panicked: {}", e)));
                (name, outcome)
            }
        })
        .buffer_unordered(workers)
        .collect()
        .await;

    let mut interrupted = false;
    for (name, outcome) in outcomes {
        match outcome {
            ConvertOutcome::Converted => stats.converted += 1,
            ConvertOutcome::SkippedExists => stats.skipped_exists += 1,
            ConvertOutcome::SourceKept(message) => {
                stats.converted += 1;
                stats.errors += 1;
                scope.record(ErrorKind::ConversionError, &name, message);
            }
            ConvertOutcome::Failed(message) => {
                stats.errors += 1;
                scope.record(ErrorKind::ConversionError, &name, message);
            }
            ConvertOutcome::NotStarted => interrupted = true,
        }
    }

    tracing::info!(
        album = %scope.album,
        converted = stats.converted,
        skipped = stats.skipped_exists,
        errors = stats.errors,
        "ConvertAndTag finished"
    );

    if interrupted {
        return Err(ProcessError::Interrupted);
    }
    Ok(())
}

/// Transcode, tag, promote, and delete one lossless source (blocking)
fn convert_one(
    transcoder: Arc<dyn Transcoder>,
    tags: Arc<dyn TagTransfer>,
    source: &Path,
    bitrate_kbps: u32,
) -> ConvertOutcome {
    let Some(dir) = source.parent() else {
        return ConvertOutcome::Failed(format!("no parent directory: {}", source.display()));
    };
    let stem = crate::models::file_record::file_stem(source);
    let target = dir.join(format!("{}.mp3", stem));
    let partial = dir.join(format!("{}.partial.mp3", stem));

    if target.exists() {
        return ConvertOutcome::SkippedExists;
    }

    let produce = || -> Result<usize, ToolError> {
        transcoder.transcode(source, &partial, bitrate_kbps)?;
        let items = tags.transfer(source, &partial)?;
        fs::rename(&partial, &target)?;
        Ok(items)
    };

    match produce() {
        Ok(items) => {
            tracing::debug!(
                source = %source.display(),
                target = %target.display(),
                tag_items = items,
                "Converted"
            );
        }
        Err(e) => {
            if let Err(cleanup) = fs::remove_file(&partial) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(partial = %partial.display(), error = %cleanup, "Partial output not removed");
                }
            }
            return ConvertOutcome::Failed(e.to_string());
        }
    }

    match fs::remove_file(source) {
        Ok(()) => ConvertOutcome::Converted,
        Err(e) => ConvertOutcome::SourceKept(format!("converted but source not deleted: {}", e)),
    }
}
