//! Run-scoped context threaded through every pipeline stage
//!
//! Replaces process-wide mutable state: the run id, resolved configuration,
//! ledger writer, tool capabilities, OCR cache, and cancellation token all
//! live here and are passed explicitly.

use crate::config::PipelineConfig;
use crate::error::ErrorKind;
use crate::models::ErrorEntry;
use crate::services::ledger::Ledger;
use crate::tools::ToolSet;
use crate::utils::SpaceProbe;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Shared state for one invocation of the batch controller
#[derive(Clone)]
pub struct RunContext {
    pub run_id: Uuid,
    pub config: Arc<PipelineConfig>,
    pub ledger: Arc<Ledger>,
    pub tools: ToolSet,
    pub space: Arc<dyn SpaceProbe>,
    pub ocr_cache: OcrCache,
    pub cancel: CancellationToken,
}

impl RunContext {
    pub fn new(
        config: PipelineConfig,
        ledger: Arc<Ledger>,
        tools: ToolSet,
        space: Arc<dyn SpaceProbe>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            config: Arc::new(config),
            ledger,
            tools,
            space,
            ocr_cache: OcrCache::default(),
            cancel,
        }
    }

    /// Error recorder bound to one archive
    pub fn scope(&self, album: &str, archive: &str) -> ArchiveScope {
        ArchiveScope {
            run_id: self.run_id,
            album: album.to_string(),
            archive: archive.to_string(),
            ledger: self.ledger.clone(),
        }
    }
}

/// Records per-file errors for the archive currently being processed
///
/// Cheap to clone into worker tasks.
#[derive(Clone)]
pub struct ArchiveScope {
    pub run_id: Uuid,
    pub album: String,
    pub archive: String,
    ledger: Arc<Ledger>,
}

impl ArchiveScope {
    /// Append an error entry naming `file`; ledger write failures are logged, never raised
    pub fn record(&self, kind: ErrorKind, file: &str, message: impl Into<String>) {
        let entry = ErrorEntry::new(self.run_id, &self.album, &self.archive, kind, message)
            .with_file(file);

        tracing::warn!(
            album = %self.album,
            file = %file,
            kind = %kind,
            error = %entry.message,
            "Unit of work failed"
        );

        if let Err(e) = self.ledger.append_error(&entry) {
            tracing::error!(album = %self.album, error = %e, "Failed to append error entry");
        }
    }
}

/// OCR text keyed by image content hash, shared for the whole run
#[derive(Clone, Default)]
pub struct OcrCache {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl OcrCache {
    pub fn get(&self, hash: &str) -> Option<String> {
        self.lock().get(hash).cloned()
    }

    pub fn insert(&self, hash: String, text: String) {
        self.lock().insert(hash, text);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
