//! Per-archive state machine
//!
//! `Discovered → Extracted → Flattened → Classified → AudioResolved → Enriched
//! → Compiled → MarkedComplete → OriginalDeleted`, with `LowSpace` as the only
//! non-terminal detour and `Failed` as the terminal failure state.

use crate::error::ErrorKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Processing state of one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveState {
    /// Found by the scan, not yet attempted (or interrupted)
    Discovered,
    /// Deferred: not enough free space, retried next pass
    LowSpace,
    /// Entries unpacked into the scratch area
    Extracted,
    /// Nested directories collapsed into one album directory
    Flattened,
    /// Files partitioned into audio / image / document / other
    Classified,
    /// Audio decision applied
    AudioResolved,
    /// Text extracted from documents and images
    Enriched,
    /// `album_metadata.md` written
    Compiled,
    /// Album promoted and resume marker written
    MarkedComplete,
    /// Original archive removed
    OriginalDeleted,
    /// Terminal failure, original archive preserved
    Failed,
}

impl ArchiveState {
    /// Album reached terminal success (original may or may not be gone yet)
    pub fn is_complete(&self) -> bool {
        matches!(self, ArchiveState::MarkedComplete | ArchiveState::OriginalDeleted)
    }
}

/// State transition event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub archive_id: String,
    pub old_state: ArchiveState,
    pub new_state: ArchiveState,
    pub transitioned_at: DateTime<Utc>,
}

/// One archive as tracked by the batch controller
#[derive(Debug, Clone)]
pub struct ArchiveRecord {
    /// Stable identity: path relative to the archive root
    pub archive_id: String,

    /// Absolute path of the archive file
    pub path: PathBuf,

    /// Archive size at discovery
    pub size_bytes: u64,

    /// Album directory name: the archive file stem, reduced to one safe path segment
    pub album_name: String,

    /// Current state
    pub state: ArchiveState,

    /// Set when the archive ends in `Failed`
    pub error_kind: Option<ErrorKind>,

    /// Transitions recorded during this attempt
    pub history: Vec<StateTransition>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ArchiveRecord {
    /// Create a record for a freshly discovered archive
    pub fn discovered(archive_root: &Path, path: &Path, size_bytes: u64) -> Self {
        let archive_id = path
            .strip_prefix(archive_root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let album_name = album_name_for(path, &archive_id);

        Self {
            archive_id,
            path: path.to_path_buf(),
            size_bytes,
            album_name,
            state: ArchiveState::Discovered,
            error_kind: None,
            history: Vec::new(),
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state
    pub fn transition_to(&mut self, new_state: ArchiveState) -> StateTransition {
        let transition = StateTransition {
            archive_id: self.archive_id.clone(),
            old_state: self.state,
            new_state,
            transitioned_at: Utc::now(),
        };
        self.state = new_state;

        if self.is_terminal() {
            self.ended_at = Some(Utc::now());
        }

        tracing::debug!(
            archive = %self.archive_id,
            from = ?transition.old_state,
            to = ?transition.new_state,
            "Archive state transition"
        );

        self.history.push(transition.clone());
        transition
    }

    /// Enter `Failed` with the given error kind
    pub fn fail(&mut self, kind: ErrorKind) -> StateTransition {
        self.error_kind = Some(kind);
        self.transition_to(ArchiveState::Failed)
    }

    /// Check if the record is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, ArchiveState::OriginalDeleted | ArchiveState::Failed)
    }

    /// Seconds since processing of this archive started
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.ended_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// True when `name` is exactly one normal path component
///
/// Joined onto a root, such a name always yields a strict child of that root.
pub fn is_single_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(segment)), None) if segment == name
    )
}

/// Album directory name for an archive
///
/// Separators are replaced and leading dots stripped, so names like `..`,
/// `.` or `.failed` can never address the scratch or processed root itself.
/// Stems with nothing left fall back to `archive-<hash of archive id>`, which
/// stays stable across runs so the resume check still finds the album.
fn album_name_for(path: &Path, archive_id: &str) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').trim().to_string();

    if is_single_segment(&cleaned) {
        return cleaned;
    }

    let digest = format!("{:x}", Sha256::digest(archive_id.as_bytes()));
    let fallback = format!("archive-{}", &digest[..12]);
    tracing::warn!(
        archive = %archive_id,
        album = %fallback,
        "Archive name is not usable as a directory name, using fallback"
    );
    fallback
}
