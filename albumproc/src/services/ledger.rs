//! Resume & report ledger
//!
//! Three append-only JSON-lines files in the state directory:
//! - `processing_report.jsonl`: one [`ReportEntry`] per successful archive
//! - `errors.jsonl`: one [`ErrorEntry`] per recorded failure
//! - `archive_state.jsonl`: one [`StateRecord`] per persisted transition
//!
//! plus a resume marker file inside every completed album directory.
//!
//! **Concurrency:** each file is held open in append mode behind its own mutex
//! and every record is written with a single `write_all` of one full line, so
//! the audio and OCR pools can append concurrently without interleaving.

use crate::config::{ERRORS_FILE_NAME, MARKER_FILE_NAME, REPORT_FILE_NAME, STATE_FILE_NAME};
use crate::error::ErrorKind;
use crate::models::{ArchiveState, ErrorEntry, ReportEntry, StateRecord};
use albumproc_common::time::now_rfc3339;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Append-only ledger owned by one batch controller at a time
pub struct Ledger {
    state_dir: PathBuf,
    report: Mutex<File>,
    errors: Mutex<File>,
    state: Mutex<StateStore>,
}

struct StateStore {
    file: File,
    latest: HashMap<String, StateRecord>,
}

impl Ledger {
    /// Open (creating if needed) the ledger files in `state_dir` and load the state store
    pub fn open(state_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(state_dir)?;

        let state_path = state_dir.join(STATE_FILE_NAME);
        let latest = load_latest_states(&state_path)?;
        tracing::debug!(
            state_file = %state_path.display(),
            archives = latest.len(),
            "Loaded archive state store"
        );

        Ok(Self {
            state_dir: state_dir.to_path_buf(),
            report: Mutex::new(open_append(&state_dir.join(REPORT_FILE_NAME))?),
            errors: Mutex::new(open_append(&state_dir.join(ERRORS_FILE_NAME))?),
            state: Mutex::new(StateStore {
                file: open_append(&state_path)?,
                latest,
            }),
        })
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn report_path(&self) -> PathBuf {
        self.state_dir.join(REPORT_FILE_NAME)
    }

    pub fn errors_path(&self) -> PathBuf {
        self.state_dir.join(ERRORS_FILE_NAME)
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }

    /// Append one success record
    pub fn append_report(&self, entry: &ReportEntry) -> io::Result<()> {
        append_line(&mut lock(&self.report), entry)
    }

    /// Append one error record
    pub fn append_error(&self, entry: &ErrorEntry) -> io::Result<()> {
        tracing::debug!(
            archive = %entry.archive,
            kind = %entry.kind,
            "Recording error entry"
        );
        append_line(&mut lock(&self.errors), entry)
    }

    /// Persist a state transition for `archive`
    pub fn record_state(
        &self,
        archive: &str,
        album: &str,
        state: ArchiveState,
        error_kind: Option<ErrorKind>,
    ) -> io::Result<()> {
        let record = StateRecord {
            archive: archive.to_string(),
            album: album.to_string(),
            state,
            error_kind,
            timestamp: now_rfc3339(),
        };

        let mut store = lock(&self.state);
        append_line(&mut store.file, &record)?;
        store.latest.insert(record.archive.clone(), record);
        Ok(())
    }

    /// Most recent persisted record for `archive`
    pub fn last_state(&self, archive: &str) -> Option<StateRecord> {
        lock(&self.state).latest.get(archive).cloned()
    }

    /// Write the resume marker inside `album_dir` and persist `MarkedComplete`
    pub fn mark_complete(&self, album_dir: &Path, archive: &str, album: &str) -> io::Result<()> {
        let marker = serde_json::json!({
            "archive": archive,
            "album": album,
            "completed_at": now_rfc3339(),
        });
        fs::write(album_dir.join(MARKER_FILE_NAME), format!("{}\n", marker))?;
        self.record_state(archive, album, ArchiveState::MarkedComplete, None)
    }

    /// Album completed in this or an earlier run
    ///
    /// The state store is authoritative; a marker file alone also counts so
    /// albums completed before the store existed are still recognized. A marker
    /// naming a different archive (two archives with the same file stem) does
    /// not count.
    pub fn is_complete(&self, album_dir: &Path, archive: &str) -> bool {
        let persisted = self
            .last_state(archive)
            .map(|record| record.state.is_complete())
            .unwrap_or(false);

        persisted || marker_matches(album_dir, archive)
    }
}

/// Resume marker present inside `album_dir`
pub fn has_marker(album_dir: &Path) -> bool {
    album_dir.join(MARKER_FILE_NAME).is_file()
}

/// Marker present and either written for `archive` or carrying no archive at all
pub fn marker_matches(album_dir: &Path, archive: &str) -> bool {
    let Ok(content) = fs::read_to_string(album_dir.join(MARKER_FILE_NAME)) else {
        return false;
    };

    match serde_json::from_str::<serde_json::Value>(&content) {
        Ok(value) => match value.get("archive").and_then(|a| a.as_str()) {
            Some(owner) => owner == archive,
            None => true,
        },
        Err(_) => true,
    }
}

/// Parse every well-formed line of a JSON-lines file; a missing file is empty
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> io::Result<Vec<T>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!(
                    file = %path.display(),
                    line = index + 1,
                    error = %e,
                    "Skipping malformed ledger line"
                );
            }
        }
    }
    Ok(records)
}

fn load_latest_states(path: &Path) -> io::Result<HashMap<String, StateRecord>> {
    let records: Vec<StateRecord> = read_jsonl(path)?;
    let mut latest = HashMap::new();
    for record in records {
        latest.insert(record.archive.clone(), record);
    }
    Ok(latest)
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn append_line<T: Serialize>(file: &mut File, record: &T) -> io::Result<()> {
    let mut line = serde_json::to_string(record).map_err(io::Error::from)?;
    line.push('\n');
    file.write_all(line.as_bytes())?;
    file.flush()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
