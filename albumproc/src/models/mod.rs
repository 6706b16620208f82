//! Data models for the archive processor
//!
//! - Per-archive state machine
//! - File records produced by the classifier
//! - Enrichment results and ledger entries

pub mod archive;
pub mod enrichment;
pub mod file_record;
pub mod report;

pub use archive::{ArchiveRecord, ArchiveState, StateTransition};
pub use enrichment::{EnrichmentResult, TextProvenance};
pub use file_record::{FileKind, FileRecord};
pub use report::{
    AudioDecision, AudioStats, EnrichmentStats, ErrorEntry, ReportEntry, ReportOutcome,
    StateRecord,
};
