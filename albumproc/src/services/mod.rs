//! Pipeline services for albumproc
//!
//! Leaf-first: extraction, flattening, classification, audio resolution, text
//! enrichment, metadata compilation, the ledger, and the batch controller that
//! drives them.

pub mod archive_scanner;
pub mod audio_resolver;
pub mod batch_controller;
pub mod classifier;
pub mod flattener;
pub mod inventory;
pub mod ledger;
pub mod metadata_compiler;
pub mod safe_extractor;
pub mod text_enrichment;

pub use archive_scanner::{ArchiveScanner, DiscoveredArchive, ScanError};
pub use audio_resolver::{decide, resolve_audio, Resolution};
pub use batch_controller::{ArchiveOutcome, BatchController, RunSummary};
pub use classifier::{classify_album, classify_file, kind_for_extension};
pub use flattener::{flatten, FlattenReport, Rename};
pub use ledger::Ledger;
pub use metadata_compiler::{compile, write_metadata};
pub use safe_extractor::{ExtractError, ExtractReport, SafeExtractor};
pub use text_enrichment::{enrich_album, EnrichmentOutcome};
