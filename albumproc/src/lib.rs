//! albumproc library interface
//!
//! Unattended album archive processing: safe extraction, flattening,
//! classification, audio resolution, text enrichment, metadata compilation,
//! and a resumable, space-aware batch controller.

pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod services;
pub mod tools;
pub mod utils;

pub use crate::config::{ConfigOverrides, PipelineConfig};
pub use crate::context::{ArchiveScope, OcrCache, RunContext};
pub use crate::error::{ErrorKind, ProcessError, ProcessResult};
pub use crate::services::{BatchController, Ledger, RunSummary};
pub use crate::tools::ToolSet;
