//! End-of-run summary

use albumproc_common::human::format_elapsed;
use serde::Serialize;
use uuid::Uuid;

/// Counts for one invocation of the batch controller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Archives taken to terminal success in this run
    pub processed: usize,
    /// Archives whose album was already complete (resume marker or state store)
    pub already_complete: usize,
    pub deleted_originals: usize,
    pub failed: usize,
    /// Still waiting for free space when the loop stopped
    pub deferred_space: usize,
    /// Skipped because an earlier run recorded a permanent failure
    pub skipped_permanent: usize,
    pub passes: usize,
    pub interrupted: bool,
    pub elapsed_seconds: f64,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            ..Default::default()
        }
    }

    /// Emit the summary as one structured log event
    pub fn log(&self) {
        tracing::info!(
            run_id = %self.run_id,
            processed = self.processed,
            already_complete = self.already_complete,
            deleted_originals = self.deleted_originals,
            failed = self.failed,
            deferred_space = self.deferred_space,
            skipped_permanent = self.skipped_permanent,
            passes = self.passes,
            interrupted = self.interrupted,
            elapsed = %format_elapsed(self.elapsed_seconds),
            "Batch run finished"
        );
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Run {} summary", self.run_id)?;
        writeln!(f, "  processed:          {}", self.processed)?;
        writeln!(f, "  already complete:   {}", self.already_complete)?;
        writeln!(f, "  originals deleted:  {}", self.deleted_originals)?;
        writeln!(f, "  failed:             {}", self.failed)?;
        writeln!(f, "  deferred (space):   {}", self.deferred_space)?;
        writeln!(f, "  skipped permanent:  {}", self.skipped_permanent)?;
        writeln!(f, "  passes:             {}", self.passes)?;
        if self.interrupted {
            writeln!(f, "  interrupted:        yes")?;
        }
        write!(f, "  elapsed:            {}", format_elapsed(self.elapsed_seconds))
    }
}
