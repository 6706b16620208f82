//! albumproc - unattended album archive processor
//!
//! Scans a directory of ZIP album archives and processes each one to a
//! flattened, resolved, documented album directory. Per-archive failures are
//! recorded and never stop the batch; only a missing external tool at startup
//! is fatal.

use albumproc::services::inventory;
use albumproc::utils::FsSpaceProbe;
use albumproc::{BatchController, ConfigOverrides, Ledger, PipelineConfig, RunContext, ToolSet};
use anyhow::{Context, Result};
use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Command-line arguments for albumproc
#[derive(Parser, Debug)]
#[command(name = "albumproc")]
#[command(about = "Unattended album archive processor")]
#[command(version)]
struct Args {
    /// Directory scanned for ZIP archives
    #[arg(short = 'd', long, env = "ALBUMPROC_ARCHIVE_DIR", global = true)]
    archive_dir: Option<PathBuf>,

    /// Scratch extraction area (default: <archive-dir>/.tmp)
    #[arg(long, env = "ALBUMPROC_SCRATCH_DIR", global = true)]
    scratch_dir: Option<PathBuf>,

    /// Root that completed albums are promoted into (default: <archive-dir>/processed)
    #[arg(long, env = "ALBUMPROC_PROCESSED_DIR", global = true)]
    processed_dir: Option<PathBuf>,

    /// Directory for the ledgers and log file (default: <archive-dir>)
    #[arg(long, env = "ALBUMPROC_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// Concurrent transcodes per album
    #[arg(long, env = "ALBUMPROC_AUDIO_WORKERS")]
    audio_workers: Option<usize>,

    /// Concurrent OCR/rasterize jobs per album
    #[arg(long, env = "ALBUMPROC_OCR_WORKERS")]
    ocr_workers: Option<usize>,

    /// Enable OCR of images and image-only PDFs
    #[arg(long, env = "ALBUMPROC_OCR_ENABLED", value_parser = BoolishValueParser::new())]
    ocr_enabled: Option<bool>,

    /// OCR language passed to the OCR engine
    #[arg(long, env = "ALBUMPROC_OCR_LANG")]
    ocr_lang: Option<String>,

    /// Delete partial albums on failure (otherwise keep them under <processed>/.failed)
    #[arg(long, env = "ALBUMPROC_CLEANUP_ON_FAILURE", value_parser = BoolishValueParser::new())]
    cleanup_on_failure: Option<bool>,

    /// Retry archives that previously failed permanently
    #[arg(long, env = "ALBUMPROC_RETRY_FAILED", value_parser = BoolishValueParser::new())]
    retry_failed: Option<bool>,

    /// Lower bound for the free-space requirement, in bytes
    #[arg(long, env = "ALBUMPROC_MIN_FREE_BYTES")]
    min_free_bytes: Option<u64>,

    /// Time limit for one transcode, in seconds
    #[arg(long, env = "ALBUMPROC_TRANSCODE_TIMEOUT_SECS", hide = true)]
    transcode_timeout_secs: Option<u64>,

    /// Time limit for one OCR or rasterize call, in seconds
    #[arg(long, env = "ALBUMPROC_OCR_TIMEOUT_SECS", hide = true)]
    ocr_timeout_secs: Option<u64>,

    /// Explicit TOML config file
    #[arg(long, env = "ALBUMPROC_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every archive (default)
    Run,
    /// Print one JSON line per processed album plus totals
    Inventory,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            archive_dir: self.archive_dir.clone(),
            scratch_dir: self.scratch_dir.clone(),
            processed_dir: self.processed_dir.clone(),
            state_dir: self.state_dir.clone(),
            audio_workers: self.audio_workers,
            ocr_workers: self.ocr_workers,
            ocr_enabled: self.ocr_enabled,
            ocr_lang: self.ocr_lang.clone(),
            cleanup_on_failure: self.cleanup_on_failure,
            retry_failed: self.retry_failed,
            min_free_bytes: self.min_free_bytes,
            transcode_timeout_secs: self.transcode_timeout_secs,
            ocr_timeout_secs: self.ocr_timeout_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // `ALBUMPROC_CONFIG` is already folded into `args.config` by clap
    let toml = albumproc_common::config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = PipelineConfig::resolve(args.overrides(), toml)
        .context("Invalid configuration")?;

    if let Some(Command::Inventory) = args.command {
        let stdout = std::io::stdout();
        inventory::write_inventory(&config.processed_dir, &mut stdout.lock())
            .context("Failed to write inventory")?;
        return Ok(());
    }

    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("Failed to create state dir {}", config.state_dir.display()))?;
    albumproc_common::logging::init(&config.logging, &config.state_dir)
        .context("Failed to initialize logging")?;

    info!("Starting albumproc");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Missing tools are fatal before any archive is touched
    let tools = ToolSet::detect(&config).context("Required external tool not available")?;

    let ledger = Arc::new(
        Ledger::open(&config.state_dir)
            .with_context(|| format!("Failed to open ledger in {}", config.state_dir.display()))?,
    );

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let ctx = RunContext::new(config, ledger, tools, Arc::new(FsSpaceProbe), cancel);
    let controller = BatchController::new(ctx);
    let summary = controller.run().await;

    println!("{}", summary);
    Ok(())
}

/// Cancel the run on Ctrl+C or SIGTERM
///
/// In-flight per-file work finishes; no new archive is started.
async fn cancel_on_signal(cancel: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, finishing in-flight work");
        },
        _ = terminate => {
            info!("Received terminate signal, finishing in-flight work");
        },
    }
    cancel.cancel();
}
