//! Processed-album inventory
//!
//! One JSON line per album directory under the processed root, followed by a
//! totals line. Hidden directories (including the `.failed` quarantine) are
//! not albums and are skipped.

use crate::services::ledger::has_marker;
use crate::utils::dir_size;
use albumproc_common::human::bytes_to_mb;
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// One album directory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InventoryEntry {
    pub album: String,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub file_count: usize,
    /// Resume marker present
    pub complete: bool,
}

/// Sum over all albums
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryTotals {
    pub albums: usize,
    pub size_bytes: u64,
    pub size_mb: f64,
    pub file_count: usize,
}

/// Collect inventory entries sorted by album name
pub fn collect(processed_dir: &Path) -> io::Result<(Vec<InventoryEntry>, InventoryTotals)> {
    let mut entries = Vec::new();

    if processed_dir.is_dir() {
        for entry in fs::read_dir(processed_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let album = entry.file_name().to_string_lossy().to_string();
            if album.starts_with('.') {
                continue;
            }

            let (size_bytes, file_count) = dir_size(&entry.path());
            entries.push(InventoryEntry {
                album,
                size_bytes,
                size_mb: bytes_to_mb(size_bytes),
                file_count,
                complete: has_marker(&entry.path()),
            });
        }
    }
    entries.sort_by(|a, b| a.album.cmp(&b.album));

    let size_bytes: u64 = entries.iter().map(|e| e.size_bytes).sum();
    let totals = InventoryTotals {
        albums: entries.len(),
        size_bytes,
        size_mb: bytes_to_mb(size_bytes),
        file_count: entries.iter().map(|e| e.file_count).sum(),
    };

    Ok((entries, totals))
}

/// Write the inventory as JSON lines
pub fn write_inventory<W: Write>(processed_dir: &Path, out: &mut W) -> io::Result<InventoryTotals> {
    let (entries, totals) = collect(processed_dir)?;
    for entry in &entries {
        writeln!(out, "{}", serde_json::to_string(entry).map_err(io::Error::from)?)?;
    }
    writeln!(
        out,
        "{}",
        serde_json::to_string(&serde_json::json!({ "totals": &totals })).map_err(io::Error::from)?
    )?;
    Ok(totals)
}
