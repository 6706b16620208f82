//! Directory flattener
//!
//! Moves every file of an extracted tree into one flat album directory.
//!
//! **Naming:** files are visited shallowest first, then by path. The first file
//! to claim a leaf name keeps it. A later file with the same leaf name takes its
//! parent directory segments as a prefix (`disc 2_cover.jpg`, then
//! `Album_disc 2_cover.jpg`, ...), widening outward until the name is free. If
//! even the full path collides, ` (N)` is appended to the stem. Name comparison
//! is case-insensitive so the result is safe on case-folding filesystems.
//!
//! The resume marker and the metadata file name are claimed up front, so an
//! archive shipping files with those names keeps them under a ` (N)` name
//! instead of having them overwritten later.

use crate::config::{MARKER_FILE_NAME, METADATA_FILE_NAME};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One file that did not keep its leaf name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    /// Original path relative to the extracted root
    pub from: String,
    /// New name inside the album directory
    pub to: String,
}

/// Flattening result
#[derive(Debug, Clone, Default)]
pub struct FlattenReport {
    pub files: usize,
    /// Files that lived in a subdirectory of the extracted tree
    pub from_subdirs: usize,
    pub renames: Vec<Rename>,
}

/// Move every file under `extracted` into `album_dir`, then remove `extracted`
pub fn flatten(extracted: &Path, album_dir: &Path) -> io::Result<FlattenReport> {
    fs::create_dir_all(album_dir)?;

    let mut sources: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(extracted).follow_links(false) {
        let entry = entry.map_err(io::Error::from)?;
        if entry.file_type().is_file() {
            let relative = entry
                .path()
                .strip_prefix(extracted)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .to_path_buf();
            sources.push(relative);
        }
    }
    sources.sort_by(|a, b| {
        a.components()
            .count()
            .cmp(&b.components().count())
            .then_with(|| a.cmp(b))
    });

    let mut taken: HashSet<String> = [MARKER_FILE_NAME, METADATA_FILE_NAME]
        .iter()
        .map(|n| n.to_lowercase())
        .collect();
    let mut report = FlattenReport::default();

    for relative in &sources {
        let segments: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        let name = choose_name(&segments, &taken);
        taken.insert(name.to_lowercase());

        let leaf = segments.last().cloned().unwrap_or_default();
        if name != leaf {
            tracing::debug!(
                from = %relative.display(),
                to = %name,
                "Renamed on flatten collision"
            );
            report.renames.push(Rename {
                from: relative.to_string_lossy().replace('\\', "/"),
                to: name.clone(),
            });
        }

        fs::rename(extracted.join(relative), album_dir.join(&name))?;
        report.files += 1;
        if segments.len() > 1 {
            report.from_subdirs += 1;
        }
    }

    fs::remove_dir_all(extracted)?;
    Ok(report)
}

/// Pick the first free name for a file whose path is `segments` (leaf last)
fn choose_name(segments: &[String], taken: &HashSet<String>) -> String {
    let is_free = |candidate: &str| !taken.contains(&candidate.to_lowercase());

    let Some((leaf, parents)) = segments.split_last() else {
        return String::new();
    };

    if is_free(leaf) {
        return leaf.clone();
    }

    let mut widest = leaf.clone();
    for start in (0..parents.len()).rev() {
        let mut parts: Vec<&str> = parents[start..].iter().map(String::as_str).collect();
        parts.push(leaf);
        widest = parts.join("_");
        if is_free(&widest) {
            return widest;
        }
    }

    let (stem, extension) = split_extension(&widest);
    let mut counter = 1usize;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{} ({}).{}", stem, counter, ext),
            None => format!("{} ({})", stem, counter),
        };
        if is_free(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn split_extension(name: &str) -> (&str, Option<&str>) {
    match name.rfind('.') {
        Some(dot) if dot > 0 => (&name[..dot], Some(&name[dot + 1..])),
        _ => (name, None),
    }
}
