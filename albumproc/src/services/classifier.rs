//! File classifier
//!
//! Partitions an album directory's files into lossless audio, lossy audio,
//! image, document, and other. Extension first; files without a known
//! extension are content-sniffed. Audio gets a duration, images a SHA-256
//! content hash for OCR dedup.

use crate::config::{MARKER_FILE_NAME, METADATA_FILE_NAME};
use crate::models::{FileKind, FileRecord};
use crate::utils::sha256_file;
use lofty::file::AudioFile;
use lofty::probe::Probe;
use std::fs;
use std::io;
use std::path::Path;

/// Kind implied by a lowercased extension
pub fn kind_for_extension(ext: &str) -> Option<FileKind> {
    match ext {
        "flac" | "wav" | "aif" | "aiff" | "wv" | "ape" => Some(FileKind::AudioLossless),
        "mp3" | "ogg" | "oga" | "opus" | "m4a" | "aac" => Some(FileKind::AudioLossy),
        "jpg" | "jpeg" | "png" | "gif" | "bmp" | "tif" | "tiff" | "webp" => Some(FileKind::Image),
        "pdf" | "txt" | "nfo" | "md" => Some(FileKind::Document),
        _ => None,
    }
}

/// Kind from magic bytes, for files whose extension says nothing
fn sniff_kind(path: &Path) -> FileKind {
    match infer::get_from_path(path) {
        Ok(Some(detected)) => {
            let kind = kind_for_extension(detected.extension()).unwrap_or(FileKind::Other);
            tracing::debug!(
                path = %path.display(),
                mime = detected.mime_type(),
                kind = ?kind,
                "Content-sniffed file"
            );
            kind
        }
        Ok(None) => FileKind::Other,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Content sniff failed");
            FileKind::Other
        }
    }
}

/// Duration in seconds, `None` when the container cannot be read
fn audio_duration(path: &Path) -> Option<f64> {
    let tagged_file = Probe::open(path).ok()?.read().ok()?;
    let seconds = tagged_file.properties().duration().as_secs_f64();
    (seconds > 0.0).then_some(seconds)
}

/// Classify one file at `album_dir/relative`
pub fn classify_file(album_dir: &Path, relative: &Path) -> io::Result<FileRecord> {
    let path = album_dir.join(relative);
    let size_bytes = fs::metadata(&path)?.len();

    let extension = relative
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let kind = kind_for_extension(&extension).unwrap_or_else(|| sniff_kind(&path));

    let duration_seconds = if kind.is_audio() {
        audio_duration(&path)
    } else {
        None
    };

    let content_hash = if kind == FileKind::Image {
        Some(sha256_file(&path)?)
    } else {
        None
    };

    Ok(FileRecord {
        path: relative.to_path_buf(),
        kind,
        content_hash,
        duration_seconds,
        size_bytes,
    })
}

/// Classify every regular file in a flat album directory, sorted by name
pub fn classify_album(album_dir: &Path) -> io::Result<Vec<FileRecord>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(album_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if name == MARKER_FILE_NAME || name == METADATA_FILE_NAME {
            continue;
        }
        names.push(name);
    }
    names.sort();

    let records = names
        .iter()
        .map(|name| classify_file(album_dir, Path::new(name)))
        .collect::<io::Result<Vec<_>>>()?;

    tracing::debug!(
        album_dir = %album_dir.display(),
        files = records.len(),
        lossless = records.iter().filter(|r| r.kind == FileKind::AudioLossless).count(),
        lossy = records.iter().filter(|r| r.kind == FileKind::AudioLossy).count(),
        images = records.iter().filter(|r| r.kind == FileKind::Image).count(),
        documents = records.iter().filter(|r| r.kind == FileKind::Document).count(),
        "Album classified"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, seconds: u32) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(8000 * seconds) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_extension_table() {
        assert_eq!(kind_for_extension("flac"), Some(FileKind::AudioLossless));
        assert_eq!(kind_for_extension("aiff"), Some(FileKind::AudioLossless));
        assert_eq!(kind_for_extension("opus"), Some(FileKind::AudioLossy));
        assert_eq!(kind_for_extension("tiff"), Some(FileKind::Image));
        assert_eq!(kind_for_extension("nfo"), Some(FileKind::Document));
        assert_eq!(kind_for_extension("cue"), None);
    }

    #[test]
    fn test_classify_album() {
        let temp_dir = TempDir::new().unwrap();
        let album = temp_dir.path();

        write_wav(&album.join("01 Track.wav"), 2);
        fs::write(album.join("cover.jpg"), b"not really a jpeg").unwrap();
        fs::write(album.join("notes.txt"), b"liner notes").unwrap();
        fs::write(album.join("album.cue"), b"FILE x").unwrap();
        fs::write(album.join(MARKER_FILE_NAME), b"{}").unwrap();
        fs::write(album.join(METADATA_FILE_NAME), b"# x").unwrap();

        let records = classify_album(album).unwrap();
        let names: Vec<String> = records.iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["01 Track.wav", "album.cue", "cover.jpg", "notes.txt"]);

        let wav = &records[0];
        assert_eq!(wav.kind, FileKind::AudioLossless);
        let duration = wav.duration_seconds.unwrap();
        assert!((duration - 2.0).abs() < 0.1);

        assert_eq!(records[1].kind, FileKind::Other);
        assert_eq!(records[2].kind, FileKind::Image);
        assert_eq!(records[2].content_hash.as_ref().unwrap().len(), 64);
        assert_eq!(records[3].kind, FileKind::Document);
        assert!(records[3].content_hash.is_none());
    }

    #[test]
    fn test_sniff_unknown_extension() {
        let temp_dir = TempDir::new().unwrap();
        let album = temp_dir.path();
        // Minimal PNG signature + IHDR start
        let png = [
            0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
            0x44, 0x52,
        ];
        fs::write(album.join("scan_001"), png).unwrap();

        let record = classify_file(album, Path::new("scan_001")).unwrap();
        assert_eq!(record.kind, FileKind::Image);
        assert!(record.content_hash.is_some());
    }

    #[test]
    fn test_unreadable_audio_has_no_duration() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("broken.flac"), b"garbage").unwrap();

        let record = classify_file(temp_dir.path(), Path::new("broken.flac")).unwrap();
        assert_eq!(record.kind, FileKind::AudioLossless);
        assert!(record.duration_seconds.is_none());
    }
}
