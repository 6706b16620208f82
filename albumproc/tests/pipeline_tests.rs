//! End-to-end batch runs over real ZIP archives with fake external tools
//!
//! Covers the success path, the audio decisions, and idempotent re-runs.

mod helpers;

use albumproc::config::{MARKER_FILE_NAME, METADATA_FILE_NAME};
use helpers::{flac_bytes, Fakes, FakeTranscoder, Harness};
use std::fs;
use std::sync::Arc;

// ============================================================================
// Success path
// ============================================================================

#[tokio::test]
async fn test_lossless_only_album_is_converted_and_promoted() {
    let harness = Harness::new();
    let one = flac_bytes("one");
    let two = flac_bytes("two");
    let archive = harness.add_archive(
        "Blue Train",
        &[
            ("Blue Train/01 - Blue Train.flac", &one[..]),
            ("Blue Train/02 - Moment's Notice.flac", &two[..]),
            ("Blue Train/notes.txt", b"Recorded at Van Gelder Studio, 1957."),
            ("Blue Train/__MACOSX/._notes.txt", b"junk"),
        ],
    );
    let fakes = Fakes::default();

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.deleted_originals, 1);
    assert!(!archive.exists(), "original deleted after success");

    let album = harness.album("Blue Train");
    assert_eq!(
        harness.list(&album),
        vec![
            MARKER_FILE_NAME.to_string(),
            "01 - Blue Train.mp3".to_string(),
            "02 - Moment's Notice.mp3".to_string(),
            METADATA_FILE_NAME.to_string(),
            "notes.txt".to_string(),
        ]
    );
    assert_eq!(fakes.transcoder.calls(), 2);

    let metadata = fs::read_to_string(album.join(METADATA_FILE_NAME)).unwrap();
    assert!(metadata.starts_with("# Blue Train\n"));
    assert!(metadata.contains("## notes.txt"));
    assert!(metadata.contains("Recorded at Van Gelder Studio, 1957."));

    let reports = harness.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0]["outcome"], "ok");
    assert_eq!(reports[0]["archive"], "Blue Train.zip");
    assert_eq!(reports[0]["decision"], "convert_and_tag");
    assert_eq!(reports[0]["audio"]["converted"], 2);
    assert_eq!(reports[0]["flattened"], true);
    assert!(harness.errors().is_empty());

    // Nothing is left in scratch
    let scratch = harness.archive_dir().join(".tmp");
    assert!(!scratch.exists() || harness.list(&scratch).is_empty());
}

#[tokio::test]
async fn test_lossy_copies_of_every_track_drop_the_lossless() {
    let harness = Harness::new();
    let flac = flac_bytes("a");
    harness.add_archive(
        "Kind of Blue",
        &[
            ("So What.flac", &flac[..]),
            ("So What.mp3", b"ID3 so what"),
            ("Freddie Freeloader.mp3", b"ID3 freddie"),
        ],
    );
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    let album = harness.album("Kind of Blue");
    assert!(!album.join("So What.flac").exists());
    assert!(album.join("So What.mp3").is_file());
    assert!(album.join("Freddie Freeloader.mp3").is_file());
    assert_eq!(fakes.transcoder.calls(), 0);

    let reports = harness.reports();
    assert_eq!(reports[0]["decision"], "delete_lossless");
    assert_eq!(reports[0]["audio"]["deleted_lossless"], 1);
    assert_eq!(reports[0]["flattened"], false);
}

#[tokio::test]
async fn test_partial_overlap_is_left_for_manual_review() {
    let harness = Harness::new();
    let a = flac_bytes("a");
    let b = flac_bytes("b");
    harness.add_archive(
        "Mixed",
        &[("A.flac", &a[..]), ("B.flac", &b[..]), ("A.mp3", b"ID3 a")],
    );
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    let album = harness.album("Mixed");
    assert!(album.join("A.flac").is_file());
    assert!(album.join("B.flac").is_file());
    assert!(album.join("A.mp3").is_file());
    assert_eq!(fakes.transcoder.calls(), 0);

    let reports = harness.reports();
    assert_eq!(reports[0]["decision"], "no_action");
    assert_eq!(reports[0]["audio"]["manual_review"], true);
}

#[tokio::test]
async fn test_failed_conversion_keeps_source_and_records_error() {
    let harness = Harness::new();
    let good = flac_bytes("good");
    let bad = flac_bytes("bad");
    let archive = harness.add_archive("Damaged", &[("good.flac", &good[..]), ("bad.flac", &bad[..])]);
    let fakes = Fakes {
        transcoder: Arc::new(FakeTranscoder::failing(&["bad"])),
        ..Default::default()
    };

    let summary = harness.run(&fakes).await;

    // A per-file failure does not fail the archive
    assert_eq!(summary.processed, 1);
    assert!(!archive.exists());

    let album = harness.album("Damaged");
    assert!(album.join("good.mp3").is_file());
    assert!(!album.join("good.flac").exists());
    assert!(album.join("bad.flac").is_file());
    assert!(!album.join("bad.mp3").exists());
    assert!(!album.join("bad.partial.mp3").exists());

    let errors = harness.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "conversion_error");
    assert_eq!(errors[0]["file"], "bad.flac");
    assert_eq!(errors[0]["album"], "Damaged");

    let reports = harness.reports();
    assert_eq!(reports[0]["audio"]["converted"], 1);
    assert_eq!(reports[0]["audio"]["errors"], 1);
}

#[tokio::test]
async fn test_empty_archive_produces_an_empty_album() {
    let harness = Harness::new();
    harness.add_archive("Silence", &[]);
    let fakes = Fakes::default();

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.processed, 1);
    let metadata = fs::read_to_string(harness.album("Silence").join(METADATA_FILE_NAME)).unwrap();
    assert!(metadata.contains("_No documents or images found._"));
    assert_eq!(harness.reports()[0]["extracted"], false);
}

// ============================================================================
// Resume and idempotency
// ============================================================================

#[tokio::test]
async fn test_second_run_does_no_work() {
    let harness = Harness::new();
    let flac = flac_bytes("x");
    harness.add_archive("Again", &[("x.flac", &flac[..])]);
    let fakes = Fakes::default();

    harness.run(&fakes).await;
    let album = harness.album("Again");
    let before = harness.list(&album);

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.already_complete, 0);
    assert_eq!(fakes.transcoder.calls(), 1);
    assert_eq!(harness.list(&album), before);
    assert_eq!(harness.reports().len(), 1);
}

#[tokio::test]
async fn test_reappearing_original_of_finished_album_is_removed() {
    let harness = Harness::new();
    let flac = flac_bytes("x");
    let entries: [(&str, &[u8]); 1] = [("x.flac", &flac[..])];
    harness.add_archive("Twice", &entries);
    let fakes = Fakes::default();

    harness.run(&fakes).await;
    let archive = harness.add_archive("Twice", &entries);

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.already_complete, 1);
    assert_eq!(summary.deleted_originals, 1);
    assert!(!archive.exists());
    assert_eq!(fakes.transcoder.calls(), 1, "no reprocessing");

    let reports = harness.reports();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[1]["outcome"], "already_processed");
}

#[tokio::test]
async fn test_marker_alone_is_enough_to_skip() {
    let harness = Harness::new();
    let album = harness.album("Marked");
    fs::create_dir_all(&album).unwrap();
    fs::write(album.join(MARKER_FILE_NAME), b"").unwrap();
    let archive = harness.add_archive("Marked", &[("a.txt", b"hello")]);
    let fakes = Fakes::default();

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.already_complete, 1);
    assert!(!archive.exists());
    assert!(!album.join("a.txt").exists(), "existing album untouched");
}

#[tokio::test]
async fn test_same_stem_archives_in_different_folders_both_complete() {
    let harness = Harness::new();
    fs::create_dir_all(harness.archive_dir().join("disc1")).unwrap();
    fs::create_dir_all(harness.archive_dir().join("disc2")).unwrap();
    helpers::write_zip(
        &harness.archive_dir().join("disc1").join("Live.zip"),
        &[("first.txt", b"one")],
    );
    helpers::write_zip(
        &harness.archive_dir().join("disc2").join("Live.zip"),
        &[("second.txt", b"two")],
    );
    let fakes = Fakes::default();

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.processed, 2);
    assert!(harness.album("Live").join("first.txt").is_file());
    assert!(harness.album("Live (2)").join("second.txt").is_file());
}

#[tokio::test]
async fn test_incomplete_destination_is_replaced() {
    let harness = Harness::new();
    let leftover = harness.album("Halfway");
    fs::create_dir_all(&leftover).unwrap();
    fs::write(leftover.join("stale.tmp"), b"stale").unwrap();
    harness.add_archive("Halfway", &[("track.mp3", b"ID3 track")]);
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    let album = harness.album("Halfway");
    assert!(album.join("track.mp3").is_file());
    assert!(!album.join("stale.tmp").exists());
    assert!(album.join(MARKER_FILE_NAME).is_file());
}

#[tokio::test]
async fn test_shipped_metadata_and_marker_are_kept_under_new_names() {
    let harness = Harness::new();
    harness.add_archive(
        "Own Notes",
        &[
            ("album_metadata.md", b"Notes from the uploader."),
            (MARKER_FILE_NAME, b"not ours"),
        ],
    );
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    let album = harness.album("Own Notes");
    assert_eq!(
        fs::read_to_string(album.join("album_metadata (1).md")).unwrap(),
        "Notes from the uploader."
    );
    assert_eq!(
        fs::read_to_string(album.join(".albumproc_done (1)")).unwrap(),
        "not ours"
    );

    let metadata = fs::read_to_string(album.join(METADATA_FILE_NAME)).unwrap();
    assert!(metadata.starts_with("# Own Notes\n"));
    assert!(metadata.contains("## album_metadata (1).md"));
    assert!(metadata.contains("Notes from the uploader."));

    // Our own marker, not the shipped one
    let marker = fs::read_to_string(album.join(MARKER_FILE_NAME)).unwrap();
    assert!(marker.contains("Own Notes.zip"));
}
