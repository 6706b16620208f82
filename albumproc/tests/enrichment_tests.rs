//! Text enrichment through the full pipeline: embedded text, OCR fallback,
//! the OCR cache, and the compiled metadata file

mod helpers;

use albumproc::config::METADATA_FILE_NAME;
use helpers::{FakePdfText, Fakes, Harness};
use std::fs;
use std::sync::Arc;

fn metadata(harness: &Harness, album: &str) -> String {
    fs::read_to_string(harness.album(album).join(METADATA_FILE_NAME)).unwrap()
}

#[tokio::test]
async fn test_identical_images_are_ocred_once() {
    let harness = Harness::new();
    let scan: &[u8] = b"\xff\xd8\xff\xe0 same scan bytes";
    harness.add_archive(
        "Scans",
        &[
            ("front.jpg", scan),
            ("Disc 2/front.jpg", scan),
            ("back.jpg", b"\xff\xd8\xff\xe0 different bytes"),
        ],
    );
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    assert_eq!(fakes.ocr.calls(), 2, "one call per distinct image");
    let report = &harness.reports()[0];
    assert_eq!(report["enrichment"]["images_ocred"], 2);
    assert_eq!(report["enrichment"]["ocr_cache_hits"], 1);

    let doc = metadata(&harness, "Scans");
    assert!(doc.contains("| ocr (cached) |"));
    assert!(doc.contains("## Disc 2_front.jpg"));
}

#[tokio::test]
async fn test_ocr_cache_spans_archives_in_one_run() {
    let harness = Harness::new();
    let logo: &[u8] = b"\x89PNG\r\n\x1a\n label logo";
    harness.add_archive("One", &[("logo.png", logo)]);
    harness.add_archive("Two", &[("logo.png", logo)]);
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    assert_eq!(fakes.ocr.calls(), 1);
    let reports = harness.reports();
    assert_eq!(reports[1]["enrichment"]["ocr_cache_hits"], 1);
}

#[tokio::test]
async fn test_pdf_with_text_layer_is_not_ocred() {
    let harness = Harness::new();
    harness.add_archive("Liner", &[("liner notes.pdf", b"%PDF-1.4 fake")]);
    let fakes = Fakes {
        pdf_text: Arc::new(FakePdfText::default().with(
            "liner notes.pdf",
            &["Side A was recorded live in one take.", "Side B followed a week later."],
        )),
        ..Default::default()
    };

    harness.run(&fakes).await;

    assert_eq!(fakes.ocr.calls(), 0);
    let doc = metadata(&harness, "Liner");
    assert!(doc.contains("| liner notes.pdf | embedded |"));
    assert!(doc.contains("Side A was recorded live in one take.\n\nSide B followed a week later."));
}

#[tokio::test]
async fn test_image_only_pdf_falls_back_to_page_ocr() {
    let harness = Harness::new();
    harness.add_archive("Booklet", &[("booklet.pdf", b"%PDF-1.4 fake")]);
    let fakes = Fakes {
        pdf_text: Arc::new(FakePdfText::default().with("booklet.pdf", &["", " ", ""])),
        ..Default::default()
    };

    harness.run(&fakes).await;

    assert_eq!(fakes.ocr.calls(), 3, "one OCR call per page");
    let report = &harness.reports()[0];
    assert_eq!(report["enrichment"]["pages_ocred"], 3);

    let doc = metadata(&harness, "Booklet");
    assert!(doc.contains("| booklet.pdf | ocr |"));
    assert!(doc.contains("text of booklet-1.png\n\ntext of booklet-2.png\n\ntext of booklet-3.png"));

    // Rasterized pages never reach the album
    let names = harness.list(&harness.album("Booklet"));
    assert!(!names.iter().any(|n| n.ends_with(".png")));
}

#[tokio::test]
async fn test_unreadable_pdf_is_recorded_and_album_still_completes() {
    let harness = Harness::new();
    let archive = harness.add_archive("Torn", &[("torn.pdf", b"not a pdf")]);
    let fakes = Fakes::default();

    let summary = harness.run(&fakes).await;

    assert_eq!(summary.processed, 1);
    assert!(!archive.exists());
    let errors = harness.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["kind"], "document_unreadable");
    assert_eq!(errors[0]["file"], "torn.pdf");

    let doc = metadata(&harness, "Torn");
    assert!(doc.contains("| torn.pdf | skipped | 0 |"));
    assert!(doc.contains("_No text extracted._"));
}

#[tokio::test]
async fn test_ocr_disabled_skips_images() {
    let mut harness = Harness::new();
    harness.overrides.ocr_enabled = Some(false);
    harness.add_archive("Quiet", &[("cover.jpg", b"\xff\xd8\xff\xe0 cover")]);
    let fakes = Fakes {
        ocr_enabled: false,
        ..Default::default()
    };

    harness.run(&fakes).await;

    assert_eq!(fakes.ocr.calls(), 0);
    assert!(metadata(&harness, "Quiet").contains("| cover.jpg | skipped | 0 |"));
}

#[tokio::test]
async fn test_metadata_sections_follow_booklet_order() {
    let harness = Harness::new();
    harness.add_archive(
        "Ordered",
        &[
            ("back.jpg", b"\xff\xd8\xff\xe0 back"),
            ("scan 2.jpg", b"\xff\xd8\xff\xe0 two"),
            ("readme.txt", b"Read me first."),
            ("scan 1.jpg", b"\xff\xd8\xff\xe0 one"),
            ("front.jpg", b"\xff\xd8\xff\xe0 front"),
        ],
    );
    let fakes = Fakes::default();

    harness.run(&fakes).await;

    let doc = metadata(&harness, "Ordered");
    let position = |name: &str| {
        doc.find(&format!("## {}\n", name))
            .unwrap_or_else(|| panic!("missing section {}", name))
    };
    assert!(position("front.jpg") < position("scan 1.jpg"));
    assert!(position("scan 1.jpg") < position("scan 2.jpg"));
    assert!(position("scan 2.jpg") < position("readme.txt"));
    assert!(position("readme.txt") < position("back.jpg"));
}
