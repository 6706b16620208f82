//! Metadata compiler
//!
//! Orders an album's enrichment results by a filename heuristic and renders
//! them into `album_metadata.md`. Pure and deterministic: the output carries no
//! timestamps, so identical input yields byte-identical output.

use crate::config::METADATA_FILE_NAME;
use crate::models::EnrichmentResult;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

const SCORE_FRONT: u64 = 0;
const SCORE_BOOKLET: u64 = 10;
const SCORE_NUMBERED: u64 = 100;
const SCORE_OTHER: u64 = 500;
const SCORE_BACK: u64 = 1000;

/// Ranking score for a source name (lower sorts first)
///
/// `back` wins over `cover` so "Back Cover.jpg" lands last.
pub fn score(source: &str) -> u64 {
    let name = Path::new(source)
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_else(|| source.to_lowercase());

    if name.contains("back") {
        return SCORE_BACK;
    }
    if name.contains("front") || name.contains("cover") {
        return SCORE_FRONT;
    }
    if name.contains("booklet") {
        return SCORE_BOOKLET;
    }

    let trimmed = name.trim();
    let bare_number = !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit());
    let numbered = ["insert", "page", "inlay", "scan"]
        .iter()
        .any(|word| name.contains(word));

    if bare_number || numbered {
        return SCORE_NUMBERED + first_number(&name).unwrap_or(0);
    }

    SCORE_OTHER
}

fn first_number(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    // Cap absurd numbers so they cannot overtake `back`
    digits.parse::<u64>().ok().map(|n| n.min(SCORE_OTHER - SCORE_NUMBERED - 1))
}

/// Results in document order: score, then ordering hint, then name
pub fn order(results: &[EnrichmentResult]) -> Vec<&EnrichmentResult> {
    let mut ordered: Vec<&EnrichmentResult> = results.iter().collect();
    ordered.sort_by(|a, b| {
        score(&a.source)
            .cmp(&score(&b.source))
            .then_with(|| a.position.cmp(&b.position))
            .then_with(|| a.source.cmp(&b.source))
    });
    ordered
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// Render the album summary document
pub fn compile(album: &str, results: &[EnrichmentResult]) -> String {
    let ordered = order(results);
    let mut doc = String::new();

    let _ = writeln!(doc, "# {}", album);
    let _ = writeln!(doc);

    if ordered.is_empty() {
        let _ = writeln!(doc, "_No documents or images found._");
        return doc;
    }

    let _ = writeln!(doc, "| Source | Provenance | Characters |");
    let _ = writeln!(doc, "|---|---|---|");
    for result in &ordered {
        let _ = writeln!(
            doc,
            "| {} | {} | {} |",
            escape_cell(&result.source),
            result.provenance.label(),
            result.char_count()
        );
    }

    for result in &ordered {
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## {}", result.source);
        let _ = writeln!(doc);
        let text = result.text.trim();
        if text.is_empty() {
            let _ = writeln!(doc, "_No text extracted._");
        } else {
            let _ = writeln!(doc, "{}", text);
        }
    }

    doc
}

/// Write `album_metadata.md` into `album_dir`
pub fn write_metadata(album_dir: &Path, album: &str, results: &[EnrichmentResult]) -> io::Result<()> {
    fs::write(album_dir.join(METADATA_FILE_NAME), compile(album, results))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TextProvenance;

    fn result(source: &str, position: usize, text: &str) -> EnrichmentResult {
        EnrichmentResult {
            source: source.to_string(),
            text: text.to_string(),
            provenance: TextProvenance::Ocr,
            position,
            pages: 1,
        }
    }

    #[test]
    fn test_scores() {
        assert_eq!(score("Front.jpg"), 0);
        assert_eq!(score("cover.png"), 0);
        assert_eq!(score("Back Cover.jpg"), 1000);
        assert_eq!(score("booklet.pdf"), 10);
        assert_eq!(score("insert 3.jpg"), 103);
        assert_eq!(score("page_12.png"), 112);
        assert_eq!(score("07.jpg"), 107);
        assert_eq!(score("scan.jpg"), 100);
        assert_eq!(score("liner notes.txt"), 500);
        assert_eq!(score("insert 99999.jpg"), 499);
    }

    #[test]
    fn test_order_front_first_back_last() {
        let results = vec![
            result("back.jpg", 0, "B"),
            result("notes.txt", 1, "N"),
            result("insert2.jpg", 2, "I2"),
            result("insert1.jpg", 3, "I1"),
            result("front.jpg", 4, "F"),
        ];
        let names: Vec<&str> = order(&results).iter().map(|r| r.source.as_str()).collect();
        assert_eq!(
            names,
            vec!["front.jpg", "insert1.jpg", "insert2.jpg", "notes.txt", "back.jpg"]
        );
    }

    #[test]
    fn test_ties_break_by_position_then_name() {
        let results = vec![
            result("b.txt", 1, ""),
            result("a.txt", 1, ""),
            result("z.txt", 0, ""),
        ];
        let names: Vec<&str> = order(&results).iter().map(|r| r.source.as_str()).collect();
        assert_eq!(names, vec!["z.txt", "a.txt", "b.txt"]);
    }

    #[test]
    fn test_compile_is_deterministic() {
        let forward = vec![result("cover.jpg", 0, "COVER"), result("back.jpg", 1, "")];
        let reversed = vec![forward[1].clone(), forward[0].clone()];

        let a = compile("Album", &forward);
        let b = compile("Album", &reversed);
        assert_eq!(a, b);
        assert!(a.starts_with("# Album\n"));
        assert!(a.contains("| cover.jpg | ocr | 5 |"));
        assert!(a.contains("## back.jpg\n\n_No text extracted._"));
        assert!(a.find("## cover.jpg").unwrap() < a.find("## back.jpg").unwrap());
    }

    #[test]
    fn test_compile_empty_album() {
        assert_eq!(compile("Empty", &[]), "# Empty\n\n_No documents or images found._\n");
    }
}
