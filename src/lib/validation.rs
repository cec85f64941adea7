//! Pre-flight checks on a manuscript before anything is rendered.
//!
//! Nothing here is fatal: every finding is a human-readable warning, and a manuscript with
//! warnings still assembles.

use crate::model::{Manuscript, PartContent, PartType};
use std::collections::BTreeMap;

/// Returns one warning per issue found in the manuscript.
pub fn validate_manuscript(manuscript: &Manuscript) -> Vec<String> {
    let mut warnings = Vec::new();
    let book = &manuscript.book;

    if book.title.trim().is_empty() {
        warnings.push("⚠️  The book has no title; running heads will be blank".to_string());
    }
    if manuscript.parts.is_empty() {
        warnings.push("⚠️  The book has no parts; the output will be empty".to_string());
        return warnings;
    }

    let mut seen: BTreeMap<i64, usize> = BTreeMap::new();
    for part in &manuscript.parts {
        *seen.entry(part.part_index).or_default() += 1;
    }
    for (index, count) in seen.iter().filter(|(_, count)| **count > 1) {
        warnings.push(format!(
            "⚠️  {} parts share part_index {}; they keep their input order",
            count, index
        ));
    }

    let sorted = crate::assemble::sort_parts(&manuscript.parts);
    match sorted.iter().position(|p| p.part_type == PartType::Cover) {
        None => warnings.push(
            "⚠️  No cover part; the first page of the merged PDF will not be a cover".to_string(),
        ),
        Some(0) => {}
        Some(_) => warnings.push(
            "⚠️  The cover is not the first part; the page left unstamped is whatever comes first"
                .to_string(),
        ),
    }

    for part in sorted {
        if !part.book_id.is_empty() && part.book_id != book.id {
            warnings.push(format!(
                "⚠️  Part {} belongs to book {:?}, not {:?}",
                part.part_index, part.book_id, book.id
            ));
        }
        match part.decode() {
            PartContent::Unknown { part_type } => warnings.push(format!(
                "⚠️  Part {} has unknown type {:?} and will be left out",
                part.part_index, part_type
            )),
            content if content.is_degraded() => warnings.push(format!(
                "⚠️  Part {} ({}) does not match its expected shape and will render as plain text",
                part.part_index, part.part_type
            )),
            _ => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Book, BookPart};

    fn manuscript(parts: Vec<BookPart>) -> Manuscript {
        Manuscript {
            book: Book {
                id: "b1".to_string(),
                title: "T".to_string(),
                ..Default::default()
            },
            parts,
        }
    }

    #[test]
    fn test_clean_manuscript_has_no_warnings() {
        let m = manuscript(vec![
            BookPart::new(0, PartType::Cover, "{}"),
            BookPart::new(1, PartType::ChapterTitle, r#"{"title":"One"}"#),
        ]);
        assert!(validate_manuscript(&m).is_empty());
    }

    #[test]
    fn test_reports_each_issue() {
        let mut stray = BookPart::new(3, PartType::Conclusion, r#"{"content":"x"}"#);
        stray.book_id = "other".to_string();
        let m = manuscript(vec![
            BookPart::new(1, PartType::ChapterTitle, "not json"),
            BookPart::new(1, PartType::from("appendix"), "{}"),
            BookPart::new(2, PartType::Cover, "{}"),
            stray,
        ]);
        let warnings = validate_manuscript(&m).join("\n");
        assert!(warnings.contains("share part_index 1"));
        assert!(warnings.contains("cover is not the first part"));
        assert!(warnings.contains("unknown type \"appendix\""));
        assert!(warnings.contains("plain text"));
        assert!(warnings.contains("belongs to book \"other\""));
    }

    #[test]
    fn test_empty_manuscript() {
        let mut m = manuscript(Vec::new());
        m.book.title = "  ".to_string();
        let warnings = validate_manuscript(&m);
        assert_eq!(warnings.len(), 2);
    }
}
