//! Book and book-part records plus the typed content model decoded from part payloads.
//!
//! Parts are stored with a loosely-typed `content` column: serialized JSON whose shape depends on
//! the part's `part_type`. [`PartContent::decode`] turns that payload into a tagged union, one
//! variant per part type. A payload that does not match the shape declared by its type degrades to
//! [`PartContent::PlainText`] holding the raw string, so a single malformed part never takes the
//! whole document down with it.
//!
//! ```text
//! +--------------+     +-----------------+     +---------------------+
//! |  BookPart    |     |  part_type tag  |     |  PartContent        |
//! |  part_index  | --> |  "toc"          | --> |  Toc(TocContent)    |
//! |  content ""  |     |  serde_json     |     |  or PlainText(raw)  |
//! +--------------+     +-----------------+     +---------------------+
//! ```

use crate::PressError;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Lifecycle of a book as it moves through generation and publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    #[default]
    GeneratingContent,
    ContentReady,
    ProcessingParts,
    GeneratingPdf,
    Ready,
    Error,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::GeneratingContent => "generating_content",
            BookStatus::ContentReady => "content_ready",
            BookStatus::ProcessingParts => "processing_parts",
            BookStatus::GeneratingPdf => "generating_pdf",
            BookStatus::Ready => "ready",
            BookStatus::Error => "error",
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// The forward path is `generating_content -> content_ready -> processing_parts ->
    /// generating_pdf -> ready`. Any state may fall into `error`. Retries re-enter at
    /// `processing_parts` (or `generating_content` from `error`), and a ready book may be
    /// re-published.
    pub fn can_transition_to(&self, next: BookStatus) -> bool {
        use BookStatus::*;
        matches!(
            (*self, next),
            (GeneratingContent, ContentReady)
                | (ContentReady, ProcessingParts)
                | (ProcessingParts, ProcessingParts)
                | (ProcessingParts, GeneratingPdf)
                | (GeneratingPdf, ProcessingParts)
                | (GeneratingPdf, Ready)
                | (Ready, ProcessingParts)
                | (Error, ProcessingParts)
                | (Error, GeneratingContent)
                | (_, Error)
        )
    }

    /// Checked transition used by the publishing pipeline.
    pub fn transition(&mut self, next: BookStatus) -> Result<(), PressError> {
        if !self.can_transition_to(next) {
            return Err(PressError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            });
        }
        debug!("book status {} -> {}", self.as_str(), next.as_str());
        *self = next;
        Ok(())
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: BookStatus,
    #[serde(default)]
    pub owner_id: Option<String>,
    /// Locator of the merged, stamped PDF once the book is ready.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

/// Tag describing which payload shape a part carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PartType {
    Cover,
    Copyright,
    Toc,
    Introduction,
    ChapterTitle,
    ChapterContent,
    Conclusion,
    /// A tag this crate does not know how to render.
    Other(String),
}

impl PartType {
    pub fn as_str(&self) -> &str {
        match self {
            PartType::Cover => "cover",
            PartType::Copyright => "copyright",
            PartType::Toc => "toc",
            PartType::Introduction => "introduction",
            PartType::ChapterTitle => "chapter_title",
            PartType::ChapterContent => "chapter_content",
            PartType::Conclusion => "conclusion",
            PartType::Other(tag) => tag,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, PartType::Other(_))
    }
}

impl From<&str> for PartType {
    fn from(tag: &str) -> Self {
        match tag.trim() {
            "cover" => PartType::Cover,
            "copyright" => PartType::Copyright,
            "toc" => PartType::Toc,
            "introduction" => PartType::Introduction,
            "chapter_title" => PartType::ChapterTitle,
            "chapter_content" => PartType::ChapterContent,
            "conclusion" => PartType::Conclusion,
            other => PartType::Other(other.to_string()),
        }
    }
}

impl From<String> for PartType {
    fn from(tag: String) -> Self {
        PartType::from(tag.as_str())
    }
}

impl From<PartType> for String {
    fn from(part_type: PartType) -> Self {
        part_type.as_str().to_string()
    }
}

impl fmt::Display for PartType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered structural unit of a book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookPart {
    #[serde(default)]
    pub book_id: String,
    pub part_index: i64,
    pub part_type: PartType,
    /// Serialized payload. Inline JSON values are accepted on input and kept as their text.
    #[serde(default, deserialize_with = "content_as_text")]
    pub content: String,
    /// Locator of the independently paginated artifact for this part, once rendered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
}

impl BookPart {
    pub fn new(part_index: i64, part_type: PartType, content: impl Into<String>) -> Self {
        Self {
            book_id: String::new(),
            part_index,
            part_type,
            content: content.into(),
            pdf_url: None,
        }
    }

    /// Decodes this part's payload according to its declared type.
    pub fn decode(&self) -> PartContent {
        PartContent::decode(&self.part_type, &self.content)
    }
}

fn content_as_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    })
}

/// The input file of the CLI: a book record and its parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manuscript {
    pub book: Book,
    #[serde(default)]
    pub parts: Vec<BookPart>,
}

impl Manuscript {
    pub fn from_json(json: &str) -> Result<Self, PressError> {
        let mut manuscript: Manuscript =
            serde_json::from_str(json).map_err(|e| PressError::Manuscript {
                message: e.to_string(),
                suggestion: Some(
                    "Expected an object with a \"book\" record and a \"parts\" array".to_string(),
                ),
            })?;
        for part in &mut manuscript.parts {
            if part.book_id.is_empty() {
                part.book_id = manuscript.book.id.clone();
            }
        }
        Ok(manuscript)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subtitle: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CopyrightContent {
    /// Explicit copyright text; `None` selects the boilerplate notice.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TocEntry {
    pub text: String,
    pub subchapter: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TocContent {
    pub title: Option<String>,
    pub entries: Vec<TocEntry>,
}

/// Heading plus prose, used by both the introduction and the conclusion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProseContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterTitleContent {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subchapter {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub introduction: Option<String>,
    #[serde(default)]
    pub subchapters: Vec<Subchapter>,
}

/// Decoded payload of a part, one variant per `part_type`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PartContent {
    Cover(CoverContent),
    Copyright(CopyrightContent),
    Toc(TocContent),
    Introduction(ProseContent),
    ChapterTitle(ChapterTitleContent),
    ChapterContent(ChapterContent),
    Conclusion(ProseContent),
    /// Payload that did not match its declared shape, kept verbatim.
    PlainText { text: String },
    /// Part type this crate does not render.
    Unknown { part_type: String },
}

#[derive(Deserialize)]
struct RawToc {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<TocLines>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TocLines {
    Text(String),
    Lines(Vec<String>),
}

#[derive(Deserialize)]
struct RawCopyright {
    #[serde(default)]
    content: Option<String>,
}

impl PartContent {
    /// Decodes a serialized payload according to `part_type`.
    ///
    /// Never fails: a payload that is not valid JSON for its type becomes
    /// [`PartContent::PlainText`] with the raw string. Copyright pages accept free text as-is.
    pub fn decode(part_type: &PartType, raw: &str) -> PartContent {
        let decoded = match part_type {
            PartType::Cover => from_object::<CoverContent>(raw).map(PartContent::Cover),
            PartType::Copyright => return decode_copyright(raw),
            PartType::Toc => from_object::<RawToc>(raw).map(|toc| {
                let lines = match toc.content {
                    Some(TocLines::Text(text)) => {
                        text.lines().map(str::to_string).collect::<Vec<_>>()
                    }
                    Some(TocLines::Lines(lines)) => lines,
                    None => Vec::new(),
                };
                PartContent::Toc(TocContent {
                    title: toc.title,
                    entries: parse_toc_lines(&lines),
                })
            }),
            PartType::Introduction => {
                from_object::<ProseContent>(raw).map(PartContent::Introduction)
            }
            PartType::ChapterTitle => {
                from_object::<ChapterTitleContent>(raw).map(PartContent::ChapterTitle)
            }
            PartType::ChapterContent => {
                from_object::<ChapterContent>(raw).map(PartContent::ChapterContent)
            }
            PartType::Conclusion => from_object::<ProseContent>(raw).map(PartContent::Conclusion),
            PartType::Other(tag) => {
                return PartContent::Unknown {
                    part_type: tag.clone(),
                }
            }
        };

        match decoded {
            Ok(content) => content,
            Err(reason) => {
                warn!(
                    "{} payload does not match its shape ({}), rendering it as plain text",
                    part_type, reason
                );
                PartContent::PlainText {
                    text: raw.to_string(),
                }
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, PartContent::PlainText { .. })
    }
}

/// Deserializes a payload that must be a JSON object.
///
/// Derived struct deserializers also accept a JSON array in field order, which is not a valid
/// shape for any part payload.
fn from_object<T: DeserializeOwned>(raw: &str) -> Result<T, String> {
    match serde_json::from_str::<Value>(raw).map_err(|e| e.to_string())? {
        value @ Value::Object(_) => serde_json::from_value(value).map_err(|e| e.to_string()),
        _ => Err("not a JSON object".to_string()),
    }
}

fn decode_copyright(raw: &str) -> PartContent {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return PartContent::Copyright(CopyrightContent { text: None });
    }
    let text = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::String(text)) => Some(text),
        Ok(Value::Object(_)) => serde_json::from_str::<RawCopyright>(trimmed)
            .ok()
            .and_then(|c| c.content),
        // Anything else is the free-text form.
        _ => Some(raw.to_string()),
    };
    PartContent::Copyright(CopyrightContent {
        text: text.filter(|t| !t.trim().is_empty()),
    })
}

/// Splits table-of-contents lines into chapter and subchapter entries.
///
/// Chapter lines are unprefixed. Subchapter lines start with indentation, a bullet (`-`, `*`,
/// `•`, `–`) or a dotted section number such as `1.2`; the marker is stripped from the text.
pub fn parse_toc_lines<S: AsRef<str>>(lines: &[S]) -> Vec<TocEntry> {
    lines
        .iter()
        .filter_map(|line| {
            let line = line.as_ref();
            if line.trim().is_empty() {
                return None;
            }
            let indented = line.starts_with(char::is_whitespace);
            let trimmed = line.trim();
            let stripped = trimmed
                .strip_prefix("- ")
                .or_else(|| trimmed.strip_prefix("* "))
                .or_else(|| trimmed.strip_prefix('•'))
                .or_else(|| trimmed.strip_prefix('–'));
            match stripped {
                Some(text) => Some(TocEntry {
                    text: text.trim().to_string(),
                    subchapter: true,
                }),
                None => Some(TocEntry {
                    text: trimmed.to_string(),
                    subchapter: indented || is_section_number(trimmed),
                }),
            }
        })
        .collect()
}

fn is_section_number(line: &str) -> bool {
    let head = line.split_whitespace().next().unwrap_or("");
    let head = head.trim_end_matches(['.', ':']);
    let mut pieces = head.split('.');
    let first = pieces.next().unwrap_or("");
    let rest: Vec<&str> = pieces.collect();
    !first.is_empty()
        && !rest.is_empty()
        && first.chars().all(|c| c.is_ascii_digit())
        && rest
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_type_round_trips_known_and_unknown_tags() {
        assert_eq!(PartType::from("chapter_content"), PartType::ChapterContent);
        assert_eq!(PartType::from("toc").as_str(), "toc");
        let other = PartType::from("appendix");
        assert_eq!(other, PartType::Other("appendix".to_string()));
        assert!(!other.is_known());

        let json = serde_json::to_string(&PartType::ChapterTitle).unwrap();
        assert_eq!(json, "\"chapter_title\"");
        let parsed: PartType = serde_json::from_str("\"glossary\"").unwrap();
        assert_eq!(parsed.as_str(), "glossary");
    }

    #[test]
    fn test_decode_chapter_content_keeps_subchapter_order() {
        let raw = r#"{"title":"Roots","introduction":"Intro text","subchapters":[
            {"title":"B second","content":"b"},{"title":"A first","content":"a"}]}"#;
        match PartContent::decode(&PartType::ChapterContent, raw) {
            PartContent::ChapterContent(chapter) => {
                assert_eq!(chapter.title.as_deref(), Some("Roots"));
                let titles: Vec<_> = chapter
                    .subchapters
                    .iter()
                    .map(|s| s.title.clone().unwrap())
                    .collect();
                assert_eq!(titles, vec!["B second", "A first"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_json_degrades_to_plain_text() {
        let raw = "Just some text the model returned";
        let content = PartContent::decode(&PartType::Introduction, raw);
        assert_eq!(
            content,
            PartContent::PlainText {
                text: raw.to_string()
            }
        );
        assert!(content.is_degraded());
    }

    #[test]
    fn test_decode_wrong_shape_degrades_to_plain_text() {
        let raw = r#"{"title": 42}"#;
        assert!(PartContent::decode(&PartType::ChapterTitle, raw).is_degraded());
        let raw = r#"["not", "an", "object"]"#;
        assert!(PartContent::decode(&PartType::Cover, raw).is_degraded());
    }

    #[test]
    fn test_decode_array_in_field_order_degrades_to_plain_text() {
        let raw = r#"["Heading from array","Body from array"]"#;
        for part_type in [
            PartType::Introduction,
            PartType::Conclusion,
            PartType::ChapterTitle,
            PartType::ChapterContent,
            PartType::Toc,
        ] {
            assert_eq!(
                PartContent::decode(&part_type, raw),
                PartContent::PlainText {
                    text: raw.to_string()
                },
                "{} accepted an array payload",
                part_type
            );
        }
    }

    #[test]
    fn test_decode_null_fields_are_renderable() {
        let raw = r#"{"title": null, "content": null}"#;
        assert_eq!(
            PartContent::decode(&PartType::Conclusion, raw),
            PartContent::Conclusion(ProseContent::default())
        );
    }

    #[test]
    fn test_decode_copyright_variants() {
        let free = PartContent::decode(&PartType::Copyright, "All rights reserved.");
        assert_eq!(
            free,
            PartContent::Copyright(CopyrightContent {
                text: Some("All rights reserved.".to_string())
            })
        );

        let object = PartContent::decode(&PartType::Copyright, r#"{"content":"(c) 2024"}"#);
        assert_eq!(
            object,
            PartContent::Copyright(CopyrightContent {
                text: Some("(c) 2024".to_string())
            })
        );

        let empty = PartContent::decode(&PartType::Copyright, r#"{}"#);
        assert_eq!(empty, PartContent::Copyright(CopyrightContent { text: None }));
    }

    #[test]
    fn test_decode_toc_from_text_and_array() {
        let raw = r#"{"title":"Contents","content":"Chapter 1: Seeds\n- Soil\n  Water\nChapter 2: Growth\n2.1 Light"}"#;
        let PartContent::Toc(toc) = PartContent::decode(&PartType::Toc, raw) else {
            panic!("expected toc");
        };
        let flags: Vec<_> = toc.entries.iter().map(|e| e.subchapter).collect();
        assert_eq!(flags, vec![false, true, true, false, true]);
        assert_eq!(toc.entries[1].text, "Soil");

        let raw = r#"{"content":["Chapter 1: A","- a.1"]}"#;
        let PartContent::Toc(toc) = PartContent::decode(&PartType::Toc, raw) else {
            panic!("expected toc");
        };
        assert_eq!(toc.entries.len(), 2);
        assert!(toc.entries[1].subchapter);
    }

    #[test]
    fn test_unknown_part_type_decodes_to_unknown() {
        let content = PartContent::decode(&PartType::from("appendix"), "{}");
        assert_eq!(
            content,
            PartContent::Unknown {
                part_type: "appendix".to_string()
            }
        );
    }

    #[test]
    fn test_manuscript_accepts_inline_json_content() {
        let json = r#"{
            "book": {"id": "b1", "title": "Gardens"},
            "parts": [
                {"part_index": 0, "part_type": "cover", "content": {"title": "Gardens"}},
                {"part_index": 1, "part_type": "copyright", "content": "free text"}
            ]
        }"#;
        let manuscript = Manuscript::from_json(json).unwrap();
        assert_eq!(manuscript.parts[0].book_id, "b1");
        assert!(manuscript.parts[0].content.contains("\"title\""));
        assert_eq!(manuscript.parts[1].content, "free text");
        assert_eq!(manuscript.book.status, BookStatus::GeneratingContent);
    }

    #[test]
    fn test_status_lifecycle() {
        let mut status = BookStatus::ContentReady;
        status.transition(BookStatus::ProcessingParts).unwrap();
        status.transition(BookStatus::GeneratingPdf).unwrap();
        status.transition(BookStatus::Ready).unwrap();
        assert!(status.transition(BookStatus::GeneratingPdf).is_err());
        status.transition(BookStatus::Error).unwrap();
        status.transition(BookStatus::ProcessingParts).unwrap();
        assert!(!BookStatus::GeneratingContent.can_transition_to(BookStatus::Ready));
    }
}
