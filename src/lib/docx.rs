//! Word-processor export.
//!
//! The same walk over decoded parts as the HTML renderer, but the target is a flat sequence of
//! styled paragraphs and explicit page breaks. [`layout_docx`] produces that sequence as plain
//! data and [`export_docx`] writes it out with `docx-rs`.
//!
//! Two rules differ from the paginated output on purpose:
//! - a chapter title is not followed by a page break, so it flows straight into its chapter
//! - inside every text block only the first paragraph starts flush; every following paragraph
//!   gets a first-line indent

use crate::config::PressConfig;
use crate::markdown::{self, Block, Inline};
use crate::model::{Book, BookPart, PartContent};
use crate::render::{copyright_lines, title_or};
use crate::styling::{mm_to_twips, BasicTextStyle, TextAlignment};
use crate::PressError;
use docx_rs::{
    AlignmentType, BreakType, Docx, LineSpacing, PageMargin, Paragraph, Run, SpecialIndentType,
};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Cursor;

static CHAPTER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^chapter\s+\d+\s*:").expect("chapter line pattern is valid"));

/// Space around a chapter-title heading, in twips.
const CHAPTER_TITLE_SPACING: u32 = 2400;
/// Left indent of table-of-contents entries that are not chapter lines, in twips.
const TOC_ENTRY_INDENT: i32 = 360;
/// Left indent of list items, in twips.
const LIST_INDENT: i32 = 360;

#[derive(Debug, Clone, PartialEq)]
pub struct DocxRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocxParagraph {
    pub runs: Vec<DocxRun>,
    pub alignment: TextAlignment,
    /// Font size in points.
    pub size: u8,
    /// First-line indent in twips.
    pub first_line_indent: Option<i32>,
    /// Left indent in twips.
    pub left_indent: Option<i32>,
    pub space_before: u32,
    pub space_after: u32,
}

impl DocxParagraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DocxBlock {
    Paragraph(DocxParagraph),
    PageBreak,
}

fn points_to_twips(points: f32) -> u32 {
    (points * 20.0).round().max(0.0) as u32
}

fn styled(text: &str, style: &BasicTextStyle) -> DocxParagraph {
    let size = style.size as f32;
    DocxParagraph {
        runs: vec![DocxRun {
            text: text.to_string(),
            bold: style.bold,
            italic: style.italic,
        }],
        alignment: style.alignment.unwrap_or(TextAlignment::Left),
        size: style.size,
        first_line_indent: None,
        left_indent: None,
        space_before: points_to_twips(style.before_spacing * size),
        space_after: points_to_twips(style.after_spacing * size),
    }
}

fn runs(inlines: &[Inline], style: &BasicTextStyle) -> Vec<DocxRun> {
    inlines
        .iter()
        .map(|inline| DocxRun {
            text: inline.text().to_string(),
            bold: style.bold || matches!(inline, Inline::Strong(_)),
            italic: style.italic,
        })
        .collect()
}

struct DocxLayout<'a> {
    config: &'a PressConfig,
    blocks: Vec<DocxBlock>,
}

impl<'a> DocxLayout<'a> {
    fn push(&mut self, paragraph: DocxParagraph) {
        self.blocks.push(DocxBlock::Paragraph(paragraph));
    }

    fn page_break(&mut self) {
        self.blocks.push(DocxBlock::PageBreak);
    }

    fn centered(&mut self, text: &str, style: &BasicTextStyle) {
        let mut paragraph = styled(text, style);
        paragraph.alignment = TextAlignment::Center;
        self.push(paragraph);
    }

    /// One text field: paragraphs and list items. Only the first paragraph starts flush.
    fn text_block(&mut self, text: Option<&str>) {
        let Some(text) = text else {
            return;
        };
        let style = &self.config.style;
        let indent = points_to_twips(style.text.indent * style.text.size as f32) as i32;
        let mut paragraphs = 0;
        for block in markdown::parse(text) {
            match block {
                Block::Paragraph(inlines) => {
                    let mut paragraph = styled("", &style.text);
                    paragraph.runs = runs(&inlines, &style.text);
                    if paragraphs > 0 {
                        paragraph.first_line_indent = Some(indent);
                    }
                    paragraphs += 1;
                    self.push(paragraph);
                }
                Block::List {
                    ordered,
                    start,
                    items,
                } => {
                    for (i, item) in items.iter().enumerate() {
                        let marker = if ordered {
                            format!("{}. ", start as usize + i)
                        } else {
                            "• ".to_string()
                        };
                        let mut paragraph = styled(&marker, &style.list_item);
                        paragraph.runs.extend(runs(item, &style.list_item));
                        paragraph.alignment = TextAlignment::Left;
                        paragraph.left_indent = Some(LIST_INDENT);
                        self.push(paragraph);
                    }
                }
            }
        }
    }

    fn part(&mut self, book: &Book, part: &BookPart, content: &PartContent) {
        let style = &self.config.style;
        match content {
            PartContent::Cover(cover) => {
                let title = cover.title.as_deref().unwrap_or(&book.title);
                self.centered(title, &style.cover_title);
                if let Some(subtitle) = cover
                    .subtitle
                    .as_deref()
                    .or(book.subtitle.as_deref())
                    .filter(|s| !s.trim().is_empty())
                {
                    self.centered(subtitle, &style.cover_subtitle);
                }
                if let Some(author) = cover
                    .author
                    .as_deref()
                    .or(book.author.as_deref())
                    .filter(|s| !s.trim().is_empty())
                {
                    self.centered(author, &style.cover_author);
                }
                self.page_break();
            }
            PartContent::Copyright(copyright) => {
                for line in copyright_lines(book, copyright, &self.config.copyright_notice) {
                    self.centered(&line, &style.copyright);
                }
                self.page_break();
            }
            PartContent::Toc(toc) => {
                self.push(styled(
                    title_or(&toc.title, "Table of Contents"),
                    &style.heading_2,
                ));
                for entry in &toc.entries {
                    if CHAPTER_LINE.is_match(&entry.text) {
                        let mut paragraph = styled(&entry.text, &style.toc_chapter);
                        paragraph.runs[0].bold = true;
                        self.push(paragraph);
                    } else {
                        let mut paragraph = styled(&entry.text, &style.toc_subchapter);
                        paragraph.left_indent = Some(TOC_ENTRY_INDENT);
                        self.push(paragraph);
                    }
                }
                self.page_break();
            }
            PartContent::Introduction(prose) => {
                self.push(styled(title_or(&prose.title, "Introduction"), &style.heading_2));
                self.text_block(prose.content.as_deref());
                self.page_break();
            }
            PartContent::Conclusion(prose) => {
                self.push(styled(title_or(&prose.title, "Conclusion"), &style.heading_2));
                self.text_block(prose.content.as_deref());
                self.page_break();
            }
            PartContent::ChapterTitle(chapter) => {
                let mut heading = styled(title_or(&chapter.title, "Chapter"), &style.heading_1);
                heading.alignment = TextAlignment::Center;
                heading.space_before = CHAPTER_TITLE_SPACING;
                heading.space_after = CHAPTER_TITLE_SPACING;
                self.push(heading);
            }
            PartContent::ChapterContent(chapter) => {
                self.push(styled(title_or(&chapter.title, "Chapter"), &style.heading_2));
                self.text_block(chapter.introduction.as_deref());
                for subchapter in &chapter.subchapters {
                    if let Some(title) = subchapter.title.as_deref().filter(|t| !t.trim().is_empty())
                    {
                        self.push(styled(title, &style.heading_3));
                    }
                    self.text_block(subchapter.content.as_deref());
                }
                self.page_break();
            }
            PartContent::PlainText { text } => {
                for line in text.lines().filter(|l| !l.trim().is_empty()) {
                    let mut paragraph = styled(line, &style.text);
                    paragraph.alignment = TextAlignment::Left;
                    self.push(paragraph);
                }
                self.page_break();
            }
            PartContent::Unknown { part_type } => {
                debug!(
                    "part {} has unknown type {:?}, nothing to export",
                    part.part_index, part_type
                );
            }
        }
    }
}

/// Lays out every part in reading order as paragraphs and page breaks.
///
/// A page break at the very end is dropped so the document does not end on a blank page.
pub fn layout_docx(config: &PressConfig, book: &Book, parts: &[BookPart]) -> Vec<DocxBlock> {
    let mut layout = DocxLayout {
        config,
        blocks: Vec::new(),
    };
    for part in crate::assemble::sort_parts(parts) {
        layout.part(book, part, &part.decode());
    }
    if layout.blocks.last() == Some(&DocxBlock::PageBreak) {
        layout.blocks.pop();
    }
    layout.blocks
}

fn alignment_type(alignment: TextAlignment) -> AlignmentType {
    match alignment {
        TextAlignment::Left => AlignmentType::Left,
        TextAlignment::Center => AlignmentType::Center,
        TextAlignment::Right => AlignmentType::Right,
        TextAlignment::Justify => AlignmentType::Both,
    }
}

fn to_docx_paragraph(paragraph: &DocxParagraph) -> Paragraph {
    let mut out = Paragraph::new()
        .align(alignment_type(paragraph.alignment))
        .line_spacing(
            LineSpacing::new()
                .before(paragraph.space_before)
                .after(paragraph.space_after),
        );
    if paragraph.first_line_indent.is_some() || paragraph.left_indent.is_some() {
        out = out.indent(
            paragraph.left_indent,
            paragraph.first_line_indent.map(SpecialIndentType::FirstLine),
            None,
            None,
        );
    }
    for run in &paragraph.runs {
        let mut docx_run = Run::new()
            .add_text(run.text.as_str())
            .size(paragraph.size as usize * 2);
        if run.bold {
            docx_run = docx_run.bold();
        }
        if run.italic {
            docx_run = docx_run.italic();
        }
        out = out.add_run(docx_run);
    }
    out
}

/// Writes the book as a `.docx` package.
pub fn export_docx(
    config: &PressConfig,
    book: &Book,
    parts: &[BookPart],
) -> Result<Vec<u8>, PressError> {
    let blocks = layout_docx(config, book, parts);
    let page = &config.page;
    let margins = &page.margins;
    let mut docx = Docx::new()
        .page_size(
            mm_to_twips(page.width_mm) as u32,
            mm_to_twips(page.height_mm) as u32,
        )
        .page_margin(
            PageMargin::new()
                .top(mm_to_twips(margins.top))
                .bottom(mm_to_twips(margins.bottom))
                .left(mm_to_twips(margins.left))
                .right(mm_to_twips(margins.right)),
        );

    for block in &blocks {
        docx = match block {
            DocxBlock::Paragraph(paragraph) => docx.add_paragraph(to_docx_paragraph(paragraph)),
            DocxBlock::PageBreak => docx
                .add_paragraph(Paragraph::new().add_run(Run::new().add_break(BreakType::Page))),
        };
    }

    let mut cursor = Cursor::new(Vec::new());
    docx.build().pack(&mut cursor).map_err(|e| {
        PressError::docx_error(
            format!("writing DOCX package: {}", e),
            Some("Check that the output location is writable".to_string()),
        )
    })?;
    debug!("exported {} DOCX block(s)", blocks.len());
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PartType;

    fn book() -> Book {
        Book {
            id: "b2".to_string(),
            title: "Calm Kitchens".to_string(),
            author: Some("M. Ortiz".to_string()),
            ..Default::default()
        }
    }

    fn layout(parts: &[BookPart]) -> Vec<DocxBlock> {
        layout_docx(&PressConfig::default(), &book(), parts)
    }

    fn paragraphs(blocks: &[DocxBlock]) -> Vec<&DocxParagraph> {
        blocks
            .iter()
            .filter_map(|b| match b {
                DocxBlock::Paragraph(p) => Some(p),
                DocxBlock::PageBreak => None,
            })
            .collect()
    }

    #[test]
    fn test_only_first_paragraph_of_a_block_is_flush() {
        let part = BookPart::new(
            4,
            PartType::ChapterContent,
            r#"{"title":"Pantry","introduction":"One.\nTwo.\n\nThree."}"#,
        );
        let blocks = layout(&[part]);
        let paragraphs = paragraphs(&blocks);
        assert_eq!(paragraphs[0].text(), "Pantry");
        let body: Vec<_> = paragraphs[1..4].iter().map(|p| p.first_line_indent).collect();
        assert_eq!(body[0], None);
        assert!(body[1].is_some());
        assert!(body[2].is_some());
    }

    #[test]
    fn test_each_subchapter_restarts_the_flush_rule() {
        let part = BookPart::new(
            4,
            PartType::ChapterContent,
            r#"{"title":"Pantry","subchapters":[{"title":"Jars","content":"A.\nB."},{"title":"Bins","content":"C."}]}"#,
        );
        let blocks = layout(&[part]);
        let texts: Vec<(String, bool)> = paragraphs(&blocks)
            .iter()
            .map(|p| (p.text(), p.first_line_indent.is_some()))
            .collect();
        assert_eq!(
            texts,
            vec![
                ("Pantry".to_string(), false),
                ("Jars".to_string(), false),
                ("A.".to_string(), false),
                ("B.".to_string(), true),
                ("Bins".to_string(), false),
                ("C.".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_chapter_title_has_no_page_break() {
        let blocks = layout(&[
            BookPart::new(1, PartType::ChapterTitle, r#"{"title":"Chapter 1: Pantry"}"#),
            BookPart::new(2, PartType::ChapterContent, r#"{"title":"Pantry"}"#),
            BookPart::new(3, PartType::Conclusion, r#"{"content":"End."}"#),
        ]);
        assert!(matches!(&blocks[0], DocxBlock::Paragraph(p)
            if p.alignment == TextAlignment::Center && p.space_before == CHAPTER_TITLE_SPACING));
        assert!(matches!(&blocks[1], DocxBlock::Paragraph(p) if p.text() == "Pantry"));
        assert_eq!(blocks[2], DocxBlock::PageBreak);
        assert_ne!(blocks.last(), Some(&DocxBlock::PageBreak));
    }

    #[test]
    fn test_toc_lines_bold_chapters_and_indent_the_rest() {
        let blocks = layout(&[BookPart::new(
            2,
            PartType::Toc,
            r#"{"content":"Chapter 1: Tools\n- Knives\nChapter 2: Heat"}"#,
        )]);
        let paragraphs = paragraphs(&blocks);
        assert_eq!(paragraphs[0].text(), "Table of Contents");
        assert!(paragraphs[1].runs[0].bold);
        assert_eq!(paragraphs[1].left_indent, None);
        assert_eq!(paragraphs[2].text(), "Knives");
        assert!(!paragraphs[2].runs[0].bold);
        assert_eq!(paragraphs[2].left_indent, Some(TOC_ENTRY_INDENT));
        assert!(paragraphs[3].runs[0].bold);
    }

    #[test]
    fn test_cover_and_copyright_are_centred_and_break() {
        let blocks = layout(&[
            BookPart::new(0, PartType::Cover, "{}"),
            BookPart::new(1, PartType::Copyright, ""),
            BookPart::new(2, PartType::Introduction, r#"{"content":"Hi."}"#),
        ]);
        assert!(matches!(&blocks[0], DocxBlock::Paragraph(p)
            if p.text() == "Calm Kitchens" && p.alignment == TextAlignment::Center));
        assert!(matches!(&blocks[1], DocxBlock::Paragraph(p) if p.text() == "M. Ortiz"));
        assert_eq!(blocks[2], DocxBlock::PageBreak);
        assert!(matches!(&blocks[3], DocxBlock::Paragraph(p)
            if p.text().starts_with("Copyright © M. Ortiz") && p.size == 8));
        assert_eq!(blocks[5], DocxBlock::PageBreak);
    }

    #[test]
    fn test_bold_spans_and_list_items() {
        let blocks = layout(&[BookPart::new(
            2,
            PartType::Introduction,
            r#"{"content":"Keep **sharp** knives\n1. hone\n2. strop"}"#,
        )]);
        let paragraphs = paragraphs(&blocks);
        assert_eq!(paragraphs[1].runs.len(), 3);
        assert!(paragraphs[1].runs[1].bold);
        assert_eq!(paragraphs[2].text(), "1. hone");
        assert_eq!(paragraphs[3].left_indent, Some(LIST_INDENT));
    }

    #[test]
    fn test_unknown_parts_export_nothing() {
        assert!(layout(&[BookPart::new(0, PartType::from("index"), "{}")]).is_empty());
    }

    #[test]
    fn test_export_produces_a_zip_package() {
        let bytes = export_docx(
            &PressConfig::default(),
            &book(),
            &[BookPart::new(0, PartType::Cover, "{}")],
        )
        .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}
