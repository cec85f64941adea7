//! PDF generation by manual coordinate placement.
//!
//! This is the in-process alternative to paginating the assembled HTML with a browser. Each part
//! is laid out onto fixed-size pages of the configured trim size with the standard Helvetica
//! family: text is measured with the metrics from [`crate::fonts`], wrapped greedily, and placed
//! line by line from the top margin down, starting a new page whenever the bottom margin is
//! reached. The per-type rules mirror the HTML path:
//!
//! - cover: the whole page is filled with the cover colour and the title block is centred
//! - copyright: short centred paragraphs resting on the bottom margin
//! - chapter title: a page holding only the title, centred vertically
//! - prose: headings, then markdown-lite paragraphs and lists; paragraphs are indented except the
//!   first of a block and one following a list
//!
//! Running heads are not drawn here; [`crate::merge`] stamps them once parts are concatenated.

use crate::config::PressConfig;
use crate::fonts::{self, FontFace, Line};
use crate::markdown::{self, Block, Inline};
use crate::merge;
use crate::model::{Book, BookPart, PartContent};
use crate::render::{copyright_lines, title_or};
use crate::styling::{mm_to_pt, BasicTextStyle, TextAlignment};
use crate::PressError;
use log::{debug, info};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

const HEADING_LINE_HEIGHT: f32 = 1.2;
const BLACK: (u8, u8, u8) = (0, 0, 0);

/// How a block of text is placed horizontally.
struct Placement {
    /// Extra left inset in points.
    inset: f32,
    /// First-line indent in points.
    indent: f32,
    /// List marker drawn in the hanging area of the first line.
    marker: Option<String>,
}

impl Placement {
    fn plain() -> Self {
        Self {
            inset: 0.0,
            indent: 0.0,
            marker: None,
        }
    }
}

/// Page-by-page drawing state.
struct Canvas {
    width: f32,
    height: f32,
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    pages: Vec<Vec<Operation>>,
    y: f32,
}

impl Canvas {
    fn new(config: &PressConfig) -> Self {
        let page = &config.page;
        let width = page.width_pt();
        let height = page.height_pt();
        Self {
            width,
            height,
            left: mm_to_pt(page.margins.left),
            right: width - mm_to_pt(page.margins.right),
            top: height - mm_to_pt(page.margins.top),
            bottom: mm_to_pt(page.margins.bottom),
            pages: Vec::new(),
            y: 0.0,
        }
    }

    fn text_width(&self) -> f32 {
        self.right - self.left
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.y = self.top;
    }

    fn at_top(&self) -> bool {
        (self.y - self.top).abs() < f32::EPSILON
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.new_page();
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn fill_page(&mut self, color: (u8, u8, u8)) {
        let (width, height) = (self.width, self.height);
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.extend(fill_color(color));
        ops.push(Operation::new(
            "re",
            vec![0.into(), 0.into(), width.into(), height.into()],
        ));
        ops.push(Operation::new("f", vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn skip(&mut self, amount: f32) {
        if !self.at_top() {
            self.y -= amount;
        }
    }

    /// Draws one wrapped line with its baseline placed inside a `line_height` slot.
    fn draw_line(
        &mut self,
        line: &Line,
        x: f32,
        size: f32,
        line_height: f32,
        color: (u8, u8, u8),
        word_spacing: f32,
    ) {
        if self.y - line_height < self.bottom {
            self.new_page();
        }
        let baseline = self.y - (line_height + size) / 2.0 + size * 0.2;
        let mut ops = vec![Operation::new("BT", vec![])];
        ops.extend(fill_color(color));
        ops.push(Operation::new("Tw", vec![word_spacing.into()]));
        ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        for piece in line.pieces() {
            ops.push(Operation::new(
                "Tf",
                vec![
                    Object::Name(piece.face.resource_name().as_bytes().to_vec()),
                    size.into(),
                ],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(fonts::encode_win_ansi(&piece.text))],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
        self.ops().extend(ops);
        self.y -= line_height;
    }

    fn draw_marker(
        &mut self,
        marker: &str,
        x: f32,
        size: f32,
        line_height: f32,
        color: (u8, u8, u8),
    ) {
        let baseline = self.y - (line_height + size) / 2.0 + size * 0.2;
        let mut ops = vec![Operation::new("BT", vec![])];
        ops.extend(fill_color(color));
        ops.push(Operation::new("Tw", vec![0.into()]));
        ops.push(Operation::new(
            "Tf",
            vec![
                Object::Name(FontFace::Regular.resource_name().as_bytes().to_vec()),
                size.into(),
            ],
        ));
        ops.push(Operation::new("Td", vec![x.into(), baseline.into()]));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(fonts::encode_win_ansi(marker))],
        ));
        ops.push(Operation::new("ET", vec![]));
        self.ops().extend(ops);
    }
}

fn fill_color((r, g, b): (u8, u8, u8)) -> Vec<Operation> {
    vec![Operation::new(
        "rg",
        vec![
            (r as f32 / 255.0).into(),
            (g as f32 / 255.0).into(),
            (b as f32 / 255.0).into(),
        ],
    )]
}

fn base_face(style: &BasicTextStyle) -> FontFace {
    if style.bold {
        FontFace::Bold
    } else if style.italic {
        FontFace::Italic
    } else {
        FontFace::Regular
    }
}

fn styled_runs(inlines: &[Inline], style: &BasicTextStyle) -> Vec<(String, FontFace)> {
    let face = base_face(style);
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text(text) => (text.clone(), face),
            Inline::Strong(text) => (text.clone(), FontFace::Bold),
        })
        .collect()
}

/// Lays out parts onto pages.
pub struct PdfRenderer<'a> {
    config: &'a PressConfig,
}

impl<'a> PdfRenderer<'a> {
    pub fn new(config: &'a PressConfig) -> Self {
        Self { config }
    }

    pub fn render_part(&self, book: &Book, part: &BookPart) -> Result<Document, PressError> {
        self.render_content(book, part, &part.decode())
    }

    pub fn render_content(
        &self,
        book: &Book,
        part: &BookPart,
        content: &PartContent,
    ) -> Result<Document, PressError> {
        let style = &self.config.style;
        let mut canvas = Canvas::new(self.config);

        match content {
            PartContent::Cover(cover) => {
                canvas.new_page();
                canvas.fill_page(self.config.cover.background_color);
                if self.config.cover.background_image.is_some() {
                    debug!("cover background images are only drawn by the HTML path");
                }
                let title = cover.title.clone().unwrap_or_else(|| book.title.clone());
                let subtitle = cover.subtitle.clone().or_else(|| book.subtitle.clone());
                let author = cover.author.clone().or_else(|| book.author.clone());
                let mut block = vec![(title, &style.cover_title)];
                if let Some(subtitle) = subtitle.filter(|s| !s.trim().is_empty()) {
                    block.push((subtitle, &style.cover_subtitle));
                }
                if let Some(author) = author.filter(|s| !s.trim().is_empty()) {
                    block.push((author, &style.cover_author));
                }
                self.centered_block(&mut canvas, &block, TextAlignment::Center);
            }
            PartContent::Copyright(copyright) => {
                canvas.new_page();
                let lines = copyright_lines(book, copyright, &self.config.copyright_notice);
                let runs: Vec<_> = lines
                    .iter()
                    .map(|line| vec![(line.clone(), base_face(&style.copyright))])
                    .collect();
                let height: f32 = runs
                    .iter()
                    .map(|r| self.block_height(&canvas, r, &style.copyright, style.line_height, 0.0))
                    .sum();
                canvas.y = (canvas.bottom + height).min(canvas.top);
                for run in runs {
                    self.text_block(
                        &mut canvas,
                        &run,
                        &style.copyright,
                        style.line_height,
                        Placement::plain(),
                    );
                }
            }
            PartContent::Toc(toc) => {
                canvas.new_page();
                self.heading(&mut canvas, title_or(&toc.title, "Table of Contents"), &style.heading_2);
                for entry in &toc.entries {
                    let entry_style = if entry.subchapter {
                        &style.toc_subchapter
                    } else {
                        &style.toc_chapter
                    };
                    let placement = Placement {
                        inset: entry_style.indent * entry_style.size as f32,
                        ..Placement::plain()
                    };
                    self.text_block(
                        &mut canvas,
                        &[(entry.text.clone(), base_face(entry_style))],
                        entry_style,
                        style.line_height,
                        placement,
                    );
                }
            }
            PartContent::Introduction(prose) => {
                canvas.new_page();
                self.heading(&mut canvas, title_or(&prose.title, "Introduction"), &style.heading_2);
                self.markdown(&mut canvas, prose.content.as_deref());
            }
            PartContent::Conclusion(prose) => {
                canvas.new_page();
                self.heading(&mut canvas, title_or(&prose.title, "Conclusion"), &style.heading_2);
                self.markdown(&mut canvas, prose.content.as_deref());
            }
            PartContent::ChapterTitle(chapter) => {
                canvas.new_page();
                let title = title_or(&chapter.title, "Chapter").to_string();
                self.centered_block(
                    &mut canvas,
                    &[(title, &style.heading_1)],
                    TextAlignment::Center,
                );
            }
            PartContent::ChapterContent(chapter) => {
                canvas.new_page();
                self.heading(&mut canvas, title_or(&chapter.title, "Chapter"), &style.heading_2);
                self.markdown(&mut canvas, chapter.introduction.as_deref());
                for subchapter in &chapter.subchapters {
                    self.heading(
                        &mut canvas,
                        subchapter.title.as_deref().unwrap_or(""),
                        &style.heading_3,
                    );
                    self.markdown(&mut canvas, subchapter.content.as_deref());
                }
            }
            PartContent::PlainText { text } => {
                canvas.new_page();
                for line in text.lines() {
                    if line.trim().is_empty() {
                        canvas.skip(style.text.size as f32 * style.line_height);
                        continue;
                    }
                    self.text_block(
                        &mut canvas,
                        &[(line.to_string(), FontFace::Regular)],
                        &style.text,
                        style.line_height,
                        Placement::plain(),
                    );
                }
            }
            PartContent::Unknown { part_type } => {
                return Err(PressError::pdf_error(
                    format!(
                        "part {} has unknown type {:?} and produces no pages",
                        part.part_index, part_type
                    ),
                    Some("Remove the part or give it one of the known part types".to_string()),
                ));
            }
        }

        if canvas.pages.is_empty() {
            canvas.new_page();
        }
        debug!(
            "laid out part {} ({}) on {} page(s)",
            part.part_index,
            part.part_type,
            canvas.pages.len()
        );
        self.build_document(canvas)
    }

    fn heading(&self, canvas: &mut Canvas, text: &str, style: &BasicTextStyle) {
        if text.trim().is_empty() {
            return;
        }
        let runs = [(text.to_string(), base_face(style))];
        // Keep a heading together with at least one body line.
        let needed = self.block_height(canvas, &runs, style, HEADING_LINE_HEIGHT, 0.0)
            + self.config.style.text.size as f32 * self.config.style.line_height;
        if canvas.y - needed < canvas.bottom {
            canvas.new_page();
        }
        self.text_block(canvas, &runs, style, HEADING_LINE_HEIGHT, Placement::plain());
    }

    fn markdown(&self, canvas: &mut Canvas, text: Option<&str>) {
        let Some(text) = text else {
            return;
        };
        let style = &self.config.style;
        let indent = style.text.indent * style.text.size as f32;
        let mut first = true;
        let mut after_list = false;
        for block in markdown::parse(text) {
            match block {
                Block::Paragraph(inlines) => {
                    let placement = Placement {
                        indent: if first || after_list { 0.0 } else { indent },
                        ..Placement::plain()
                    };
                    self.text_block(
                        canvas,
                        &styled_runs(&inlines, &style.text),
                        &style.text,
                        style.line_height,
                        placement,
                    );
                    after_list = false;
                }
                Block::List {
                    ordered,
                    start,
                    items,
                } => {
                    let hang = 1.5 * style.list_item.size as f32;
                    for (i, item) in items.iter().enumerate() {
                        let marker = if ordered {
                            format!("{}.", start as usize + i)
                        } else {
                            "•".to_string()
                        };
                        self.text_block(
                            canvas,
                            &styled_runs(item, &style.list_item),
                            &style.list_item,
                            style.line_height,
                            Placement {
                                inset: hang,
                                indent: 0.0,
                                marker: Some(marker),
                            },
                        );
                    }
                    after_list = true;
                }
            }
            first = false;
        }
    }

    fn wrap_lines(
        &self,
        canvas: &Canvas,
        runs: &[(String, FontFace)],
        style: &BasicTextStyle,
        inset: f32,
        indent: f32,
    ) -> Vec<Line> {
        let width = canvas.text_width() - inset;
        let words = fonts::split_words(runs);
        fonts::wrap(&words, style.size as f32, width - indent, width)
    }

    fn block_height(
        &self,
        canvas: &Canvas,
        runs: &[(String, FontFace)],
        style: &BasicTextStyle,
        line_height: f32,
        inset: f32,
    ) -> f32 {
        let size = style.size as f32;
        let lines = self.wrap_lines(canvas, runs, style, inset, 0.0);
        (style.before_spacing + style.after_spacing) * size + lines.len() as f32 * size * line_height
    }

    fn text_block(
        &self,
        canvas: &mut Canvas,
        runs: &[(String, FontFace)],
        style: &BasicTextStyle,
        line_height: f32,
        placement: Placement,
    ) {
        let size = style.size as f32;
        let slot = size * line_height;
        let color = style.text_color.unwrap_or(BLACK);
        let alignment = style.alignment.unwrap_or(TextAlignment::Left);
        let lines = self.wrap_lines(canvas, runs, style, placement.inset, placement.indent);
        let available = canvas.text_width() - placement.inset;

        canvas.skip(style.before_spacing * size);
        let last = lines.len().saturating_sub(1);
        for (i, line) in lines.iter().enumerate() {
            let indent = if i == 0 { placement.indent } else { 0.0 };
            let room = available - indent;
            let start = canvas.left + placement.inset + indent;
            let (x, word_spacing) = match alignment {
                TextAlignment::Left => (start, 0.0),
                TextAlignment::Center => (start + (room - line.width).max(0.0) / 2.0, 0.0),
                TextAlignment::Right => (start + (room - line.width).max(0.0), 0.0),
                TextAlignment::Justify if i < last && line.space_count() > 0 => (
                    start,
                    (room - line.width).max(0.0) / line.space_count() as f32,
                ),
                TextAlignment::Justify => (start, 0.0),
            };
            if i == 0 {
                if let Some(marker) = &placement.marker {
                    if canvas.y - slot < canvas.bottom {
                        canvas.new_page();
                    }
                    let marker_x = canvas.left + placement.inset
                        - fonts::text_width(marker, FontFace::Regular, size)
                        - size * 0.5;
                    canvas.draw_marker(marker, marker_x, size, slot, color);
                }
            }
            canvas.draw_line(line, x, size, slot, color, word_spacing);
        }
        canvas.y -= style.after_spacing * size;
    }

    /// Places a stack of single-style paragraphs in the vertical middle of the current page.
    fn centered_block(
        &self,
        canvas: &mut Canvas,
        block: &[(String, &BasicTextStyle)],
        alignment: TextAlignment,
    ) {
        let heights: Vec<f32> = block
            .iter()
            .map(|(text, style)| {
                self.block_height(
                    canvas,
                    &[(text.clone(), base_face(style))],
                    style,
                    HEADING_LINE_HEIGHT,
                    0.0,
                )
            })
            .collect();
        let total: f32 = heights.iter().sum();
        let middle = (canvas.top + canvas.bottom) / 2.0;
        canvas.y = (middle + total / 2.0).min(canvas.top);
        for (text, style) in block {
            let mut centered = (*style).clone();
            centered.alignment = Some(alignment);
            // Spacing before the first paragraph counts even at the top of the block.
            canvas.y -= centered.before_spacing * centered.size as f32;
            centered.before_spacing = 0.0;
            self.text_block(
                canvas,
                &[(text.clone(), base_face(style))],
                &centered,
                HEADING_LINE_HEIGHT,
                Placement::plain(),
            );
        }
    }

    fn build_document(&self, canvas: Canvas) -> Result<Document, PressError> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut font_dict = lopdf::Dictionary::new();
        for face in FontFace::ALL {
            let font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => face.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            font_dict.set(face.resource_name(), font_id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => font_dict,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(canvas.pages.len());
        for operations in canvas.pages {
            let content = Content { operations };
            let bytes = content
                .encode()
                .map_err(|e| PressError::pdf_error(format!("encoding page content: {}", e), None))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, bytes));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), canvas.width.into(), canvas.height.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        Ok(doc)
    }
}

/// Serializes a document.
pub fn document_to_bytes(doc: &mut Document) -> Result<Vec<u8>, PressError> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| PressError::pdf_error(format!("writing PDF: {}", e), None))?;
    Ok(bytes)
}

/// Renders one part as a standalone PDF.
pub fn render_part_pdf(
    config: &PressConfig,
    book: &Book,
    part: &BookPart,
) -> Result<Vec<u8>, PressError> {
    let mut doc = PdfRenderer::new(config).render_part(book, part)?;
    doc.compress();
    document_to_bytes(&mut doc)
}

/// Renders the whole book in one pass: every known part in reading order, concatenated and
/// stamped with running heads.
pub fn render_book_pdf(
    config: &PressConfig,
    book: &Book,
    parts: &[BookPart],
) -> Result<Vec<u8>, PressError> {
    let renderer = PdfRenderer::new(config);
    let mut documents = Vec::new();
    for part in crate::assemble::sort_parts(parts) {
        if !part.part_type.is_known() {
            debug!("skipping part {} with unknown type {}", part.part_index, part.part_type);
            continue;
        }
        documents.push(renderer.render_part(book, part)?);
    }
    let mut merged = merge::merge_documents(documents)?;
    merge::stamp_running_heads(&mut merged, &book.title, &config.stamp)?;
    merge::set_document_info(&mut merged, book);
    merged.compress();
    info!(
        "rendered {} page(s) for book {:?}",
        merged.get_pages().len(),
        book.id
    );
    document_to_bytes(&mut merged)
}
