//! Shared page geometry and typographic rules.
//!
//! The same [`BookStyle`] drives every output adapter: the stylesheet injected into assembled
//! HTML documents, the manual-coordinate PDF layout and the DOCX export. Page dimensions and
//! margins are expressed in millimetres and converted where an adapter needs points or twips.

use html_escape::encode_style;
use std::fmt::Write;

pub const MM_PER_INCH: f32 = 25.4;
pub const POINTS_PER_INCH: f32 = 72.0;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm / MM_PER_INCH * POINTS_PER_INCH
}

pub fn mm_to_twips(mm: f32) -> i32 {
    (mm_to_pt(mm) * 20.0).round() as i32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAlignment {
    Left,
    Center,
    Right,
    Justify,
}

impl TextAlignment {
    pub fn as_css(&self) -> &'static str {
        match self {
            TextAlignment::Left => "left",
            TextAlignment::Center => "center",
            TextAlignment::Right => "right",
            TextAlignment::Justify => "justify",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

/// Fixed trim size of every page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSetup {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margins: Margins,
}

impl PageSetup {
    /// A5 trim (148 x 210 mm) with room reserved for the running header and footer.
    pub fn a5() -> Self {
        Self {
            width_mm: 148.0,
            height_mm: 210.0,
            margins: Margins {
                top: 20.0,
                right: 18.0,
                bottom: 20.0,
                left: 18.0,
            },
        }
    }

    pub fn width_pt(&self) -> f32 {
        mm_to_pt(self.width_mm)
    }

    pub fn height_pt(&self) -> f32 {
        mm_to_pt(self.height_mm)
    }
}

impl Default for PageSetup {
    fn default() -> Self {
        Self::a5()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BasicTextStyle {
    /// Font size in points.
    pub size: u8,
    /// Space before the element, in em.
    pub before_spacing: f32,
    /// Space after the element, in em.
    pub after_spacing: f32,
    pub text_color: Option<(u8, u8, u8)>,
    pub background_color: Option<(u8, u8, u8)>,
    pub alignment: Option<TextAlignment>,
    pub font_family: Option<String>,
    pub bold: bool,
    pub italic: bool,
    /// First-line indent in em.
    pub indent: f32,
}

impl BasicTextStyle {
    pub fn new(size: u8, before_spacing: f32, after_spacing: f32) -> Self {
        Self {
            size,
            before_spacing,
            after_spacing,
            text_color: None,
            background_color: None,
            alignment: None,
            font_family: None,
            bold: false,
            italic: false,
            indent: 0.0,
        }
    }

    fn with_alignment(mut self, alignment: TextAlignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn with_color(mut self, color: (u8, u8, u8)) -> Self {
        self.text_color = Some(color);
        self
    }

    /// Declarations for a CSS rule body.
    pub fn css_declarations(&self) -> String {
        let mut css = String::new();
        let _ = write!(css, "font-size: {}pt; ", self.size);
        let _ = write!(
            css,
            "margin: {}em 0 {}em 0; ",
            self.before_spacing, self.after_spacing
        );
        if let Some(family) = &self.font_family {
            let _ = write!(css, "font-family: {}; ", encode_style(family));
        }
        if let Some((r, g, b)) = self.text_color {
            let _ = write!(css, "color: rgb({}, {}, {}); ", r, g, b);
        }
        if let Some((r, g, b)) = self.background_color {
            let _ = write!(css, "background-color: rgb({}, {}, {}); ", r, g, b);
        }
        if let Some(alignment) = self.alignment {
            let _ = write!(css, "text-align: {}; ", alignment.as_css());
        }
        css.push_str(if self.bold {
            "font-weight: bold; "
        } else {
            "font-weight: normal; "
        });
        if self.italic {
            css.push_str("font-style: italic; ");
        }
        css.trim_end().to_string()
    }
}

impl Default for BasicTextStyle {
    fn default() -> Self {
        Self::new(11, 0.0, 0.6)
    }
}

/// Typography of every element a book part can contain.
#[derive(Debug, Clone, PartialEq)]
pub struct BookStyle {
    pub text: BasicTextStyle,
    pub heading_1: BasicTextStyle,
    pub heading_2: BasicTextStyle,
    pub heading_3: BasicTextStyle,
    pub toc_chapter: BasicTextStyle,
    pub toc_subchapter: BasicTextStyle,
    pub copyright: BasicTextStyle,
    pub cover_title: BasicTextStyle,
    pub cover_subtitle: BasicTextStyle,
    pub cover_author: BasicTextStyle,
    pub list_item: BasicTextStyle,
    /// Line height as a multiple of the font size.
    pub line_height: f32,
}

impl Default for BookStyle {
    fn default() -> Self {
        let mut text = BasicTextStyle::new(11, 0.0, 0.6).with_alignment(TextAlignment::Justify);
        text.font_family = Some("Georgia, 'Times New Roman', serif".to_string());
        text.indent = 1.5;
        let white = (255, 255, 255);
        Self {
            text,
            heading_1: BasicTextStyle::new(24, 0.0, 1.0)
                .bold()
                .with_alignment(TextAlignment::Center),
            heading_2: BasicTextStyle::new(18, 0.0, 0.9).bold(),
            heading_3: BasicTextStyle::new(14, 1.0, 0.5).bold(),
            toc_chapter: BasicTextStyle::new(11, 0.6, 0.2).bold(),
            toc_subchapter: {
                let mut style = BasicTextStyle::new(10, 0.0, 0.2);
                style.indent = 1.5;
                style
            },
            copyright: BasicTextStyle::new(8, 0.0, 0.8).with_alignment(TextAlignment::Center),
            cover_title: BasicTextStyle::new(30, 0.0, 0.5)
                .bold()
                .with_alignment(TextAlignment::Center)
                .with_color(white),
            cover_subtitle: BasicTextStyle::new(16, 0.0, 1.5)
                .italic()
                .with_alignment(TextAlignment::Center)
                .with_color(white),
            cover_author: BasicTextStyle::new(14, 0.0, 0.0)
                .with_alignment(TextAlignment::Center)
                .with_color(white),
            list_item: BasicTextStyle::new(11, 0.0, 0.3),
            line_height: 1.5,
        }
    }
}

/// Which wrapper a stylesheet is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperMode {
    /// The whole book in one document; running heads drawn by the pagination engine.
    Full,
    /// One part per document; running heads only reserved, stamped later at merge time.
    Standalone,
}

/// Appearance of the cover page.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverStyle {
    pub background_image: Option<String>,
    pub background_color: (u8, u8, u8),
}

impl Default for CoverStyle {
    fn default() -> Self {
        Self {
            background_image: None,
            background_color: (28, 37, 65),
        }
    }
}

/// Builds the stylesheet shared by every assembled document.
pub fn stylesheet(
    style: &BookStyle,
    page: &PageSetup,
    cover: &CoverStyle,
    mode: WrapperMode,
) -> String {
    let m = &page.margins;
    let mut css = String::new();

    let _ = writeln!(
        css,
        "@page {{ size: {}mm {}mm; margin: {}mm {}mm {}mm {}mm; }}",
        page.width_mm, page.height_mm, m.top, m.right, m.bottom, m.left
    );
    if mode == WrapperMode::Full {
        css.push_str(
            "@page { @top-center { content: string(book-title); font-size: 8pt; \
             letter-spacing: 0.1em; } @bottom-center { content: counter(page); font-size: 9pt; } }\n",
        );
        css.push_str("@page :first { @top-center { content: none; } @bottom-center { content: none; } }\n");
        css.push_str(".running-title { string-set: book-title content(); display: none; }\n");
    }
    css.push_str("@page cover { margin: 0; @top-center { content: none; } @bottom-center { content: none; } }\n");

    let _ = writeln!(
        css,
        "html, body {{ margin: 0; padding: 0; }}\nbody {{ {} line-height: {}; }}",
        style.text.css_declarations(),
        style.line_height
    );

    // Cover: unconstrained full-bleed page.
    let (r, g, b) = cover.background_color;
    let _ = write!(
        css,
        ".cover {{ page: cover; width: {}mm; height: {}mm; margin: 0; position: relative; \
         background-color: rgb({}, {}, {}); background-size: cover; background-position: center; \
         display: flex; align-items: center; justify-content: center; text-align: center; }}\n",
        page.width_mm, page.height_mm, r, g, b
    );
    let _ = writeln!(css, ".cover-title {{ {} }}", style.cover_title.css_declarations());
    let _ = writeln!(
        css,
        ".cover-subtitle {{ {} }}",
        style.cover_subtitle.css_declarations()
    );
    let _ = writeln!(css, ".cover-author {{ {} }}", style.cover_author.css_declarations());
    css.push_str(".cover p { text-indent: 0; }\n");

    // Content pages.
    css.push_str(".page-frame { break-before: page; }\n");
    css.push_str(".page-frame:first-child { break-before: auto; }\n");
    let _ = writeln!(css, "h1 {{ {} }}", style.heading_1.css_declarations());
    let _ = writeln!(css, "h2 {{ {} }}", style.heading_2.css_declarations());
    let _ = writeln!(css, "h3 {{ {} }}", style.heading_3.css_declarations());
    css.push_str("h1, h2, h3 { break-after: avoid; }\n");
    let _ = writeln!(
        css,
        "p {{ margin: {}em 0 {}em 0; text-indent: {}em; orphans: 2; widows: 2; }}",
        style.text.before_spacing, style.text.after_spacing, style.text.indent
    );
    css.push_str(
        "h1 + p, h2 + p, h3 + p, ul + p, ol + p, .part-body > p:first-child { text-indent: 0; }\n",
    );
    let _ = writeln!(
        css,
        "li {{ {} text-align: left; }}",
        style.list_item.css_declarations()
    );

    // Copyright: centered short paragraphs, smaller type.
    let _ = writeln!(
        css,
        ".copyright-block {{ display: flex; flex-direction: column; justify-content: flex-end; \
         min-height: {}mm; }}\n.copyright-block p {{ {} text-indent: 0; }}",
        page.height_mm - m.top - m.bottom - 1.0,
        style.copyright.css_declarations()
    );

    // Table of contents.
    css.push_str(".toc-list { list-style: none; margin: 0; padding: 0; }\n");
    let _ = writeln!(
        css,
        ".toc-chapter {{ {} padding-left: 0; }}",
        style.toc_chapter.css_declarations()
    );
    let _ = writeln!(
        css,
        ".toc-subchapter {{ {} padding-left: {}em; }}",
        style.toc_subchapter.css_declarations(),
        style.toc_subchapter.indent
    );

    // Chapter divider: only the title, vertically centered.
    let _ = writeln!(
        css,
        ".chapter-title-block {{ display: flex; align-items: center; justify-content: center; \
         min-height: {}mm; text-align: center; }}",
        page.height_mm - m.top - m.bottom - 1.0
    );

    css.push_str(".plain-text { white-space: pre-wrap; text-indent: 0; }\n");
    css
}
