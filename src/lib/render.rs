//! Part renderer: one typed book part in, one HTML fragment out.
//!
//! Rendering is a pure function of the part's type and decoded payload (plus the book record,
//! whose title, subtitle and author fill in for missing cover fields). It never fails:
//! payloads that do not decode are shown verbatim and unknown part types yield an empty fragment.

use crate::config::PressConfig;
use crate::markdown;
use crate::model::{
    Book, BookPart, ChapterContent, CopyrightContent, CoverContent, PartContent, PartType,
    ProseContent, TocContent,
};
use html_escape::{encode_double_quoted_attribute, encode_text};
use log::debug;

/// Rendered markup of one part.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub part_index: i64,
    pub part_type: PartType,
    pub html: String,
}

impl Fragment {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty()
    }

    pub fn is_cover(&self) -> bool {
        self.part_type == PartType::Cover
    }
}

pub struct PartRenderer<'a> {
    config: &'a PressConfig,
}

impl<'a> PartRenderer<'a> {
    pub fn new(config: &'a PressConfig) -> Self {
        Self { config }
    }

    pub fn render(&self, book: &Book, part: &BookPart) -> Fragment {
        self.render_content(book, part, &part.decode())
    }

    /// Renders an already decoded payload.
    pub fn render_content(&self, book: &Book, part: &BookPart, content: &PartContent) -> Fragment {
        let (class, body) = match content {
            PartContent::Cover(cover) => ("cover", self.cover(book, cover)),
            PartContent::Copyright(copyright) => ("copyright", self.copyright(book, copyright)),
            PartContent::Toc(toc) => ("toc", toc_html(toc)),
            PartContent::Introduction(prose) => ("introduction", prose_html(prose, "Introduction")),
            PartContent::Conclusion(prose) => ("conclusion", prose_html(prose, "Conclusion")),
            PartContent::ChapterTitle(chapter) => (
                "chapter-title",
                format!(
                    "<div class=\"chapter-title-block\"><h1>{}</h1></div>\n",
                    encode_text(title_or(&chapter.title, "Chapter"))
                ),
            ),
            PartContent::ChapterContent(chapter) => ("chapter", chapter_html(chapter)),
            PartContent::PlainText { text } => (
                "plain",
                format!(
                    "<div class=\"part-body\"><p class=\"plain-text\">{}</p></div>\n",
                    encode_text(text)
                ),
            ),
            PartContent::Unknown { part_type } => {
                debug!(
                    "part {} has unknown type {:?}, rendering nothing",
                    part.part_index, part_type
                );
                return Fragment {
                    part_index: part.part_index,
                    part_type: part.part_type.clone(),
                    html: String::new(),
                };
            }
        };

        let style_attr = match (content, &self.config.cover.background_image) {
            (PartContent::Cover(_), Some(image)) => format!(
                " style=\"background-image: url('{}');\"",
                encode_double_quoted_attribute(&image.replace('\'', "%27"))
            ),
            _ => String::new(),
        };

        Fragment {
            part_index: part.part_index,
            part_type: part.part_type.clone(),
            html: format!(
                "<section class=\"part {}\" data-part-index=\"{}\" data-part-type=\"{}\"{}>\n{}</section>\n",
                class,
                part.part_index,
                encode_double_quoted_attribute(part.part_type.as_str()),
                style_attr,
                body
            ),
        }
    }

    fn cover(&self, book: &Book, cover: &CoverContent) -> String {
        let title = cover.title.as_deref().unwrap_or(&book.title);
        let subtitle = cover.subtitle.as_deref().or(book.subtitle.as_deref());
        let author = cover.author.as_deref().or(book.author.as_deref());

        let mut html = String::from("<div class=\"cover-block\">\n");
        html.push_str(&format!("<h1 class=\"cover-title\">{}</h1>\n", encode_text(title)));
        if let Some(subtitle) = subtitle.filter(|s| !s.trim().is_empty()) {
            html.push_str(&format!(
                "<p class=\"cover-subtitle\">{}</p>\n",
                encode_text(subtitle)
            ));
        }
        if let Some(author) = author.filter(|s| !s.trim().is_empty()) {
            html.push_str(&format!(
                "<p class=\"cover-author\">{}</p>\n",
                encode_text(author)
            ));
        }
        html.push_str("</div>\n");
        html
    }

    fn copyright(&self, book: &Book, copyright: &CopyrightContent) -> String {
        let lines = copyright_lines(book, copyright, &self.config.copyright_notice);
        let mut html = String::from("<div class=\"copyright-block\">\n");
        for line in lines {
            html.push_str(&format!("<p>{}</p>\n", encode_text(&line)));
        }
        html.push_str("</div>\n");
        html
    }
}

/// Short paragraphs of the copyright page. Without explicit text this is the ownership line
/// followed by the fixed rights notice.
pub fn copyright_lines(book: &Book, copyright: &CopyrightContent, notice: &str) -> Vec<String> {
    match &copyright.text {
        Some(text) => text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        None => {
            let holder = book
                .author
                .as_deref()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or(&book.title);
            vec![
                format!("Copyright © {}. All rights reserved.", holder),
                notice.to_string(),
            ]
        }
    }
}

pub(crate) fn title_or<'t>(title: &'t Option<String>, fallback: &'t str) -> &'t str {
    title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(fallback)
}

fn toc_html(toc: &TocContent) -> String {
    let mut html = format!(
        "<h2 class=\"toc-heading\">{}</h2>\n<ul class=\"toc-list\">\n",
        encode_text(title_or(&toc.title, "Table of Contents"))
    );
    for entry in &toc.entries {
        let class = if entry.subchapter {
            "toc-subchapter"
        } else {
            "toc-chapter"
        };
        html.push_str(&format!(
            "<li class=\"{}\">{}</li>\n",
            class,
            encode_text(&entry.text)
        ));
    }
    html.push_str("</ul>\n");
    html
}

fn prose_html(prose: &ProseContent, fallback_title: &str) -> String {
    format!(
        "<h2 class=\"part-heading\">{}</h2>\n<div class=\"part-body\">\n{}</div>\n",
        encode_text(title_or(&prose.title, fallback_title)),
        markdown::render_opt(prose.content.as_deref())
    )
}

fn chapter_html(chapter: &ChapterContent) -> String {
    let mut html = format!(
        "<h2 class=\"chapter-heading\">{}</h2>\n<div class=\"part-body\">\n{}</div>\n",
        encode_text(title_or(&chapter.title, "Chapter")),
        markdown::render_opt(chapter.introduction.as_deref())
    );
    for subchapter in &chapter.subchapters {
        html.push_str(&format!(
            "<h3 class=\"subchapter-heading\">{}</h3>\n<div class=\"part-body\">\n{}</div>\n",
            encode_text(subchapter.title.as_deref().unwrap_or("")),
            markdown::render_opt(subchapter.content.as_deref())
        ));
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> Book {
        Book {
            id: "b1".to_string(),
            title: "Quiet Gardens".to_string(),
            subtitle: Some("Growing in small spaces".to_string()),
            author: Some("R. Vale".to_string()),
            ..Default::default()
        }
    }

    fn render(part_type: &str, content: &str) -> Fragment {
        let config = PressConfig::default();
        PartRenderer::new(&config).render(
            &book(),
            &BookPart::new(3, PartType::from(part_type), content),
        )
    }

    #[test]
    fn test_cover_falls_back_to_book_fields() {
        let fragment = render("cover", r#"{"title": "Quiet <Gardens>"}"#);
        assert!(fragment.is_cover());
        assert!(fragment.html.contains("<h1 class=\"cover-title\">Quiet &lt;Gardens&gt;</h1>"));
        assert!(fragment.html.contains("Growing in small spaces"));
        assert!(fragment.html.contains("<p class=\"cover-author\">R. Vale</p>"));
    }

    #[test]
    fn test_cover_background_image_from_config() {
        let mut config = PressConfig::default();
        config.cover.background_image = Some("https://img.example/c.jpg".to_string());
        let fragment = PartRenderer::new(&config).render(
            &book(),
            &BookPart::new(0, PartType::Cover, "{}"),
        );
        assert!(fragment
            .html
            .contains("style=\"background-image: url('https://img.example/c.jpg');\""));
    }

    #[test]
    fn test_copyright_boilerplate_when_no_text() {
        let fragment = render("copyright", "{}");
        assert!(fragment.html.contains("Copyright © R. Vale. All rights reserved."));
        assert!(fragment.html.contains("No part of this publication may be reproduced"));

        let fragment = render("copyright", "Line one\n\nLine two");
        assert_eq!(fragment.html.matches("<p>").count(), 2);
        assert!(!fragment.html.contains("No part of this publication"));
    }

    #[test]
    fn test_toc_marks_chapter_and_subchapter_lines() {
        let fragment = render(
            "toc",
            r#"{"title":"Contents","content":"Chapter 1: Soil\n- Compost\nChapter 2: Light"}"#,
        );
        assert!(fragment.html.contains("<h2 class=\"toc-heading\">Contents</h2>"));
        assert_eq!(fragment.html.matches("class=\"toc-chapter\"").count(), 2);
        assert!(fragment
            .html
            .contains("<li class=\"toc-subchapter\">Compost</li>"));
    }

    #[test]
    fn test_introduction_body_goes_through_markdown_lite() {
        let fragment = render(
            "introduction",
            r#"{"title":"Welcome","content":"First **bold** point\n- a\n- b"}"#,
        );
        assert!(fragment.html.contains("<h2 class=\"part-heading\">Welcome</h2>"));
        assert!(fragment.html.contains("<p>First <strong>bold</strong> point</p>"));
        assert!(fragment.html.contains("<ul>\n<li>a</li>\n<li>b</li>\n</ul>"));
    }

    #[test]
    fn test_chapter_title_is_a_standalone_divider() {
        let fragment = render("chapter_title", r#"{"title":"Chapter 2: Light"}"#);
        assert!(fragment
            .html
            .contains("<div class=\"chapter-title-block\"><h1>Chapter 2: Light</h1></div>"));
        assert!(!fragment.html.contains("<p>"));
    }

    #[test]
    fn test_chapter_content_renders_subchapters_in_stored_order() {
        let fragment = render(
            "chapter_content",
            r#"{"title":"Soil","introduction":"Why soil matters.","subchapters":[
                {"title":"Zeta","content":"last letter"},
                {"title":"Alpha","content":"first letter"}]}"#,
        );
        let zeta = fragment.html.find("Zeta").unwrap();
        let alpha = fragment.html.find("Alpha").unwrap();
        assert!(zeta < alpha);
        assert!(fragment.html.contains("<h2 class=\"chapter-heading\">Soil</h2>"));
        assert!(fragment.html.contains("<p>Why soil matters.</p>"));
        assert_eq!(fragment.html.matches("<h3 class=\"subchapter-heading\">").count(), 2);
    }

    #[test]
    fn test_malformed_payload_renders_raw_text() {
        let raw = "The model forgot the JSON & wrote prose";
        let fragment = render("chapter_content", raw);
        assert!(!fragment.is_empty());
        assert!(fragment
            .html
            .contains("<p class=\"plain-text\">The model forgot the JSON &amp; wrote prose</p>"));
    }

    #[test]
    fn test_array_payload_renders_raw_text_not_headings() {
        let fragment = render("introduction", r#"["Heading from array","Body from array"]"#);
        assert!(fragment.html.contains("class=\"plain-text\""));
        assert!(fragment.html.contains("Heading from array"));
        assert!(!fragment.html.contains("part-heading"));
    }

    #[test]
    fn test_unknown_part_type_renders_empty_fragment() {
        let fragment = render("appendix", r#"{"title":"A"}"#);
        assert!(fragment.is_empty());
        assert_eq!(fragment.part_index, 3);
    }

    #[test]
    fn test_fragment_carries_part_index_attribute() {
        let fragment = render("conclusion", r#"{"content":"Done."}"#);
        assert!(fragment.html.starts_with(
            "<section class=\"part conclusion\" data-part-index=\"3\" data-part-type=\"conclusion\">"
        ));
        assert!(fragment.html.contains(">Conclusion</h2>"));
    }
}
