//! Markdown-lite: the small subset of markdown that generated chapter text actually uses.
//!
//! Recognised syntax, applied line by line:
//! - `**bold**` spans (any number per line, non-greedy, never nested)
//! - unordered items starting with `- ` or `* `
//! - ordered items starting with `N. `
//! - blank lines, which only separate paragraphs
//!
//! Every other non-blank line becomes its own paragraph. Consecutive items of the same list kind
//! are grouped into one list; a plain line or an item of the other kind closes the open list.
//!
//! The renderer is applied per text field (an introduction, one subchapter body, ...) and never
//! across a whole part payload, so titles stay out of the body markup.

use html_escape::encode_text;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static BOLD_SPAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("bold span pattern is valid"));

static ORDERED_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.\s+(.*)$").expect("ordered item pattern is valid"));

/// Inline run inside a paragraph or list item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Inline {
    Text(String),
    Strong(String),
}

impl Inline {
    pub fn text(&self) -> &str {
        match self {
            Inline::Text(t) | Inline::Strong(t) => t,
        }
    }
}

/// Block-level structure produced from a text field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Block {
    Paragraph(Vec<Inline>),
    List {
        ordered: bool,
        /// Number of the first item of an ordered list.
        start: u32,
        items: Vec<Vec<Inline>>,
    },
}

enum LineKind<'a> {
    Blank,
    Unordered(&'a str),
    Ordered(u32, &'a str),
    Plain(&'a str),
}

fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if let Some(rest) = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
    {
        return LineKind::Unordered(rest.trim());
    }
    if let Some(caps) = ORDERED_ITEM.captures(trimmed) {
        let number = caps[1].parse::<u32>().unwrap_or(1);
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return LineKind::Ordered(number, body.trim());
    }
    LineKind::Plain(trimmed)
}

/// Splits a line into plain and bold runs.
///
/// An unmatched `**` stays literal text.
pub fn parse_inline(line: &str) -> Vec<Inline> {
    let mut inlines = Vec::new();
    let mut last = 0;
    for caps in BOLD_SPAN.captures_iter(line) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            inlines.push(Inline::Text(line[last..whole.start()].to_string()));
        }
        inlines.push(Inline::Strong(inner.as_str().to_string()));
        last = whole.end();
    }
    if last < line.len() {
        inlines.push(Inline::Text(line[last..].to_string()));
    }
    inlines
}

/// Parses a text field into blocks.
pub fn parse(text: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut open_list: Option<Block> = None;

    for line in text.lines() {
        match classify(line) {
            LineKind::Blank => {}
            LineKind::Unordered(body) => {
                push_item(&mut blocks, &mut open_list, false, 1, body);
            }
            LineKind::Ordered(number, body) => {
                push_item(&mut blocks, &mut open_list, true, number, body);
            }
            LineKind::Plain(body) => {
                if let Some(list) = open_list.take() {
                    blocks.push(list);
                }
                blocks.push(Block::Paragraph(parse_inline(body)));
            }
        }
    }
    if let Some(list) = open_list.take() {
        blocks.push(list);
    }
    blocks
}

fn push_item(
    blocks: &mut Vec<Block>,
    open_list: &mut Option<Block>,
    ordered: bool,
    number: u32,
    body: &str,
) {
    if let Some(Block::List {
        ordered: open_ordered,
        items,
        ..
    }) = open_list
    {
        if *open_ordered == ordered {
            items.push(parse_inline(body));
            return;
        }
    }
    if let Some(list) = open_list.take() {
        blocks.push(list);
    }
    *open_list = Some(Block::List {
        ordered,
        start: number,
        items: vec![parse_inline(body)],
    });
}

/// Writes inline runs as escaped HTML.
pub fn inline_html(inlines: &[Inline]) -> String {
    let mut out = String::new();
    for inline in inlines {
        match inline {
            Inline::Text(text) => out.push_str(&encode_text(text)),
            Inline::Strong(text) => {
                out.push_str("<strong>");
                out.push_str(&encode_text(text));
                out.push_str("</strong>");
            }
        }
    }
    out
}

/// Writes blocks as HTML.
pub fn to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        match block {
            Block::Paragraph(inlines) => {
                out.push_str("<p>");
                out.push_str(&inline_html(inlines));
                out.push_str("</p>\n");
            }
            Block::List {
                ordered,
                start,
                items,
            } => {
                let tag = if *ordered { "ol" } else { "ul" };
                if *ordered && *start != 1 {
                    out.push_str(&format!("<ol start=\"{}\">\n", start));
                } else {
                    out.push_str(&format!("<{}>\n", tag));
                }
                for item in items {
                    out.push_str("<li>");
                    out.push_str(&inline_html(item));
                    out.push_str("</li>\n");
                }
                out.push_str(&format!("</{}>\n", tag));
            }
        }
    }
    out
}

/// Parses and renders a text field in one step.
pub fn render(text: &str) -> String {
    to_html(&parse(text))
}

/// Renders an optional field; a missing field yields empty output.
pub fn render_opt(text: Option<&str>) -> String {
    text.map(render).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bold_spans_are_extracted_non_greedy() {
        let inlines = parse_inline("**x** and **y**");
        assert_eq!(
            inlines,
            vec![
                Inline::Strong("x".to_string()),
                Inline::Text(" and ".to_string()),
                Inline::Strong("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_unclosed_bold_marker_stays_literal() {
        assert_eq!(
            parse_inline("a **dangling"),
            vec![Inline::Text("a **dangling".to_string())]
        );
    }

    #[test]
    fn test_list_grouping_is_closed_by_plain_line() {
        let blocks = parse("- a\n- b\nplain\n- c");
        assert_eq!(blocks.len(), 3);
        match &blocks[0] {
            Block::List { ordered, items, .. } => {
                assert!(!ordered);
                assert_eq!(items.len(), 2);
                assert_eq!(items[0], vec![Inline::Text("a".to_string())]);
                assert_eq!(items[1], vec![Inline::Text("b".to_string())]);
            }
            other => panic!("expected list, got {:?}", other),
        }
        assert_eq!(
            blocks[1],
            Block::Paragraph(vec![Inline::Text("plain".to_string())])
        );
        match &blocks[2] {
            Block::List { items, .. } => assert_eq!(items.len(), 1),
            other => panic!("expected list, got {:?}", other),
        }
    }

    #[test]
    fn test_switching_list_kind_opens_new_list() {
        let blocks = parse("- a\n* b\n1. one\n2. two\n- c");
        assert_eq!(blocks.len(), 3);
        assert!(matches!(&blocks[0], Block::List { ordered: false, items, .. } if items.len() == 2));
        assert!(matches!(&blocks[1], Block::List { ordered: true, items, .. } if items.len() == 2));
        assert!(matches!(&blocks[2], Block::List { ordered: false, .. }));
    }

    #[test]
    fn test_plain_lines_become_one_paragraph_each() {
        let blocks = parse("First line\nSecond line\n\n\nThird line\n");
        assert_eq!(blocks.len(), 3);
        assert!(blocks.iter().all(|b| matches!(b, Block::Paragraph(_))));
        assert_eq!(
            render("First line\nSecond line"),
            "<p>First line</p>\n<p>Second line</p>\n"
        );
    }

    #[test]
    fn test_bold_line_is_not_a_list_item() {
        let blocks = parse("**Key idea:** water early");
        assert!(matches!(&blocks[0], Block::Paragraph(inlines) if inlines.len() == 2));
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert_eq!(render(""), "");
        assert_eq!(render("\n\n  \n"), "");
        assert_eq!(render_opt(None), "");
    }

    #[test]
    fn test_html_output_escapes_text_and_marks_bold() {
        let html = render("Use <soil> & **compost**\n3. third\n4. fourth");
        assert!(html.contains("<p>Use &lt;soil&gt; &amp; <strong>compost</strong></p>"));
        assert!(html.contains("<ol start=\"3\">"));
        assert!(html.contains("<li>fourth</li>"));
        assert!(html.trim_end().ends_with("</ol>"));
    }
}
