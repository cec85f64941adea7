//! Document assembler.
//!
//! Turns a book and its parts into styled HTML documents ready for a pagination engine:
//! the whole book in one preview document, or one standalone document per part.
//! The cover is always emitted bare (its own full-bleed page); every other part sits in a
//! `page-frame` that starts on a fresh page and carries the margins reserved for running heads.

use crate::config::PressConfig;
use crate::model::{Book, BookPart};
use crate::render::{Fragment, PartRenderer};
use crate::styling::{stylesheet, WrapperMode};
use html_escape::{encode_double_quoted_attribute, encode_text};
use log::debug;

/// Orders parts by `part_index`. Ties keep their input order.
pub fn sort_parts(parts: &[BookPart]) -> Vec<&BookPart> {
    let mut sorted: Vec<&BookPart> = parts.iter().collect();
    sorted.sort_by_key(|part| part.part_index);
    sorted
}

/// Maps the book's language field to an HTML `lang` value.
pub fn lang_code(language: Option<&str>) -> String {
    let Some(language) = language.map(str::trim).filter(|l| !l.is_empty()) else {
        return "en".to_string();
    };
    let lower = language.to_lowercase();
    let named = match lower.as_str() {
        "english" => Some("en"),
        "french" | "français" | "francais" => Some("fr"),
        "spanish" | "español" | "espanol" => Some("es"),
        "german" | "deutsch" => Some("de"),
        "italian" | "italiano" => Some("it"),
        "portuguese" | "português" | "portugues" => Some("pt"),
        "dutch" => Some("nl"),
        _ => None,
    };
    if let Some(code) = named {
        return code.to_string();
    }
    let looks_like_tag = lower.len() <= 8
        && lower
            .chars()
            .all(|c| c.is_ascii_alphabetic() || c == '-');
    if looks_like_tag {
        lower
    } else {
        "en".to_string()
    }
}

pub struct Assembler<'a> {
    config: &'a PressConfig,
}

impl<'a> Assembler<'a> {
    pub fn new(config: &'a PressConfig) -> Self {
        Self { config }
    }

    /// Renders every part in reading order, dropping empty fragments.
    pub fn fragments(&self, book: &Book, parts: &[BookPart]) -> Vec<Fragment> {
        let renderer = PartRenderer::new(self.config);
        sort_parts(parts)
            .into_iter()
            .map(|part| renderer.render(book, part))
            .filter(|fragment| {
                if fragment.is_empty() {
                    debug!("skipping empty fragment for part {}", fragment.part_index);
                }
                !fragment.is_empty()
            })
            .collect()
    }

    /// The whole book as one preview document.
    pub fn assemble_full(&self, book: &Book, parts: &[BookPart]) -> String {
        let fragments = self.fragments(book, parts);
        debug!(
            "assembling {} fragments for book {:?}",
            fragments.len(),
            book.id
        );

        let mut body = format!(
            "<span class=\"running-title\">{}</span>\n",
            encode_text(&book.title.to_uppercase())
        );
        for fragment in &fragments {
            push_fragment(&mut body, fragment);
        }
        self.wrap(book, &body, WrapperMode::Full)
    }

    /// One part as a standalone document for independent pagination.
    pub fn assemble_part(&self, book: &Book, part: &BookPart) -> String {
        let fragment = PartRenderer::new(self.config).render(book, part);
        self.assemble_fragment(book, &fragment)
    }

    pub fn assemble_fragment(&self, book: &Book, fragment: &Fragment) -> String {
        let mut body = String::new();
        if !fragment.is_empty() {
            push_fragment(&mut body, fragment);
        }
        self.wrap(book, &body, WrapperMode::Standalone)
    }

    fn wrap(&self, book: &Book, body: &str, mode: WrapperMode) -> String {
        let css = stylesheet(
            &self.config.style,
            &self.config.page,
            &self.config.cover,
            mode,
        );
        format!(
            "<!DOCTYPE html>\n<html lang=\"{}\">\n<head>\n<meta charset=\"utf-8\">\n\
             <title>{}</title>\n<style>\n{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
            encode_double_quoted_attribute(&lang_code(book.language.as_deref())),
            encode_text(&book.title),
            css,
            body
        )
    }
}

fn push_fragment(body: &mut String, fragment: &Fragment) {
    if fragment.is_cover() {
        body.push_str(&fragment.html);
    } else {
        body.push_str("<div class=\"page-frame\">\n");
        body.push_str(&fragment.html);
        body.push_str("</div>\n");
    }
}
