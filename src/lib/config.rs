//! Configuration for page geometry, typography, stamping, the pagination engine and storage.
//!
//! Configuration is TOML, read leniently: each key that is missing or has the wrong type keeps
//! its built-in default, and a file that fails to parse falls back to the defaults entirely.
//! The resulting [`PressConfig`] is passed explicitly to every stage of the pipeline.
//!
//! # Sections
//!
//! - `[page]` sets the trim size in millimetres (`width`, `height`) and `margins`
//! - `[text]` is the body text; `indent` is the first-line indent in em
//! - `[heading.1]`, `[heading.2]`, `[heading.3]` style part, chapter and subchapter headings
//! - `[toc.chapter]` and `[toc.subchapter]` style table of contents lines
//! - `[copyright]` styles the copyright page; `notice` replaces the boilerplate sentence
//! - `[cover]` takes `background_image` (URL or path) and `backgroundcolor`; `[cover.title]` styles the title
//! - `[stamp]` controls merge-time running heads: `size`, `header_offset`, `footer_offset` (pt)
//! - `[engine]` is the external HTML-to-PDF command: `command` and `args` with `{input}`/`{output}`
//! - `[storage]` `root` keeps part artifacts in that directory between PDF runs (`--store` wins)
//!
//! # Style properties
//!
//! - `size` - font size in points (integer)
//! - `fontfamily` - CSS font family list (string)
//! - `textcolor`, `backgroundcolor` - RGB tables: `{ r = 0, g = 0, b = 0 }`
//! - `beforespacing`, `afterspacing` - spacing in em (float)
//! - `alignment` - "left", "center", "right" or "justify"
//! - `bold`, `italic` - booleans
//! - `indent` - first-line indent in em (float)
//!
//! # Example
//!
//! ```toml
//! [page]
//! width = 148.0
//! height = 210.0
//! margins = { top = 20.0, right = 18.0, bottom = 20.0, left = 18.0 }
//!
//! [text]
//! size = 11
//! alignment = "justify"
//! indent = 1.5
//!
//! [heading.2]
//! size = 18
//! bold = true
//!
//! [stamp]
//! size = 9
//! ```

use crate::styling::{
    BasicTextStyle, BookStyle, CoverStyle, Margins, PageSetup, TextAlignment,
};
use log::warn;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

/// Where the TOML configuration should be loaded from.
#[derive(Debug, Clone)]
pub enum ConfigSource<'a> {
    /// Built-in defaults
    Default,
    /// A file path
    File(&'a str),
    /// An embedded TOML string
    Embedded(&'a str),
}

/// Running header/footer stamping applied by the merge stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StampStyle {
    /// Font size in points of both the header and the footer.
    pub size: f32,
    /// Baseline distance of the header from the top edge, in points.
    pub header_offset: f32,
    /// Baseline distance of the footer from the bottom edge, in points.
    pub footer_offset: f32,
}

impl Default for StampStyle {
    fn default() -> Self {
        Self {
            size: 9.0,
            header_offset: 30.0,
            footer_offset: 26.0,
        }
    }
}

/// External HTML-to-PDF command used by [`crate::engine::CommandEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub command: String,
    pub args: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: "chromium".to_string(),
            args: vec![
                "--headless".to_string(),
                "--disable-gpu".to_string(),
                "--no-pdf-header-footer".to_string(),
                "--print-to-pdf={output}".to_string(),
                "{input}".to_string(),
            ],
        }
    }
}

pub const DEFAULT_COPYRIGHT_NOTICE: &str = "No part of this publication may be reproduced, \
distributed, or transmitted in any form or by any means, including photocopying, recording, or \
other electronic or mechanical methods, without the prior written permission of the publisher.";

#[derive(Debug, Clone, PartialEq)]
pub struct PressConfig {
    pub page: PageSetup,
    pub style: BookStyle,
    pub cover: CoverStyle,
    pub stamp: StampStyle,
    pub copyright_notice: String,
    pub engine: EngineConfig,
    /// Object store directory for the publishing pipeline. `None` keeps no artifacts.
    pub storage_root: Option<PathBuf>,
}

impl Default for PressConfig {
    fn default() -> Self {
        Self {
            page: PageSetup::a5(),
            style: BookStyle::default(),
            cover: CoverStyle::default(),
            stamp: StampStyle::default(),
            copyright_notice: DEFAULT_COPYRIGHT_NOTICE.to_string(),
            engine: EngineConfig::default(),
            storage_root: None,
        }
    }
}

fn parse_color(value: Option<&Value>, field: &str) -> Option<(u8, u8, u8)> {
    value.and_then(|c| {
        let color = c.get(field)?;
        let channel = |name: &str| -> Option<u8> {
            Some(color.get(name)?.as_integer()?.clamp(0, 255) as u8)
        };
        Some((channel("r")?, channel("g")?, channel("b")?))
    })
}

fn parse_alignment(value: Option<&Value>) -> Option<TextAlignment> {
    value.and_then(|v| v.as_str()).map(|s| match s {
        "left" => TextAlignment::Left,
        "center" => TextAlignment::Center,
        "right" => TextAlignment::Right,
        "justify" => TextAlignment::Justify,
        _ => TextAlignment::Left,
    })
}

/// Reads a float that may have been written as an integer (`margin = 20`).
fn as_number(value: Option<&Value>) -> Option<f32> {
    value.and_then(|v| {
        v.as_float()
            .map(|f| f as f32)
            .or_else(|| v.as_integer().map(|i| i as f32))
    })
}

fn parse_style(value: Option<&Value>, default: BasicTextStyle) -> BasicTextStyle {
    let mut style = default;
    if let Some(style_config) = value {
        if let Some(size) = style_config.get("size").and_then(|v| v.as_integer()) {
            style.size = size.clamp(1, u8::MAX as i64) as u8;
        }
        if let Some(spacing) = as_number(style_config.get("beforespacing")) {
            style.before_spacing = spacing;
        }
        if let Some(spacing) = as_number(style_config.get("afterspacing")) {
            style.after_spacing = spacing;
        }
        if let Some(color) = parse_color(Some(style_config), "textcolor") {
            style.text_color = Some(color);
        }
        if let Some(bg_color) = parse_color(Some(style_config), "backgroundcolor") {
            style.background_color = Some(bg_color);
        }
        if let Some(alignment) = parse_alignment(style_config.get("alignment")) {
            style.alignment = Some(alignment);
        }
        if let Some(font) = style_config.get("fontfamily").and_then(|v| v.as_str()) {
            style.font_family = Some(font.to_string());
        }
        if let Some(bold) = style_config.get("bold").and_then(|v| v.as_bool()) {
            style.bold = bold;
        }
        if let Some(italic) = style_config.get("italic").and_then(|v| v.as_bool()) {
            style.italic = italic;
        }
        if let Some(indent) = as_number(style_config.get("indent")) {
            style.indent = indent;
        }
    }
    style
}

fn parse_page(value: Option<&Value>, default: PageSetup) -> PageSetup {
    let mut page = default;
    let Some(page_config) = value else {
        return page;
    };
    if let Some(width) = as_number(page_config.get("width")).filter(|w| *w > 0.0) {
        page.width_mm = width;
    }
    if let Some(height) = as_number(page_config.get("height")).filter(|h| *h > 0.0) {
        page.height_mm = height;
    }
    if let Some(margins) = page_config.get("margins") {
        page.margins = Margins {
            top: as_number(margins.get("top")).unwrap_or(page.margins.top),
            right: as_number(margins.get("right")).unwrap_or(page.margins.right),
            bottom: as_number(margins.get("bottom")).unwrap_or(page.margins.bottom),
            left: as_number(margins.get("left")).unwrap_or(page.margins.left),
        };
    }
    page
}

fn parse_stamp(value: Option<&Value>, default: StampStyle) -> StampStyle {
    let mut stamp = default;
    if let Some(stamp_config) = value {
        if let Some(size) = as_number(stamp_config.get("size")).filter(|s| *s > 0.0) {
            stamp.size = size;
        }
        if let Some(offset) = as_number(stamp_config.get("header_offset")) {
            stamp.header_offset = offset;
        }
        if let Some(offset) = as_number(stamp_config.get("footer_offset")) {
            stamp.footer_offset = offset;
        }
    }
    stamp
}

fn parse_engine(value: Option<&Value>, default: EngineConfig) -> EngineConfig {
    let mut engine = default;
    if let Some(engine_config) = value {
        if let Some(command) = engine_config.get("command").and_then(|v| v.as_str()) {
            engine.command = command.to_string();
        }
        if let Some(args) = engine_config.get("args").and_then(|v| v.as_array()) {
            engine.args = args
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect();
        }
    }
    engine
}

/// Parses a TOML configuration string into a complete [`PressConfig`].
///
/// # Example
/// ```rust
/// use bookpress::config::parse_config_string;
///
/// let config = parse_config_string(r#"
/// [page]
/// width = 152.4
/// height = 228.6
///
/// [heading.2]
/// size = 20
///
/// [stamp]
/// size = 8
/// "#);
/// assert_eq!(config.page.width_mm, 152.4);
/// assert_eq!(config.style.heading_2.size, 20);
/// assert_eq!(config.stamp.size, 8.0);
/// ```
pub fn parse_config_string(config_str: &str) -> PressConfig {
    let config: Value = match toml::from_str(config_str) {
        Ok(v) => v,
        Err(e) => {
            warn!("Ignoring invalid configuration ({}), using defaults", e);
            return PressConfig::default();
        }
    };

    let defaults = PressConfig::default();
    let style_defaults = defaults.style.clone();
    let heading = config.get("heading");
    let toc = config.get("toc");
    let cover = config.get("cover");

    let style = BookStyle {
        text: parse_style(config.get("text"), style_defaults.text),
        heading_1: parse_style(heading.and_then(|h| h.get("1")), style_defaults.heading_1),
        heading_2: parse_style(heading.and_then(|h| h.get("2")), style_defaults.heading_2),
        heading_3: parse_style(heading.and_then(|h| h.get("3")), style_defaults.heading_3),
        toc_chapter: parse_style(toc.and_then(|t| t.get("chapter")), style_defaults.toc_chapter),
        toc_subchapter: parse_style(
            toc.and_then(|t| t.get("subchapter")),
            style_defaults.toc_subchapter,
        ),
        copyright: parse_style(config.get("copyright"), style_defaults.copyright),
        cover_title: parse_style(
            cover.and_then(|c| c.get("title")),
            style_defaults.cover_title,
        ),
        cover_subtitle: style_defaults.cover_subtitle,
        cover_author: style_defaults.cover_author,
        list_item: parse_style(config.get("list_item"), style_defaults.list_item),
        line_height: as_number(config.get("text").and_then(|t| t.get("lineheight")))
            .filter(|l| *l > 0.0)
            .unwrap_or(style_defaults.line_height),
    };

    let cover_style = CoverStyle {
        background_image: cover
            .and_then(|c| c.get("background_image"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string),
        background_color: parse_color(cover, "backgroundcolor")
            .unwrap_or(defaults.cover.background_color),
    };

    PressConfig {
        page: parse_page(config.get("page"), defaults.page),
        style,
        cover: cover_style,
        stamp: parse_stamp(config.get("stamp"), defaults.stamp),
        copyright_notice: config
            .get("copyright")
            .and_then(|c| c.get("notice"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or(defaults.copyright_notice),
        engine: parse_engine(config.get("engine"), defaults.engine),
        storage_root: config
            .get("storage")
            .and_then(|s| s.get("root"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .or(defaults.storage_root),
    }
}

/// Loads the configuration from the given source.
///
/// A file that cannot be read falls back to the defaults with a warning.
pub fn load_config_from_source(source: ConfigSource) -> PressConfig {
    match source {
        ConfigSource::Default => PressConfig::default(),
        ConfigSource::File(path) => match fs::read_to_string(Path::new(path)) {
            Ok(s) => parse_config_string(&s),
            Err(e) => {
                warn!("Could not read configuration {}: {}", path, e);
                PressConfig::default()
            }
        },
        ConfigSource::Embedded(content) => parse_config_string(content),
    }
}

/// A commented configuration file that parses back into the defaults.
pub fn default_config_toml() -> String {
    let d = PressConfig::default();
    let s = &d.style;
    let m = &d.page.margins;
    let mut out = String::new();
    out.push_str("# bookpress configuration\n\n");
    out.push_str("[page]\n");
    out.push_str(&format!("width = {:.1}\nheight = {:.1}\n", d.page.width_mm, d.page.height_mm));
    out.push_str(&format!(
        "margins = {{ top = {:.1}, right = {:.1}, bottom = {:.1}, left = {:.1} }}\n\n",
        m.top, m.right, m.bottom, m.left
    ));
    out.push_str(&format!(
        "[text]\nsize = {}\nalignment = \"justify\"\nindent = {:.1}\nlineheight = {:.1}\nfontfamily = \"{}\"\n\n",
        s.text.size,
        s.text.indent,
        s.line_height,
        s.text.font_family.as_deref().unwrap_or("serif").replace('"', "'")
    ));
    for (level, heading) in [(1, &s.heading_1), (2, &s.heading_2), (3, &s.heading_3)] {
        out.push_str(&format!(
            "[heading.{}]\nsize = {}\nbold = {}\n\n",
            level, heading.size, heading.bold
        ));
    }
    out.push_str(&format!("[copyright]\nsize = {}\n", s.copyright.size));
    out.push_str("# notice = \"Custom rights sentence\"\n\n");
    let (r, g, b) = d.cover.background_color;
    out.push_str(&format!(
        "[cover]\nbackgroundcolor = {{ r = {}, g = {}, b = {} }}\n# background_image = \"https://example.com/cover.jpg\"\n\n[cover.title]\nsize = {}\nbold = {}\n\n",
        r, g, b, s.cover_title.size, s.cover_title.bold
    ));
    out.push_str(&format!(
        "[stamp]\nsize = {:.1}\nheader_offset = {:.1}\nfooter_offset = {:.1}\n\n",
        d.stamp.size, d.stamp.header_offset, d.stamp.footer_offset
    ));
    let args = d
        .engine
        .args
        .iter()
        .map(|a| format!("\"{}\"", a))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!(
        "[engine]\ncommand = \"{}\"\nargs = [{}]\n\n",
        d.engine.command, args
    ));
    out.push_str("[storage]\n# root = \"bookpress-store\"\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_color() {
        let color_toml: Value = toml::from_str(
            r#"
            color = { r = 255, g = 128, b = 64 }
        "#,
        )
        .unwrap();
        assert_eq!(parse_color(Some(&color_toml), "color"), Some((255, 128, 64)));
        assert_eq!(parse_color(None, "color"), None);

        let invalid_color: Value = toml::from_str(
            r#"
            color = { r = 255, g = 128 }
        "#,
        )
        .unwrap();
        assert_eq!(parse_color(Some(&invalid_color), "color"), None);
    }

    #[test]
    fn test_parse_color_clamps_out_of_range_channels() {
        let color_toml: Value = toml::from_str(
            r#"
            color = { r = 300, g = -20, b = 255 }
        "#,
        )
        .unwrap();
        assert_eq!(parse_color(Some(&color_toml), "color"), Some((255, 0, 255)));
    }

    #[test]
    fn test_parse_alignment() {
        let alignments = [
            ("left", TextAlignment::Left),
            ("center", TextAlignment::Center),
            ("right", TextAlignment::Right),
            ("justify", TextAlignment::Justify),
        ];
        for (input, expected) in alignments.iter() {
            let align_toml: Value =
                toml::from_str(&format!("alignment = \"{}\"", input)).unwrap();
            assert_eq!(parse_alignment(align_toml.get("alignment")), Some(*expected));
        }

        let invalid_type: Value = toml::from_str("alignment = 42").unwrap();
        assert_eq!(parse_alignment(invalid_type.get("alignment")), None);
    }

    #[test]
    fn test_parse_style_partial_and_invalid_values() {
        let style_toml: Value = toml::from_str(
            r#"
            [style]
            size = 16
            bold = "not_a_boolean"
            beforespacing = 2
            indent = 0.5
            "#,
        )
        .unwrap();
        let default_style = BasicTextStyle::default();
        let parsed = parse_style(style_toml.get("style"), default_style.clone());
        assert_eq!(parsed.size, 16);
        assert_eq!(parsed.bold, default_style.bold);
        assert_eq!(parsed.before_spacing, 2.0);
        assert_eq!(parsed.indent, 0.5);
        assert_eq!(parsed.after_spacing, default_style.after_spacing);
    }

    #[test]
    fn test_parse_config_string() {
        let config = parse_config_string(
            r#"
            [page]
            width = 127
            margins = { top = 15.0, left = 12.5 }

            [text]
            size = 12
            alignment = "left"

            [cover]
            background_image = "https://img.example/cover.png"
            backgroundcolor = { r = 1, g = 2, b = 3 }

            [copyright]
            notice = "Printed with care."

            [engine]
            command = "wkhtmltopdf"
            args = ["{input}", "{output}"]

            [storage]
            root = "/tmp/books"
            "#,
        );
        assert_eq!(config.page.width_mm, 127.0);
        assert_eq!(config.page.height_mm, 210.0);
        assert_eq!(config.page.margins.top, 15.0);
        assert_eq!(config.page.margins.left, 12.5);
        assert_eq!(config.page.margins.right, 18.0);
        assert_eq!(config.style.text.size, 12);
        assert_eq!(config.style.text.alignment, Some(TextAlignment::Left));
        assert_eq!(
            config.cover.background_image.as_deref(),
            Some("https://img.example/cover.png")
        );
        assert_eq!(config.cover.background_color, (1, 2, 3));
        assert_eq!(config.copyright_notice, "Printed with care.");
        assert_eq!(config.engine.command, "wkhtmltopdf");
        assert_eq!(config.engine.args, vec!["{input}", "{output}"]);
        assert_eq!(config.storage_root, Some(PathBuf::from("/tmp/books")));
    }

    #[test]
    fn test_invalid_toml_falls_back_to_defaults() {
        let config = parse_config_string("this is not valid toml {{{");
        assert_eq!(config, PressConfig::default());
    }

    #[test]
    fn test_load_config_sources() {
        assert_eq!(load_config_from_source(ConfigSource::Default), PressConfig::default());
        assert_eq!(
            load_config_from_source(ConfigSource::File("nonexistent.toml")),
            PressConfig::default()
        );
        let embedded = load_config_from_source(ConfigSource::Embedded("[stamp]\nsize = 7"));
        assert_eq!(embedded.stamp.size, 7.0);
    }

    #[test]
    fn test_default_config_toml_parses_back_into_defaults() {
        let parsed = parse_config_string(&default_config_toml());
        assert_eq!(parsed, PressConfig::default());
    }

    #[test]
    fn test_storage_root_is_unset_unless_configured() {
        assert_eq!(PressConfig::default().storage_root, None);
        let blank = parse_config_string("[storage]\nroot = \"  \"");
        assert_eq!(blank.storage_root, None);
    }
}
