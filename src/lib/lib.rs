//! The bookpress library assembles a book out of generated, loosely typed parts (cover,
//! copyright page, table of contents, introduction, chapter title pages, chapter bodies and a
//! conclusion) and publishes it in three forms: one HTML document for preview, a paginated PDF
//! stamped with running heads and page numbers, and a DOCX document for word processors.
//!
//! Input is a [`model::Manuscript`]: a book record plus its parts, each with an integer
//! `part_index` and a serialized JSON payload whose shape depends on the part type. Payloads that
//! do not match their declared shape never abort a build; they are rendered as plain text.
//!
//! ```rust
//! use bookpress::config::ConfigSource;
//! use bookpress::model::Manuscript;
//! use std::error::Error;
//!
//! fn example() -> Result<(), Box<dyn Error>> {
//!     let manuscript = Manuscript::from_json(r#"{
//!         "book": { "id": "b1", "title": "Small Gardens", "author": "R. Vale" },
//!         "parts": [
//!             { "part_index": 0, "part_type": "cover", "content": "{}" },
//!             { "part_index": 1, "part_type": "introduction",
//!               "content": "{\"title\":\"Why grow\",\"content\":\"Start **small**.\"}" }
//!         ]
//!     }"#)?;
//!     let html = bookpress::assemble_into_html(&manuscript, ConfigSource::Default);
//!     assert!(html.contains("<strong>small</strong>"));
//!     let pdf = bookpress::render_into_pdf(&manuscript, ConfigSource::Default)?;
//!     assert!(pdf.starts_with(b"%PDF-"));
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! Styling comes from a TOML file (`bookpressrc.toml`); every key is optional:
//! ```toml
//! [page]
//! width = 148.0
//! height = 210.0
//! margins = { top = 20.0, right = 18.0, bottom = 22.0, left = 18.0 }
//!
//! [text]
//! size = 11
//! alignment = "justify"
//! indent = 1.5
//!
//! [stamp]
//! size = 9
//! ```
//!
//! ## Publishing flow
//! ```text
//! +-------------+     +----------------+     +-------------------+
//! |  Manuscript |     |  Part renderer |     |  Assembler        |
//! |  book       | --> |  cover, toc,   | --> |  full preview     |
//! |  parts[]    |     |  chapters ...  |     |  one doc per part |
//! +-------------+     +----------------+     +-------------------+
//!                                                     |
//! +---------------+     +------------------+     +----v---------+
//! | book.pdf      |     | Merge            |     | Pagination   |
//! | header: TITLE | <-- | concatenate in   | <-- | engine, one  |
//! | footer: n     |     | part_index order |     | PDF per part |
//! +---------------+     +------------------+     +--------------+
//! ```
//! The DOCX export walks the same parts directly into styled paragraphs.

pub mod assemble;
pub mod config;
pub mod debug;
pub mod docx;
pub mod engine;
pub mod fonts;
pub mod markdown;
pub mod merge;
pub mod model;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod storage;
pub mod styling;
pub mod validation;

use model::Manuscript;
use std::path::Path;
use thiserror::Error;

fn hint(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!("\n💡 Suggestion: {}", s))
        .unwrap_or_default()
}

/// Errors raised while assembling, paginating, merging or storing a book.
///
/// Malformed part payloads are not errors: they degrade to plain text where they are decoded.
#[derive(Debug, Error)]
pub enum PressError {
    /// The manuscript file could not be read as a book with parts
    #[error("❌ Manuscript Error: {message}{}", hint(.suggestion))]
    Manuscript {
        message: String,
        suggestion: Option<String>,
    },
    #[error("❌ PDF Error: {message}{}", hint(.suggestion))]
    Pdf {
        message: String,
        suggestion: Option<String>,
    },
    #[error("❌ DOCX Error: {message}{}", hint(.suggestion))]
    Docx {
        message: String,
        suggestion: Option<String>,
    },
    /// The pagination engine failed or could not be started
    #[error("❌ Engine Error: {message}{}", hint(.suggestion))]
    Engine {
        message: String,
        suggestion: Option<String>,
    },
    /// Parts without a rendered artifact at merge time
    #[error(
        "❌ Merge Error: book {book_id:?} has parts without a rendered artifact: {part_indices:?}\n💡 Suggestion: Render every part before merging"
    )]
    MissingArtifacts {
        book_id: String,
        part_indices: Vec<i64>,
    },
    #[error("❌ Storage Error: {message}{}", hint(.suggestion))]
    Storage {
        message: String,
        suggestion: Option<String>,
    },
    #[error("❌ Not Found: {what}")]
    NotFound { what: String },
    #[error("❌ Status Error: a book cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("❌ File Error: {message}\n📁 Path: {path}\n💡 Suggestion: {suggestion}")]
    Io {
        message: String,
        path: String,
        suggestion: String,
    },
}

impl PressError {
    pub fn pdf_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        PressError::Pdf {
            message: message.into(),
            suggestion,
        }
    }

    pub fn docx_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        PressError::Docx {
            message: message.into(),
            suggestion,
        }
    }

    pub fn engine_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        PressError::Engine {
            message: message.into(),
            suggestion,
        }
    }

    pub fn storage_error(message: impl Into<String>, suggestion: Option<String>) -> Self {
        PressError::Storage {
            message: message.into(),
            suggestion,
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        PressError::NotFound { what: what.into() }
    }
}

/// Output formats of a published book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Pdf,
    Docx,
}

impl Format {
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Html => "html",
            Format::Pdf => "pdf",
            Format::Docx => "docx",
        }
    }
}

impl std::str::FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "html" => Ok(Format::Html),
            "pdf" => Ok(Format::Pdf),
            "docx" => Ok(Format::Docx),
            other => Err(format!("unknown format {:?} (expected html, pdf or docx)", other)),
        }
    }
}

/// Assembles the whole book into one previewable HTML document.
pub fn assemble_into_html(manuscript: &Manuscript, config: config::ConfigSource) -> String {
    let config = config::load_config_from_source(config);
    assemble::Assembler::new(&config).assemble_full(&manuscript.book, &manuscript.parts)
}

/// Lays out every part in-process, merges the pages and stamps running heads.
pub fn render_into_pdf(
    manuscript: &Manuscript,
    config: config::ConfigSource,
) -> Result<Vec<u8>, PressError> {
    let config = config::load_config_from_source(config);
    pdf::render_book_pdf(&config, &manuscript.book, &manuscript.parts)
}

pub fn export_into_docx(
    manuscript: &Manuscript,
    config: config::ConfigSource,
) -> Result<Vec<u8>, PressError> {
    let config = config::load_config_from_source(config);
    docx::export_docx(&config, &manuscript.book, &manuscript.parts)
}

/// Publishes the book in `format` with an already loaded configuration.
pub fn publish_into_bytes(
    manuscript: &Manuscript,
    format: Format,
    config: &config::PressConfig,
) -> Result<Vec<u8>, PressError> {
    let (book, parts) = (&manuscript.book, &manuscript.parts);
    match format {
        Format::Html => Ok(assemble::Assembler::new(config)
            .assemble_full(book, parts)
            .into_bytes()),
        Format::Pdf => pdf::render_book_pdf(config, book, parts),
        Format::Docx => docx::export_docx(config, book, parts),
    }
}

/// Publishes the book in `format` and writes it to `path`.
///
/// # Returns
/// * `Ok(())` once the file is written
/// * `Err(PressError::Io)` when the output directory is missing or the file cannot be written
pub fn publish_into_file(
    manuscript: &Manuscript,
    format: Format,
    path: &str,
    config: config::ConfigSource,
) -> Result<(), PressError> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(PressError::Io {
                message: "Output directory does not exist".to_string(),
                path: parent.display().to_string(),
                suggestion: format!("Create the directory first: mkdir -p {}", parent.display()),
            });
        }
    }

    let config = config::load_config_from_source(config);
    let bytes = publish_into_bytes(manuscript, format, &config)?;

    std::fs::write(path, bytes).map_err(|e| PressError::Io {
        message: e.to_string(),
        path: path.to_string(),
        suggestion: if e.kind() == std::io::ErrorKind::PermissionDenied {
            "Check that you have write permissions for this location".to_string()
        } else {
            "Try a different output path or check available disk space".to_string()
        },
    })
}
